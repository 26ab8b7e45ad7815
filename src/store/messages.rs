use std::ops::Deref;

use crate::error::Result;
use crate::models::{Message, MessagePatch, User};

use super::entity::{EntityStore, Outcome};

/// Staff inbox
#[derive(Clone)]
pub struct MessageStore {
    inner: EntityStore<Message>,
}

impl MessageStore {
    pub fn new(inner: EntityStore<Message>) -> Self {
        Self { inner }
    }

    /// Send a message from one user to another
    pub async fn send(&self, from: &User, to: &User, subject: &str, content: &str) -> Result<Outcome<Message>> {
        self.inner
            .add(Message {
                from_id: from.id.clone(),
                from_name: from.name.clone(),
                to_id: to.id.clone(),
                to_name: to.name.clone(),
                subject: subject.to_string(),
                content: content.to_string(),
                ..Default::default()
            })
            .await
    }

    pub async fn inbox(&self, user_id: &str) -> Vec<Message> {
        self.inner.filter(|m| m.to_id == user_id).await
    }

    pub async fn sent(&self, user_id: &str) -> Vec<Message> {
        self.inner.filter(|m| m.from_id == user_id).await
    }

    pub async fn unread_count(&self, user_id: &str) -> usize {
        self.inner.filter(|m| m.to_id == user_id && !m.read).await.len()
    }

    pub async fn mark_read(&self, id: &str) -> Result<Outcome<Message>> {
        self.inner
            .update(
                id,
                MessagePatch {
                    read: Some(true),
                    ..Default::default()
                },
            )
            .await
    }
}

impl Deref for MessageStore {
    type Target = EntityStore<Message>;

    fn deref(&self) -> &Self::Target {
        &self.inner
    }
}
