use std::ops::Deref;

use crate::error::{Error, Result};
use crate::models::{User, UserPatch};

use super::entity::{EntityStore, Outcome};

/// Staff accounts
#[derive(Clone)]
pub struct UserStore {
    inner: EntityStore<User>,
}

impl UserStore {
    pub fn new(inner: EntityStore<User>) -> Self {
        Self { inner }
    }

    /// Add a user; the username must be unused (case-insensitive)
    pub async fn add(&self, user: User) -> Result<Outcome<User>> {
        if self.find_by_username(&user.username).await.is_some() {
            return Err(Error::Duplicate {
                field: "username",
                value: user.username,
            });
        }
        self.inner.add(user).await
    }

    /// Update a user. Renaming onto another user's username is rejected
    /// before any write.
    pub async fn update(&self, id: &str, patch: UserPatch) -> Result<Outcome<User>> {
        if let Some(username) = &patch.username {
            let wanted = username.trim().to_lowercase();
            let taken = self
                .inner
                .filter(|u| u.id != id && u.username.to_lowercase() == wanted)
                .await;
            if !taken.is_empty() {
                return Err(Error::Duplicate {
                    field: "username",
                    value: username.trim().to_string(),
                });
            }
        }
        self.inner.update(id, patch).await
    }

    pub async fn find_by_username(&self, username: &str) -> Option<User> {
        let wanted = username.trim().to_lowercase();
        self.inner
            .filter(|u| u.username.to_lowercase() == wanted)
            .await
            .into_iter()
            .next()
    }

    pub async fn find_by_auth_id(&self, auth_id: &str) -> Option<User> {
        self.inner
            .filter(|u| u.auth_id.as_deref() == Some(auth_id))
            .await
            .into_iter()
            .next()
    }

    pub async fn active(&self) -> Vec<User> {
        self.inner.filter(|u| u.active).await
    }
}

impl Deref for UserStore {
    type Target = EntityStore<User>;

    fn deref(&self) -> &Self::Target {
        &self.inner
    }
}
