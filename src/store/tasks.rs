use std::ops::Deref;
use std::sync::Arc;

use log::warn;

use crate::error::{Error, Result};
use crate::files::{FileStore, Upload};
use crate::models::{HistoryEntry, Status, Task};

use super::entity::{EntityStore, Outcome};

/// An upload that did not make it
#[derive(Debug, Clone, PartialEq)]
pub struct FailedUpload {
    pub name: String,
    pub error: String,
}

/// Result of [`TaskStore::add_images`]. Uploaded files are never rolled back.
#[derive(Debug, Clone)]
pub struct ImageUploadReport {
    /// URLs recorded on the task
    pub uploaded: Vec<String>,
    pub failed: Vec<FailedUpload>,
    /// Outcome of the task write; `None` when nothing was uploaded
    pub task: Option<Outcome<Task>>,
}

/// Tasks with their append-only history
#[derive(Clone)]
pub struct TaskStore {
    inner: EntityStore<Task>,
    files: Arc<dyn FileStore>,
}

impl TaskStore {
    pub fn new(inner: EntityStore<Task>, files: Arc<dyn FileStore>) -> Self {
        Self { inner, files }
    }

    /// Add a task; its history starts with a creation entry
    pub async fn add(&self, mut task: Task) -> Result<Outcome<Task>> {
        task.history.clear();
        task.history.push(HistoryEntry::now(
            task.status,
            "Task created",
            &task.created_by,
        ));
        self.inner.add(task).await
    }

    /// Move a task forward, appending exactly one history entry.
    /// The same status is a no-op; going back is rejected.
    pub async fn set_status(
        &self,
        id: &str,
        status: Status,
        actor: &str,
        note: Option<&str>,
    ) -> Result<Outcome<Task>> {
        let actor = actor.to_string();
        let description = match note {
            Some(note) if !note.trim().is_empty() => note.to_string(),
            _ => format!("Status changed to {}", status),
        };

        self.inner
            .update_with(id, move |task| {
                if task.status == status {
                    return Ok(false);
                }
                if !task.status.can_transition_to(status) {
                    return Err(Error::InvalidTransition {
                        from: task.status,
                        to: status,
                    });
                }
                task.status = status;
                task.history.push(HistoryEntry::now(status, description, &actor));
                Ok(true)
            })
            .await
    }

    /// Upload images into `tasks/<id>` and record the successful ones with a
    /// single history entry.
    pub async fn add_images(&self, task_id: &str, files: Vec<Upload>, actor: &str) -> Result<ImageUploadReport> {
        let folder = format!("tasks/{}", task_id);
        let mut uploaded = Vec::new();
        let mut failed = Vec::new();

        for file in &files {
            match self.files.upload(file, &folder).await {
                Ok(url) => uploaded.push(url),
                Err(e) => {
                    warn!("Upload of {} for task {} failed: {}", file.name, task_id, e);
                    failed.push(FailedUpload {
                        name: file.name.clone(),
                        error: e.to_string(),
                    });
                }
            }
        }

        if uploaded.is_empty() {
            return Ok(ImageUploadReport {
                uploaded,
                failed,
                task: None,
            });
        }

        let urls = uploaded.clone();
        let actor = actor.to_string();
        let outcome = self
            .inner
            .update_with(task_id, move |task| {
                let description = format!("{} image(s) added", urls.len());
                task.images.extend(urls);
                task.history.push(HistoryEntry::now(task.status, description, &actor));
                Ok(true)
            })
            .await?;

        if outcome.is_not_found() {
            warn!("Task {} vanished; {} uploaded file(s) are unreferenced", task_id, uploaded.len());
        }

        Ok(ImageUploadReport {
            uploaded,
            failed,
            task: Some(outcome),
        })
    }

    /// Tasks working on a vehicle, or on any vehicle of a reception
    pub async fn tasks_for_vehicle(&self, vehicle_id: &str) -> Vec<Task> {
        self.inner
            .filter(|t| t.vehicle.as_ref().map(|v| v.vehicle_id == vehicle_id).unwrap_or(false))
            .await
    }

    pub async fn tasks_for_reception(&self, reception_id: &str) -> Vec<Task> {
        self.inner
            .filter(|t| t.vehicle.as_ref().map(|v| v.reception_id == reception_id).unwrap_or(false))
            .await
    }

    pub async fn tasks_for_user(&self, user_id: &str) -> Vec<Task> {
        self.inner
            .filter(|t| t.assigned_to.as_ref().map(|a| a.user_id == user_id).unwrap_or(false))
            .await
    }
}

impl Deref for TaskStore {
    type Target = EntityStore<Task>;

    fn deref(&self) -> &Self::Target {
        &self.inner
    }
}
