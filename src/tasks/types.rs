use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TaskStatus {
    Running,
    Done,
    Error,
}

/// What a poller sees for one task.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskSnapshot<T> {
    pub id: Uuid,
    pub status: TaskStatus,
    /// 0–100, never decreasing.
    pub progress: usize,
    pub message: String,
    pub result: Option<T>,
    pub error: Option<String>,
    pub submitted_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
}

impl<T> TaskSnapshot<T> {
    pub(crate) fn submitted(id: Uuid) -> Self {
        Self {
            id,
            status: TaskStatus::Running,
            progress: 0,
            message: "queued".to_string(),
            result: None,
            error: None,
            submitted_at: Utc::now(),
            finished_at: None,
        }
    }

    pub fn is_finished(&self) -> bool {
        self.status != TaskStatus::Running
    }
}
