//! In-memory table of processing tasks.
//!
//! Each upload gets a [`TaskRecord`] holding its progress and a
//! [`CancellationToken`] that a concurrent cancel request can trip. Records are
//! evicted lazily: every handler calls [`TaskStore::evict_expired`] before it
//! touches the table, and anything created longer ago than the retention window
//! is dropped whether or not it finished.

use std::time::{Duration, Instant};

use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use serde::Serialize;
use thiserror::Error;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use crate::Section;

/// Default time a task record is kept, measured from creation: 1 hour.
pub const DEFAULT_TASK_RETENTION: Duration = Duration::from_secs(60 * 60);

#[derive(Error, Debug, PartialEq, Eq)]
pub enum TaskError {
    #[error("task id is not a valid UUID: {0}")]
    InvalidId(String),
    #[error("task id already in use: {0}")]
    DuplicateId(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    Processing,
    Completed,
    Cancelled,
}

#[derive(Debug)]
struct TaskRecord {
    cancel: CancellationToken,
    progress: f64,
    current_section: Option<Section>,
    status: TaskStatus,
    created_at: Instant,
    completed_at: Option<Instant>,
}

impl TaskRecord {
    fn new() -> Self {
        Self {
            cancel: CancellationToken::new(),
            progress: 0.0,
            current_section: None,
            status: TaskStatus::Processing,
            created_at: Instant::now(),
            completed_at: None,
        }
    }
}

/// Point-in-time view of a task, safe to hand out of the map.
#[derive(Debug, Clone, PartialEq)]
pub struct TaskSnapshot {
    pub task_id: String,
    pub progress: f64,
    pub current_section: Option<Section>,
    /// `Cancelled` whenever the token has been tripped, regardless of the stored status.
    pub status: TaskStatus,
    pub age: Duration,
    /// Time between creation and completion, once finished.
    pub elapsed: Option<Duration>,
}

/// Concurrent task table keyed by task id.
#[derive(Debug)]
pub struct TaskStore {
    tasks: DashMap<String, TaskRecord>,
    retention: Duration,
}

impl Default for TaskStore {
    fn default() -> Self {
        Self::new(DEFAULT_TASK_RETENTION)
    }
}

impl TaskStore {
    pub fn new(retention: Duration) -> Self {
        Self {
            tasks: DashMap::new(),
            retention,
        }
    }

    pub fn retention(&self) -> Duration {
        self.retention
    }

    /// Create a task with a fresh random id.
    pub fn create(&self) -> (String, CancellationToken) {
        let id = Uuid::new_v4().to_string();
        let record = TaskRecord::new();
        let cancel = record.cancel.clone();
        self.tasks.insert(id.clone(), record);
        tracing::debug!(task_id = %id, "task created");
        (id, cancel)
    }

    /// Create a task under a caller-chosen id. The id must be a UUID not already in use.
    ///
    /// Returns the id in canonical (lowercase, hyphenated) form.
    pub fn create_with_id(&self, id: &str) -> Result<(String, CancellationToken), TaskError> {
        let id = Uuid::parse_str(id.trim())
            .map_err(|_| TaskError::InvalidId(id.to_string()))?
            .to_string();

        match self.tasks.entry(id.clone()) {
            Entry::Occupied(_) => Err(TaskError::DuplicateId(id)),
            Entry::Vacant(slot) => {
                let record = TaskRecord::new();
                let cancel = record.cancel.clone();
                slot.insert(record);
                tracing::debug!(task_id = %id, "task created with client id");
                Ok((id, cancel))
            }
        }
    }

    pub fn snapshot(&self, id: &str) -> Option<TaskSnapshot> {
        self.tasks.get(id).map(|record| TaskSnapshot {
            task_id: id.to_string(),
            progress: record.progress,
            current_section: record.current_section,
            status: if record.cancel.is_cancelled() {
                TaskStatus::Cancelled
            } else {
                record.status
            },
            age: record.created_at.elapsed(),
            elapsed: record
                .completed_at
                .map(|done| done.saturating_duration_since(record.created_at)),
        })
    }

    pub fn contains(&self, id: &str) -> bool {
        self.tasks.contains_key(id)
    }

    pub fn set_section(&self, id: &str, section: Section) {
        if let Some(mut record) = self.tasks.get_mut(id) {
            record.current_section = Some(section);
        }
    }

    /// Record progress in percent. Never moves backwards.
    pub fn set_progress(&self, id: &str, percent: f64) {
        if let Some(mut record) = self.tasks.get_mut(id) {
            record.progress = record.progress.max(percent.clamp(0.0, 100.0));
        }
    }

    /// Trip the task's cancellation token and mark it cancelled.
    ///
    /// Returns `false` if the task does not exist.
    pub fn cancel(&self, id: &str) -> bool {
        match self.tasks.get_mut(id) {
            Some(mut record) => {
                record.cancel.cancel();
                record.status = TaskStatus::Cancelled;
                tracing::info!(task_id = %id, "cancellation requested");
                true
            }
            None => false,
        }
    }

    /// Set the final status and completion time.
    pub fn finish(&self, id: &str, status: TaskStatus) {
        if let Some(mut record) = self.tasks.get_mut(id) {
            record.status = status;
            record.completed_at = Some(Instant::now());
        }
    }

    pub fn remove(&self, id: &str) -> bool {
        self.tasks.remove(id).is_some()
    }

    /// Drop every task created longer ago than the retention window.
    pub fn evict_expired(&self) -> usize {
        self.evict_expired_at(Instant::now())
    }

    /// [`evict_expired`](Self::evict_expired) against an explicit clock reading.
    pub fn evict_expired_at(&self, now: Instant) -> usize {
        let mut evicted = 0;
        self.tasks.retain(|_, record| {
            let keep = now.saturating_duration_since(record.created_at) <= self.retention;
            if !keep {
                evicted += 1;
            }
            keep
        });
        if evicted > 0 {
            tracing::debug!(evicted, remaining = self.tasks.len(), "evicted expired tasks");
        }
        evicted
    }

    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }
}
