//! Tracked tasks created by `create_task` actions.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{Result, WikiflowError};
use crate::types::EventPayload;

/// A task assigned to one user.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Task {
    pub id: String,
    pub task_type: String,
    pub title: String,
    /// Assignee user id.
    pub assigned_to: String,
    pub status: TaskStatus,
    pub due_date: Option<DateTime<Utc>>,
    /// Copy of the triggering payload.
    pub metadata: EventPayload,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Insert request for a task row. Status always starts at `Pending`.
#[derive(Debug, Clone)]
pub struct NewTask {
    pub task_type: String,
    pub title: String,
    pub assigned_to: String,
    pub due_date: Option<DateTime<Utc>>,
    pub metadata: EventPayload,
}

/// Task status.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    Pending,
    InProgress,
    Completed,
    Cancelled,
}

impl TaskStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            TaskStatus::Pending => "pending",
            TaskStatus::InProgress => "in_progress",
            TaskStatus::Completed => "completed",
            TaskStatus::Cancelled => "cancelled",
        }
    }

    /// Completed and cancelled tasks never move again.
    pub fn is_terminal(&self) -> bool {
        matches!(self, TaskStatus::Completed | TaskStatus::Cancelled)
    }

    /// Whether an assignee may move a task from `self` to `next`.
    pub fn can_transition_to(&self, next: TaskStatus) -> bool {
        use TaskStatus::*;
        matches!(
            (self, next),
            (Pending, InProgress | Completed | Cancelled)
                | (InProgress, Pending | Completed | Cancelled)
        )
    }

    /// Validate a transition, returning the new status.
    pub fn transition(self, next: TaskStatus) -> Result<TaskStatus> {
        if self.can_transition_to(next) {
            Ok(next)
        } else {
            Err(WikiflowError::InvalidTransition(format!(
                "{} → {}",
                self.as_str(),
                next.as_str()
            )))
        }
    }
}

impl std::fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for TaskStatus {
    type Err = WikiflowError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "pending" => Ok(TaskStatus::Pending),
            "in_progress" => Ok(TaskStatus::InProgress),
            "completed" => Ok(TaskStatus::Completed),
            "cancelled" => Ok(TaskStatus::Cancelled),
            other => Err(WikiflowError::Other(format!("unknown task status '{other}'"))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transitions() {
        assert!(TaskStatus::Pending.can_transition_to(TaskStatus::InProgress));
        assert!(TaskStatus::InProgress.can_transition_to(TaskStatus::Completed));
        assert!(TaskStatus::InProgress.can_transition_to(TaskStatus::Pending));
        assert!(!TaskStatus::Completed.can_transition_to(TaskStatus::Pending));
        assert!(!TaskStatus::Cancelled.can_transition_to(TaskStatus::InProgress));
        assert!(!TaskStatus::Pending.can_transition_to(TaskStatus::Pending));
    }

    #[test]
    fn test_transition_error() {
        let err = TaskStatus::Completed.transition(TaskStatus::Pending).unwrap_err();
        assert!(matches!(err, WikiflowError::InvalidTransition(_)));
    }

    #[test]
    fn test_status_parse() {
        assert_eq!("in_progress".parse::<TaskStatus>().unwrap(), TaskStatus::InProgress);
        assert!("done".parse::<TaskStatus>().is_err());
        assert!(TaskStatus::Cancelled.is_terminal());
    }
}
