//! Workflow definitions: trigger event → conditions → ordered actions.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{Result, WikiflowError};

/// Payload carried by a domain event. Shape is contract-by-convention per
/// trigger event (e.g. `comment_created` carries `post_author_id`,
/// `post_title`, `post_slug`, `actor_id`, `actor_name`).
pub type EventPayload = serde_json::Map<String, Value>;

/// Upper bound on `create_task.due_days` (about a century).
pub const MAX_DUE_DAYS: i64 = 36_500;

/// A stored rule binding a trigger event to conditions and actions.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Workflow {
    #[serde(default = "new_workflow_id")]
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub description: String,
    /// Event key, e.g. "comment_created".
    pub trigger_event: String,
    /// Field → expected value. Every entry must match; empty always matches.
    #[serde(default)]
    pub conditions: serde_json::Map<String, Value>,
    #[serde(default)]
    pub actions: Vec<Action>,
    #[serde(default = "bool_true")]
    pub is_active: bool,
    /// Higher runs first.
    #[serde(default)]
    pub priority: i32,
    #[serde(default = "Utc::now")]
    pub created_at: DateTime<Utc>,
}

fn bool_true() -> bool { true }

fn new_workflow_id() -> String {
    format!("wf-{}", uuid::Uuid::new_v4())
}

impl Workflow {
    /// Create an active workflow with no conditions.
    pub fn new(name: &str, trigger_event: &str, actions: Vec<Action>) -> Self {
        Self {
            id: new_workflow_id(),
            name: name.to_string(),
            description: String::new(),
            trigger_event: trigger_event.to_string(),
            conditions: serde_json::Map::new(),
            actions,
            is_active: true,
            priority: 0,
            created_at: Utc::now(),
        }
    }

    /// Builder: add an equality condition.
    pub fn with_condition(mut self, field: &str, expected: Value) -> Self {
        self.conditions.insert(field.to_string(), expected);
        self
    }

    /// Builder: set priority.
    pub fn with_priority(mut self, priority: i32) -> Self {
        self.priority = priority;
        self
    }

    /// Strict-equality check of every condition against the payload.
    pub fn matches(&self, payload: &EventPayload) -> bool {
        self.conditions
            .iter()
            .all(|(field, expected)| payload.get(field) == Some(expected))
    }

    /// Validate the definition before it is saved.
    pub fn validate(&self) -> Result<()> {
        if self.name.trim().is_empty() {
            return Err(WikiflowError::invalid_workflow("name is required"));
        }
        if self.trigger_event.trim().is_empty() {
            return Err(WikiflowError::invalid_workflow("trigger_event is required"));
        }
        for (i, action) in self.actions.iter().enumerate() {
            action
                .validate()
                .map_err(|e| WikiflowError::invalid_workflow(format!("action #{}: {e}", i + 1)))?;
        }
        Ok(())
    }
}

/// One unit of work a matched workflow performs.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Action {
    CreateTask(CreateTaskAction),
    NotifyUser(NotifyUserAction),
}

impl Action {
    /// Short kind label used in logs.
    pub fn kind(&self) -> &'static str {
        match self {
            Action::CreateTask(_) => "create_task",
            Action::NotifyUser(_) => "notify_user",
        }
    }

    fn validate(&self) -> std::result::Result<(), String> {
        match self {
            Action::CreateTask(a) => {
                if a.task_type.trim().is_empty() {
                    return Err("task_type is required".into());
                }
                if a.assigned_to_role.trim().is_empty() {
                    return Err("assigned_to_role must not be empty".into());
                }
                if a.title_template.trim().is_empty() {
                    return Err("title_template is required".into());
                }
                if a.due_days.is_some_and(|d| d < 0) {
                    return Err("due_days must not be negative".into());
                }
                if a.due_days.is_some_and(|d| d > MAX_DUE_DAYS) {
                    return Err(format!("due_days must be at most {MAX_DUE_DAYS}"));
                }
                check_placeholders(&a.title_template)
            }
            Action::NotifyUser(a) => {
                if a.notification_type.trim().is_empty() {
                    return Err("notification_type is required".into());
                }
                Ok(())
            }
        }
    }
}

/// Create one task per user holding a role.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CreateTaskAction {
    pub task_type: String,
    #[serde(default = "default_role")]
    pub assigned_to_role: String,
    /// Title with `{{field}}` placeholders filled from the payload.
    pub title_template: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub due_days: Option<i64>,
}

fn default_role() -> String { "admin".into() }

/// Notify the users selected by `target`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct NotifyUserAction {
    pub notification_type: String,
    pub target: NotifyTarget,
}

/// Who a `notify_user` action reaches.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum NotifyTarget {
    /// `payload.post_author_id`
    PostAuthor,
    /// `payload.user_id`
    User,
    /// Every user holding the admin role.
    AllAdmins,
}

/// Reject unterminated `{{` placeholders.
fn check_placeholders(template: &str) -> std::result::Result<(), String> {
    let mut rest = template;
    while let Some(start) = rest.find("{{") {
        let after = &rest[start + 2..];
        match after.find("}}") {
            Some(end) => rest = &after[end + 2..],
            None => return Err(format!("unterminated placeholder in '{template}'")),
        }
    }
    Ok(())
}
