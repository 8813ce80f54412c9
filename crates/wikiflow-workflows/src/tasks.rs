//! Task creator: one task per holder of the action's role, each with a
//! companion `task_assigned` in-app notification.

use chrono::{TimeDelta, Utc};
use serde_json::Value;
use std::sync::Arc;

use wikiflow_core::error::{Result, WikiflowError};
use wikiflow_core::traits::EngineStore;
use wikiflow_core::types::{Channel, CreateTaskAction, EventPayload, NewNotification, NewTask};

use crate::template::{payload_id, render};

const TASK_ASSIGNED: &str = "task_assigned";
const TASK_ASSIGNED_TITLE: &str = "Nova tarefa atribuída";

/// Result of running one `create_task` action.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaskCreation {
    /// Id of the first task created, if any.
    pub created_id: Option<String>,
    pub count: usize,
}

pub struct TaskCreator {
    store: Arc<dyn EngineStore>,
    task_link: String,
}

impl TaskCreator {
    pub fn new(store: Arc<dyn EngineStore>, task_link: impl Into<String>) -> Self {
        Self {
            store,
            task_link: task_link.into(),
        }
    }

    /// Create the tasks for one action. No role holders means nothing is
    /// written and `count` is zero.
    pub async fn create(
        &self,
        action: &CreateTaskAction,
        payload: &EventPayload,
    ) -> Result<TaskCreation> {
        let mut assignees = self.store.users_with_role(&action.assigned_to_role).await?;
        assignees.sort();
        assignees.dedup();

        if assignees.is_empty() {
            tracing::info!(
                "📭 No users with role '{}', skipping task '{}'",
                action.assigned_to_role,
                action.task_type
            );
            return Ok(TaskCreation {
                created_id: None,
                count: 0,
            });
        }

        let title = render(&action.title_template, payload)?;
        let due_date = action
            .due_days
            .map(|d| {
                TimeDelta::try_days(d)
                    .and_then(|delta| Utc::now().checked_add_signed(delta))
                    .ok_or_else(|| WikiflowError::Other(format!("due_days {d} is out of range")))
            })
            .transpose()?;
        let actor = payload_id(payload, "actor_id");

        let mut created_id = None;
        for user_id in &assignees {
            let task = self
                .store
                .insert_task(NewTask {
                    task_type: action.task_type.clone(),
                    title: title.clone(),
                    assigned_to: user_id.clone(),
                    due_date,
                    metadata: payload.clone(),
                })
                .await?;
            tracing::info!("📋 Task '{}' assigned to {user_id}", task.title);

            // the actor never hears about their own assignment
            if actor.as_deref() != Some(user_id.as_str()) {
                let mut metadata = EventPayload::new();
                metadata.insert("task_id".into(), Value::String(task.id.clone()));
                metadata.insert("task_type".into(), Value::String(task.task_type.clone()));
                self.store
                    .insert_notification(NewNotification {
                        user_id: user_id.clone(),
                        notification_type: TASK_ASSIGNED.into(),
                        title: TASK_ASSIGNED_TITLE.into(),
                        body: task.title.clone(),
                        link: self.task_link.clone(),
                        metadata,
                        channels_sent: vec![Channel::InApp],
                        scheduled_for: None,
                    })
                    .await?;
            }

            created_id.get_or_insert(task.id);
        }

        Ok(TaskCreation {
            created_id,
            count: assignees.len(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::persistence::SqliteStore;
    use serde_json::json;
    use std::path::PathBuf;
    use wikiflow_core::types::UserRecord;

    fn store_with(users: &[(&str, &str)]) -> Arc<SqliteStore> {
        let store = SqliteStore::open(&PathBuf::from(":memory:")).unwrap();
        for (id, role) in users {
            store
                .upsert_user(&UserRecord {
                    user_id: id.to_string(),
                    email: None,
                    roles: vec![role.to_string()],
                })
                .unwrap();
        }
        Arc::new(store)
    }

    fn review_action(due_days: Option<i64>) -> CreateTaskAction {
        CreateTaskAction {
            task_type: "review".into(),
            assigned_to_role: "admin".into(),
            title_template: "Novo comentário em {{post_title}}".into(),
            due_days,
        }
    }

    #[tokio::test]
    async fn test_one_task_per_role_holder() {
        let store = store_with(&[("a1", "admin"), ("a2", "admin"), ("u1", "reader")]);
        let creator = TaskCreator::new(store.clone(), "/admin/tasks");
        let payload = json!({"post_title": "Intro a Dados"});

        let result = creator
            .create(&review_action(Some(3)), payload.as_object().unwrap())
            .await
            .unwrap();
        assert_eq!(result.count, 2);
        assert!(result.created_id.is_some());

        let tasks = store.list_tasks(None).unwrap();
        assert_eq!(tasks.len(), 2);
        for task in &tasks {
            assert_eq!(task.title, "Novo comentário em Intro a Dados");
            assert_eq!(task.metadata["post_title"], "Intro a Dados");
            let due = task.due_date.unwrap();
            let days = (due - task.created_at).num_days();
            assert!((2..=3).contains(&days));
        }

        let inbox = store.list_notifications("a1").unwrap();
        assert_eq!(inbox.len(), 1);
        assert_eq!(inbox[0].notification_type, "task_assigned");
        assert_eq!(inbox[0].title, "Nova tarefa atribuída");
        assert_eq!(inbox[0].body, "Novo comentário em Intro a Dados");
        assert_eq!(inbox[0].link, "/admin/tasks");
        assert_eq!(inbox[0].metadata["task_type"], "review");
        assert!(store.list_notifications("u1").unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_no_role_holders_writes_nothing() {
        let store = store_with(&[("u1", "reader")]);
        let creator = TaskCreator::new(store.clone(), "/admin/tasks");

        let result = creator
            .create(&review_action(None), &EventPayload::new())
            .await
            .unwrap();
        assert_eq!(result, TaskCreation { created_id: None, count: 0 });
        assert!(store.list_tasks(None).unwrap().is_empty());
        assert!(store.list_notifications("u1").unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_actor_gets_task_but_no_companion_notification() {
        let store = store_with(&[("a1", "admin"), ("a2", "admin")]);
        let creator = TaskCreator::new(store.clone(), "/admin/tasks");
        let payload = json!({"post_title": "X", "actor_id": "a1"});

        let result = creator
            .create(&review_action(None), payload.as_object().unwrap())
            .await
            .unwrap();
        assert_eq!(result.count, 2);
        assert_eq!(store.list_tasks(Some("a1")).unwrap().len(), 1);
        assert!(store.list_notifications("a1").unwrap().is_empty());
        assert_eq!(store.list_notifications("a2").unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_no_due_days_means_no_due_date() {
        let store = store_with(&[("a1", "admin")]);
        let creator = TaskCreator::new(store.clone(), "/admin/tasks");
        creator
            .create(&review_action(None), &EventPayload::new())
            .await
            .unwrap();
        assert!(store.list_tasks(None).unwrap()[0].due_date.is_none());
    }

    #[tokio::test]
    async fn test_out_of_range_due_days_is_an_error() {
        let store = store_with(&[("a1", "admin")]);
        let creator = TaskCreator::new(store.clone(), "/admin/tasks");

        let err = creator
            .create(&review_action(Some(100_000_000)), &EventPayload::new())
            .await
            .unwrap_err();
        assert_eq!(err.to_string(), "due_days 100000000 is out of range");
        assert!(store.list_tasks(None).unwrap().is_empty());
        assert!(store.list_notifications("a1").unwrap().is_empty());
    }
}
