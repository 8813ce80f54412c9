//! Workflow matcher. Runs every active workflow bound to an event.

use serde::{Deserialize, Serialize};
use std::sync::Arc;

use wikiflow_core::config::NotificationConfig;
use wikiflow_core::error::Result;
use wikiflow_core::traits::{EngineStore, MailTransport};
use wikiflow_core::types::{Action, EventPayload};

use crate::notify::{NotificationDispatcher, SendNotification, SendReport};
use crate::schedule::BatchSchedule;
use crate::tasks::TaskCreator;

/// An incoming domain event, as posted to `/trigger-workflow`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkflowEvent {
    pub event: String,
    #[serde(default)]
    pub data: EventPayload,
}

/// Outcomes of one matched workflow, one string per action in order.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct WorkflowOutcome {
    pub workflow: String,
    pub actions: Vec<String>,
}

/// Entry point for events and direct sends.
pub struct WorkflowEngine {
    store: Arc<dyn EngineStore>,
    tasks: TaskCreator,
    notifier: NotificationDispatcher,
}

impl WorkflowEngine {
    pub fn new(
        store: Arc<dyn EngineStore>,
        mailer: Arc<dyn MailTransport>,
        config: &NotificationConfig,
    ) -> Self {
        let tasks = TaskCreator::new(store.clone(), config.task_link.clone());
        let notifier =
            NotificationDispatcher::new(store.clone(), mailer, BatchSchedule::from_config(config));
        Self {
            store,
            tasks,
            notifier,
        }
    }

    /// Run every active, matching workflow for `event`. Only a failure to
    /// read the workflows is an error; action failures become `error:` outcomes.
    pub async fn dispatch(&self, event: &str, payload: &EventPayload) -> Result<Vec<WorkflowOutcome>> {
        let mut workflows = self.store.active_workflows(event).await?;
        workflows.retain(|w| w.is_active);
        // stable: ties keep the store's created_at/id order
        workflows.sort_by(|a, b| b.priority.cmp(&a.priority));

        let mut outcomes = Vec::new();
        for workflow in workflows.iter().filter(|w| w.matches(payload)) {
            tracing::info!("⚡ Workflow '{}' matched event '{event}'", workflow.name);

            let mut actions = Vec::with_capacity(workflow.actions.len());
            for action in &workflow.actions {
                let outcome = self.run_action(action, payload).await;
                tracing::debug!("  ↳ {} → {outcome}", action.kind());
                actions.push(outcome);
            }
            outcomes.push(WorkflowOutcome {
                workflow: workflow.name.clone(),
                actions,
            });
        }

        if outcomes.is_empty() {
            tracing::debug!("No workflows matched event '{event}'");
        }
        Ok(outcomes)
    }

    async fn run_action(&self, action: &Action, payload: &EventPayload) -> String {
        match action {
            Action::CreateTask(a) => match self.tasks.create(a, payload).await {
                Ok(created) => match created.created_id {
                    Some(id) => format!("task_created: {id}"),
                    None => format!("task_skipped: no users with role '{}'", a.assigned_to_role),
                },
                Err(e) => {
                    tracing::warn!("⚠️ create_task '{}' failed: {e}", a.task_type);
                    format!("error: {e}")
                }
            },
            Action::NotifyUser(a) => match self.notifier.notify_users(a, payload).await {
                Ok(count) => format!("notification_sent: {count}"),
                Err(e) => {
                    tracing::warn!("⚠️ notify_user '{}' failed: {e}", a.notification_type);
                    format!("error: {e}")
                }
            },
        }
    }

    /// Direct send, honoring the recipient's preferences.
    pub async fn send_notification(&self, request: SendNotification) -> Result<SendReport> {
        self.notifier.send_notification(request).await
    }
}
