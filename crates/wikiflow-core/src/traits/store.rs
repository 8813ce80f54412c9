//! Storage port: everything the engine reads or writes during a dispatch.

use async_trait::async_trait;

use crate::error::Result;
use crate::types::{
    NewNotification, NewTask, Notification, NotificationPreference, Task, Workflow,
};

/// Data access used by the matcher, task creator, and dispatcher.
///
/// Every call reads fresh rows; implementations must not cache.
#[async_trait]
pub trait EngineStore: Send + Sync {
    /// Active workflows bound to `trigger_event`, highest priority first.
    /// Ties are ordered by creation time, then id.
    async fn active_workflows(&self, trigger_event: &str) -> Result<Vec<Workflow>>;

    /// Ids of users holding `role`.
    async fn users_with_role(&self, role: &str) -> Result<Vec<String>>;

    /// Contact address for the email channel.
    async fn user_email(&self, user_id: &str) -> Result<Option<String>>;

    /// Stored preference rows for one user and notification type.
    async fn preferences(
        &self,
        user_id: &str,
        notification_type: &str,
    ) -> Result<Vec<NotificationPreference>>;

    async fn insert_task(&self, task: NewTask) -> Result<Task>;

    async fn insert_notification(&self, notification: NewNotification) -> Result<Notification>;
}
