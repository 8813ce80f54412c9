//! Domain model shared by the engine and the gateway.

pub mod notification;
pub mod task;
pub mod workflow;

pub use notification::{
    Channel, Frequency, NewNotification, Notification, NotificationPreference, UserRecord,
};
pub use task::{NewTask, Task, TaskStatus};
pub use workflow::{
    Action, CreateTaskAction, EventPayload, NotifyTarget, NotifyUserAction, Workflow,
};
