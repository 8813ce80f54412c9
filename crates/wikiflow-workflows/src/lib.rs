//! # Wikiflow Workflows
//!
//! Rule engine that turns domain events into tasks and notifications.
//!
//! ## Architecture
//! ```text
//! Event ("comment_created", payload)
//!   → WorkflowEngine.dispatch(event, payload)
//!     → active workflows for the event, highest priority first
//!     → conditions: strict equality on payload fields
//!     → actions, in order, one outcome string each
//!         ├── create_task  → TaskCreator (one task per role holder + task_assigned)
//!         └── notify_user  → NotificationDispatcher (in-app, actor filtered)
//!
//! Direct send (NotificationDispatcher.send_notification)
//!   → per-channel preference policy
//!       ├── in_app  → immediate
//!       ├── email   → SMTP now, or scheduled at the next batch boundary
//!       └── push    → not implemented
//! ```
//!
//! Storage and mail go through the `EngineStore` / `MailTransport` ports
//! from `wikiflow-core`; `SqliteStore` and `SmtpTransport` are the bundled
//! implementations.

pub mod content;
pub mod dispatch;
pub mod notify;
pub mod persistence;
pub mod schedule;
pub mod tasks;
pub mod template;
pub mod workflow;

pub use dispatch::{LogTransport, SmtpTransport, transport_from_config};
pub use notify::{NotificationDispatcher, SendNotification, SendReport};
pub use persistence::SqliteStore;
pub use schedule::BatchSchedule;
pub use tasks::{TaskCreation, TaskCreator};
pub use workflow::{WorkflowEngine, WorkflowEvent, WorkflowOutcome};
