//! # Wikiflow Core
//!
//! Shared building blocks for the workflow & notification engine:
//! configuration, the unified error type, the domain model, and the
//! ports (`EngineStore`, `MailTransport`) the engine is wired against.

pub mod config;
pub mod error;
pub mod traits;
pub mod types;

pub use config::WikiflowConfig;
pub use error::{Result, WikiflowError};
pub use traits::{EngineStore, MailTransport};
