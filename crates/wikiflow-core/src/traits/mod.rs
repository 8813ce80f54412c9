//! Ports the engine is wired against.

pub mod mail;
pub mod store;

pub use mail::MailTransport;
pub use store::EngineStore;
