//! Notifications, delivery channels, and per-user preferences.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::WikiflowError;
use crate::types::EventPayload;

/// A notification record owned by one user.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Notification {
    pub id: String,
    pub user_id: String,
    pub notification_type: String,
    pub title: String,
    pub body: String,
    pub link: String,
    pub metadata: EventPayload,
    /// Channels the notification was delivered through.
    pub channels_sent: Vec<Channel>,
    /// Set for batched deliveries picked up by the batch sender.
    pub scheduled_for: Option<DateTime<Utc>>,
    pub is_read: bool,
    pub created_at: DateTime<Utc>,
}

/// Insert request for a notification row.
#[derive(Debug, Clone)]
pub struct NewNotification {
    pub user_id: String,
    pub notification_type: String,
    pub title: String,
    pub body: String,
    pub link: String,
    pub metadata: EventPayload,
    pub channels_sent: Vec<Channel>,
    pub scheduled_for: Option<DateTime<Utc>>,
}

/// Delivery medium.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(rename_all = "snake_case")]
pub enum Channel {
    InApp,
    Email,
    Push,
}

impl Channel {
    pub fn as_str(&self) -> &'static str {
        match self {
            Channel::InApp => "in_app",
            Channel::Email => "email",
            Channel::Push => "push",
        }
    }
}

impl std::fmt::Display for Channel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for Channel {
    type Err = WikiflowError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "in_app" => Ok(Channel::InApp),
            "email" => Ok(Channel::Email),
            "push" => Ok(Channel::Push),
            other => Err(WikiflowError::Other(format!("unknown channel '{other}'"))),
        }
    }
}

/// How often a channel's notifications are flushed.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum Frequency {
    #[default]
    Each,
    Daily,
    Weekly,
    Monthly,
    Never,
}

impl Frequency {
    pub fn as_str(&self) -> &'static str {
        match self {
            Frequency::Each => "each",
            Frequency::Daily => "daily",
            Frequency::Weekly => "weekly",
            Frequency::Monthly => "monthly",
            Frequency::Never => "never",
        }
    }

    /// Daily, weekly, and monthly deliveries are batched.
    pub fn is_batched(&self) -> bool {
        matches!(self, Frequency::Daily | Frequency::Weekly | Frequency::Monthly)
    }
}

impl std::str::FromStr for Frequency {
    type Err = WikiflowError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "each" => Ok(Frequency::Each),
            "daily" => Ok(Frequency::Daily),
            "weekly" => Ok(Frequency::Weekly),
            "monthly" => Ok(Frequency::Monthly),
            "never" => Ok(Frequency::Never),
            other => Err(WikiflowError::Other(format!("unknown frequency '{other}'"))),
        }
    }
}

/// One row per (user, notification type, channel).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct NotificationPreference {
    pub user_id: String,
    pub notification_type: String,
    pub channel: Channel,
    #[serde(default = "bool_true")]
    pub is_enabled: bool,
    #[serde(default)]
    pub frequency: Frequency,
}

fn bool_true() -> bool { true }

impl NotificationPreference {
    /// Policy applied when no row exists: enabled, delivered on each event.
    pub fn default_for(user_id: &str, notification_type: &str, channel: Channel) -> Self {
        Self {
            user_id: user_id.to_string(),
            notification_type: notification_type.to_string(),
            channel,
            is_enabled: true,
            frequency: Frequency::Each,
        }
    }
}

/// Directory entry: contact address and role memberships.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct UserRecord {
    pub user_id: String,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub roles: Vec<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_channel_wire_names() {
        let channels: Vec<Channel> =
            serde_json::from_str(r#"["in_app", "email", "push"]"#).unwrap();
        assert_eq!(channels, vec![Channel::InApp, Channel::Email, Channel::Push]);
        assert_eq!("email".parse::<Channel>().unwrap(), Channel::Email);
        assert!("sms".parse::<Channel>().is_err());
    }

    #[test]
    fn test_preference_defaults() {
        let pref: NotificationPreference = serde_json::from_str(
            r#"{"user_id": "u1", "notification_type": "welcome", "channel": "email"}"#,
        )
        .unwrap();
        assert!(pref.is_enabled);
        assert_eq!(pref.frequency, Frequency::Each);
        assert_eq!(pref, NotificationPreference::default_for("u1", "welcome", Channel::Email));
    }

    #[test]
    fn test_frequency_batching() {
        assert!(!Frequency::Each.is_batched());
        assert!(Frequency::Weekly.is_batched());
        assert!(!Frequency::Never.is_batched());
        assert_eq!("monthly".parse::<Frequency>().unwrap(), Frequency::Monthly);
    }
}
