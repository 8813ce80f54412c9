//! Notification dispatcher.
//!
//! Two entry points:
//! - [`NotificationDispatcher::notify_users`] for workflow `notify_user`
//!   actions: resolves targets from the payload, drops the actor, writes
//!   in-app rows from the per-type copy. Preferences are not consulted.
//! - [`NotificationDispatcher::send_notification`] for direct sends: applies
//!   each user's per-channel preference (enabled flag and frequency).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;

use wikiflow_core::error::Result;
use wikiflow_core::traits::{EngineStore, MailTransport};
use wikiflow_core::types::{
    Channel, EventPayload, Frequency, NewNotification, NotificationPreference, NotifyTarget,
    NotifyUserAction,
};

use crate::content::{FALLBACK_LINK, compose};
use crate::schedule::BatchSchedule;
use crate::template::payload_id;

/// Direct-send request, as posted to `/send-notification`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SendNotification {
    pub user_id: String,
    #[serde(rename = "type")]
    pub notification_type: String,
    pub title: String,
    #[serde(default)]
    pub body: String,
    #[serde(default = "default_link")]
    pub link: String,
    #[serde(default)]
    pub metadata: EventPayload,
    #[serde(default = "default_channels")]
    pub channels: Vec<Channel>,
}

fn default_link() -> String { FALLBACK_LINK.into() }
fn default_channels() -> Vec<Channel> { vec![Channel::InApp] }

/// Per-channel outcome of a direct send.
#[derive(Debug, Clone, Default, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct SendReport {
    /// Channels delivered immediately.
    pub channels_sent: Vec<Channel>,
    /// Channel name → `sent`, `disabled`, `never`, `scheduled_<freq>`,
    /// `not_implemented`, or `failed: <reason>`.
    pub results: BTreeMap<String, String>,
}

pub struct NotificationDispatcher {
    store: Arc<dyn EngineStore>,
    mailer: Arc<dyn MailTransport>,
    schedule: BatchSchedule,
}

impl NotificationDispatcher {
    pub fn new(
        store: Arc<dyn EngineStore>,
        mailer: Arc<dyn MailTransport>,
        schedule: BatchSchedule,
    ) -> Self {
        Self {
            store,
            mailer,
            schedule,
        }
    }

    /// Run a `notify_user` action. Returns how many notifications were written.
    pub async fn notify_users(
        &self,
        action: &NotifyUserAction,
        payload: &EventPayload,
    ) -> Result<usize> {
        let recipients = self.resolve_targets(action.target, payload).await?;
        if recipients.is_empty() {
            tracing::debug!("📭 No recipients for '{}'", action.notification_type);
            return Ok(0);
        }

        let content = compose(&action.notification_type, payload)?;
        for user_id in &recipients {
            self.store
                .insert_notification(NewNotification {
                    user_id: user_id.clone(),
                    notification_type: action.notification_type.clone(),
                    title: content.title.clone(),
                    body: content.body.clone(),
                    link: content.link.clone(),
                    metadata: payload.clone(),
                    channels_sent: vec![Channel::InApp],
                    scheduled_for: None,
                })
                .await?;
        }

        tracing::info!(
            "🔔 '{}' notification sent to {} user(s)",
            action.notification_type,
            recipients.len()
        );
        Ok(recipients.len())
    }

    /// Target ids with the actor removed, deduplicated, in resolution order.
    async fn resolve_targets(
        &self,
        target: NotifyTarget,
        payload: &EventPayload,
    ) -> Result<Vec<String>> {
        let candidates = match target {
            NotifyTarget::PostAuthor => payload_id(payload, "post_author_id").into_iter().collect(),
            NotifyTarget::User => payload_id(payload, "user_id").into_iter().collect(),
            NotifyTarget::AllAdmins => self.store.users_with_role("admin").await?,
        };

        let actor = payload_id(payload, "actor_id");
        let mut recipients: Vec<String> = Vec::with_capacity(candidates.len());
        for id in candidates {
            if actor.as_deref() == Some(id.as_str()) || recipients.contains(&id) {
                continue;
            }
            recipients.push(id);
        }
        Ok(recipients)
    }

    /// Deliver a direct notification according to the user's preferences.
    pub async fn send_notification(&self, request: SendNotification) -> Result<SendReport> {
        self.send_notification_at(request, Utc::now()).await
    }

    /// Same as [`send_notification`](Self::send_notification) with an
    /// explicit clock for batch scheduling.
    pub async fn send_notification_at(
        &self,
        request: SendNotification,
        now: DateTime<Utc>,
    ) -> Result<SendReport> {
        let stored = self
            .store
            .preferences(&request.user_id, &request.notification_type)
            .await?;

        let mut channels = request.channels.clone();
        let mut seen = Vec::with_capacity(channels.len());
        channels.retain(|c| {
            if seen.contains(c) {
                false
            } else {
                seen.push(*c);
                true
            }
        });

        let mut report = SendReport::default();
        for channel in channels {
            let pref = stored
                .iter()
                .find(|p| p.channel == channel)
                .cloned()
                .unwrap_or_else(|| {
                    NotificationPreference::default_for(
                        &request.user_id,
                        &request.notification_type,
                        channel,
                    )
                });

            let outcome = self.deliver(&request, &pref, now, &mut report.channels_sent).await?;
            report.results.insert(channel.as_str().to_string(), outcome);
        }

        if !report.channels_sent.is_empty() {
            self.store
                .insert_notification(NewNotification {
                    user_id: request.user_id.clone(),
                    notification_type: request.notification_type.clone(),
                    title: request.title.clone(),
                    body: request.body.clone(),
                    link: request.link.clone(),
                    metadata: request.metadata.clone(),
                    channels_sent: report.channels_sent.clone(),
                    scheduled_for: None,
                })
                .await?;
        }

        tracing::info!(
            "🔔 Direct '{}' to {}: {:?}",
            request.notification_type,
            request.user_id,
            report.results
        );
        Ok(report)
    }

    /// Apply one channel's preference. Immediate deliveries are appended to `sent`.
    async fn deliver(
        &self,
        request: &SendNotification,
        pref: &NotificationPreference,
        now: DateTime<Utc>,
        sent: &mut Vec<Channel>,
    ) -> Result<String> {
        if !pref.is_enabled {
            return Ok("disabled".into());
        }
        if pref.frequency == Frequency::Never {
            return Ok("never".into());
        }

        match pref.channel {
            Channel::InApp => {
                sent.push(Channel::InApp);
                Ok("sent".into())
            }
            Channel::Email if pref.frequency.is_batched() => {
                let scheduled_for = self.schedule.next_boundary(pref.frequency, now);
                self.store
                    .insert_notification(NewNotification {
                        user_id: request.user_id.clone(),
                        notification_type: request.notification_type.clone(),
                        title: request.title.clone(),
                        body: request.body.clone(),
                        link: request.link.clone(),
                        metadata: request.metadata.clone(),
                        channels_sent: Vec::new(),
                        scheduled_for,
                    })
                    .await?;
                Ok(format!("scheduled_{}", pref.frequency.as_str()))
            }
            Channel::Email => {
                let Some(address) = self.store.user_email(&request.user_id).await? else {
                    return Ok("failed: no email address on file".into());
                };
                let body = if request.body.is_empty() {
                    request.link.clone()
                } else {
                    format!("{}\n\n{}", request.body, request.link)
                };
                match self.mailer.send_mail(&address, &request.title, &body).await {
                    Ok(()) => {
                        sent.push(Channel::Email);
                        Ok("sent".into())
                    }
                    Err(e) => {
                        tracing::warn!(
                            "⚠️ Email via {} to {} failed: {e}",
                            self.mailer.name(),
                            request.user_id
                        );
                        Ok(format!("failed: {e}"))
                    }
                }
            }
            Channel::Push => Ok("not_implemented".into()),
        }
    }
}
