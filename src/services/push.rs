//! Push message model and the gateway seam.
//!
//! `PushMessage` mirrors the FCM HTTP v1 `Message` resource closely enough to
//! be serialized straight into a send request. Procedures only ever talk to a
//! `PushGateway`, so the concrete transport can be swapped in tests.

use std::collections::BTreeMap;

use async_trait::async_trait;
use futures::future::join_all;
use serde::Serialize;

use crate::error::AppResult;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PushMessage {
    pub token: String,
    pub notification: PushNotification,
    pub data: BTreeMap<String, String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub android: Option<AndroidConfig>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub apns: Option<ApnsConfig>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PushNotification {
    pub title: String,
    pub body: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AndroidConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub priority: Option<String>,
    pub notification: AndroidNotification,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AndroidNotification {
    pub channel_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sound: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub notification_priority: Option<String>,
    /// Badge count shown on the launcher icon.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub notification_count: Option<u32>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ApnsConfig {
    pub payload: ApnsPayload,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ApnsPayload {
    pub aps: Aps,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Aps {
    pub sound: String,
    pub badge: u32,
    #[serde(rename = "content-available")]
    pub content_available: u8,
}

impl PushMessage {
    pub fn new(token: impl Into<String>, title: impl Into<String>, body: impl Into<String>) -> Self {
        Self {
            token: token.into(),
            notification: PushNotification {
                title: title.into(),
                body: body.into(),
            },
            data: BTreeMap::new(),
            android: None,
            apns: None,
        }
    }

    pub fn with_data(mut self, key: &str, value: impl Into<String>) -> Self {
        self.data.insert(key.to_string(), value.into());
        self
    }

    /// Android block with only a channel id.
    pub fn with_android_channel(mut self, channel_id: &str) -> Self {
        self.android = Some(AndroidConfig {
            priority: None,
            notification: AndroidNotification {
                channel_id: channel_id.to_string(),
                sound: None,
                notification_priority: None,
                notification_count: None,
            },
        });
        self
    }

    /// Android and APNs blocks that make the message show up with sound and
    /// badge while the app is backgrounded or terminated.
    pub fn with_background_delivery(mut self, channel_id: &str, high_priority: bool) -> Self {
        self.android = Some(AndroidConfig {
            priority: high_priority.then(|| "HIGH".to_string()),
            notification: AndroidNotification {
                channel_id: channel_id.to_string(),
                sound: Some("default".to_string()),
                notification_priority: high_priority.then(|| "PRIORITY_HIGH".to_string()),
                notification_count: Some(1),
            },
        });
        self.apns = Some(ApnsConfig {
            payload: ApnsPayload {
                aps: Aps {
                    sound: "default".to_string(),
                    badge: 1,
                    content_available: 1,
                },
            },
        });
        self
    }
}

/// Token-addressed push delivery.
#[async_trait]
pub trait PushGateway: Send + Sync + 'static {
    /// Deliver one message. Returns the gateway's message id.
    async fn send(&self, message: &PushMessage) -> AppResult<String>;
}

/// Counters describing what one procedure invocation did.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct DeliveryReport {
    pub push_sent: usize,
    pub push_failed: usize,
    pub in_app_written: usize,
    pub in_app_failed: usize,
}

impl DeliveryReport {
    pub fn merge(&mut self, other: DeliveryReport) {
        self.push_sent += other.push_sent;
        self.push_failed += other.push_failed;
        self.in_app_written += other.in_app_written;
        self.in_app_failed += other.in_app_failed;
    }

    pub fn push_attempts(&self) -> usize {
        self.push_sent + self.push_failed
    }
}

/// Send messages one after another. A failed send is logged and counted;
/// it never stops the remaining sends.
pub async fn send_each(gateway: &dyn PushGateway, messages: Vec<PushMessage>) -> DeliveryReport {
    let mut report = DeliveryReport::default();
    for message in &messages {
        match gateway.send(message).await {
            Ok(id) => {
                tracing::debug!("Push sent: message_id={}", id);
                report.push_sent += 1;
            }
            Err(e) => {
                tracing::error!("Failed to send push to token {}: {}", redact_token(&message.token), e);
                report.push_failed += 1;
            }
        }
    }
    report
}

/// Issue all sends at once and wait for every one of them to settle.
pub async fn send_all_concurrently(
    gateway: &dyn PushGateway,
    messages: Vec<PushMessage>,
) -> DeliveryReport {
    let results = join_all(messages.iter().map(|m| gateway.send(m))).await;

    let mut report = DeliveryReport::default();
    for (message, result) in messages.iter().zip(results) {
        match result {
            Ok(id) => {
                tracing::debug!("Push sent: message_id={}", id);
                report.push_sent += 1;
            }
            Err(e) => {
                tracing::error!("Failed to send push to token {}: {}", redact_token(&message.token), e);
                report.push_failed += 1;
            }
        }
    }
    report
}

/// Shorten a token for logs; tokens are credentials for one installation.
pub fn redact_token(token: &str) -> String {
    let prefix: String = token.chars().take(8).collect();
    if prefix.len() < token.len() {
        format!("{}…", prefix)
    } else {
        prefix
    }
}
