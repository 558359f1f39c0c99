//! Shared types for the notification pipeline.

use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};

use crate::pipeline::builder::MESSAGE_LIMIT;

// ── Outbound message ────────────────────────────────────────────────

/// One post to the chat platform. Built per chunk, delivered immediately.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutboundMessage {
    pub text: String,
    pub channel: String,
    pub username: Option<String>,
    pub footer: Option<String>,
}

impl OutboundMessage {
    /// Wire payload for an incoming webhook.
    pub fn payload(&self) -> Payload<'_> {
        Payload {
            text: &self.text,
            username: non_empty(&self.username),
            channel: Some(self.channel.as_str()).filter(|c| !c.is_empty()),
            attachments: non_empty(&self.footer)
                .map(|footer| vec![Attachment { footer }])
                .unwrap_or_default(),
        }
    }
}

fn non_empty(value: &Option<String>) -> Option<&str> {
    value.as_deref().filter(|s| !s.is_empty())
}

/// JSON body of a webhook post. Field order is the wire order.
#[derive(Debug, Serialize)]
pub struct Payload<'a> {
    pub text: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub username: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub channel: Option<&'a str>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub attachments: Vec<Attachment<'a>>,
}

#[derive(Debug, Serialize)]
pub struct Attachment<'a> {
    pub footer: &'a str,
}

// ── Settings ────────────────────────────────────────────────────────

/// Which body to post when a message carries both.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BodyPreference {
    #[default]
    Plain,
    /// Render the HTML body to text and post it unfenced.
    Html,
}

/// Message formatting flags.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MessageSettings {
    /// Wrap bodies in triple-backtick fences (and split them when too long).
    pub use_code_fence: bool,
    pub username: Option<String>,
    /// Per-message character budget.
    pub limit: usize,
}

impl Default for MessageSettings {
    fn default() -> Self {
        Self {
            use_code_fence: false,
            username: None,
            limit: MESSAGE_LIMIT,
        }
    }
}

// ── Webhook ─────────────────────────────────────────────────────────

/// A named incoming webhook. The URL is a credential.
#[derive(Debug, Clone)]
pub struct Webhook {
    pub name: String,
    url: SecretString,
}

impl Webhook {
    pub fn new(name: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            url: SecretString::from(url.into()),
        }
    }

    pub fn from_secret(name: impl Into<String>, url: SecretString) -> Self {
        Self {
            name: name.into(),
            url,
        }
    }

    pub fn url(&self) -> &str {
        self.url.expose_secret()
    }
}
