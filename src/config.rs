//! Configuration file and command-line defaults.
//!
//! The file is TOML. Without an explicit path the first of
//! `./mail-notify.toml`, `~/.mail-notify.toml`, `/etc/mail-notify.toml` and
//! `/usr/local/etc/mail-notify.toml` that exists is read; when none exists
//! the configuration is empty and routing depends on the command line.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use secrecy::SecretString;
use serde::{Deserialize, Deserializer};
use tracing::{debug, info, warn};

use crate::error::ConfigError;
use crate::pipeline::builder::MESSAGE_LIMIT;
use crate::pipeline::rules::RoutingTable;
use crate::pipeline::types::{BodyPreference, MessageSettings, Webhook};

const FILE_NAME: &str = "mail-notify.toml";

/// Rule pattern and webhook name with special meaning.
const DEFAULT: &str = "default";
const MATCH_ALL: &str = ".*";

// ── File contents ───────────────────────────────────────────────────

#[derive(Debug, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    /// Named incoming-webhook URLs.
    #[serde(deserialize_with = "secret_urls")]
    pub slack: BTreeMap<String, SecretString>,
    pub team: Vec<TeamRule>,
    pub channel: Vec<ChannelRule>,
    pub flags: Flags,
    pub mime_part: Vec<MimePartRule>,
}

/// Recipient pattern to webhook name.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TeamRule {
    pub pattern: String,
    pub slack: String,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ChannelRule {
    pub pattern: String,
    pub channel: String,
}

/// Sender pattern to preferred body.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct MimePartRule {
    pub pattern: String,
    pub prefer: BodyPreference,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Flags {
    /// Fence bodies in triple backticks.
    pub pretext: bool,
    pub username: Option<String>,
    pub limit: usize,
}

impl Default for Flags {
    fn default() -> Self {
        Self {
            pretext: false,
            username: None,
            limit: MESSAGE_LIMIT,
        }
    }
}

/// Command-line defaults layered over the file.
#[derive(Debug, Clone, Default)]
pub struct Overrides {
    /// Webhook URL stored as `default`.
    pub slack: Option<String>,
    /// Webhook name for the `default` team pattern or a trailing catch-all.
    pub team: Option<String>,
    /// Channel for the `default` channel pattern or a trailing catch-all.
    pub channel: Option<String>,
}

// ── Loading ─────────────────────────────────────────────────────────

/// Candidate files in search order.
pub fn search_paths() -> Vec<PathBuf> {
    let mut paths = vec![PathBuf::from(FILE_NAME)];
    if let Ok(home) = std::env::var("HOME") {
        paths.push(Path::new(&home).join(format!(".{FILE_NAME}")));
    }
    paths.push(Path::new("/etc").join(FILE_NAME));
    paths.push(Path::new("/usr/local/etc").join(FILE_NAME));
    paths
}

impl Config {
    /// Load `explicit`, which must exist, or the first file on the search path.
    pub fn load(explicit: Option<&Path>) -> Result<Self, ConfigError> {
        let path = match explicit {
            Some(path) if !path.exists() => {
                return Err(ConfigError::NotFound {
                    path: path.to_path_buf(),
                });
            }
            Some(path) => Some(path.to_path_buf()),
            None => search_paths().into_iter().find(|path| path.is_file()),
        };

        match path {
            Some(path) => Self::from_file(&path),
            None => {
                debug!("No configuration file found, using defaults");
                Ok(Self::default())
            }
        }
    }

    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let config = Self::from_toml(&text)?;
        info!(path = %path.display(), "Loaded configuration");
        Ok(config)
    }

    pub fn from_toml(text: &str) -> Result<Self, ConfigError> {
        toml::from_str(text).map_err(|e| ConfigError::ParseError(e.to_string()))
    }

    pub fn settings(&self) -> MessageSettings {
        MessageSettings {
            use_code_fence: self.flags.pretext,
            username: self.flags.username.clone(),
            limit: self.flags.limit,
        }
    }

    /// Compile the rule tables, applying command-line defaults.
    ///
    /// A `default` pattern matches everything and takes the command-line
    /// default when one was given. A command-line default not consumed that
    /// way becomes a trailing catch-all rule. With no team rules at all, a
    /// webhook named `default` catches everything.
    pub fn routing_table(&self, overrides: &Overrides) -> Result<RoutingTable, ConfigError> {
        let mut webhooks: BTreeMap<&str, Webhook> = self
            .slack
            .iter()
            .map(|(name, url)| (name.as_str(), Webhook::from_secret(name, url.clone())))
            .collect();
        if let Some(url) = &overrides.slack {
            webhooks.insert(DEFAULT, Webhook::new(DEFAULT, url.as_str()));
        }

        let mut table = RoutingTable::new();
        let mut default_team = overrides.team.as_deref();
        let mut default_channel = overrides.channel.as_deref();

        for rule in &self.team {
            let (pattern, name) = if rule.pattern == DEFAULT {
                (MATCH_ALL, default_team.take().unwrap_or(rule.slack.as_str()))
            } else {
                (rule.pattern.as_str(), rule.slack.as_str())
            };
            let webhook = webhooks
                .get(name)
                .cloned()
                .ok_or_else(|| ConfigError::UnknownWebhook {
                    pattern: rule.pattern.clone(),
                    name: name.to_string(),
                })?;
            table
                .add_team(pattern, webhook)
                .map_err(|e| invalid(pattern, e))?;
        }

        if let Some(name) = default_team {
            match webhooks.get(name) {
                Some(webhook) => table
                    .add_team(MATCH_ALL, webhook.clone())
                    .map_err(|e| invalid(MATCH_ALL, e))?,
                None => warn!(team = name, "Default team names no known webhook, ignoring"),
            }
        }
        if table.teams().is_empty() {
            if let Some(webhook) = webhooks.get(DEFAULT) {
                table
                    .add_team(MATCH_ALL, webhook.clone())
                    .map_err(|e| invalid(MATCH_ALL, e))?;
            }
        }

        for rule in &self.channel {
            let (pattern, channel) = if rule.pattern == DEFAULT {
                (MATCH_ALL, default_channel.take().unwrap_or(rule.channel.as_str()))
            } else {
                (rule.pattern.as_str(), rule.channel.as_str())
            };
            table
                .add_channel(pattern, channel)
                .map_err(|e| invalid(pattern, e))?;
        }
        if let Some(channel) = default_channel {
            table
                .add_channel(MATCH_ALL, channel)
                .map_err(|e| invalid(MATCH_ALL, e))?;
        }

        for rule in &self.mime_part {
            table
                .add_body_preference(&rule.pattern, rule.prefer)
                .map_err(|e| invalid(&rule.pattern, e))?;
        }

        debug!(
            teams = table.teams().len(),
            channels = table.channels().len(),
            "Built routing table"
        );
        Ok(table)
    }
}

fn secret_urls<'de, D>(deserializer: D) -> Result<BTreeMap<String, SecretString>, D::Error>
where
    D: Deserializer<'de>,
{
    let urls = BTreeMap::<String, String>::deserialize(deserializer)?;
    Ok(urls
        .into_iter()
        .map(|(name, url)| (name, SecretString::from(url)))
        .collect())
}

fn invalid(pattern: &str, error: regex::Error) -> ConfigError {
    ConfigError::InvalidPattern {
        pattern: pattern.to_string(),
        reason: error.to_string(),
    }
}
