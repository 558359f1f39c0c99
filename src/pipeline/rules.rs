//! Recipient routing: which webhook and channel a message goes to, and
//! which body a sender's mail should be rendered from.
//!
//! Every rule table is ordered and the first match wins. Patterns are
//! anchored at the start of the bare address only, so `ops` matches
//! `ops@example.com` and `ops-team@example.com` but not `devops@example.com`.
//! Routing fails closed: no matching team or channel rule is an error.

use mailparse::MailAddr;
use regex::Regex;
use tracing::debug;

use crate::error::RoutingError;
use crate::pipeline::types::{BodyPreference, Webhook};

/// A compiled pattern and what it routes to.
#[derive(Debug, Clone)]
pub struct RoutingRule<T> {
    /// The pattern as written in configuration.
    pub pattern: String,
    regex: Regex,
    pub destination: T,
}

impl<T> RoutingRule<T> {
    pub fn new(pattern: &str, destination: T) -> Result<Self, regex::Error> {
        Ok(Self {
            pattern: pattern.to_string(),
            regex: Regex::new(&format!("^(?:{pattern})"))?,
            destination,
        })
    }

    pub fn matches(&self, address: &str) -> bool {
        self.regex.is_match(address)
    }
}

/// Where one message goes.
#[derive(Debug, Clone, Copy)]
pub struct Route<'a> {
    pub webhook: &'a Webhook,
    pub channel: &'a str,
}

/// Ordered rule tables, built once at startup.
#[derive(Debug, Clone, Default)]
pub struct RoutingTable {
    teams: Vec<RoutingRule<Webhook>>,
    channels: Vec<RoutingRule<String>>,
    body_preferences: Vec<RoutingRule<BodyPreference>>,
}

impl RoutingTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_team(&mut self, pattern: &str, webhook: Webhook) -> Result<(), regex::Error> {
        self.teams.push(RoutingRule::new(pattern, webhook)?);
        Ok(())
    }

    pub fn add_channel(&mut self, pattern: &str, channel: &str) -> Result<(), regex::Error> {
        self.channels.push(RoutingRule::new(pattern, channel.to_string())?);
        Ok(())
    }

    /// Prefer `preference` for mail whose sender matches `pattern`.
    pub fn add_body_preference(
        &mut self,
        pattern: &str,
        preference: BodyPreference,
    ) -> Result<(), regex::Error> {
        self.body_preferences
            .push(RoutingRule::new(pattern, preference)?);
        Ok(())
    }

    pub fn teams(&self) -> &[RoutingRule<Webhook>] {
        &self.teams
    }

    pub fn channels(&self) -> &[RoutingRule<String>] {
        &self.channels
    }

    /// Resolve the destination for a decoded `To` header.
    ///
    /// Errors carry the whole header, not just the bare address.
    pub fn resolve(&self, to_header: &str) -> Result<Route<'_>, RoutingError> {
        let address = bare_address(to_header);

        let webhook = first_match(&self.teams, &address).ok_or_else(|| {
            RoutingError::TeamNotFound {
                address: to_header.to_string(),
            }
        })?;
        let channel = first_match(&self.channels, &address).ok_or_else(|| {
            RoutingError::ChannelNotFound {
                address: to_header.to_string(),
            }
        })?;

        debug!(
            address = %address,
            team = %webhook.name,
            channel = %channel,
            "Resolved route"
        );
        Ok(Route { webhook, channel })
    }

    /// Body preference for a decoded `From` header, plain when no rule matches.
    pub fn body_preference(&self, from_header: &str) -> BodyPreference {
        first_match(&self.body_preferences, &bare_address(from_header))
            .copied()
            .unwrap_or_default()
    }
}

fn first_match<'a, T>(rules: &'a [RoutingRule<T>], address: &str) -> Option<&'a T> {
    rules
        .iter()
        .find(|rule| rule.matches(address))
        .map(|rule| &rule.destination)
}

/// The first mailbox of an address header, without display name.
///
/// Falls back to the trimmed header when it does not parse as an address list.
pub fn bare_address(header: &str) -> String {
    mailparse::addrparse(header)
        .ok()
        .and_then(|list| {
            list.iter().find_map(|addr| match addr {
                MailAddr::Single(info) => Some(info.addr.clone()),
                MailAddr::Group(group) => group.addrs.first().map(|info| info.addr.clone()),
            })
        })
        .unwrap_or_else(|| header.trim().to_string())
}
