//! mail-notify: post incoming email to Slack, routed by recipient.

pub mod channels;
pub mod config;
pub mod error;
pub mod mail;
pub mod pipeline;
