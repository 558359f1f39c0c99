//! Outbound delivery of built messages.

pub mod dry_run;
pub mod slack;

use async_trait::async_trait;

use crate::error::ChannelError;
use crate::pipeline::types::OutboundMessage;

pub use dry_run::DryRun;
pub use slack::SlackWebhook;

/// Sends one message to a destination. Pure I/O: no retries, no splitting.
///
/// Implementations never alter message content; swapping one for another
/// changes where the bytes go, not what they are.
#[async_trait]
pub trait Deliver: Send + Sync {
    /// Short name for logging (e.g. "slack").
    fn name(&self) -> &str;

    /// Deliver `message` to `destination` (a webhook URL).
    async fn deliver(&self, destination: &str, message: &OutboundMessage)
    -> Result<(), ChannelError>;
}
