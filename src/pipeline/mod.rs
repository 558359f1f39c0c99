//! Mail-to-Slack message pipeline.
//!
//! Every parsed message flows through:
//! 1. `RoutingTable::resolve()`: recipient to webhook and channel
//! 2. `build()`: preamble, body selection, budget, chunking
//! 3. `Deliver::deliver()`: one call per post, in order
//!
//! Nothing is sent until routing has succeeded.

pub mod autolink;
pub mod builder;
pub mod chunker;
pub mod html;
pub mod processor;
pub mod rules;
pub mod types;

pub use autolink::AutoLinkEstimator;
pub use builder::{MESSAGE_LIMIT, build};
pub use processor::Notifier;
pub use rules::{Route, RoutingTable};
pub use types::{BodyPreference, MessageSettings, OutboundMessage, Webhook};
