//! Turns a [`ParsedMail`] into the outbound posts for one destination.

use tracing::debug;

use crate::mail::ParsedMail;
use crate::pipeline::autolink::AutoLinkEstimator;
use crate::pipeline::chunker::Chunker;
use crate::pipeline::html::render_text;
use crate::pipeline::types::{BodyPreference, MessageSettings, OutboundMessage};

/// Slack's per-message character limit.
pub const MESSAGE_LIMIT: usize = 4000;

/// "``````\n": two fences and the trailing newline.
const FENCE_OVERHEAD: usize = 7;

/// Escape the three characters Slack treats as markup. `&` goes first.
pub fn escape(text: &str) -> String {
    text.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
}

/// Characters left for a fenced body after `heading`, saturating at zero.
pub fn budget(limit: usize, heading: &str, estimator: &AutoLinkEstimator) -> usize {
    let reserved = escape(heading).chars().count() + estimator.inflation(heading) + FENCE_OVERHEAD;
    limit.saturating_sub(reserved)
}

pub fn preamble(mail: &ParsedMail) -> String {
    format!(
        "*Date*: {}\n*From*: {}\n*To*: {}\n*Subject*: {}\n",
        mail.date, mail.from, mail.to, mail.subject
    )
}

pub fn footer(mail: &ParsedMail) -> String {
    format!(
        "Posted by mail-notify. Original mail is {}.",
        escape(&mail.message_id)
    )
}

/// Pick the body to post and whether it may be fenced.
///
/// An HTML preference with an HTML body present disables fencing.
fn select_body(mail: &ParsedMail, preference: BodyPreference, fence: bool) -> (String, bool) {
    match (preference, &mail.body_plain, &mail.body_html) {
        (BodyPreference::Html, _, Some(html)) => (render_text(html), false),
        (_, Some(plain), _) => (plain.clone(), fence),
        (_, None, Some(html)) => (render_text(html), fence),
        (_, None, None) => (String::new(), fence),
    }
}

/// Posts for one message, in delivery order.
pub enum Outbound<'e> {
    /// The whole body fits: one post carrying the footer.
    Single(Option<OutboundMessage>),
    /// One post per chunk, then an empty post carrying the footer.
    Chunked {
        chunks: Chunker<'e>,
        channel: String,
        username: Option<String>,
        footer: Option<String>,
    },
}

impl Iterator for Outbound<'_> {
    type Item = OutboundMessage;

    fn next(&mut self) -> Option<OutboundMessage> {
        match self {
            Outbound::Single(message) => message.take(),
            Outbound::Chunked {
                chunks,
                channel,
                username,
                footer,
            } => match chunks.next() {
                Some(chunk) => Some(OutboundMessage {
                    text: chunk.text(),
                    channel: channel.clone(),
                    username: username.clone(),
                    footer: None,
                }),
                None => footer.take().map(|footer| OutboundMessage {
                    text: String::new(),
                    channel: channel.clone(),
                    username: username.clone(),
                    footer: Some(footer),
                }),
            },
        }
    }
}

/// Build the posts for `mail`.
pub fn build<'e>(
    mail: &ParsedMail,
    channel: &str,
    preference: BodyPreference,
    settings: &MessageSettings,
    estimator: &'e AutoLinkEstimator,
) -> Outbound<'e> {
    let (body, fence) = select_body(mail, preference, settings.use_code_fence);
    let heading = preamble(mail);
    let available = budget(settings.limit, &heading, estimator);

    let escaped = escape(&body);
    let length = escaped.chars().count();
    let inflation = estimator.inflation(&body);

    debug!(fence, budget = available, length, inflation, "Sizing message body");

    if !fence || length + inflation <= available {
        let mut text = escape(&heading);
        if fence {
            text.push_str(&format!("```{escaped}```\n"));
        } else {
            text.push_str(&escaped);
        }
        return Outbound::Single(Some(OutboundMessage {
            text,
            channel: channel.to_string(),
            username: settings.username.clone(),
            footer: Some(footer(mail)),
        }));
    }

    debug!(limit = settings.limit, "Body over budget, splitting by line");
    Outbound::Chunked {
        chunks: Chunker::new(&body, &heading, &mail.subject, settings.limit, estimator),
        channel: channel.to_string(),
        username: settings.username.clone(),
        footer: Some(footer(mail)),
    }
}
