//! Flatten a MIME tree into a [`ParsedMail`].

use std::collections::HashMap;

use tracing::{debug, warn};

use crate::error::ParseError;
use crate::mail::charset;
use crate::mail::flowed::unfold_flowed;
use crate::mail::header::decode_header;
use crate::mail::mime::{MimeBody, MimePart};

/// Decoded headers and text bodies of one message.
///
/// Bodies use `\n` line endings and end with exactly one `\n`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ParsedMail {
    pub from: String,
    pub to: String,
    pub subject: String,
    pub date: String,
    pub message_id: String,
    pub body_plain: Option<String>,
    pub body_html: Option<String>,
}

impl ParsedMail {
    /// Parse raw RFC 822 bytes and extract them.
    pub fn parse(raw: &[u8]) -> Result<Self, ParseError> {
        Ok(extract(&MimePart::parse(raw)?))
    }
}

/// A decoded leaf: its content type (if declared) and text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TextLeaf<'a> {
    pub content_type: Option<&'a str>,
    pub text: String,
}

/// Decode every non-empty leaf, in document order.
pub fn leaves(part: &MimePart) -> Vec<TextLeaf<'_>> {
    let mut out = Vec::new();
    collect_leaves(part, &mut out);
    out
}

fn collect_leaves<'a>(part: &'a MimePart, out: &mut Vec<TextLeaf<'a>>) {
    match &part.body {
        MimeBody::Multipart(children) => {
            for child in children {
                collect_leaves(child, out);
            }
        }
        MimeBody::Leaf { payload, .. } if payload.is_empty() => {}
        MimeBody::Leaf { payload, charset } => out.push(TextLeaf {
            content_type: part.content_type(),
            text: charset::decode(payload, charset.as_deref()),
        }),
    }
}

/// Build a [`ParsedMail`] from a MIME tree.
pub fn extract(root: &MimePart) -> ParsedMail {
    let mut mail = ParsedMail {
        from: header_field(root, "From"),
        to: header_field(root, "To"),
        subject: header_field(root, "Subject"),
        date: header_field(root, "Date"),
        message_id: header_field(root, "Message-ID"),
        body_plain: None,
        body_html: None,
    };

    for leaf in leaves(root) {
        let content_type = leaf.content_type.map(str::to_lowercase);
        let slot = match content_type.as_deref() {
            None => &mut mail.body_plain,
            Some(ct) if ct.starts_with("text/plain") => &mut mail.body_plain,
            Some(ct) if ct.starts_with("text/html") => &mut mail.body_html,
            Some(ct) => {
                debug!(content_type = ct, "Skipping non-text part");
                continue;
            }
        };

        let body = normalize_body(content_type.as_deref(), &leaf.text);
        slot.get_or_insert_with(String::new).push_str(&body);
    }

    mail
}

fn normalize_body(content_type: Option<&str>, text: &str) -> String {
    let mut body = text.replace("\r\n", "\n");

    let params = content_type.map(content_params).unwrap_or_default();
    let flowed = params.get("format").is_some_and(|v| v == "flowed")
        && params.get("delsp").is_some_and(|v| v == "yes");
    if flowed {
        body = unfold_flowed(&body);
    }

    let mut body = body.trim_end().to_string();
    body.push('\n');
    body
}

/// Parse the `; key=value` parameters of an already lower-cased content type.
///
/// A segment without `=` voids the whole list.
pub fn content_params(content_type: &str) -> HashMap<String, String> {
    let mut params = HashMap::new();
    for segment in content_type.split(';').skip(1) {
        let segment = segment.trim();
        if segment.is_empty() {
            continue;
        }
        let Some((key, value)) = segment.split_once('=') else {
            return HashMap::new();
        };
        params.insert(
            key.trim().to_string(),
            value.trim().trim_matches('"').to_string(),
        );
    }
    params
}

fn header_field(root: &MimePart, name: &str) -> String {
    let Some(raw) = root.header(name) else {
        return String::new();
    };
    decode_header(raw).unwrap_or_else(|e| {
        warn!(header = name, error = %e, "Failed to decode header, leaving it empty");
        String::new()
    })
}
