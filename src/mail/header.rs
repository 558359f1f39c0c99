//! RFC 2047 encoded-word header decoding.
//!
//! Adjacent encoded words with the same charset are decoded as one byte
//! run, so a multibyte character split across two words comes back whole.

use std::borrow::Cow;
use std::sync::LazyLock;

use base64::Engine;
use base64::alphabet;
use base64::engine::{DecodePaddingMode, GeneralPurpose, GeneralPurposeConfig};
use regex::Regex;
use tracing::debug;

use crate::error::CharsetError;
use crate::mail::charset::{self, Charset};

static FOLD: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\r?\n\s+").unwrap());

static ENCODED_WORD: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"=\?([^?]+)\?([BbQq])\?([^?]+)\?=").unwrap());

/// Mailers disagree on trailing `=` in `B` words.
const B_ENGINE: GeneralPurpose = GeneralPurpose::new(
    &alphabet::STANDARD,
    GeneralPurposeConfig::new().with_decode_padding_mode(DecodePaddingMode::Indifferent),
);

enum Fragment<'a> {
    Literal(&'a str),
    Encoded { charset: &'a str, bytes: Vec<u8> },
}

impl Fragment<'_> {
    fn is_encoded(&self) -> bool {
        matches!(self, Fragment::Encoded { .. })
    }
}

/// Collapse folded header lines (line break plus indentation) to one space.
pub fn unfold(raw: &str) -> Cow<'_, str> {
    FOLD.replace_all(raw, " ")
}

/// Decode a header value into readable text.
///
/// Fails on malformed `B`/`Q` payloads or on bytes that are invalid in a
/// known charset. Unknown charsets decode as lossy UTF-8.
pub fn decode_header(raw: &str) -> Result<String, CharsetError> {
    let value = unfold(raw);
    let mut fragments = split(&value)?;

    let mut i = 1;
    while i + 1 < fragments.len() {
        let lone_space = matches!(fragments[i], Fragment::Literal(" "));
        if lone_space && fragments[i - 1].is_encoded() && fragments[i + 1].is_encoded() {
            fragments.remove(i);
        } else {
            i += 1;
        }
    }

    let mut out = String::with_capacity(value.len());
    let mut pending: Option<(&str, Vec<u8>)> = None;

    for fragment in fragments {
        match fragment {
            Fragment::Encoded { charset, bytes } => {
                if let Some((label, run)) = pending.as_mut() {
                    if label.eq_ignore_ascii_case(charset) {
                        run.extend_from_slice(&bytes);
                        continue;
                    }
                }
                if let Some((label, run)) = pending.replace((charset, bytes)) {
                    out.push_str(&decode_word(label, &run)?);
                }
            }
            Fragment::Literal(text) => {
                if let Some((label, run)) = pending.take() {
                    out.push_str(&decode_word(label, &run)?);
                }
                out.push_str(text);
            }
        }
    }
    if let Some((label, run)) = pending {
        out.push_str(&decode_word(label, &run)?);
    }

    Ok(out)
}

fn split(value: &str) -> Result<Vec<Fragment<'_>>, CharsetError> {
    let mut fragments = Vec::new();
    let mut last = 0;

    for caps in ENCODED_WORD.captures_iter(value) {
        let (Some(whole), Some(charset), Some(encoding), Some(text)) =
            (caps.get(0), caps.get(1), caps.get(2), caps.get(3))
        else {
            continue;
        };
        if whole.start() > last {
            fragments.push(Fragment::Literal(&value[last..whole.start()]));
        }
        let bytes = match encoding.as_str() {
            "B" | "b" => B_ENGINE.decode(text.as_str())?,
            _ => decode_q(text.as_str())?,
        };
        fragments.push(Fragment::Encoded {
            charset: charset.as_str(),
            bytes,
        });
        last = whole.end();
    }
    if last < value.len() {
        fragments.push(Fragment::Literal(&value[last..]));
    }

    Ok(fragments)
}

fn decode_q(text: &str) -> Result<Vec<u8>, CharsetError> {
    let bytes = text.as_bytes();
    let mut out = Vec::with_capacity(bytes.len());
    let mut i = 0;
    while i < bytes.len() {
        match bytes[i] {
            b'_' => {
                out.push(b' ');
                i += 1;
            }
            b'=' => {
                let byte = bytes
                    .get(i + 1..i + 3)
                    .filter(|hex| hex.iter().all(u8::is_ascii_hexdigit))
                    .and_then(|hex| std::str::from_utf8(hex).ok())
                    .and_then(|hex| u8::from_str_radix(hex, 16).ok())
                    .ok_or_else(|| CharsetError::QuotedPrintable(text.to_string()))?;
                out.push(byte);
                i += 3;
            }
            other => {
                out.push(other);
                i += 1;
            }
        }
    }
    Ok(out)
}

fn decode_word(label: &str, bytes: &[u8]) -> Result<String, CharsetError> {
    // RFC 2231 language suffix: `utf-8*en`
    let label = label.split_once('*').map_or(label, |(name, _)| name);
    match Charset::from_label(label) {
        Some(resolved) => charset::decode_strict(bytes, resolved),
        None => {
            debug!(charset = label, "Unknown encoded-word charset, decoding as UTF-8");
            Ok(String::from_utf8_lossy(bytes).into_owned())
        }
    }
}
