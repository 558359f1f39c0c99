//! MIME tree built from raw RFC 822 bytes.
//!
//! `mailparse` does the wire parsing and transfer decoding. Everything
//! downstream works on [`MimePart`], which carries raw header values and
//! undecoded-charset payload bytes.

use tracing::warn;

use crate::error::ParseError;
use crate::mail::charset;
use crate::mail::header::unfold;

/// One node of a MIME tree.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MimePart {
    /// Header fields in wire order, values unfolded but not RFC 2047 decoded.
    pub headers: Vec<(String, String)>,
    pub body: MimeBody,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MimeBody {
    Multipart(Vec<MimePart>),
    /// Transfer-decoded payload bytes and the declared charset, if any.
    Leaf {
        payload: Vec<u8>,
        charset: Option<String>,
    },
}

impl MimePart {
    /// A leaf part with no headers.
    pub fn leaf(payload: impl Into<Vec<u8>>) -> Self {
        Self {
            headers: Vec::new(),
            body: MimeBody::Leaf {
                payload: payload.into(),
                charset: None,
            },
        }
    }

    /// A multipart node with no headers.
    pub fn multipart(children: Vec<MimePart>) -> Self {
        Self {
            headers: Vec::new(),
            body: MimeBody::Multipart(children),
        }
    }

    pub fn with_header(mut self, name: &str, value: &str) -> Self {
        self.headers.push((name.to_string(), value.to_string()));
        self
    }

    /// Set the declared charset of a leaf. No-op on multipart nodes.
    pub fn with_charset(mut self, label: &str) -> Self {
        if let MimeBody::Leaf { charset, .. } = &mut self.body {
            *charset = Some(label.to_string());
        }
        self
    }

    /// First header with the given name (case-insensitive).
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(key, _)| key.eq_ignore_ascii_case(name))
            .map(|(_, value)| value.as_str())
    }

    /// The raw `Content-Type` value, parameters included.
    pub fn content_type(&self) -> Option<&str> {
        self.header("Content-Type")
    }

    pub fn is_multipart(&self) -> bool {
        matches!(self.body, MimeBody::Multipart(_))
    }

    /// Parse a raw message into a MIME tree.
    pub fn parse(raw: &[u8]) -> Result<Self, ParseError> {
        let parsed = mailparse::parse_mail(raw)?;
        Ok(Self::from_parsed(&parsed))
    }

    fn from_parsed(part: &mailparse::ParsedMail<'_>) -> Self {
        let headers = part
            .headers
            .iter()
            .map(|header| {
                let value = charset::decode(header.get_value_raw(), None);
                (header.get_key(), unfold(value.trim()).into_owned())
            })
            .collect();

        let body = if part.ctype.mimetype == "message/rfc822" {
            Self::embedded(part)
        } else if part.ctype.mimetype.starts_with("multipart/") || !part.subparts.is_empty() {
            MimeBody::Multipart(part.subparts.iter().map(Self::from_parsed).collect())
        } else {
            let payload = part.get_body_raw().unwrap_or_else(|e| {
                warn!(
                    mimetype = %part.ctype.mimetype,
                    error = %e,
                    "Failed to transfer-decode part, treating as empty"
                );
                Vec::new()
            });
            MimeBody::Leaf {
                payload,
                charset: part.ctype.params.get("charset").cloned(),
            }
        };

        Self { headers, body }
    }

    /// An attached message is a container holding the parsed inner message.
    fn embedded(part: &mailparse::ParsedMail<'_>) -> MimeBody {
        let inner = part
            .get_body_raw()
            .map_err(ParseError::from)
            .and_then(|raw| Self::parse(&raw));
        match inner {
            Ok(inner) => MimeBody::Multipart(vec![inner]),
            Err(e) => {
                warn!(error = %e, "Failed to parse attached message, treating as empty");
                MimeBody::Multipart(Vec::new())
            }
        }
    }
}
