//! Charset normalization for message bodies and encoded words.
//!
//! Resolution order: a declared label (unless it is the generic
//! `us-ascii`), then content detection, then UTF-8. Legacy Japanese
//! charsets are mapped onto their fuller supersets:
//!
//! | resolved      | decoded as                 | byte fixups                          |
//! |---------------|----------------------------|--------------------------------------|
//! | ISO-2022-JP   | ISO-2022-JP-2004           | `ESC $ B`→`ESC $ ( Q`, `ESC ( J`→`ESC ( B` |
//! | SJIS          | CP932 (windows-31j)        | none                                 |
//! | EUC-JP        | EUC-JP with IBM/NEC rows   | none                                 |

use std::borrow::Cow;

use encoding_rs::{EUC_JP, Encoding, ISO_2022_JP, SHIFT_JIS, UTF_8};
use tracing::debug;

use crate::error::CharsetError;
use crate::mail::jis::{self, ESC};

/// A resolved character set.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Charset {
    Utf8,
    Iso2022Jp,
    ShiftJis,
    EucJp,
    Other(&'static Encoding),
}

impl Charset {
    /// Resolve a charset label (case-insensitive).
    pub fn from_label(label: &str) -> Option<Self> {
        let label = label.trim().trim_matches('"');
        match label.to_ascii_lowercase().as_str() {
            "iso-2022-jp" | "iso-2022-jp-2004" | "iso-2022-jp-3" | "csiso2022jp" => {
                Some(Self::Iso2022Jp)
            }
            "sjis" | "shift_jis" | "shift-jis" | "x-sjis" | "cp932" | "ms932" | "windows-31j" => {
                Some(Self::ShiftJis)
            }
            "euc-jp" | "eucjp" | "x-euc-jp" | "eucjis2004" | "euc-jis-2004" => Some(Self::EucJp),
            _ => Encoding::for_label(label.as_bytes()).map(Self::from_encoding),
        }
    }

    fn from_encoding(encoding: &'static Encoding) -> Self {
        if encoding == UTF_8 {
            Self::Utf8
        } else if encoding == ISO_2022_JP {
            Self::Iso2022Jp
        } else if encoding == SHIFT_JIS {
            Self::ShiftJis
        } else if encoding == EUC_JP {
            Self::EucJp
        } else {
            Self::Other(encoding)
        }
    }

    /// Guess the charset from raw bytes.
    ///
    /// Returns `None` for empty input or when no candidate decodes cleanly.
    pub fn detect(bytes: &[u8]) -> Option<Self> {
        if bytes.is_empty() {
            return None;
        }
        if bytes.is_ascii() {
            return Some(if has_iso2022_designation(bytes) {
                Self::Iso2022Jp
            } else {
                Self::Utf8
            });
        }
        if std::str::from_utf8(bytes).is_ok() {
            return Some(Self::Utf8);
        }
        // EUC-JP first: most EUC-JP streams are also valid Shift_JIS, the
        // reverse is rare.
        [EUC_JP, SHIFT_JIS]
            .into_iter()
            .find(|encoding| {
                encoding
                    .decode_without_bom_handling_and_without_replacement(bytes)
                    .is_some()
            })
            .map(Self::from_encoding)
    }

    /// Canonical label, as a detector would report it.
    pub fn name(&self) -> &'static str {
        match self {
            Self::Utf8 => "utf-8",
            Self::Iso2022Jp => "ISO-2022-JP",
            Self::ShiftJis => "SJIS",
            Self::EucJp => "EUC-JP",
            Self::Other(encoding) => encoding.name(),
        }
    }

    fn encoding(&self) -> &'static Encoding {
        match *self {
            Self::Utf8 => UTF_8,
            Self::Iso2022Jp => ISO_2022_JP,
            Self::ShiftJis => SHIFT_JIS,
            Self::EucJp => EUC_JP,
            Self::Other(encoding) => encoding,
        }
    }
}

fn has_iso2022_designation(bytes: &[u8]) -> bool {
    bytes
        .windows(2)
        .any(|w| w[0] == ESC && (w[1] == b'$' || w[1] == b'('))
}

fn is_generic_label(label: &str) -> bool {
    matches!(
        label.trim().to_ascii_lowercase().as_str(),
        "" | "us-ascii" | "ascii"
    )
}

/// Pick the effective charset for `bytes`.
pub fn resolve(bytes: &[u8], declared: Option<&str>) -> Charset {
    declared
        .filter(|label| !is_generic_label(label))
        .and_then(Charset::from_label)
        .or_else(|| Charset::detect(bytes))
        .unwrap_or(Charset::Utf8)
}

/// Byte-level corrections applied before decoding.
///
/// For ISO-2022-JP, JIS X 0208 designations are upgraded to JIS X 0213
/// plane 1 and the JIS X 0201 Roman designation is normalized to ASCII.
pub fn legacy_fixups(charset: Charset, bytes: &[u8]) -> Cow<'_, [u8]> {
    if charset != Charset::Iso2022Jp || !bytes.contains(&ESC) {
        return Cow::Borrowed(bytes);
    }

    let mut out = Vec::with_capacity(bytes.len() + 16);
    let mut i = 0;
    while i < bytes.len() {
        match &bytes[i..] {
            [ESC, b'$', b'B', ..] => {
                out.extend_from_slice(&[ESC, b'$', b'(', b'Q']);
                i += 3;
            }
            [ESC, b'(', b'J', ..] => {
                out.extend_from_slice(&[ESC, b'(', b'B']);
                i += 3;
            }
            _ => {
                out.push(bytes[i]);
                i += 1;
            }
        }
    }
    Cow::Owned(out)
}

/// Decode a body payload. Never fails; undecodable bytes become U+FFFD.
pub fn decode(bytes: &[u8], declared: Option<&str>) -> String {
    let charset = resolve(bytes, declared);
    debug!(
        declared = declared.unwrap_or("-"),
        charset = charset.name(),
        len = bytes.len(),
        "Decoding payload"
    );
    decode_lossy(bytes, charset)
}

/// Decode with a known charset, replacing malformed sequences.
pub fn decode_lossy(bytes: &[u8], charset: Charset) -> String {
    let bytes = legacy_fixups(charset, bytes);
    match charset {
        Charset::Iso2022Jp => jis::decode_lossy(&bytes),
        other => other
            .encoding()
            .decode_without_bom_handling(&bytes)
            .0
            .into_owned(),
    }
}

/// Decode with a known charset, failing on malformed sequences.
pub fn decode_strict(bytes: &[u8], charset: Charset) -> Result<String, CharsetError> {
    let bytes = legacy_fixups(charset, bytes);
    let decoded = match charset {
        Charset::Iso2022Jp => jis::decode_strict(&bytes),
        other => other
            .encoding()
            .decode_without_bom_handling_and_without_replacement(&bytes)
            .map(Cow::into_owned),
    };
    decoded.ok_or_else(|| CharsetError::Malformed {
        charset: charset.name().to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    const JAPANESE: &str = "このメールは日本語で書かれています。";

    fn encode(encoding: &'static Encoding, text: &str) -> Vec<u8> {
        let (bytes, _, had_errors) = encoding.encode(text);
        assert!(!had_errors);
        bytes.into_owned()
    }

    // ── Labels ──────────────────────────────────────────────────────

    #[test]
    fn label_aliases() {
        assert_eq!(Charset::from_label("ISO-2022-JP"), Some(Charset::Iso2022Jp));
        assert_eq!(Charset::from_label("iso-2022-jp-2004"), Some(Charset::Iso2022Jp));
        assert_eq!(Charset::from_label("Shift_JIS"), Some(Charset::ShiftJis));
        assert_eq!(Charset::from_label("CP932"), Some(Charset::ShiftJis));
        assert_eq!(Charset::from_label("EUC-JP"), Some(Charset::EucJp));
        assert_eq!(Charset::from_label("\"UTF-8\""), Some(Charset::Utf8));
        assert_eq!(
            Charset::from_label("iso-8859-1"),
            Some(Charset::Other(encoding_rs::WINDOWS_1252))
        );
        assert_eq!(Charset::from_label("no-such-charset"), None);
    }

    // ── Detection ───────────────────────────────────────────────────

    #[test]
    fn detect_ascii_and_utf8() {
        assert_eq!(Charset::detect(b""), None);
        assert_eq!(Charset::detect(b"hello"), Some(Charset::Utf8));
        assert_eq!(Charset::detect(JAPANESE.as_bytes()), Some(Charset::Utf8));
    }

    #[test]
    fn detect_legacy_japanese() {
        assert_eq!(
            Charset::detect(&encode(ISO_2022_JP, JAPANESE)),
            Some(Charset::Iso2022Jp)
        );
        assert_eq!(
            Charset::detect(&encode(SHIFT_JIS, JAPANESE)),
            Some(Charset::ShiftJis)
        );
        assert_eq!(Charset::detect(&encode(EUC_JP, JAPANESE)), Some(Charset::EucJp));
    }

    #[test]
    fn detect_gives_up_on_garbage() {
        assert_eq!(Charset::detect(b"caf\xe9"), None);
    }

    // ── Round trips ─────────────────────────────────────────────────

    #[test]
    fn legacy_round_trip_without_placeholders() {
        for encoding in [ISO_2022_JP, SHIFT_JIS, EUC_JP] {
            let decoded = decode(&encode(encoding, JAPANESE), None);
            assert_eq!(decoded, JAPANESE, "{}", encoding.name());
            assert!(!decoded.contains('\u{FFFD}'));
        }
    }

    #[test]
    fn nec_special_characters_in_cp932() {
        // Circled digits only exist in the Microsoft extension.
        let text = "①②③";
        assert_eq!(decode(&encode(SHIFT_JIS, text), Some("Shift_JIS")), text);
    }

    // ── Fixups ──────────────────────────────────────────────────────

    #[test]
    fn iso2022_fixups() {
        let fixed = legacy_fixups(Charset::Iso2022Jp, b"\x1b$B0!\x1b(Ja");
        assert_eq!(fixed.as_ref(), b"\x1b$(Q0!\x1b(Ba");
    }

    #[test]
    fn fixups_leave_other_charsets_alone() {
        let input = b"\x1b$B0!";
        assert!(matches!(
            legacy_fixups(Charset::ShiftJis, input),
            Cow::Borrowed(_)
        ));
    }

    #[test]
    fn jis_roman_normalized_to_ascii() {
        assert_eq!(decode(b"a\x1b(Jb\x1b(B", Some("ISO-2022-JP")), "ab");
    }

    // ── Declared labels ─────────────────────────────────────────────

    #[test]
    fn declared_label_wins() {
        assert_eq!(decode(b"caf\xe9", Some("iso-8859-1")), "café");
    }

    #[test]
    fn generic_ascii_label_falls_back_to_detection() {
        assert_eq!(decode("café".as_bytes(), Some("us-ascii")), "café");
    }

    #[test]
    fn undetectable_bytes_are_replaced() {
        assert_eq!(decode(b"caf\xe9", None), "caf\u{FFFD}");
        assert_eq!(decode(b"abc\xff", Some("utf-8")), "abc\u{FFFD}");
    }

    #[test]
    fn strict_decoding_fails_loudly() {
        assert!(matches!(
            decode_strict(b"\xff", Charset::Utf8),
            Err(CharsetError::Malformed { .. })
        ));
        assert_eq!(decode_strict("ok".as_bytes(), Charset::Utf8).unwrap(), "ok");
    }
}
