//! ISO-2022-JP-2004 stream decoding.
//!
//! `encoding_rs` only implements the WHATWG ISO-2022-JP decoder, which
//! rejects the JIS X 0213 designations. Double-byte runs are rewritten to
//! their EUC-JP form (set the high bit on both bytes) and decoded through
//! `EUC_JP`, so the JIS X 0208 compatible region of JIS X 0213 plane 1
//! decodes exactly. Plane 2 has no EUC-JP mapping in `encoding_rs`.

use encoding_rs::EUC_JP;

pub(crate) const ESC: u8 = 0x1b;

const REPLACEMENT: char = '\u{FFFD}';

/// Graphic set currently designated into G0.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Mode {
    Ascii,
    Katakana,
    Plane1,
    Plane2,
}

/// Recognizes the escape sequence following an `ESC` byte.
///
/// Returns the designated mode and the number of bytes after `ESC`.
fn designation(rest: &[u8]) -> Option<(Mode, usize)> {
    match rest {
        [b'(', b'B', ..] => Some((Mode::Ascii, 2)),
        [b'(', b'I', ..] => Some((Mode::Katakana, 2)),
        [b'$', b'@' | b'B', ..] => Some((Mode::Plane1, 2)),
        [b'$', b'(', b'Q' | b'O', ..] => Some((Mode::Plane1, 3)),
        [b'$', b'(', b'P', ..] => Some((Mode::Plane2, 3)),
        _ => None,
    }
}

/// Decodes with U+FFFD for anything malformed or unmappable.
pub(crate) fn decode_lossy(bytes: &[u8]) -> String {
    Decoder::new(false).run(bytes).unwrap_or_default()
}

/// Decodes, returning `None` at the first malformed or unmappable sequence.
pub(crate) fn decode_strict(bytes: &[u8]) -> Option<String> {
    Decoder::new(true).run(bytes)
}

struct Decoder {
    strict: bool,
    out: String,
    /// Pending double-byte / katakana run in EUC-JP form.
    euc: Vec<u8>,
}

impl Decoder {
    fn new(strict: bool) -> Self {
        Self {
            strict,
            out: String::new(),
            euc: Vec::new(),
        }
    }

    fn run(mut self, bytes: &[u8]) -> Option<String> {
        self.out.reserve(bytes.len());
        let mut mode = Mode::Ascii;
        let mut i = 0;

        while i < bytes.len() {
            let b = bytes[i];

            if b == ESC {
                if let Some((next, len)) = designation(&bytes[i + 1..]) {
                    mode = next;
                    i += 1 + len;
                } else {
                    self.malformed()?;
                    i += 1;
                }
                continue;
            }

            // Controls and space pass through in every mode.
            if b < 0x21 || b == 0x7f {
                self.flush()?;
                self.out.push(char::from(b));
                i += 1;
                continue;
            }

            match mode {
                Mode::Ascii if b < 0x80 => {
                    self.flush()?;
                    self.out.push(char::from(b));
                    i += 1;
                }
                Mode::Katakana if (0x21..=0x5f).contains(&b) => {
                    self.euc.extend_from_slice(&[0x8e, b | 0x80]);
                    i += 1;
                }
                Mode::Plane1 | Mode::Plane2 => {
                    let pair = bytes
                        .get(i + 1)
                        .copied()
                        .filter(|trail| (0x21..=0x7e).contains(trail) && (0x21..=0x7e).contains(&b));
                    match (mode, pair) {
                        (Mode::Plane1, Some(trail)) => {
                            self.euc.extend_from_slice(&[b | 0x80, trail | 0x80]);
                            i += 2;
                        }
                        (_, Some(_)) => {
                            self.malformed()?;
                            i += 2;
                        }
                        (_, None) => {
                            self.malformed()?;
                            i += 1;
                        }
                    }
                }
                _ => {
                    self.malformed()?;
                    i += 1;
                }
            }
        }

        self.flush()?;
        Some(self.out)
    }

    fn flush(&mut self) -> Option<()> {
        if self.euc.is_empty() {
            return Some(());
        }
        if self.strict {
            let text = EUC_JP.decode_without_bom_handling_and_without_replacement(&self.euc)?;
            self.out.push_str(&text);
        } else {
            let (text, _) = EUC_JP.decode_without_bom_handling(&self.euc);
            self.out.push_str(&text);
        }
        self.euc.clear();
        Some(())
    }

    fn malformed(&mut self) -> Option<()> {
        if self.strict {
            return None;
        }
        self.flush()?;
        self.out.push(REPLACEMENT);
        Some(())
    }
}
