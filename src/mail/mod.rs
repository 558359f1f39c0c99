//! Inbound mail: MIME tree, charset normalization, header decoding and
//! body extraction.

pub mod charset;
pub mod extract;
pub mod flowed;
pub mod header;
mod jis;
pub mod mime;

pub use charset::Charset;
pub use extract::{ParsedMail, extract};
pub use header::decode_header;
pub use mime::{MimeBody, MimePart};
