//! `letterbox`: recursive MIME message decomposition.
//!
//! Parses an RFC 5322 / MIME message, however deeply nested, into typed
//! headers, decoded text bodies and extracted files.

pub mod config;
pub mod error;
pub mod export;
pub mod model;
pub mod parser;

pub use error::{DecodeError, ParseError, Result};
pub use model::mail::{Email, Headers};
pub use parser::{Parser, ProcessingMode};
