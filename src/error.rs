//! Centralized error types for letterbox.

use thiserror::Error;

/// Error type returned by user-supplied address, date and file functions.
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Failures of the decode pipeline (transfer encodings and charsets).
#[derive(Error, Debug)]
pub enum DecodeError {
    /// Base64 content that is still invalid after line-wrapping is removed.
    #[error("invalid base64 content: {0}")]
    Base64(#[from] base64::DecodeError),

    /// A quoted-printable `=` that is neither a soft break nor a hex escape.
    #[error("invalid quoted-printable escape at byte {offset}")]
    QuotedPrintable { offset: usize },

    /// The declared charset label has no decoder.
    #[error("unknown charset {0:?}")]
    UnknownCharset(String),
}

/// All errors produced while parsing a message.
///
/// Any error aborts the whole parse; no partial [`Email`](crate::model::mail::Email)
/// is ever returned.
#[derive(Error, Debug)]
pub enum ParseError {
    /// The input reader failed.
    #[error("cannot read message: {0}")]
    Io(#[from] std::io::Error),

    /// A header line that is neither `Name: value` nor a continuation.
    #[error("malformed header line {0:?}")]
    MalformedHeader(String),

    /// A `multipart/*` content type without a `boundary` parameter.
    #[error("{0} part has no boundary parameter")]
    MissingBoundary(String),

    /// The input ended before the closing `--boundary--` delimiter.
    #[error("multipart body ended before closing boundary {0:?}")]
    UnterminatedMultipart(String),

    /// A content type that is neither handled nor explicitly ignorable.
    #[error("unknown Content-Type {0:?}")]
    UnknownContentType(String),

    /// Multipart nesting went deeper than the configured limit.
    #[error("multipart nesting exceeds the maximum depth of {0}")]
    TooDeep(usize),

    /// An encoded header value could not be decoded.
    #[error("{field} header ({value:?}): {source}")]
    HeaderDecode {
        field: String,
        value: String,
        source: DecodeError,
    },

    /// An address or date function rejected a non-empty header value.
    #[error("{field} header ({value:?}): {source}")]
    Header {
        field: String,
        value: String,
        source: BoxError,
    },

    /// A text or file body could not be decoded.
    #[error("cannot decode {what}: {source}")]
    Body {
        what: &'static str,
        source: DecodeError,
    },

    /// The file function failed.
    #[error("cannot handle file {name:?}: {source}")]
    FileHandler { name: String, source: BoxError },

    /// An error raised while processing a nested part, with its part path
    /// (`"1"`, `"2.1"`, ...).
    #[error("part {path}: {source}")]
    Part {
        path: String,
        source: Box<ParseError>,
    },
}

/// Convenience alias for `Result<T, ParseError>`.
pub type Result<T> = std::result::Result<T, ParseError>;

impl ParseError {
    /// Attach the path of the part being processed, unless an inner part
    /// already did.
    pub fn in_part(self, path: &str) -> Self {
        match self {
            Self::Part { .. } => self,
            other => Self::Part {
                path: path.to_string(),
                source: Box::new(other),
            },
        }
    }

    /// The error with any [`ParseError::Part`] context removed.
    pub fn kind(&self) -> &ParseError {
        match self {
            Self::Part { source, .. } => source.kind(),
            other => other,
        }
    }

    /// The path of the part that failed, if the failure happened below the root.
    pub fn part_path(&self) -> Option<&str> {
        match self {
            Self::Part { path, .. } => Some(path),
            _ => None,
        }
    }
}
