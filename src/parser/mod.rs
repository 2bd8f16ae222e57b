//! Email parsing: message splitting, header decoding, MIME traversal and the
//! configurable [`Parser`] entry point.

pub mod charset;
pub mod classify;
pub mod decode;
pub mod eml;
pub mod fields;
pub mod header;
pub mod multipart;
mod staged;

use std::fmt;
use std::io::Read;
use std::path::PathBuf;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::config::ParserConfig;
use crate::error::{BoxError, Result};
use crate::export::attachment::save_files_to_directory;
use crate::model::address::EmailAddress;
use crate::model::content::ContentInfo;
use crate::model::file::File;
use crate::model::mail::Email;
use staged::StagedEmail;

/// Parses a single address header value (`Sender`, `Resent-Sender`).
pub type AddressFn =
    Arc<dyn Fn(&str) -> std::result::Result<EmailAddress, BoxError> + Send + Sync>;
/// Parses an address list header value (`From`, `To`, `Cc`, ...).
pub type AddressListFn =
    Arc<dyn Fn(&str) -> std::result::Result<Vec<EmailAddress>, BoxError> + Send + Sync>;
/// Parses a `Date` or `Resent-Date` header value.
pub type DateFn = Arc<dyn Fn(&str) -> std::result::Result<DateTime<Utc>, BoxError> + Send + Sync>;
/// Receives each extracted file and a reader over its decoded payload.
pub type FileFn =
    Arc<dyn Fn(&mut File, &mut dyn Read) -> std::result::Result<(), BoxError> + Send + Sync>;

/// Default limit on nested multipart levels.
pub const DEFAULT_MAX_DEPTH: usize = 64;

/// How much of a message to process.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ProcessingMode {
    /// Headers, text bodies and files.
    #[default]
    Full,
    /// Headers only; the body is never decoded.
    HeadersOnly,
    /// Headers and text bodies; file parts are skipped.
    NoAttachments,
}

impl fmt::Display for ProcessingMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Full => "full",
            Self::HeadersOnly => "headers-only",
            Self::NoAttachments => "no-attachments",
        })
    }
}

/// A configured email parser.
///
/// Configuration is fixed once built; `parse` only reads it, so one parser
/// can be cloned or shared across threads.
#[derive(Clone)]
pub struct Parser {
    pub(crate) mode: ProcessingMode,
    pub(crate) skip_content_types: Vec<String>,
    pub(crate) address_fn: AddressFn,
    pub(crate) address_list_fn: AddressListFn,
    pub(crate) date_fn: DateFn,
    pub(crate) file_fn: FileFn,
    pub(crate) max_depth: usize,
    pub(crate) verbose: bool,
}

impl Default for Parser {
    fn default() -> Self {
        Self {
            mode: ProcessingMode::Full,
            skip_content_types: Vec::new(),
            address_fn: Arc::new(|raw: &str| -> std::result::Result<EmailAddress, BoxError> {
                Ok(EmailAddress::parse(raw)?)
            }),
            address_list_fn: Arc::new(
                |raw: &str| -> std::result::Result<Vec<EmailAddress>, BoxError> {
                    Ok(EmailAddress::parse_list(raw)?)
                },
            ),
            date_fn: Arc::new(|raw: &str| -> std::result::Result<DateTime<Utc>, BoxError> {
                Ok(header::parse_date(raw)?)
            }),
            file_fn: Arc::new(
                |file: &mut File, reader: &mut dyn Read| -> std::result::Result<(), BoxError> {
                    reader.read_to_end(&mut file.data)?;
                    Ok(())
                },
            ),
            max_depth: DEFAULT_MAX_DEPTH,
            verbose: false,
        }
    }
}

impl fmt::Debug for Parser {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Parser")
            .field("mode", &self.mode)
            .field("skip_content_types", &self.skip_content_types)
            .field("max_depth", &self.max_depth)
            .field("verbose", &self.verbose)
            .finish_non_exhaustive()
    }
}

impl Parser {
    /// A parser with default settings: full mode, no skipped types.
    pub fn new() -> Self {
        Self::default()
    }

    /// A parser configured from the `[parser]` config section.
    pub fn from_config(config: &ParserConfig) -> Self {
        let parser = Self::new()
            .with_mode(config.mode)
            .with_skip_content_types(&config.skip_content_types)
            .with_max_depth(config.max_depth);
        if config.verbose {
            parser.with_verbose()
        } else {
            parser
        }
    }

    pub fn with_mode(mut self, mode: ProcessingMode) -> Self {
        self.mode = mode;
        self
    }

    /// Only extract headers.
    pub fn with_headers_only(self) -> Self {
        self.with_mode(ProcessingMode::HeadersOnly)
    }

    /// Extract headers and text, but no files.
    pub fn without_attachments(self) -> Self {
        self.with_mode(ProcessingMode::NoAttachments)
    }

    /// Content types (`primary/subtype`) whose parts are ignored, even when
    /// malformed. Compared case-insensitively.
    pub fn with_skip_content_types<I, S>(mut self, types: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.skip_content_types = types
            .into_iter()
            .map(|t| t.as_ref().trim().to_ascii_lowercase())
            .filter(|t| !t.is_empty())
            .collect();
        self
    }

    pub fn with_address_fn<F>(mut self, f: F) -> Self
    where
        F: Fn(&str) -> std::result::Result<EmailAddress, BoxError> + Send + Sync + 'static,
    {
        self.address_fn = Arc::new(f);
        self
    }

    pub fn with_address_list_fn<F>(mut self, f: F) -> Self
    where
        F: Fn(&str) -> std::result::Result<Vec<EmailAddress>, BoxError> + Send + Sync + 'static,
    {
        self.address_list_fn = Arc::new(f);
        self
    }

    pub fn with_date_fn<F>(mut self, f: F) -> Self
    where
        F: Fn(&str) -> std::result::Result<DateTime<Utc>, BoxError> + Send + Sync + 'static,
    {
        self.date_fn = Arc::new(f);
        self
    }

    /// Replace the file function. The default buffers each payload into
    /// [`File::data`].
    pub fn with_file_fn<F>(mut self, f: F) -> Self
    where
        F: Fn(&mut File, &mut dyn Read) -> std::result::Result<(), BoxError>
            + Send
            + Sync
            + 'static,
    {
        self.file_fn = Arc::new(f);
        self
    }

    /// Write every extracted file into `dir` instead of keeping it in memory.
    pub fn with_save_files_to_directory(self, dir: impl Into<PathBuf>) -> Self {
        self.with_file_fn(save_files_to_directory(dir))
    }

    /// Maximum number of nested multipart levels.
    pub fn with_max_depth(mut self, max_depth: usize) -> Self {
        self.max_depth = max_depth;
        self
    }

    /// Log the handling of every part at `info` level instead of `debug`.
    pub fn with_verbose(mut self) -> Self {
        self.verbose = true;
        self
    }

    pub fn mode(&self) -> ProcessingMode {
        self.mode
    }

    pub fn skip_content_types(&self) -> &[String] {
        &self.skip_content_types
    }

    pub fn max_depth(&self) -> usize {
        self.max_depth
    }

    /// Read a whole message from `reader` and parse it.
    pub fn parse<R: Read>(&self, mut reader: R) -> Result<Email> {
        let mut data = Vec::new();
        reader.read_to_end(&mut data)?;
        self.parse_bytes(&data)
    }

    /// Parse a message held in memory.
    ///
    /// Any error aborts the parse; no partial result is returned.
    pub fn parse_bytes(&self, data: &[u8]) -> Result<Email> {
        let (raw, body) = eml::split_message(data)?;
        let info = ContentInfo::extract(&raw, None);
        let headers = fields::extract_headers(&raw, info.clone(), self)?;

        let mut staged = StagedEmail::new(self);
        staged.set_headers(headers);
        if self.mode != ProcessingMode::HeadersOnly {
            staged.parse_root(body, &info)?;
        }

        let email = staged.into_email();
        debug!(
            mode = %self.mode,
            text_len = email.text.len(),
            html_len = email.html.len(),
            files = email.files.len(),
            "Parsed message"
        );
        Ok(email)
    }
}
