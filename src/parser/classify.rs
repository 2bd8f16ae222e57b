//! Decides what to do with each MIME part.

use crate::model::content::ContentInfo;
use crate::parser::ProcessingMode;

/// The text fields an [`Email`](crate::model::mail::Email) accumulates.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TextKind {
    Plain,
    Enriched,
    Html,
}

impl TextKind {
    pub fn describe(self) -> &'static str {
        match self {
            Self::Plain => "text",
            Self::Enriched => "enriched text",
            Self::Html => "HTML",
        }
    }
}

/// Why a part produced no output.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    /// The type is in the parser's skip list.
    Configured,
    /// A file, and the processing mode does not extract files.
    Mode,
    /// A type known to carry nothing worth extracting.
    Ignored,
}

/// Outcome of classifying one part.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Disposition {
    Recurse,
    Text(TextKind),
    InlineFile,
    AttachedFile,
    Skip(SkipReason),
    Unknown,
}

/// Types skipped silently when nothing else claims them.
pub const IGNORED_TYPES: &[&str] = &["text/calendar", "text/vcard", "text/x-vcard"];

/// Primary types treated as attachments when no disposition says otherwise.
const FILE_PRIMARY_TYPES: &[&str] = &["application", "image", "audio", "video", "font", "model"];

/// The text kind of an exact `text/plain`, `text/enriched` or `text/html`.
pub fn text_kind(content_type: &str) -> Option<TextKind> {
    match content_type {
        "text/plain" => Some(TextKind::Plain),
        "text/enriched" => Some(TextKind::Enriched),
        "text/html" => Some(TextKind::Html),
        _ => None,
    }
}

/// Classify a non-root part. Rules apply in order; the first match wins.
pub fn classify(info: &ContentInfo, mode: ProcessingMode, skip: &[String]) -> Disposition {
    let content_type = info.content_type.as_str();

    if skip.iter().any(|s| s == content_type) {
        return Disposition::Skip(SkipReason::Configured);
    }
    if info.disposition == "attachment" {
        return file_in_mode(Disposition::AttachedFile, mode);
    }
    if let Some(kind) = text_kind(content_type) {
        return Disposition::Text(kind);
    }
    if info.is_multipart() {
        return Disposition::Recurse;
    }
    if is_inline_file(info) {
        return file_in_mode(Disposition::InlineFile, mode);
    }
    if looks_like_file(info) {
        return file_in_mode(Disposition::AttachedFile, mode);
    }
    if IGNORED_TYPES.contains(&content_type) {
        return Disposition::Skip(SkipReason::Ignored);
    }
    Disposition::Unknown
}

/// Inline by disposition, or undeclared but named or referenced by Content-ID.
fn is_inline_file(info: &ContentInfo) -> bool {
    match info.disposition.as_str() {
        "inline" => true,
        "" => {
            info.type_params.contains_key("name")
                || info.disposition_params.contains_key("filename")
                || !info.id.is_empty()
        }
        _ => false,
    }
}

/// Binary-looking types and embedded messages.
pub(crate) fn looks_like_file(info: &ContentInfo) -> bool {
    FILE_PRIMARY_TYPES.contains(&info.primary_type()) || info.content_type == "message/rfc822"
}

fn file_in_mode(disposition: Disposition, mode: ProcessingMode) -> Disposition {
    match mode {
        ProcessingMode::Full => disposition,
        _ => Disposition::Skip(SkipReason::Mode),
    }
}
