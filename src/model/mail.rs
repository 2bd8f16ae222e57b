//! The parsed email document and its header record.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::address::EmailAddress;
use super::content::ContentInfo;
use super::file::File;

/// Typed view of a message's top-level headers.
///
/// Absent headers are `None`, empty vectors or empty strings.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Headers {
    pub date: Option<DateTime<Utc>>,
    pub sender: Option<EmailAddress>,
    pub from: Vec<EmailAddress>,
    pub reply_to: Vec<EmailAddress>,
    pub to: Vec<EmailAddress>,
    pub cc: Vec<EmailAddress>,
    pub bcc: Vec<EmailAddress>,

    /// `Message-ID` without angle brackets.
    pub message_id: String,
    /// Message-IDs from `In-Reply-To`, without angle brackets.
    pub in_reply_to: Vec<String>,
    /// Message-IDs from `References`, without angle brackets.
    pub references: Vec<String>,

    /// Decoded subject line (RFC 2047 encoded-words resolved).
    pub subject: String,
    pub comments: String,
    pub keywords: Vec<String>,

    /// Raw `Received` trace values, top to bottom.
    pub received: Vec<String>,

    pub resent_date: Option<DateTime<Utc>>,
    pub resent_from: Vec<EmailAddress>,
    pub resent_sender: Option<EmailAddress>,
    pub resent_to: Vec<EmailAddress>,
    pub resent_cc: Vec<EmailAddress>,
    pub resent_bcc: Vec<EmailAddress>,
    pub resent_message_id: String,

    /// Content metadata of the message itself.
    pub content_info: ContentInfo,

    /// Every other header, decoded, in file order. Case variants of a name
    /// share one key, spelled as first seen.
    pub extra_headers: BTreeMap<String, Vec<String>>,
}

/// A fully parsed email.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Email {
    pub headers: Headers,

    /// All `text/plain` parts, separated by a blank line.
    pub text: String,

    /// All `text/enriched` parts, concatenated.
    pub enriched_text: String,

    /// All `text/html` parts, concatenated.
    pub html: String,

    /// Extracted files in document order.
    pub files: Vec<File>,
}

impl Email {
    /// First value of a header that has no dedicated field.
    ///
    /// Parsing files every spelling of a name under one key, so the match
    /// here is case-insensitive.
    pub fn extra_header(&self, name: &str) -> Option<&str> {
        self.headers
            .extra_headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .and_then(|(_, values)| values.first())
            .map(String::as_str)
    }
}
