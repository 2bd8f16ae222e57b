//! Maps the raw top-level header block onto the typed [`Headers`] record.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};

use crate::error::{ParseError, Result};
use crate::model::address::EmailAddress;
use crate::model::content::ContentInfo;
use crate::model::mail::Headers;
use crate::parser::eml::RawHeaders;
use crate::parser::header::decode_header;
use crate::parser::Parser;

/// Header names with a dedicated destination in [`Headers`].
///
/// Anything else lands in `extra_headers`.
pub const EXPLICIT_HEADERS: &[&str] = &[
    "Date",
    "Sender",
    "From",
    "Reply-To",
    "To",
    "Cc",
    "Bcc",
    "Message-ID",
    "In-Reply-To",
    "References",
    "Received",
    "Subject",
    "Comments",
    "Keywords",
    "Resent-Date",
    "Resent-From",
    "Resent-Sender",
    "Resent-To",
    "Resent-Cc",
    "Resent-Bcc",
    "Resent-Message-ID",
    "Content-Type",
    "Content-Transfer-Encoding",
    "Content-Disposition",
];

pub fn is_explicit_header(name: &str) -> bool {
    EXPLICIT_HEADERS.iter().any(|h| h.eq_ignore_ascii_case(name))
}

/// Build the header record of a message.
///
/// `content_info` is the already extracted metadata of the root entity.
pub(crate) fn extract_headers(
    raw: &RawHeaders,
    content_info: ContentInfo,
    parser: &Parser,
) -> Result<Headers> {
    let fields = FieldReader { raw, parser };

    let mut extra_headers: BTreeMap<String, Vec<String>> = BTreeMap::new();
    for (name, value) in raw.iter() {
        if is_explicit_header(name) {
            continue;
        }
        let decoded = fields.decode(name, value)?;
        // Spellings of one name share the key first seen
        let key = extra_headers
            .keys()
            .find(|k| k.eq_ignore_ascii_case(name))
            .cloned()
            .unwrap_or_else(|| name.to_string());
        extra_headers.entry(key).or_default().push(decoded);
    }

    Ok(Headers {
        date: fields.date("Date")?,
        sender: fields.address("Sender")?,
        from: fields.address_list("From")?,
        reply_to: fields.address_list("Reply-To")?,
        to: fields.address_list("To")?,
        cc: fields.address_list("Cc")?,
        bcc: fields.address_list("Bcc")?,
        message_id: fields.message_id("Message-ID"),
        in_reply_to: fields.ids("In-Reply-To"),
        references: fields.ids("References"),
        subject: fields.text("Subject")?,
        comments: fields.text("Comments")?,
        keywords: fields.keywords()?,
        received: raw.get_all("Received").map(str::to_string).collect(),
        resent_date: fields.date("Resent-Date")?,
        resent_from: fields.address_list("Resent-From")?,
        resent_sender: fields.address("Resent-Sender")?,
        resent_to: fields.address_list("Resent-To")?,
        resent_cc: fields.address_list("Resent-Cc")?,
        resent_bcc: fields.address_list("Resent-Bcc")?,
        resent_message_id: fields.message_id("Resent-Message-ID"),
        content_info,
        extra_headers,
    })
}

struct FieldReader<'a> {
    raw: &'a RawHeaders,
    parser: &'a Parser,
}

impl FieldReader<'_> {
    fn decode(&self, field: &str, value: &str) -> Result<String> {
        decode_header(value).map_err(|source| ParseError::HeaderDecode {
            field: field.to_string(),
            value: value.to_string(),
            source,
        })
    }

    /// Decoded, trimmed value; `None` when absent or blank.
    fn decoded(&self, field: &str) -> Result<Option<String>> {
        let Some(value) = self.raw.get(field) else {
            return Ok(None);
        };
        let decoded = self.decode(field, value)?;
        let trimmed = decoded.trim();
        Ok((!trimmed.is_empty()).then(|| trimmed.to_string()))
    }

    fn text(&self, field: &str) -> Result<String> {
        Ok(self.decoded(field)?.unwrap_or_default())
    }

    fn address(&self, field: &str) -> Result<Option<EmailAddress>> {
        self.decoded(field)?
            .map(|value| {
                (self.parser.address_fn)(&value).map_err(|source| header_error(field, value, source))
            })
            .transpose()
    }

    fn address_list(&self, field: &str) -> Result<Vec<EmailAddress>> {
        match self.decoded(field)? {
            Some(value) => (self.parser.address_list_fn)(&value)
                .map_err(|source| header_error(field, value, source)),
            None => Ok(Vec::new()),
        }
    }

    fn date(&self, field: &str) -> Result<Option<DateTime<Utc>>> {
        self.decoded(field)?
            .map(|value| {
                (self.parser.date_fn)(&value).map_err(|source| header_error(field, value, source))
            })
            .transpose()
    }

    fn message_id(&self, field: &str) -> String {
        self.raw
            .get(field)
            .map(|v| v.trim_matches(|c: char| c == '<' || c == '>' || c.is_whitespace()))
            .unwrap_or_default()
            .to_string()
    }

    fn ids(&self, field: &str) -> Vec<String> {
        self.raw
            .get(field)
            .map(|v| {
                v.split_whitespace()
                    .map(|id| id.trim_matches(|c| c == '<' || c == '>'))
                    .filter(|id| !id.is_empty())
                    .map(str::to_string)
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Every `Keywords` header, split on commas.
    fn keywords(&self) -> Result<Vec<String>> {
        let mut keywords = Vec::new();
        for value in self.raw.get_all("Keywords") {
            let decoded = self.decode("Keywords", value)?;
            keywords.extend(
                decoded
                    .split(',')
                    .map(str::trim)
                    .filter(|k| !k.is_empty())
                    .map(str::to_string),
            );
        }
        Ok(keywords)
    }
}

fn header_error(field: &str, value: String, source: crate::error::BoxError) -> ParseError {
    ParseError::Header {
        field: field.to_string(),
        value,
        source,
    }
}
