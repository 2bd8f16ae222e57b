//! Splitting RFC 5322 entities into an unfolded header block and a body.
//!
//! Used both for the top-level message and for every MIME part.

use crate::error::{ParseError, Result};
use crate::parser::charset;

/// The header fields of one entity, in file order.
///
/// Names keep their original case; lookups are case-insensitive. Values are
/// unfolded and trimmed but otherwise raw (encoded words are not decoded).
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RawHeaders {
    fields: Vec<(String, String)>,
}

impl RawHeaders {
    /// Parse an unfolded header block (without the terminating blank line).
    pub fn parse(block: &[u8]) -> Result<Self> {
        let text = charset::decode_lossy(block, "");
        let mut headers = Self::default();

        for line in text.lines() {
            if line.trim().is_empty() {
                continue;
            }
            if line.starts_with(' ') || line.starts_with('\t') {
                // Continuation line
                match headers.fields.last_mut() {
                    Some(last) => {
                        if !last.1.is_empty() {
                            last.1.push(' ');
                        }
                        last.1.push_str(line.trim());
                    }
                    None => return Err(ParseError::MalformedHeader(line.to_string())),
                }
                continue;
            }
            let (name, value) = line
                .split_once(':')
                .ok_or_else(|| ParseError::MalformedHeader(line.to_string()))?;
            let name = name.trim_end();
            if name.is_empty() || name.contains(char::is_whitespace) {
                return Err(ParseError::MalformedHeader(line.to_string()));
            }
            headers.push(name, value.trim());
        }

        Ok(headers)
    }

    /// Append a field.
    pub fn push(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.fields.push((name.into(), value.into()));
    }

    /// First value of `name`, case-insensitive.
    pub fn get(&self, name: &str) -> Option<&str> {
        self.get_all(name).next()
    }

    /// Every value of `name` in file order.
    pub fn get_all<'a>(&'a self, name: &str) -> impl Iterator<Item = &'a str> + 'a {
        let name = name.to_owned();
        self.fields
            .iter()
            .filter(move |(k, _)| k.eq_ignore_ascii_case(&name))
            .map(|(_, v)| v.as_str())
    }

    /// All `(name, value)` pairs in file order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.fields.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
}

/// Split a top-level message into headers and body.
///
/// A leading UTF-8 BOM and an mbox `From ` separator line are skipped.
pub fn split_message(data: &[u8]) -> Result<(RawHeaders, &[u8])> {
    split_entity(skip_from_line(data))
}

/// Split a MIME entity (message or part) at its first blank line.
///
/// An entity without a blank line is all headers and has an empty body.
pub fn split_entity(data: &[u8]) -> Result<(RawHeaders, &[u8])> {
    let (header_end, body_start) = find_header_end(data);
    let headers = RawHeaders::parse(&data[..header_end])?;
    Ok((headers, &data[body_start..]))
}

/// Find where the header block ends and where the body starts.
///
/// Returns `(header_end, body_start)`; the blank line (LF or CRLF) lies
/// between the two.
fn find_header_end(data: &[u8]) -> (usize, usize) {
    let mut pos = 0;
    while pos < data.len() {
        let line_end = match data[pos..].iter().position(|&b| b == b'\n') {
            Some(i) => pos + i,
            None => return (data.len(), data.len()),
        };
        let line = &data[pos..line_end];
        if line.is_empty() || line == b"\r" {
            return (pos, line_end + 1);
        }
        pos = line_end + 1;
    }
    (data.len(), data.len())
}

/// Skip the BOM and `From ` separator line at the start of mbox messages.
fn skip_from_line(data: &[u8]) -> &[u8] {
    let data = data.strip_prefix(b"\xEF\xBB\xBF").unwrap_or(data);

    if data.starts_with(b"From ") {
        if let Some(pos) = data.iter().position(|&b| b == b'\n') {
            return &data[pos + 1..];
        }
    }
    data
}
