//! Header value decoding: RFC 2047 encoded-words and date parsing.

use chrono::{DateTime, NaiveDateTime, TimeZone, Utc};
use thiserror::Error;
use tracing::debug;

use crate::error::DecodeError;
use crate::parser::charset;
use crate::parser::decode::{decode_base64, hex_pair};

/// Decode RFC 2047 encoded-words in a header value.
///
/// Example: `"=?UTF-8?B?SG9sYQ==?= =?UTF-8?B?IG11bmRv?="` → `"Hola mundo"`
///
/// Whitespace between two adjacent encoded-words is dropped, and adjacent
/// words in the same charset are joined before decoding so multi-byte
/// characters split across words survive. Text that only looks like an
/// encoded-word is kept as is. A well-formed word with an unknown charset or
/// a broken base64 payload is an error.
pub fn decode_header(input: &str) -> Result<String, DecodeError> {
    let mut result = String::with_capacity(input.len());
    let mut pending: Option<(&str, Vec<u8>)> = None;
    let mut remaining = input;

    while let Some(start) = remaining.find("=?") {
        let before = &remaining[..start];
        let Some(word) = EncodedWord::parse(&remaining[start..]) else {
            flush_pending(&mut result, &mut pending)?;
            result.push_str(before);
            result.push_str("=?");
            remaining = &remaining[start + 2..];
            continue;
        };

        // RFC 2047 §6.2: linear whitespace between encoded-words is ignored
        if pending.is_none() || !before.trim().is_empty() {
            flush_pending(&mut result, &mut pending)?;
            result.push_str(before);
        }

        let bytes = word.payload()?;
        match pending.as_mut() {
            Some((label, buf)) if label.eq_ignore_ascii_case(word.charset) => {
                buf.extend_from_slice(&bytes)
            }
            _ => {
                flush_pending(&mut result, &mut pending)?;
                pending = Some((word.charset, bytes));
            }
        }
        remaining = &remaining[start + word.len..];
    }

    flush_pending(&mut result, &mut pending)?;
    result.push_str(remaining);
    Ok(result)
}

fn flush_pending(out: &mut String, pending: &mut Option<(&str, Vec<u8>)>) -> Result<(), DecodeError> {
    if let Some((label, bytes)) = pending.take() {
        out.push_str(&charset::decode(&bytes, label)?);
    }
    Ok(())
}

/// One `=?charset?encoding?text?=` token.
struct EncodedWord<'a> {
    charset: &'a str,
    encoding: u8,
    text: &'a str,
    /// Length of the whole token including the `=?` and `?=` markers.
    len: usize,
}

impl<'a> EncodedWord<'a> {
    /// Parse a token at the start of `s`, which begins with `=?`.
    fn parse(s: &'a str) -> Option<Self> {
        let body = s.strip_prefix("=?")?;
        let (charset, rest) = body.split_once('?')?;
        let (encoding, rest) = rest.split_once('?')?;
        let end = rest.find("?=")?;
        let text = &rest[..end];

        if charset.is_empty() || charset.contains(char::is_whitespace) {
            return None;
        }
        let encoding = match encoding.as_bytes() {
            [b] if b.eq_ignore_ascii_case(&b'b') || b.eq_ignore_ascii_case(&b'q') => {
                b.to_ascii_uppercase()
            }
            _ => return None,
        };
        if text.contains(char::is_whitespace) {
            return None;
        }

        // RFC 2231 §5: "charset*language"
        let charset = charset.split_once('*').map_or(charset, |(cs, _)| cs);
        let len = s.len() - rest.len() + end + 2;
        Some(Self {
            charset,
            encoding,
            text,
            len,
        })
    }

    fn payload(&self) -> Result<Vec<u8>, DecodeError> {
        match self.encoding {
            b'B' => decode_base64(self.text.as_bytes()),
            _ => Ok(decode_q(self.text)),
        }
    }
}

/// Decode Q-encoding (RFC 2047 §4.2): `_` is a space, `=XX` is a byte.
///
/// An `=` without two hex digits is kept literally.
fn decode_q(input: &str) -> Vec<u8> {
    let bytes = input.as_bytes();
    let mut result = Vec::with_capacity(bytes.len());
    let mut i = 0;
    while i < bytes.len() {
        match bytes[i] {
            b'_' => result.push(b' '),
            b'=' => match hex_pair(bytes.get(i + 1..i + 3)) {
                Some(byte) => {
                    result.push(byte);
                    i += 3;
                    continue;
                }
                None => result.push(b'='),
            },
            b => result.push(b),
        }
        i += 1;
    }
    result
}

/// A date header no known format could read.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DateError {
    #[error("unrecognised date {0:?}")]
    Unrecognised(String),
}

/// Parse an email date string in various common formats.
///
/// Supports RFC 2822, ISO 8601, and many broken real-world variants. A
/// trailing `(comment)` such as `(UTC)` is ignored.
pub fn parse_date(date_str: &str) -> Result<DateTime<Utc>, DateError> {
    let trimmed = strip_trailing_comment(date_str.trim());

    if let Ok(dt) = DateTime::parse_from_rfc2822(trimmed) {
        return Ok(dt.with_timezone(&Utc));
    }
    if let Ok(dt) = DateTime::parse_from_rfc3339(trimmed) {
        return Ok(dt.with_timezone(&Utc));
    }

    let no_dow = strip_day_of_week(trimmed);
    let candidates = [no_dow.to_string(), normalize_imap_date(no_dow)];

    for candidate in &candidates {
        if let Some(dt) = parse_with_formats(candidate) {
            return Ok(dt);
        }
    }
    for candidate in &candidates {
        if let Some(dt) = replace_named_tz(candidate).and_then(|c| parse_with_formats(&c)) {
            return Ok(dt);
        }
    }

    if let Some(dt) = mail_parser_date(trimmed) {
        return Ok(dt);
    }

    debug!(date = trimmed, "Could not parse date");
    Err(DateError::Unrecognised(date_str.trim().to_string()))
}

const DATE_FORMATS: &[&str] = &[
    "%d %b %Y %H:%M:%S %z",
    "%d %b %Y %H:%M %z",
    "%d %b %Y %H:%M:%S",
    "%b %d %H:%M:%S %Y",
    "%Y-%m-%dT%H:%M:%S%z",
    "%Y-%m-%dT%H:%M:%SZ",
    "%Y-%m-%d %H:%M:%S %z",
    "%Y-%m-%d %H:%M:%S",
    "%d/%m/%Y %H:%M:%S",
    "%m/%d/%Y %H:%M:%S",
];

fn parse_with_formats(candidate: &str) -> Option<DateTime<Utc>> {
    DATE_FORMATS.iter().find_map(|fmt| {
        DateTime::parse_from_str(candidate, fmt)
            .map(|dt| dt.with_timezone(&Utc))
            .ok()
            .or_else(|| {
                NaiveDateTime::parse_from_str(candidate, fmt)
                    .ok()
                    .map(|ndt| Utc.from_utc_datetime(&ndt))
            })
    })
}

/// Last resort: let `mail-parser` read it from a one-header message.
fn mail_parser_date(input: &str) -> Option<DateTime<Utc>> {
    let wrapped = format!("Date: {input}\n\n");
    let message = mail_parser::MessageParser::default().parse(wrapped.as_bytes())?;
    let rfc3339 = message.date()?.to_rfc3339();
    DateTime::parse_from_rfc3339(&rfc3339)
        .ok()
        .map(|d| d.with_timezone(&Utc))
}

fn strip_trailing_comment(s: &str) -> &str {
    match (s.ends_with(')'), s.rfind('(')) {
        (true, Some(open)) => s[..open].trim_end(),
        _ => s,
    }
}

/// `"Thu, 04 Jan 2024 ..."` → `"04 Jan 2024 ..."`.
fn strip_day_of_week(s: &str) -> &str {
    const DAYS: [&str; 7] = ["Mon", "Tue", "Wed", "Thu", "Fri", "Sat", "Sun"];
    for day in DAYS {
        if let Some(rest) = s.strip_prefix(day) {
            let rest = rest.strip_prefix(',').unwrap_or(rest);
            if rest.starts_with(' ') {
                return rest.trim_start();
            }
        }
    }
    s
}

/// IMAP INTERNALDATE style: `"16-JUL-2025 03:01:03"` → `"16 Jul 2025 03:01:03"`.
fn normalize_imap_date(s: &str) -> String {
    const MONTHS: [&str; 12] = [
        "Jan", "Feb", "Mar", "Apr", "May", "Jun", "Jul", "Aug", "Sep", "Oct", "Nov", "Dec",
    ];
    let Some((day, rest)) = s.split_once('-') else {
        return s.to_string();
    };
    let Some((month, rest)) = rest.split_once('-') else {
        return s.to_string();
    };
    match MONTHS.iter().find(|m| m.eq_ignore_ascii_case(month)) {
        Some(m) if day.chars().all(|c| c.is_ascii_digit()) => format!("{day} {m} {rest}"),
        _ => s.to_string(),
    }
}

/// Replace a trailing timezone abbreviation with its numeric offset.
fn replace_named_tz(s: &str) -> Option<String> {
    const ZONES: [(&str, &str); 13] = [
        ("EST", "-0500"),
        ("EDT", "-0400"),
        ("CST", "-0600"),
        ("CDT", "-0500"),
        ("MST", "-0700"),
        ("MDT", "-0600"),
        ("PST", "-0800"),
        ("PDT", "-0700"),
        ("GMT", "+0000"),
        ("UTC", "+0000"),
        ("CEST", "+0200"),
        ("CET", "+0100"),
        ("JST", "+0900"),
    ];
    ZONES.iter().find_map(|(name, offset)| {
        s.strip_suffix(name)
            .filter(|head| head.ends_with(' '))
            .map(|head| format!("{head}{offset}"))
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decode_base64_encoded_word() {
        assert_eq!(decode_header("=?UTF-8?B?SG9sYSBtdW5kbw==?=").unwrap(), "Hola mundo");
    }

    #[test]
    fn test_decode_q_encoded_word() {
        assert_eq!(
            decode_header("=?ISO-8859-1?Q?R=e9sum=E9_du_projet?=").unwrap(),
            "Résumé du projet"
        );
    }

    #[test]
    fn test_adjacent_words_drop_whitespace() {
        assert_eq!(
            decode_header("=?UTF-8?B?SG9sYQ==?= \r\n =?UTF-8?B?IG11bmRv?=").unwrap(),
            "Hola mundo"
        );
    }

    #[test]
    fn test_mixed_plain_and_encoded() {
        assert_eq!(
            decode_header("Re: =?UTF-8?B?SG9sYQ==?= there").unwrap(),
            "Re: Hola there"
        );
    }

    #[test]
    fn test_split_multibyte_character() {
        // "é" is C3 A9, split across two words
        assert_eq!(decode_header("=?UTF-8?Q?caf=C3?= =?UTF-8?Q?=A9?=").unwrap(), "café");
    }

    #[test]
    fn test_different_charsets_in_sequence() {
        assert_eq!(
            decode_header("=?ISO-8859-1?Q?M=FCller?= =?UTF-8?B?5bGx55Sw?=").unwrap(),
            "Müller山田"
        );
    }

    #[test]
    fn test_vendor_charset_label() {
        assert_eq!(decode_header("=?cp1252?Q?M=FCller?=").unwrap(), "Müller");
        assert_eq!(decode_header("=?utf-8*en?Q?hi?=").unwrap(), "hi");
    }

    #[test]
    fn test_malformed_words_are_literal() {
        assert_eq!(decode_header("=?UTF-8?X?abc?=").unwrap(), "=?UTF-8?X?abc?=");
        assert_eq!(decode_header("price =?unterminated").unwrap(), "price =?unterminated");
        assert_eq!(decode_header("plain text").unwrap(), "plain text");
    }

    #[test]
    fn test_unknown_charset_is_error() {
        let err = decode_header("=?x-unknown?Q?abc?=").unwrap_err();
        assert!(matches!(err, DecodeError::UnknownCharset(label) if label == "x-unknown"));
    }

    #[test]
    fn test_invalid_base64_is_error() {
        let err = decode_header("=?UTF-8?B?!!!!?=").unwrap_err();
        assert!(matches!(err, DecodeError::Base64(_)));
    }

    #[test]
    fn test_q_lenient_equals() {
        assert_eq!(decode_q("a=zz_b="), b"a=zz b=");
    }

    #[test]
    fn test_parse_date_rfc2822() {
        let dt = parse_date("Thu, 04 Jan 2024 10:00:00 +0000").unwrap();
        assert_eq!(dt.format("%Y-%m-%d").to_string(), "2024-01-04");
    }

    #[test]
    fn test_parse_date_with_comment() {
        let dt = parse_date("Thu, 04 Jan 2024 10:00:00 +0100 (CET)").unwrap();
        assert_eq!(dt.format("%H:%M").to_string(), "09:00");
    }

    #[test]
    fn test_parse_date_named_tz() {
        let dt = parse_date("Thu, 04 Jan 2024 10:00:00 EST").unwrap();
        assert_eq!(dt.format("%H:%M").to_string(), "15:00");
    }

    #[test]
    fn test_parse_date_iso8601() {
        assert!(parse_date("2024-01-04T10:00:00Z").is_ok());
    }

    #[test]
    fn test_parse_date_imap_style() {
        let dt = parse_date("16-JUL-2025 03:01:03").unwrap();
        assert_eq!(dt.format("%Y-%m-%d").to_string(), "2025-07-16");
        assert!(parse_date("14-AUG-2025 02:01:35 +0000").is_ok());
    }

    #[test]
    fn test_parse_date_rejects_garbage() {
        assert_eq!(
            parse_date("not a date"),
            Err(DateError::Unrecognised("not a date".into()))
        );
    }

    #[test]
    fn test_normalize_imap_date() {
        assert_eq!(normalize_imap_date("10-mar-2025 06:00:42"), "10 Mar 2025 06:00:42");
        assert_eq!(normalize_imap_date("04 Jan 2024 10:00:00"), "04 Jan 2024 10:00:00");
        assert_eq!(normalize_imap_date("2024-01-04"), "2024-01-04");
    }
}
