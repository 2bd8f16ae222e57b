//! MIME framing metadata of one message part (RFC 2045, RFC 2183, RFC 2231).

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::parser::charset;
use crate::parser::decode::hex_pair;
use crate::parser::eml::RawHeaders;
use crate::parser::header::decode_header;

/// Content type assumed when a part declares none (RFC 2045 §5.2).
pub const DEFAULT_CONTENT_TYPE: &str = "text/plain";

/// Content type assumed for the children of a `multipart/digest` (RFC 2046 §5.1.5).
pub const DIGEST_CONTENT_TYPE: &str = "message/rfc822";

/// Content metadata of a message or of one of its parts.
///
/// All type, disposition and encoding strings are lowercased. Parameter
/// names are lowercased; parameter values are unquoted and, for RFC 2231
/// extended parameters, reassembled and decoded.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContentInfo {
    /// `primary/subtype`, never empty.
    pub content_type: String,
    /// Content-Type parameters (`boundary`, `charset`, `name`, ...).
    pub type_params: BTreeMap<String, String>,
    /// `""`, `"inline"` or `"attachment"`.
    pub disposition: String,
    /// Content-Disposition parameters (`filename`, ...).
    pub disposition_params: BTreeMap<String, String>,
    /// Content-Transfer-Encoding, e.g. `"base64"` or `"quoted-printable"`.
    pub transfer_encoding: String,
    /// Content-ID without angle brackets.
    pub id: String,
    /// Charset label, declared or inherited; empty when unknown.
    pub charset: String,
}

impl Default for ContentInfo {
    fn default() -> Self {
        Self {
            content_type: DEFAULT_CONTENT_TYPE.to_string(),
            type_params: BTreeMap::new(),
            disposition: String::new(),
            disposition_params: BTreeMap::new(),
            transfer_encoding: String::new(),
            id: String::new(),
            charset: String::new(),
        }
    }
}

impl ContentInfo {
    /// Build the content metadata of a part from its header block.
    ///
    /// `parent` is the metadata of the enclosing multipart, used for the
    /// default type and for inheriting `charset` and `transfer_encoding`
    /// when the part declares neither.
    pub fn extract(headers: &RawHeaders, parent: Option<&ContentInfo>) -> Self {
        let (content_type, type_params) = match headers.get("Content-Type") {
            Some(value) => {
                let (head, params) = parse_header_value(value);
                if is_valid_mime_type(&head) {
                    (head, params)
                } else {
                    debug!(value, "Malformed Content-Type, using default");
                    (default_type(parent).to_string(), params)
                }
            }
            None => (default_type(parent).to_string(), BTreeMap::new()),
        };

        let (disposition, disposition_params) = headers
            .get("Content-Disposition")
            .map(parse_header_value)
            .unwrap_or_default();

        let mut transfer_encoding = headers
            .get("Content-Transfer-Encoding")
            .map(|v| v.trim().to_ascii_lowercase())
            .unwrap_or_default();
        let mut charset = type_params
            .get("charset")
            .map(|c| c.trim().to_ascii_lowercase())
            .unwrap_or_default();

        if let Some(parent) = parent {
            if transfer_encoding.is_empty() {
                transfer_encoding = parent.transfer_encoding.clone();
            }
            if charset.is_empty() {
                charset = parent.charset.clone();
            }
        }

        let id = headers
            .get("Content-ID")
            .map(|v| v.trim_matches(|c: char| c == '<' || c == '>' || c.is_whitespace()))
            .unwrap_or_default()
            .to_string();

        Self {
            content_type,
            type_params,
            disposition,
            disposition_params,
            transfer_encoding,
            id,
            charset,
        }
    }

    /// The part before the `/`, e.g. `"image"`.
    pub fn primary_type(&self) -> &str {
        self.content_type
            .split_once('/')
            .map(|(primary, _)| primary)
            .unwrap_or(&self.content_type)
    }

    pub fn is_multipart(&self) -> bool {
        self.content_type.starts_with("multipart/")
    }

    /// The `boundary` parameter, if present and non-empty.
    pub fn boundary(&self) -> Option<&str> {
        self.type_params
            .get("boundary")
            .map(String::as_str)
            .filter(|b| !b.is_empty())
    }

    /// File name from the disposition `filename`, else the type `name`.
    pub fn file_name(&self) -> &str {
        self.disposition_params
            .get("filename")
            .or_else(|| self.type_params.get("name"))
            .map(String::as_str)
            .unwrap_or("")
    }
}

fn default_type(parent: Option<&ContentInfo>) -> &'static str {
    match parent {
        Some(p) if p.content_type == "multipart/digest" => DIGEST_CONTENT_TYPE,
        _ => DEFAULT_CONTENT_TYPE,
    }
}

fn is_valid_mime_type(s: &str) -> bool {
    match s.split_once('/') {
        Some((primary, sub)) => {
            !primary.is_empty()
                && !sub.is_empty()
                && !sub.contains('/')
                && !s.contains(|c: char| c.is_whitespace() || c.is_control())
        }
        None => false,
    }
}

/// One piece of an RFC 2231 parameter (`name*0*=...`).
struct Section {
    index: usize,
    encoded: bool,
    value: String,
}

/// Split a structured header value into its lowercased head and parameters.
///
/// `"text/plain; charset=\"UTF-8\""` → `("text/plain", {"charset": "UTF-8"})`
pub(crate) fn parse_header_value(value: &str) -> (String, BTreeMap<String, String>) {
    let mut pieces = split_unquoted(value, ';').into_iter();
    let head = pieces.next().unwrap_or("").trim().to_ascii_lowercase();

    let mut params = BTreeMap::new();
    let mut extended: BTreeMap<String, Vec<Section>> = BTreeMap::new();

    for piece in pieces {
        let Some((name, raw)) = piece.split_once('=') else {
            continue;
        };
        let name = name.trim().to_ascii_lowercase();
        if name.is_empty() {
            continue;
        }
        let raw = unquote(raw.trim());

        match name.split_once('*') {
            Some((base, rest)) => {
                let encoded = rest.is_empty() || rest.ends_with('*');
                let index = match rest.trim_end_matches('*') {
                    "" => 0,
                    digits => match digits.parse() {
                        Ok(i) => i,
                        Err(_) => continue,
                    },
                };
                extended.entry(base.to_string()).or_default().push(Section {
                    index,
                    encoded,
                    value: raw,
                });
            }
            None => {
                params.insert(name, raw);
            }
        }
    }

    // Extended values take precedence over plain ones of the same name
    for (name, mut sections) in extended {
        sections.sort_by_key(|s| s.index);
        params.insert(name, join_sections(&sections));
    }

    // A file name that will not decode is still a usable name
    for name in ["name", "filename"] {
        if let Some(value) = params.get_mut(name) {
            if value.contains("=?") {
                match decode_header(value) {
                    Ok(decoded) => *value = decoded,
                    Err(e) => debug!(value = %value, error = %e, "Cannot decode parameter"),
                }
            }
        }
    }

    (head, params)
}

/// Reassemble RFC 2231 continuations; the first encoded section may carry
/// a `charset'language'` prefix.
fn join_sections(sections: &[Section]) -> String {
    let mut label = "";
    let mut bytes = Vec::new();

    for (i, section) in sections.iter().enumerate() {
        if !section.encoded {
            bytes.extend_from_slice(section.value.as_bytes());
            continue;
        }
        let mut value = section.value.as_str();
        if i == 0 {
            let mut parts = value.splitn(3, '\'');
            if let (Some(cs), Some(_lang), Some(rest)) = (parts.next(), parts.next(), parts.next())
            {
                label = cs;
                value = rest;
            }
        }
        bytes.extend(percent_decode(value));
    }

    charset::decode_lossy(&bytes, label)
}

fn percent_decode(s: &str) -> Vec<u8> {
    let bytes = s.as_bytes();
    let mut out = Vec::with_capacity(bytes.len());
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] == b'%' {
            if let Some(b) = hex_pair(bytes.get(i + 1..i + 3)) {
                out.push(b);
                i += 3;
                continue;
            }
        }
        out.push(bytes[i]);
        i += 1;
    }
    out
}

fn unquote(s: &str) -> String {
    if s.len() >= 2 && s.starts_with('"') && s.ends_with('"') {
        let mut out = String::with_capacity(s.len() - 2);
        let mut chars = s[1..s.len() - 1].chars();
        while let Some(c) = chars.next() {
            match c {
                '\\' => out.extend(chars.next()),
                c => out.push(c),
            }
        }
        out
    } else {
        s.to_string()
    }
}

/// Split on `sep` outside double-quoted strings.
fn split_unquoted(s: &str, sep: char) -> Vec<&str> {
    let mut pieces = Vec::new();
    let mut start = 0;
    let mut in_quotes = false;
    let mut escaped = false;

    for (i, c) in s.char_indices() {
        match c {
            _ if escaped => escaped = false,
            '\\' if in_quotes => escaped = true,
            '"' => in_quotes = !in_quotes,
            c if c == sep && !in_quotes => {
                pieces.push(&s[start..i]);
                start = i + c.len_utf8();
            }
            _ => {}
        }
    }
    pieces.push(&s[start..]);
    pieces
}

#[cfg(test)]
mod tests {
    use super::*;

    fn headers(pairs: &[(&str, &str)]) -> RawHeaders {
        let mut h = RawHeaders::default();
        for (name, value) in pairs {
            h.push(*name, *value);
        }
        h
    }

    #[test]
    fn test_extract_defaults() {
        let ci = ContentInfo::extract(&RawHeaders::default(), None);
        assert_eq!(ci, ContentInfo::default());
        assert_eq!(ci.content_type, "text/plain");
    }

    #[test]
    fn test_extract_type_and_params() {
        let ci = ContentInfo::extract(
            &headers(&[
                ("Content-Type", "Multipart/Mixed; Boundary=\"a;b\"; charset=UTF-8"),
                ("Content-Transfer-Encoding", " Base64 "),
            ]),
            None,
        );
        assert_eq!(ci.content_type, "multipart/mixed");
        assert_eq!(ci.boundary(), Some("a;b"));
        assert_eq!(ci.charset, "utf-8");
        assert_eq!(ci.transfer_encoding, "base64");
        assert!(ci.is_multipart());
    }

    #[test]
    fn test_malformed_type_falls_back() {
        let ci = ContentInfo::extract(&headers(&[("Content-Type", "text; charset=utf-8")]), None);
        assert_eq!(ci.content_type, "text/plain");
        assert_eq!(ci.charset, "utf-8");
    }

    #[test]
    fn test_inherits_from_parent() {
        let parent = ContentInfo {
            content_type: "multipart/mixed".into(),
            charset: "tis-620".into(),
            transfer_encoding: "8bit".into(),
            ..ContentInfo::default()
        };
        let ci = ContentInfo::extract(&headers(&[("Content-Type", "text/html")]), Some(&parent));
        assert_eq!(ci.charset, "tis-620");
        assert_eq!(ci.transfer_encoding, "8bit");

        let own = ContentInfo::extract(
            &headers(&[
                ("Content-Type", "text/html; charset=utf-8"),
                ("Content-Transfer-Encoding", "base64"),
            ]),
            Some(&parent),
        );
        assert_eq!(own.charset, "utf-8");
        assert_eq!(own.transfer_encoding, "base64");
    }

    #[test]
    fn test_digest_default_type() {
        let parent = ContentInfo {
            content_type: "multipart/digest".into(),
            ..ContentInfo::default()
        };
        let ci = ContentInfo::extract(&RawHeaders::default(), Some(&parent));
        assert_eq!(ci.content_type, "message/rfc822");
    }

    #[test]
    fn test_file_name_precedence() {
        let ci = ContentInfo::extract(
            &headers(&[
                ("Content-Type", "application/pdf; name=\"type-name.pdf\""),
                ("Content-Disposition", "attachment; filename=\"disp-name.pdf\""),
                ("Content-ID", "<part1@example.com>"),
            ]),
            None,
        );
        assert_eq!(ci.disposition, "attachment");
        assert_eq!(ci.file_name(), "disp-name.pdf");
        assert_eq!(ci.id, "part1@example.com");

        let by_type =
            ContentInfo::extract(&headers(&[("Content-Type", "image/png; name=cat.png")]), None);
        assert_eq!(by_type.file_name(), "cat.png");
        assert_eq!(by_type.primary_type(), "image");
    }

    #[test]
    fn test_rfc2231_filename() {
        let ci = ContentInfo::extract(
            &headers(&[(
                "Content-Disposition",
                "attachment; filename*=UTF-8''na%C3%AFve%20r%C3%A9sum%C3%A9.txt",
            )]),
            None,
        );
        assert_eq!(ci.file_name(), "naïve résumé.txt");
    }

    #[test]
    fn test_rfc2231_continuations() {
        let ci = ContentInfo::extract(
            &headers(&[(
                "Content-Disposition",
                "attachment; filename*0*=iso-8859-1''caf%E9; filename*1=\"-menu.txt\"",
            )]),
            None,
        );
        assert_eq!(ci.file_name(), "café-menu.txt");
    }

    #[test]
    fn test_percent_decode_needs_two_hex_digits() {
        assert_eq!(percent_decode("a%20b"), b"a b");
        assert_eq!(percent_decode("%+F%-1"), b"%+F%-1");
        assert_eq!(percent_decode("end%4"), b"end%4");
    }

    #[test]
    fn test_encoded_word_name() {
        let ci = ContentInfo::extract(
            &headers(&[("Content-Type", "image/jpeg; name=\"=?UTF-8?B?Z2F0by5qcGc=?=\"")]),
            None,
        );
        assert_eq!(ci.file_name(), "gato.jpg");
    }

    #[test]
    fn test_undecodable_encoded_word_name_kept_raw() {
        let ci = ContentInfo::extract(
            &headers(&[("Content-Type", "image/jpeg; name=\"=?x-nope?Q?a.jpg?=\"")]),
            None,
        );
        assert_eq!(ci.file_name(), "=?x-nope?Q?a.jpg?=");
    }
}
