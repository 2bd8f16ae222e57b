//! The decode pipeline: transfer-encoding removal, then charset decoding.

use std::borrow::Cow;

use base64::Engine;

use crate::error::DecodeError;
use crate::model::content::ContentInfo;
use crate::parser::charset;

/// Undo a Content-Transfer-Encoding.
///
/// `base64` and `quoted-printable` are decoded; every other value
/// (`7bit`, `8bit`, `binary`, empty, unknown) passes the bytes through.
pub fn decode_transfer<'a>(raw: &'a [u8], encoding: &str) -> Result<Cow<'a, [u8]>, DecodeError> {
    if encoding.eq_ignore_ascii_case("base64") {
        decode_base64(raw).map(Cow::Owned)
    } else if encoding.eq_ignore_ascii_case("quoted-printable") {
        decode_quoted_printable(raw).map(Cow::Owned)
    } else {
        Ok(Cow::Borrowed(raw))
    }
}

/// Decode line-wrapped base64; whitespace and `=` padding are ignored.
pub fn decode_base64(raw: &[u8]) -> Result<Vec<u8>, DecodeError> {
    let mut compact: Vec<u8> = raw
        .iter()
        .copied()
        .filter(|b| !b.is_ascii_whitespace())
        .collect();
    while compact.last() == Some(&b'=') {
        compact.pop();
    }
    Ok(base64::engine::general_purpose::STANDARD_NO_PAD.decode(&compact)?)
}

/// Decode quoted-printable (RFC 2045 §6.7).
pub fn decode_quoted_printable(raw: &[u8]) -> Result<Vec<u8>, DecodeError> {
    let mut out = Vec::with_capacity(raw.len());
    let mut offset = 0;

    for line in raw.split_inclusive(|&b| b == b'\n') {
        let (content, eol) = match line.strip_suffix(b"\r\n") {
            Some(c) => (c, &b"\r\n"[..]),
            None => match line.strip_suffix(b"\n") {
                Some(c) => (c, &b"\n"[..]),
                None => (line, &b""[..]),
            },
        };
        // Trailing whitespace is transport padding
        let content = content.trim_ascii_end();

        let mut soft_break = false;
        let mut i = 0;
        while i < content.len() {
            if content[i] != b'=' {
                out.push(content[i]);
                i += 1;
                continue;
            }
            if i + 1 == content.len() {
                soft_break = true;
                break;
            }
            let byte = hex_pair(content.get(i + 1..i + 3))
                .ok_or(DecodeError::QuotedPrintable { offset: offset + i })?;
            out.push(byte);
            i += 3;
        }
        if !soft_break {
            out.extend_from_slice(eol);
        }
        offset += line.len();
    }

    Ok(out)
}

/// Two hex digits as a byte. Signs and anything else non-hex are rejected.
pub(crate) fn hex_pair(pair: Option<&[u8]>) -> Option<u8> {
    let [hi, lo] = pair? else {
        return None;
    };
    let hi = (*hi as char).to_digit(16)?;
    let lo = (*lo as char).to_digit(16)?;
    Some((hi * 16 + lo) as u8)
}

/// Decode a text part to a normalized string: transfer encoding, charset,
/// CRLF → LF, trimmed.
pub fn decode_text(raw: &[u8], info: &ContentInfo) -> Result<String, DecodeError> {
    let bytes = decode_transfer(raw, &info.transfer_encoding)?;
    let text = charset::decode(&bytes, &info.charset)?;
    Ok(normalize_text(&text))
}

/// Decode a file payload; only the transfer encoding is removed.
pub fn decode_binary(raw: &[u8], info: &ContentInfo) -> Result<Vec<u8>, DecodeError> {
    decode_transfer(raw, &info.transfer_encoding).map(Cow::into_owned)
}

fn normalize_text(text: &str) -> String {
    text.replace("\r\n", "\n").trim().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn info(transfer_encoding: &str, charset: &str) -> ContentInfo {
        ContentInfo {
            transfer_encoding: transfer_encoding.into(),
            charset: charset.into(),
            ..ContentInfo::default()
        }
    }

    #[test]
    fn test_base64_round_trip() {
        let original = b"The quick brown fox jumps over the lazy dog.\r\nTwice!";
        let encoded = base64::engine::general_purpose::STANDARD.encode(original);
        let wrapped: String = encoded
            .as_bytes()
            .chunks(16)
            .map(|c| format!("{}\r\n", std::str::from_utf8(c).unwrap()))
            .collect();
        let decoded = decode_base64(wrapped.as_bytes()).unwrap();
        assert_eq!(decoded, original);
        assert_eq!(base64::engine::general_purpose::STANDARD.encode(&decoded), encoded);
    }

    #[test]
    fn test_base64_invalid() {
        assert!(matches!(decode_base64(b"abc$def"), Err(DecodeError::Base64(_))));
    }

    #[test]
    fn test_quoted_printable() {
        let decoded = decode_quoted_printable(b"caf=C3=a9 =\r\nau lait  \r\nfin").unwrap();
        assert_eq!(decoded, "café au lait\r\nfin".as_bytes());
    }

    #[test]
    fn test_quoted_printable_soft_break_lf() {
        assert_eq!(decode_quoted_printable(b"one=\ntwo\n").unwrap(), b"onetwo\n");
    }

    #[test]
    fn test_quoted_printable_invalid_escape() {
        let err = decode_quoted_printable(b"ok\nbad =ZZ").unwrap_err();
        assert!(matches!(err, DecodeError::QuotedPrintable { offset: 7 }));
    }

    #[test]
    fn test_quoted_printable_signed_escape_rejected() {
        for input in [&b"a=+Fb"[..], b"a=-1b"] {
            let err = decode_quoted_printable(input).unwrap_err();
            assert!(
                matches!(err, DecodeError::QuotedPrintable { offset: 1 }),
                "{:?} should be rejected",
                String::from_utf8_lossy(input)
            );
        }
    }

    #[test]
    fn test_hex_pair() {
        assert_eq!(hex_pair(Some(b"3d")), Some(0x3d));
        assert_eq!(hex_pair(Some(b"+F")), None);
        assert_eq!(hex_pair(Some(b"F")), None);
        assert_eq!(hex_pair(None), None);
    }

    #[test]
    fn test_identity_encodings_borrow() {
        for enc in ["", "7bit", "8bit", "binary", "x-uuencode"] {
            let out = decode_transfer(b"raw", enc).unwrap();
            assert!(matches!(out, Cow::Borrowed(_)), "{enc} should not copy");
            assert_eq!(&*out, b"raw");
        }
    }

    #[test]
    fn test_decode_text_normalizes() {
        let text = decode_text(b"\r\n  Hello\r\nWorld \r\n\r\n", &info("7bit", "")).unwrap();
        assert_eq!(text, "Hello\nWorld");
    }

    #[test]
    fn test_decode_text_chains_encodings() {
        let text = decode_text(b"Gr=FC=DFe", &info("quoted-printable", "iso-8859-1")).unwrap();
        assert_eq!(text, "Grüße");
        let text = decode_text(b"6OH4", &info("base64", "cp1250")).unwrap();
        assert_eq!(text, "čář");
    }

    #[test]
    fn test_decode_text_unknown_charset() {
        let err = decode_text(b"abc", &info("", "x-klingon")).unwrap_err();
        assert!(matches!(err, DecodeError::UnknownCharset(_)));
    }

    #[test]
    fn test_decode_binary_keeps_bytes() {
        let data = decode_binary(b"AAEC/w==", &info("base64", "utf-8")).unwrap();
        assert_eq!(data, [0x00u8, 0x01, 0x02, 0xff]);
        let data = decode_binary(b" \r\nraw\r\n", &info("", "")).unwrap();
        assert_eq!(data, b" \r\nraw\r\n");
    }
}
