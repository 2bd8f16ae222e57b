//! Charset label registry on top of `encoding_rs`.
//!
//! `encoding_rs` knows the WHATWG label set. Mail in the wild also uses
//! vendor spellings (`cp1250`, `ms936`, `x-cp1252`, `latin-1`, ...), so the
//! registry adds an alias table and a `windows-NNNN` ↔ `cpNNNN` rewrite.
//! The table is built once and only read afterwards.

use std::collections::HashMap;
use std::sync::LazyLock;

use encoding_rs::Encoding;
use tracing::warn;

use crate::error::DecodeError;

static REGISTRY: LazyLock<CharsetRegistry> = LazyLock::new(CharsetRegistry::with_defaults);

/// Maps normalized charset labels to decoders.
#[derive(Debug)]
pub struct CharsetRegistry {
    aliases: HashMap<&'static str, &'static Encoding>,
}

impl CharsetRegistry {
    /// Registry with the WHATWG labels plus common mail aliases.
    pub fn with_defaults() -> Self {
        let aliases = HashMap::from([
            ("latin-1", encoding_rs::WINDOWS_1252),
            ("iso-8859-1-windows-3.1-latin-1", encoding_rs::WINDOWS_1252),
            ("us", encoding_rs::WINDOWS_1252),
            ("utf-8-unix", encoding_rs::UTF_8),
            ("cp932", encoding_rs::SHIFT_JIS),
            ("ms936", encoding_rs::GBK),
            ("cp936", encoding_rs::GBK),
            ("cp949", encoding_rs::EUC_KR),
            ("ks_c_5601", encoding_rs::EUC_KR),
            ("cp950", encoding_rs::BIG5),
            ("koi8r", encoding_rs::KOI8_R),
            ("koi8u", encoding_rs::KOI8_U),
            ("iso-8859-8-e", encoding_rs::ISO_8859_8),
        ]);
        Self { aliases }
    }

    /// Find the decoder for `label`, case-insensitively.
    pub fn lookup(&self, label: &str) -> Option<&'static Encoding> {
        let label = label.trim().trim_matches('"').to_ascii_lowercase();
        if label.is_empty() {
            return None;
        }
        Encoding::for_label(label.as_bytes())
            .or_else(|| self.aliases.get(label.as_str()).copied())
            .or_else(|| vendor_alias(&label).and_then(|l| Encoding::for_label(l.as_bytes())))
    }
}

/// Rewrite `windows-NNNN` as `cpNNNN` and vice versa.
fn vendor_alias(label: &str) -> Option<String> {
    if let Some(code) = label.strip_prefix("windows-") {
        return Some(format!("cp{code}"));
    }
    label
        .strip_prefix("x-cp")
        .or_else(|| label.strip_prefix("cp"))
        .or_else(|| label.strip_prefix("ms-"))
        .map(|code| format!("windows-{code}"))
}

/// Look up a charset label in the process-wide registry.
pub fn lookup(label: &str) -> Option<&'static Encoding> {
    REGISTRY.lookup(label)
}

/// Decode `bytes` declared as `label` into UTF-8.
///
/// An empty label means "undeclared" and is handled by [`decode_lossy`].
/// A declared label without a decoder is an error.
pub fn decode(bytes: &[u8], label: &str) -> Result<String, DecodeError> {
    if label.trim().is_empty() {
        return Ok(decode_lossy(bytes, label));
    }
    let encoding = lookup(label).ok_or_else(|| DecodeError::UnknownCharset(label.to_string()))?;
    let (text, had_errors) = encoding.decode_with_bom_removal(bytes);
    if had_errors {
        warn!(charset = label, "Malformed byte sequences replaced while decoding");
    }
    Ok(text.into_owned())
}

/// Decode `bytes` without failing.
///
/// Uses `label` when it is known; otherwise tries UTF-8 and falls back to
/// windows-1252, which accepts every byte.
pub fn decode_lossy(bytes: &[u8], label: &str) -> String {
    if let Some(encoding) = lookup(label) {
        return encoding.decode_with_bom_removal(bytes).0.into_owned();
    }
    match std::str::from_utf8(bytes) {
        Ok(s) => s.to_string(),
        Err(_) => encoding_rs::WINDOWS_1252
            .decode_without_bom_handling(bytes)
            .0
            .into_owned(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lookup_whatwg_labels() {
        assert_eq!(lookup("UTF-8"), Some(encoding_rs::UTF_8));
        assert_eq!(lookup(" iso-8859-2 "), Some(encoding_rs::ISO_8859_2));
        assert_eq!(lookup("\"us-ascii\""), Some(encoding_rs::WINDOWS_1252));
        assert_eq!(lookup("tis-620"), Some(encoding_rs::WINDOWS_874));
    }

    #[test]
    fn test_lookup_vendor_aliases() {
        assert_eq!(lookup("windows-1250"), Some(encoding_rs::WINDOWS_1250));
        assert_eq!(lookup("cp1250"), Some(encoding_rs::WINDOWS_1250));
        assert_eq!(lookup("CP1251"), Some(encoding_rs::WINDOWS_1251));
        assert_eq!(lookup("ms-1252"), Some(encoding_rs::WINDOWS_1252));
        assert_eq!(lookup("cp936"), Some(encoding_rs::GBK));
        assert_eq!(lookup("latin-1"), Some(encoding_rs::WINDOWS_1252));
    }

    #[test]
    fn test_lookup_unknown() {
        assert_eq!(lookup("x-no-such-charset"), None);
        assert_eq!(lookup(""), None);
    }

    #[test]
    fn test_decode_declared() {
        assert_eq!(decode(b"caf\xe9", "iso-8859-1").unwrap(), "café");
        assert_eq!(decode(b"\xe8\xe1\xf8", "cp1250").unwrap(), "čář");
        assert!(matches!(
            decode(b"abc", "x-no-such-charset"),
            Err(DecodeError::UnknownCharset(label)) if label == "x-no-such-charset"
        ));
    }

    #[test]
    fn test_decode_undeclared() {
        assert_eq!(decode("héllo".as_bytes(), "").unwrap(), "héllo");
        assert_eq!(decode(b"h\xe9llo", "").unwrap(), "héllo");
    }

    #[test]
    fn test_decode_lossy_unknown_label() {
        assert_eq!(decode_lossy(b"plain", "x-no-such-charset"), "plain");
    }
}
