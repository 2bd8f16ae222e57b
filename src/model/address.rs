//! Email address parsing (RFC 5322 §3.4).
//!
//! These are the default address functions used by
//! [`Parser`](crate::parser::Parser); callers may inject their own.

use thiserror::Error;

/// A parsed email address.
///
/// # Examples
/// - `"Juan García <juan@ejemplo.com>"` → `display_name = "Juan García"`, `address = "juan@ejemplo.com"`
/// - `"user@example.com"` → `display_name = ""`, `address = "user@example.com"`
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize, PartialEq, Eq)]
pub struct EmailAddress {
    /// Human-readable display name (may be empty).
    pub display_name: String,
    /// The bare email address (`user@domain`).
    pub address: String,
}

/// Reasons an address string is rejected.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AddressError {
    #[error("no address")]
    Empty,
    #[error("unbalanced quotes in {0:?}")]
    UnbalancedQuote(String),
    #[error("unbalanced angle brackets in {0:?}")]
    UnbalancedAngle(String),
    #[error("unexpected text after address in {0:?}")]
    TrailingText(String),
    #[error("invalid address {0:?}")]
    Invalid(String),
}

impl EmailAddress {
    /// Parse a single email address from a decoded header value.
    ///
    /// Supported formats:
    /// - `"user@domain.com"`
    /// - `"user@domain.com (Display Name)"`
    /// - `"<user@domain.com>"`
    /// - `"Display Name <user@domain.com>"`
    /// - `"\"Display, Name\" <user@domain.com>"`
    pub fn parse(raw: &str) -> Result<Self, AddressError> {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return Err(AddressError::Empty);
        }
        if !quotes_balanced(trimmed) {
            return Err(AddressError::UnbalancedQuote(trimmed.to_string()));
        }

        // "Display Name <address>" or "<address>"
        if let Some(angle_start) = rfind_unquoted(trimmed, '<') {
            let after = &trimmed[angle_start + 1..];
            let angle_end = after
                .find('>')
                .ok_or_else(|| AddressError::UnbalancedAngle(trimmed.to_string()))?;
            let tail = after[angle_end + 1..].trim();
            if !tail.is_empty() && !tail.starts_with('(') {
                return Err(AddressError::TrailingText(trimmed.to_string()));
            }
            let addr = validate_addr_spec(after[..angle_end].trim())?;
            let display_name = strip_quotes(&trimmed[..angle_start]);
            return Ok(Self {
                display_name,
                address: addr,
            });
        }
        if rfind_unquoted(trimmed, '>').is_some() {
            return Err(AddressError::UnbalancedAngle(trimmed.to_string()));
        }

        // Bare address, optionally followed by a "(Display Name)" comment
        let (spec, comment) = match trimmed.find('(') {
            Some(open) if trimmed.ends_with(')') => (
                trimmed[..open].trim(),
                trimmed[open + 1..trimmed.len() - 1].trim(),
            ),
            _ => (trimmed, ""),
        };
        Ok(Self {
            display_name: comment.to_string(),
            address: validate_addr_spec(spec)?,
        })
    }

    /// Parse a comma-separated list of addresses.
    ///
    /// Handles quoted commas (`"Last, First" <a@b.com>, other@c.com`) and
    /// RFC 5322 groups (`Team: a@b.com, c@d.com;`), whose members are
    /// flattened into the result. An empty group such as
    /// `undisclosed-recipients:;` contributes nothing.
    pub fn parse_list(raw: &str) -> Result<Vec<Self>, AddressError> {
        let mut results = Vec::new();
        let mut current = String::new();
        let mut in_quotes = false;
        let mut in_angle = false;
        let mut in_group = false;
        let mut group_closed = false;
        let mut escaped = false;

        for ch in raw.chars() {
            if escaped {
                escaped = false;
                current.push(ch);
                continue;
            }
            match ch {
                '\\' if in_quotes => {
                    escaped = true;
                    current.push(ch);
                }
                '"' => {
                    in_quotes = !in_quotes;
                    current.push(ch);
                }
                '<' if !in_quotes => {
                    in_angle = true;
                    current.push(ch);
                }
                '>' if !in_quotes => {
                    in_angle = false;
                    current.push(ch);
                }
                ':' if !in_quotes && !in_angle && !in_group => {
                    // Group display name, discarded
                    in_group = true;
                    current.clear();
                }
                ';' if !in_quotes && !in_angle && in_group => {
                    in_group = false;
                    group_closed = true;
                    if !current.trim().is_empty() {
                        results.push(Self::parse(&current)?);
                    }
                    current.clear();
                }
                ',' if !in_quotes && !in_angle => {
                    // The separator after a closed group has nothing before it
                    if !(group_closed && current.trim().is_empty()) {
                        results.push(Self::parse(&current)?);
                    }
                    group_closed = false;
                    current.clear();
                }
                _ => current.push(ch),
            }
        }

        if in_quotes {
            return Err(AddressError::UnbalancedQuote(raw.trim().to_string()));
        }
        if in_angle {
            return Err(AddressError::UnbalancedAngle(raw.trim().to_string()));
        }

        // Last segment; a list that was only groups may end empty
        if !current.trim().is_empty() || (results.is_empty() && !raw.contains(';')) {
            results.push(Self::parse(&current)?);
        }

        Ok(results)
    }

    /// Format for display: `"Display Name <address>"` or just `"address"`.
    pub fn display(&self) -> String {
        if self.display_name.is_empty() {
            self.address.clone()
        } else {
            format!("{} <{}>", self.display_name, self.address)
        }
    }
}

/// Check a bare `local@domain` address.
fn validate_addr_spec(spec: &str) -> Result<String, AddressError> {
    let invalid = || AddressError::Invalid(spec.to_string());
    let at = spec.rfind('@').ok_or_else(invalid)?;
    let (local, domain) = (&spec[..at], &spec[at + 1..]);
    if local.is_empty() || domain.is_empty() || domain.contains(char::is_whitespace) {
        return Err(invalid());
    }
    if !local.starts_with('"') && local.contains(char::is_whitespace) {
        return Err(invalid());
    }
    Ok(spec.to_string())
}

/// Whether every double quote outside a backslash escape is paired.
fn quotes_balanced(s: &str) -> bool {
    let mut in_quotes = false;
    let mut escaped = false;
    for ch in s.chars() {
        match ch {
            _ if escaped => escaped = false,
            '\\' if in_quotes => escaped = true,
            '"' => in_quotes = !in_quotes,
            _ => {}
        }
    }
    !in_quotes
}

/// Byte index of the last `needle` outside double quotes.
fn rfind_unquoted(s: &str, needle: char) -> Option<usize> {
    let mut in_quotes = false;
    let mut found = None;
    for (i, ch) in s.char_indices() {
        match ch {
            '"' => in_quotes = !in_quotes,
            c if c == needle && !in_quotes => found = Some(i),
            _ => {}
        }
    }
    found
}

/// Strip surrounding double-quotes and trim whitespace.
fn strip_quotes(s: &str) -> String {
    let trimmed = s.trim();
    if trimmed.starts_with('"') && trimmed.ends_with('"') && trimmed.len() >= 2 {
        trimmed[1..trimmed.len() - 1].replace("\\\"", "\"").trim().to_string()
    } else {
        trimmed.to_string()
    }
}

impl std::fmt::Display for EmailAddress {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.display())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_bare_address() {
        let addr = EmailAddress::parse("user@example.com").unwrap();
        assert_eq!(addr.address, "user@example.com");
        assert_eq!(addr.display_name, "");
    }

    #[test]
    fn test_parse_angle_address() {
        let addr = EmailAddress::parse("<user@example.com>").unwrap();
        assert_eq!(addr.address, "user@example.com");
        assert_eq!(addr.display_name, "");
    }

    #[test]
    fn test_parse_name_and_address() {
        let addr = EmailAddress::parse("User One <user1@example.com>").unwrap();
        assert_eq!(addr.address, "user1@example.com");
        assert_eq!(addr.display_name, "User One");
    }

    #[test]
    fn test_parse_quoted_name() {
        let addr = EmailAddress::parse("\"Last, First\" <user@example.com>").unwrap();
        assert_eq!(addr.address, "user@example.com");
        assert_eq!(addr.display_name, "Last, First");
    }

    #[test]
    fn test_parse_comment_name() {
        let addr = EmailAddress::parse("user@example.com (User Name)").unwrap();
        assert_eq!(addr.address, "user@example.com");
        assert_eq!(addr.display_name, "User Name");
    }

    #[test]
    fn test_parse_rejects_malformed() {
        assert_eq!(EmailAddress::parse(""), Err(AddressError::Empty));
        assert!(matches!(
            EmailAddress::parse("Name <user@example.com"),
            Err(AddressError::UnbalancedAngle(_))
        ));
        assert!(matches!(
            EmailAddress::parse("\"Name <user@example.com>"),
            Err(AddressError::UnbalancedQuote(_))
        ));
        assert!(matches!(
            EmailAddress::parse("not an address"),
            Err(AddressError::Invalid(_))
        ));
        assert!(matches!(
            EmailAddress::parse("<a@b.com> junk"),
            Err(AddressError::TrailingText(_))
        ));
    }

    #[test]
    fn test_parse_list() {
        let list =
            EmailAddress::parse_list("User One <a@b.com>, User Two <c@d.com>, plain@addr.com")
                .unwrap();
        assert_eq!(list.len(), 3);
        assert_eq!(list[0].address, "a@b.com");
        assert_eq!(list[1].display_name, "User Two");
        assert_eq!(list[2].address, "plain@addr.com");
    }

    #[test]
    fn test_parse_list_with_quoted_comma() {
        let list = EmailAddress::parse_list("\"Last, First\" <a@b.com>, other@c.com").unwrap();
        assert_eq!(list.len(), 2);
        assert_eq!(list[0].display_name, "Last, First");
        assert_eq!(list[0].address, "a@b.com");
    }

    #[test]
    fn test_parse_list_groups() {
        let list = EmailAddress::parse_list("Team: a@b.com, c@d.com;, e@f.com").unwrap();
        let addrs: Vec<_> = list.iter().map(|a| a.address.as_str()).collect();
        assert_eq!(addrs, ["a@b.com", "c@d.com", "e@f.com"]);

        let empty = EmailAddress::parse_list("undisclosed-recipients:;").unwrap();
        assert!(empty.is_empty());
    }

    #[test]
    fn test_parse_list_rejects_empty_member() {
        assert_eq!(
            EmailAddress::parse_list("a@b.com,,c@d.com"),
            Err(AddressError::Empty)
        );
    }

    #[test]
    fn test_display_with_name() {
        let addr = EmailAddress {
            display_name: "Alice".to_string(),
            address: "alice@example.com".to_string(),
        };
        assert_eq!(addr.display(), "Alice <alice@example.com>");
    }

    #[test]
    fn test_display_without_name() {
        let addr = EmailAddress {
            display_name: String::new(),
            address: "alice@example.com".to_string(),
        };
        assert_eq!(addr.display(), "alice@example.com");
    }
}
