//! Depth-first traversal of the MIME tree into a single [`Email`].

use tracing::{debug, info};

use crate::error::{ParseError, Result};
use crate::model::content::ContentInfo;
use crate::model::file::{File, FileType};
use crate::model::mail::{Email, Headers};
use crate::parser::classify::{self, classify, Disposition, TextKind};
use crate::parser::decode::{decode_binary, decode_text};
use crate::parser::eml::split_entity;
use crate::parser::multipart::Parts;
use crate::parser::{Parser, ProcessingMode};

/// An email under construction.
///
/// Every part handler appends to the same document. It is only handed out
/// through [`into_email`](Self::into_email) once traversal has succeeded.
pub(crate) struct StagedEmail<'p> {
    parser: &'p Parser,
    email: Email,
}

impl<'p> StagedEmail<'p> {
    pub(crate) fn new(parser: &'p Parser) -> Self {
        Self {
            parser,
            email: Email::default(),
        }
    }

    pub(crate) fn set_headers(&mut self, headers: Headers) {
        self.email.headers = headers;
    }

    pub(crate) fn into_email(self) -> Email {
        self.email
    }

    /// Handle the body of the message itself.
    ///
    /// The root is never matched against the skip list. A root that is
    /// neither text nor multipart is a single file.
    pub(crate) fn parse_root(&mut self, body: &[u8], info: &ContentInfo) -> Result<()> {
        if let Some(kind) = classify::text_kind(&info.content_type) {
            return self.parse_text(kind, body, info);
        }
        if info.is_multipart() {
            return self.parse_multipart(body, info, "", 1);
        }
        if self.parser.mode != ProcessingMode::Full {
            debug!(content_type = %info.content_type, "Skipping single-part file message");
            return Ok(());
        }
        let file_type = if info.disposition == "attachment" || classify::looks_like_file(info) {
            FileType::Attachment
        } else {
            FileType::Inline
        };
        self.parse_file(file_type, body, info.clone())
    }

    /// Walk the children of a multipart body in file order.
    ///
    /// `depth` counts multipart levels, starting at 1 for the outermost.
    fn parse_multipart(
        &mut self,
        body: &[u8],
        info: &ContentInfo,
        path: &str,
        depth: usize,
    ) -> Result<()> {
        if depth > self.parser.max_depth {
            return Err(ParseError::TooDeep(self.parser.max_depth));
        }
        let boundary = info
            .boundary()
            .ok_or_else(|| ParseError::MissingBoundary(info.content_type.clone()))?;

        for (index, entity) in Parts::new(body, boundary).enumerate() {
            let entity = entity?;
            let part_path = child_path(path, index + 1);
            self.parse_child(entity, info, &part_path, depth)
                .map_err(|e| e.in_part(&part_path))?;
        }
        Ok(())
    }

    fn parse_child(
        &mut self,
        entity: &[u8],
        parent: &ContentInfo,
        path: &str,
        depth: usize,
    ) -> Result<()> {
        let (raw, body) = split_entity(entity)?;
        let info = ContentInfo::extract(&raw, Some(parent));
        let disposition = classify(&info, self.parser.mode, &self.parser.skip_content_types);

        if self.parser.verbose {
            info!(part = path, content_type = %info.content_type, ?disposition, "Dispatching part");
        } else {
            debug!(part = path, content_type = %info.content_type, ?disposition, "Dispatching part");
        }

        match disposition {
            Disposition::Recurse => self.parse_multipart(body, &info, path, depth + 1),
            Disposition::Text(kind) => self.parse_text(kind, body, &info),
            Disposition::InlineFile => self.parse_file(FileType::Inline, body, info),
            Disposition::AttachedFile => self.parse_file(FileType::Attachment, body, info),
            Disposition::Skip(_) => Ok(()),
            Disposition::Unknown => Err(ParseError::UnknownContentType(info.content_type)),
        }
    }

    fn parse_text(&mut self, kind: TextKind, body: &[u8], info: &ContentInfo) -> Result<()> {
        let text = decode_text(body, info).map_err(|source| ParseError::Body {
            what: kind.describe(),
            source,
        })?;
        if text.is_empty() {
            return Ok(());
        }
        match kind {
            TextKind::Plain => {
                if !self.email.text.is_empty() {
                    self.email.text.push_str("\n\n");
                }
                self.email.text.push_str(&text);
            }
            TextKind::Enriched => self.email.enriched_text.push_str(&text),
            TextKind::Html => self.email.html.push_str(&text),
        }
        Ok(())
    }

    fn parse_file(&mut self, file_type: FileType, body: &[u8], info: ContentInfo) -> Result<()> {
        let payload = decode_binary(body, &info).map_err(|source| ParseError::Body {
            what: "file",
            source,
        })?;
        let mut file = File::new(file_type, info);
        (self.parser.file_fn)(&mut file, &mut payload.as_slice()).map_err(|source| {
            ParseError::FileHandler {
                name: file.name.clone(),
                source,
            }
        })?;
        self.email.files.push(file);
        Ok(())
    }
}

/// IMAP-style part number: `child_path("2", 1)` is `"2.1"`.
fn child_path(parent: &str, index: usize) -> String {
    if parent.is_empty() {
        index.to_string()
    } else {
        format!("{parent}.{index}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn nested(levels: usize) -> String {
        let mut msg = String::new();
        for level in 0..levels {
            msg.push_str(&format!(
                "Content-Type: multipart/mixed; boundary=\"b{level}\"\n\n--b{level}\n"
            ));
        }
        msg.push_str("Content-Type: text/plain\n\ndeep\n");
        for level in (0..levels).rev() {
            msg.push_str(&format!("--b{level}--\n"));
        }
        msg
    }

    #[test]
    fn test_child_path() {
        assert_eq!(child_path("", 3), "3");
        assert_eq!(child_path("2", 1), "2.1");
        assert_eq!(child_path("2.1", 4), "2.1.4");
    }

    #[test]
    fn test_depth_limit() {
        let parser = Parser::new().with_max_depth(3);
        let email = parser.parse_bytes(nested(3).as_bytes()).unwrap();
        assert_eq!(email.text, "deep");

        let err = parser.parse_bytes(nested(4).as_bytes()).unwrap_err();
        assert!(matches!(err.kind(), ParseError::TooDeep(3)));
        assert_eq!(err.part_path(), Some("1.1.1"));
    }

    #[test]
    fn test_error_names_innermost_part() {
        let msg = "Content-Type: multipart/mixed; boundary=\"o\"\n\n\
                   --o\n\n\
                   first\n\
                   --o\n\
                   Content-Type: multipart/alternative; boundary=\"i\"\n\n\
                   --i\n\n\
                   ok\n\
                   --i\n\
                   Content-Type: x-strange/type\n\n\
                   ???\n\
                   --i--\n\
                   --o--\n";
        let err = Parser::new().parse_bytes(msg.as_bytes()).unwrap_err();
        assert_eq!(err.part_path(), Some("2.2"));
        assert!(matches!(err.kind(), ParseError::UnknownContentType(t) if t == "x-strange/type"));
    }

    #[test]
    fn test_single_part_file_message() {
        let msg = "Content-Type: application/pdf; name=doc.pdf\n\
                   Content-Transfer-Encoding: base64\n\n\
                   JVBERi0=\n";
        let email = Parser::new().parse_bytes(msg.as_bytes()).unwrap();
        assert_eq!(email.files.len(), 1);
        assert_eq!(email.files[0].file_type, FileType::Attachment);
        assert_eq!(email.files[0].name, "doc.pdf");
        assert_eq!(email.files[0].data, b"%PDF-");

        let email = Parser::new()
            .without_attachments()
            .parse_bytes(msg.as_bytes())
            .unwrap();
        assert!(email.files.is_empty());
    }

    #[test]
    fn test_empty_text_parts_add_no_separator() {
        let msg = "Content-Type: multipart/mixed; boundary=\"b\"\n\n\
                   --b\n\none\n\
                   --b\n\n\n\
                   --b\n\ntwo\n\
                   --b--\n";
        let email = Parser::new().parse_bytes(msg.as_bytes()).unwrap();
        assert_eq!(email.text, "one\n\ntwo");
    }
}
