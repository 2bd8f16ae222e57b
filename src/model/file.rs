//! Files extracted from a message (attachments and inline parts).

use serde::{Deserialize, Serialize};

use super::content::ContentInfo;

/// How a file part is presented to the reader.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FileType {
    /// Embedded in the message body (e.g. an image referenced from HTML).
    Inline,
    /// A regular attachment.
    Attachment,
}

/// A file extracted from a message part.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct File {
    pub file_type: FileType,

    /// From the disposition `filename`, else the type `name`. May be empty.
    pub name: String,

    /// Metadata of the part the file came from.
    pub content_info: ContentInfo,

    /// Transfer-decoded payload.
    ///
    /// Filled by the default file function; handlers that write the payload
    /// elsewhere leave it empty.
    #[serde(skip)]
    pub data: Vec<u8>,
}

impl File {
    /// A file with no payload yet.
    pub fn new(file_type: FileType, content_info: ContentInfo) -> Self {
        Self {
            file_type,
            name: content_info.file_name().to_string(),
            content_info,
            data: Vec::new(),
        }
    }

    pub fn content_type(&self) -> &str {
        &self.content_info.content_type
    }
}
