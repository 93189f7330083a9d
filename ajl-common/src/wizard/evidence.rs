//! Evidence items and image attachment rules

use serde::{Serialize, Serializer};
use uuid::Uuid;

use crate::{Error, Result};

/// Largest accepted image upload
pub const MAX_EVIDENCE_BYTES: usize = 10 * 1024 * 1024;

/// Accepted image content types
pub const ALLOWED_IMAGE_TYPES: [&str; 3] = ["image/png", "image/jpeg", "image/webp"];

pub const MIN_CAPTION_CHARS: usize = 5;

/// Image bytes attached to a file-backed evidence item
#[derive(Clone, PartialEq, Eq)]
pub struct FileAttachment {
    file_name: String,
    content_type: String,
    bytes: Vec<u8>,
}

impl FileAttachment {
    /// Accept an upload if its type and size are allowed
    pub fn new(file_name: impl Into<String>, content_type: &str, bytes: Vec<u8>) -> Result<Self> {
        let content_type = content_type
            .split(';')
            .next()
            .unwrap_or_default()
            .trim()
            .to_ascii_lowercase();
        if !ALLOWED_IMAGE_TYPES.contains(&content_type.as_str()) {
            return Err(Error::InvalidInput(
                "Evidence images must be PNG, JPG/JPEG, or WEBP.".to_string(),
            ));
        }
        if bytes.len() > MAX_EVIDENCE_BYTES {
            return Err(Error::InvalidInput(
                "One of the evidence images is larger than 10MB.".to_string(),
            ));
        }
        Ok(Self {
            file_name: file_name.into(),
            content_type,
            bytes,
        })
    }

    pub fn file_name(&self) -> &str {
        &self.file_name
    }

    pub fn content_type(&self) -> &str {
        &self.content_type
    }

    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    /// Storage extension taken from the file name, `png` when unrecognised
    pub fn extension(&self) -> &'static str {
        let ext = self
            .file_name
            .rsplit_once('.')
            .map(|(_, ext)| ext.to_ascii_lowercase())
            .unwrap_or_default();
        match ext.as_str() {
            "jpg" => "jpg",
            "jpeg" => "jpeg",
            "webp" => "webp",
            _ => "png",
        }
    }
}

impl std::fmt::Debug for FileAttachment {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FileAttachment")
            .field("file_name", &self.file_name)
            .field("content_type", &self.content_type)
            .field("len", &self.bytes.len())
            .finish()
    }
}

/// Attachments are reported by name, type and size; bytes never leave the server
impl Serialize for FileAttachment {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        use serde::ser::SerializeStruct;
        let mut s = serializer.serialize_struct("FileAttachment", 3)?;
        s.serialize_field("fileName", &self.file_name)?;
        s.serialize_field("contentType", &self.content_type)?;
        s.serialize_field("size", &self.bytes.len())?;
        s.end()
    }
}

/// Where an evidence item's content lives
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum EvidenceKind {
    /// Photo uploaded by the author
    File { attachment: Option<FileAttachment> },
    /// External page
    Url { url: String },
}

/// Photo or link supporting a journey
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EvidenceItem {
    pub id: String,
    pub caption: String,
    #[serde(flatten)]
    pub kind: EvidenceKind,
}

impl EvidenceItem {
    pub fn url(url: impl Into<String>, caption: impl Into<String>) -> Self {
        Self {
            id: new_evidence_id(),
            caption: caption.into(),
            kind: EvidenceKind::Url { url: url.into() },
        }
    }

    pub fn file(caption: impl Into<String>) -> Self {
        Self {
            id: new_evidence_id(),
            caption: caption.into(),
            kind: EvidenceKind::File { attachment: None },
        }
    }

    pub fn is_file(&self) -> bool {
        matches!(self.kind, EvidenceKind::File { .. })
    }
}

fn new_evidence_id() -> String {
    Uuid::new_v4().simple().to_string()[..12].to_string()
}

/// Absolute http(s) URL with something after the scheme
pub fn is_http_url(s: &str) -> bool {
    let s = s.trim();
    ["http://", "https://"]
        .iter()
        .any(|scheme| {
            s.len() > scheme.len()
                && s.get(..scheme.len())
                    .is_some_and(|prefix| prefix.eq_ignore_ascii_case(scheme))
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_attachment_type_and_size_rules() {
        assert!(FileAttachment::new("ramp.png", "image/png", vec![0; 16]).is_ok());
        assert!(FileAttachment::new("ramp.jpg", "image/jpeg; charset=binary", vec![0; 16]).is_ok());
        assert!(FileAttachment::new("doc.pdf", "application/pdf", vec![0; 16]).is_err());
        assert!(FileAttachment::new("huge.webp", "image/webp", vec![0; MAX_EVIDENCE_BYTES + 1]).is_err());
        assert!(FileAttachment::new("edge.webp", "image/webp", vec![0; MAX_EVIDENCE_BYTES]).is_ok());
    }

    #[test]
    fn test_extension_from_name() {
        let ext = |name: &str| FileAttachment::new(name, "image/png", vec![1]).unwrap().extension();
        assert_eq!(ext("door.JPG"), "jpg");
        assert_eq!(ext("door.jpeg"), "jpeg");
        assert_eq!(ext("door.webp"), "webp");
        assert_eq!(ext("door.heic"), "png");
        assert_eq!(ext("door"), "png");
    }

    #[test]
    fn test_http_url_check() {
        assert!(is_http_url("https://example.org/lift"));
        assert!(is_http_url("HTTP://example.org"));
        assert!(!is_http_url("https://"));
        assert!(!is_http_url("ftp://example.org"));
        assert!(!is_http_url("example.org"));
    }

    #[test]
    fn test_serialized_item_hides_bytes() {
        let mut item = EvidenceItem::file("Step-free entrance");
        item.kind = EvidenceKind::File {
            attachment: Some(FileAttachment::new("a.png", "image/png", vec![7; 3]).unwrap()),
        };
        let json = serde_json::to_value(&item).unwrap();
        assert_eq!(json["kind"], "file");
        assert_eq!(json["attachment"]["size"], 3);
        assert!(json["attachment"].get("bytes").is_none());
    }
}
