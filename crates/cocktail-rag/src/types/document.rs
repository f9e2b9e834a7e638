//! Document, chunk and index record types with source tracking for citations

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Metadata attached to an indexed record
pub type Metadata = serde_json::Map<String, Value>;

/// Metadata key holding the source filename
pub const META_SOURCE: &str = "source";
/// Metadata key holding the storage path
pub const META_PATH: &str = "path";
/// Metadata key holding the chunk ordinal
pub const META_CHUNK: &str = "chunk";
/// Older ingestion runs wrote the ordinal here; read-only
pub const META_LEGACY_CHUNK: &str = "chunk_id";
/// Metadata key holding the SHA-256 of the source document
pub const META_CONTENT_HASH: &str = "content_hash";
/// Metadata key holding the public URL of the source document
pub const META_URL: &str = "url";

/// Supported file types
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum FileType {
    /// PDF document
    Pdf,
    /// CSV table
    Csv,
    /// EPUB ebook
    Epub,
    /// Unknown file type
    Unknown,
}

impl FileType {
    /// Detect file type from extension
    pub fn from_extension(ext: &str) -> Self {
        match ext.to_lowercase().as_str() {
            "pdf" => Self::Pdf,
            "csv" => Self::Csv,
            "epub" => Self::Epub,
            _ => Self::Unknown,
        }
    }

    /// Detect file type from a path or filename
    pub fn from_path(path: &str) -> Self {
        extension(path).map(Self::from_extension).unwrap_or(Self::Unknown)
    }

    /// Check if this is a supported file type
    pub fn is_supported(&self) -> bool {
        !matches!(self, Self::Unknown)
    }

    /// Get display name
    pub fn display_name(&self) -> &str {
        match self {
            Self::Pdf => "PDF",
            Self::Csv => "CSV",
            Self::Epub => "EPUB",
            Self::Unknown => "Unknown",
        }
    }
}

fn extension(path: &str) -> Option<&str> {
    let name = file_name(path);
    let (stem, ext) = name.rsplit_once('.')?;
    (!stem.is_empty()).then_some(ext)
}

fn file_name(path: &str) -> &str {
    path.rsplit('/').next().unwrap_or(path)
}

/// A source file discovered in remote storage
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct RemoteDocument {
    /// Storage path, unique within the bucket; doubles as the ingestion state key
    pub path: String,
    /// Last path segment
    pub filename: String,
    /// Type derived from the extension
    pub file_type: FileType,
    /// Size in bytes, when the listing reports it
    pub size: Option<u64>,
    /// Publicly reachable URL, when the store has one
    pub public_url: Option<String>,
}

impl RemoteDocument {
    pub fn new(path: impl Into<String>) -> Self {
        let path = path.into();
        let filename = file_name(&path).to_string();
        let file_type = FileType::from_path(&path);
        Self {
            path,
            filename,
            file_type,
            size: None,
            public_url: None,
        }
    }

    pub fn with_size(mut self, size: Option<u64>) -> Self {
        self.size = size;
        self
    }

    pub fn with_public_url(mut self, url: Option<String>) -> Self {
        self.public_url = url;
        self
    }

    /// Stable id used as the chunk-id prefix.
    ///
    /// The full path is encoded so distinct paths never share an id: ASCII
    /// letters, digits, `.` and `-` are kept, `/` becomes `_`, and any other
    /// byte (including `_` and whitespace) becomes `~XX`.
    pub fn document_id(&self) -> String {
        let mut id = String::with_capacity(self.path.len());
        for byte in self.path.bytes() {
            match byte {
                b'a'..=b'z' | b'A'..=b'Z' | b'0'..=b'9' | b'.' | b'-' => id.push(byte as char),
                b'/' => id.push('_'),
                _ => id.push_str(&format!("~{:02X}", byte)),
            }
        }
        id
    }
}

/// A bounded span of a document's text
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Chunk {
    /// `<document-id>_<index>`
    pub id: String,
    /// Ordinal within the document
    pub index: usize,
    /// Chunk text
    pub text: String,
    /// Estimated tokens (chars / 4)
    pub token_estimate: usize,
    /// Owning document's filename
    pub filename: String,
    /// Owning document's storage path
    pub path: String,
}

impl Chunk {
    pub fn chunk_id(document_id: &str, index: usize) -> String {
        format!("{}_{}", document_id, index)
    }
}

/// What the vector index stores per chunk (the embedding lives beside it)
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct IndexedRecord {
    pub id: String,
    pub text: String,
    pub metadata: Metadata,
}

impl IndexedRecord {
    /// Build the record for a chunk with the canonical metadata keys
    pub fn from_chunk(chunk: &Chunk, content_hash: &str, url: Option<&str>) -> Self {
        let mut metadata = Metadata::new();
        metadata.insert(META_SOURCE.to_string(), Value::from(chunk.filename.clone()));
        metadata.insert(META_PATH.to_string(), Value::from(chunk.path.clone()));
        metadata.insert(META_CHUNK.to_string(), Value::from(chunk.index as u64));
        metadata.insert(META_CONTENT_HASH.to_string(), Value::from(content_hash));
        if let Some(url) = url {
            metadata.insert(META_URL.to_string(), Value::from(url));
        }
        Self {
            id: chunk.id.clone(),
            text: chunk.text.clone(),
            metadata,
        }
    }

    pub fn source(&self) -> Option<&str> {
        source_of(&self.metadata)
    }

    pub fn chunk_ordinal(&self) -> Option<usize> {
        chunk_ordinal_of(&self.metadata)
    }
}

/// A record returned by a similarity query
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RetrievedChunk {
    pub id: String,
    pub text: String,
    pub metadata: Metadata,
    /// Cosine similarity to the query
    pub similarity: f32,
}

impl RetrievedChunk {
    pub fn source(&self) -> Option<&str> {
        source_of(&self.metadata)
    }

    pub fn chunk_ordinal(&self) -> Option<usize> {
        chunk_ordinal_of(&self.metadata)
    }

    pub fn url(&self) -> Option<&str> {
        self.metadata.get(META_URL).and_then(Value::as_str)
    }
}

fn source_of(metadata: &Metadata) -> Option<&str> {
    metadata
        .get(META_SOURCE)
        .and_then(Value::as_str)
        .filter(|s| !s.is_empty())
}

/// Reads `chunk`, falling back to the legacy `chunk_id` key. Either may be a
/// number or a numeric string.
fn chunk_ordinal_of(metadata: &Metadata) -> Option<usize> {
    [META_CHUNK, META_LEGACY_CHUNK]
        .iter()
        .filter_map(|key| metadata.get(*key))
        .find_map(|value| match value {
            Value::Number(n) => n.as_u64().map(|n| n as usize),
            Value::String(s) => s.trim().parse().ok(),
            _ => None,
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_file_type_detection() {
        assert_eq!(FileType::from_path("pdfs/Liquid Intelligence.PDF"), FileType::Pdf);
        assert_eq!(FileType::from_path("specs.csv"), FileType::Csv);
        assert_eq!(FileType::from_path("books/flavor.epub"), FileType::Epub);
        assert_eq!(FileType::from_path("notes.docx"), FileType::Unknown);
        assert_eq!(FileType::from_path(".pdf"), FileType::Unknown);
        assert_eq!(FileType::from_path("README"), FileType::Unknown);
    }

    #[test]
    fn test_document_id() {
        let doc = RemoteDocument::new("pdfs/Liquid Intelligence.pdf");
        assert_eq!(doc.filename, "Liquid Intelligence.pdf");
        assert_eq!(doc.document_id(), "pdfs_Liquid~20Intelligence.pdf");
        assert_eq!(Chunk::chunk_id(&doc.document_id(), 3), "pdfs_Liquid~20Intelligence.pdf_3");
    }

    #[test]
    fn test_document_id_distinct_paths() {
        let paths = [
            "pdfs/a/b.csv",
            "pdfs/a b.csv",
            "pdfs/a_b.csv",
            "pdfs/specs.csv",
            "pdfs/specs.pdf",
            "pdfs/a/_b.csv",
            "pdfs/a_/b.csv",
        ];
        let ids: std::collections::HashSet<String> = paths
            .iter()
            .map(|p| RemoteDocument::new(*p).document_id())
            .collect();
        assert_eq!(ids.len(), paths.len());
    }

    #[test]
    fn test_legacy_chunk_key() {
        let mut metadata = Metadata::new();
        metadata.insert(META_SOURCE.to_string(), Value::from("menu.pdf"));
        metadata.insert(META_LEGACY_CHUNK.to_string(), Value::from("7"));
        let record = IndexedRecord {
            id: "menu_7".to_string(),
            text: "Negroni".to_string(),
            metadata,
        };
        assert_eq!(record.chunk_ordinal(), Some(7));

        let mut record = record;
        record.metadata.insert(META_CHUNK.to_string(), Value::from(2));
        assert_eq!(record.chunk_ordinal(), Some(2));
    }

    #[test]
    fn test_record_from_chunk() {
        let chunk = Chunk {
            id: "pdfs_menu_0".to_string(),
            index: 0,
            text: "Stir with ice.".to_string(),
            token_estimate: 3,
            filename: "menu.pdf".to_string(),
            path: "pdfs/menu.pdf".to_string(),
        };
        let record = IndexedRecord::from_chunk(&chunk, "abc", None);
        assert_eq!(record.source(), Some("menu.pdf"));
        assert_eq!(record.chunk_ordinal(), Some(0));
        assert!(!record.metadata.contains_key(META_URL));
    }
}
