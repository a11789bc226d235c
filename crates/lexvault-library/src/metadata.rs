//! Document metadata model persisted as `metadata.json`.

use std::collections::BTreeMap;

use jiff::Timestamp;
use jiff::civil::Date;
use serde::{Deserialize, Serialize};
use strum::{AsRefStr, Display, EnumString};

/// Rendition format of a document's primary content.
#[derive(
    Debug,
    Clone,
    Copy,
    Default,
    PartialEq,
    Eq,
    Hash,
    Serialize,
    Deserialize,
    AsRefStr,
    Display,
    EnumString
)]
pub enum DocumentFormat {
    /// Whatever format the document was uploaded in.
    #[default]
    #[serde(rename = "")]
    #[strum(serialize = "")]
    Default,
    #[serde(rename = "pdf")]
    #[strum(serialize = "pdf")]
    Pdf,
    #[serde(rename = "docx")]
    #[strum(serialize = "docx")]
    Docx,
    #[serde(rename = "txt")]
    #[strum(serialize = "txt")]
    Text,
}

impl DocumentFormat {
    /// File extension used in content paths (empty for `Default`).
    pub fn extension(self) -> &'static str {
        match self {
            Self::Default => "",
            Self::Pdf => "pdf",
            Self::Docx => "docx",
            Self::Text => "txt",
        }
    }

    /// Guesses the format from a file name's extension.
    pub fn from_file_name(name: &str) -> Self {
        let extension = name.rsplit_once('.').map(|(_, ext)| ext.to_ascii_lowercase());
        match extension.as_deref() {
            Some("pdf") => Self::Pdf,
            Some("docx") => Self::Docx,
            Some("txt") => Self::Text,
            _ => Self::Default,
        }
    }
}

/// Metadata of a supporting artifact (thumbnail, extracted text, ...).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DocumentSupportingMetadata {
    pub doc_id: String,
    /// Key in the parent's `supportings` map.
    pub name: String,
    pub original_file_name: String,
    #[serde(default)]
    pub public_url: Option<String>,
    #[serde(default)]
    pub create_ts: f64,
    #[serde(default)]
    pub extra_data: BTreeMap<String, String>,
}

impl DocumentSupportingMetadata {
    pub fn new(
        doc_id: impl Into<String>,
        name: impl Into<String>,
        original_file_name: impl Into<String>,
    ) -> Self {
        Self {
            doc_id: doc_id.into(),
            name: name.into(),
            original_file_name: original_file_name.into(),
            public_url: None,
            create_ts: 0.0,
            extra_data: BTreeMap::new(),
        }
    }
}

/// Everything recorded about a cataloged document.
///
/// `id` and `create_ts` are assigned by
/// [`Library::add_document`](crate::Library::add_document) and never change.
/// `public_url` and `thumbnail_url` are only set by publishing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DocumentMetaData {
    #[serde(default)]
    pub id: String,
    pub title: String,
    /// Language code to translated title.
    #[serde(default)]
    pub translated_title: BTreeMap<String, String>,
    pub original_file_name: String,
    #[serde(default)]
    pub source: Option<String>,
    pub original_format: DocumentFormat,
    #[serde(default)]
    pub create_ts: f64,
    #[serde(default)]
    pub publish_date: Option<Date>,
    #[serde(default)]
    pub public_url: Option<String>,
    #[serde(default)]
    pub thumbnail_url: Option<String>,
    #[serde(default)]
    pub related_entity: Option<String>,
    #[serde(default)]
    pub related_entity_title: Option<String>,
    #[serde(default)]
    pub extra_data: BTreeMap<String, String>,
    #[serde(default)]
    pub supportings: BTreeMap<String, DocumentSupportingMetadata>,
}

impl DocumentMetaData {
    /// Creates metadata for a not yet added document.
    pub fn new(
        title: impl Into<String>,
        original_file_name: impl Into<String>,
        original_format: DocumentFormat,
    ) -> Self {
        Self {
            id: String::new(),
            title: title.into(),
            translated_title: BTreeMap::new(),
            original_file_name: original_file_name.into(),
            source: None,
            original_format,
            create_ts: 0.0,
            publish_date: None,
            public_url: None,
            thumbnail_url: None,
            related_entity: None,
            related_entity_title: None,
            extra_data: BTreeMap::new(),
            supportings: BTreeMap::new(),
        }
    }

    /// Looks up a domain-specific field.
    pub fn extra_data_value(&self, field: &str) -> Option<&str> {
        self.extra_data.get(field).map(String::as_str)
    }
}

/// One entry of a document's `sections.json`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DocumentSection {
    pub section_id: String,
    pub section_name: String,
    pub start_page: i64,
    pub metadata: DocumentMetaData,
}

/// Current time as fractional epoch seconds.
pub(crate) fn epoch_seconds() -> f64 {
    Timestamp::now().as_microsecond() as f64 / 1_000_000.0
}
