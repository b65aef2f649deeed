//! Backing file formats.
//!
//! A format turns the full record sequence into file contents and back.
//! The store owns all file I/O; formats only deal in strings.

mod delimited;
mod document;

pub use delimited::DelimitedText;
pub use document::StructuredDocument;

use crate::error::Result;
use crate::schema::Schema;
use crate::types::Record;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Encoding strategy for a backing file.
pub trait RecordFormat: Send + Sync {
    /// Short name for logs.
    fn name(&self) -> &'static str;

    /// Contents of a freshly initialized file holding no records.
    fn initial_contents(&self, schema: &Schema) -> String;

    /// Parse the whole file, preserving record order.
    fn decode(&self, schema: &Schema, text: &str) -> Result<Vec<Record>>;

    /// Serialize the whole store.
    fn encode(&self, schema: &Schema, records: &[Record]) -> Result<String>;

    /// Bytes to append for one new record, if the format can grow in place.
    fn encode_append(&self, _schema: &Schema, _record: &Record) -> Option<String> {
        None
    }

    /// Reject values the format cannot represent faithfully.
    fn validate_value(&self, _field: &str, _value: &str) -> Result<()> {
        Ok(())
    }
}

/// Format selection for [`StoreConfig`](crate::StoreConfig).
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum FormatKind {
    /// One line per record, fields joined by `delimiter`, no escaping.
    DelimitedText { delimiter: char, header: bool },

    /// Pretty-printed JSON array of objects.
    StructuredDocument,
}

impl Default for FormatKind {
    fn default() -> Self {
        FormatKind::csv()
    }
}

impl FormatKind {
    /// Comma-separated with a header line.
    pub fn csv() -> Self {
        FormatKind::DelimitedText {
            delimiter: ',',
            header: true,
        }
    }

    /// Pick a format from a file extension: `.json` is a structured document,
    /// anything else is comma-delimited text.
    pub fn from_path(path: &Path) -> Self {
        let is_json = path
            .extension()
            .and_then(|ext| ext.to_str())
            .is_some_and(|ext| ext.eq_ignore_ascii_case("json"));
        if is_json {
            FormatKind::StructuredDocument
        } else {
            FormatKind::csv()
        }
    }

    /// Instantiate the strategy.
    pub fn strategy(&self) -> Box<dyn RecordFormat> {
        match self {
            FormatKind::DelimitedText { delimiter, header } => {
                Box::new(DelimitedText::new(*delimiter, *header))
            }
            FormatKind::StructuredDocument => Box::new(StructuredDocument),
        }
    }
}
