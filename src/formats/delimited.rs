//! Delimited text: an optional header line, then one line per record.

use super::RecordFormat;
use crate::error::{Result, StoreError};
use crate::schema::Schema;
use crate::types::Record;

/// Line-oriented format with a single-character delimiter.
///
/// Values are written verbatim. A value containing the delimiter or a line
/// break would shift columns on the next read, so such values are rejected
/// up front by [`RecordFormat::validate_value`].
#[derive(Clone, Debug)]
pub struct DelimitedText {
    delimiter: char,
    header: bool,
}

impl DelimitedText {
    pub fn new(delimiter: char, header: bool) -> Self {
        Self { delimiter, header }
    }

    pub fn csv() -> Self {
        Self::new(',', true)
    }

    pub fn headerless(delimiter: char) -> Self {
        Self::new(delimiter, false)
    }

    fn join(&self, values: &[String]) -> String {
        let mut line = values.join(&self.delimiter.to_string());
        line.push('\n');
        line
    }

    fn header_line(&self, schema: &Schema) -> String {
        let mut line = schema.columns().join(&self.delimiter.to_string());
        line.push('\n');
        line
    }
}

impl RecordFormat for DelimitedText {
    fn name(&self) -> &'static str {
        "delimited"
    }

    fn initial_contents(&self, schema: &Schema) -> String {
        if self.header {
            self.header_line(schema)
        } else {
            String::new()
        }
    }

    fn decode(&self, schema: &Schema, text: &str) -> Result<Vec<Record>> {
        let mut lines = text
            .lines()
            .enumerate()
            .map(|(index, line)| (index + 1, line.trim_end_matches('\r')))
            .filter(|(_, line)| !line.is_empty());

        if self.header {
            let expected = schema.columns();
            match lines.next() {
                Some((number, line)) => {
                    let found: Vec<&str> = line.split(self.delimiter).collect();
                    if found != expected {
                        return Err(StoreError::parse_line(
                            number,
                            format!("header {found:?} does not match schema {expected:?}"),
                        ));
                    }
                }
                None => return Err(StoreError::parse_line(1, "missing header line")),
            }
        }

        lines
            .map(|(number, line)| {
                let row = line.split(self.delimiter).map(str::to_string).collect();
                schema
                    .record_from_row(row)
                    .map_err(|message| StoreError::parse_line(number, message))
            })
            .collect()
    }

    fn encode(&self, schema: &Schema, records: &[Record]) -> Result<String> {
        let mut out = self.initial_contents(schema);
        for record in records {
            out.push_str(&self.join(&schema.record_to_row(record)));
        }
        Ok(out)
    }

    fn encode_append(&self, schema: &Schema, record: &Record) -> Option<String> {
        Some(self.join(&schema.record_to_row(record)))
    }

    fn validate_value(&self, field: &str, value: &str) -> Result<()> {
        if value.contains(self.delimiter) || value.contains(['\n', '\r']) {
            return Err(StoreError::UnencodableValue {
                field: field.to_string(),
                value: value.to_string(),
            });
        }
        Ok(())
    }
}
