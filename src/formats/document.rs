//! Structured document: the whole store as one JSON array.

use super::RecordFormat;
use crate::error::{Result, StoreError};
use crate::schema::Schema;
use crate::types::Record;
use serde_json::{Map, Value};

/// Pretty-printed JSON array of `column -> string` objects.
#[derive(Clone, Copy, Debug, Default)]
pub struct StructuredDocument;

impl RecordFormat for StructuredDocument {
    fn name(&self) -> &'static str {
        "document"
    }

    fn initial_contents(&self, _schema: &Schema) -> String {
        "[]\n".to_string()
    }

    fn decode(&self, schema: &Schema, text: &str) -> Result<Vec<Record>> {
        let document: Value = serde_json::from_str(text).map_err(|e| StoreError::Parse {
            location: format!("line {}", e.line()),
            message: e.to_string(),
        })?;

        let entries = document.as_array().ok_or_else(|| StoreError::Parse {
            location: "document".into(),
            message: "expected a JSON array".into(),
        })?;

        let columns = schema.columns();
        entries
            .iter()
            .enumerate()
            .map(|(index, entry)| {
                let object = entry
                    .as_object()
                    .ok_or_else(|| StoreError::parse_entry(index, "expected an object"))?;

                if let Some(extra) = object.keys().find(|k| !columns.contains(&k.as_str())) {
                    return Err(StoreError::parse_entry(
                        index,
                        format!("unexpected field {extra}"),
                    ));
                }

                let row = columns
                    .iter()
                    .map(|column| match object.get(*column) {
                        Some(Value::String(value)) => Ok(value.clone()),
                        Some(_) => Err(StoreError::parse_entry(
                            index,
                            format!("field {column} is not a string"),
                        )),
                        None => Err(StoreError::parse_entry(
                            index,
                            format!("missing field {column}"),
                        )),
                    })
                    .collect::<Result<Vec<String>>>()?;

                schema
                    .record_from_row(row)
                    .map_err(|message| StoreError::parse_entry(index, message))
            })
            .collect()
    }

    fn encode(&self, schema: &Schema, records: &[Record]) -> Result<String> {
        let columns = schema.columns();
        let entries: Vec<Value> = records
            .iter()
            .map(|record| {
                let object: Map<String, Value> = columns
                    .iter()
                    .zip(schema.record_to_row(record))
                    .map(|(column, value)| (column.to_string(), Value::String(value)))
                    .collect();
                Value::Object(object)
            })
            .collect();

        let mut out = serde_json::to_string_pretty(&entries)?;
        out.push('\n');
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Timestamp;

    fn schema() -> Schema {
        Schema::employees()
    }

    fn record(code: &str, name: &str) -> Record {
        schema()
            .build_record(
                code,
                [("Name", name), ("Salary", "1000")],
                Timestamp::parse("2024-05-01 08:00:00"),
            )
            .unwrap()
    }

    #[test]
    fn test_encode_layout() {
        let text = StructuredDocument
            .encode(&schema(), &[record("E1", "Ana")])
            .unwrap();
        let expected = r#"[
  {
    "Code": "E1",
    "Name": "Ana",
    "Salary": "1000",
    "CreatedAt": "2024-05-01 08:00:00",
    "UpdatedAt": "2024-05-01 08:00:00"
  }
]
"#;
        assert_eq!(text, expected);
    }

    #[test]
    fn test_roundtrip_preserves_order() {
        let records = vec![record("E2", "Bob"), record("E1", "Ana")];
        let text = StructuredDocument.encode(&schema(), &records).unwrap();
        assert_eq!(StructuredDocument.decode(&schema(), &text).unwrap(), records);
    }

    #[test]
    fn test_empty_document() {
        let text = StructuredDocument.initial_contents(&schema());
        assert!(StructuredDocument.decode(&schema(), &text).unwrap().is_empty());
    }

    #[test]
    fn test_decode_errors() {
        let s = schema();
        assert!(matches!(
            StructuredDocument.decode(&s, "[{").unwrap_err(),
            StoreError::Parse { .. }
        ));
        assert!(matches!(
            StructuredDocument.decode(&s, "{}").unwrap_err(),
            StoreError::Parse { .. }
        ));

        let missing = r#"[{"Code": "E1", "Name": "Ana"}]"#;
        match StructuredDocument.decode(&s, missing).unwrap_err() {
            StoreError::Parse { location, message } => {
                assert_eq!(location, "entry 0");
                assert_eq!(message, "missing field Salary");
            }
            other => panic!("unexpected error: {other:?}"),
        }

        let extra = r#"[{"Code": "E1", "Name": "Ana", "Salary": "1", "CreatedAt": "", "UpdatedAt": "", "Age": "3"}]"#;
        assert!(StructuredDocument.decode(&s, extra).is_err());

        let number = r#"[{"Code": "E1", "Name": "Ana", "Salary": 1, "CreatedAt": "", "UpdatedAt": ""}]"#;
        assert!(StructuredDocument.decode(&s, number).is_err());
    }

    #[test]
    fn test_no_append_fast_path() {
        assert!(StructuredDocument
            .encode_append(&schema(), &record("E1", "Ana"))
            .is_none());
    }
}
