//! Field layout shared by every record in a store.

use crate::error::{Result, StoreError};
use crate::types::{Record, Timestamp};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

/// Column holding the creation time in timestamped schemas.
pub const CREATED_AT_COLUMN: &str = "CreatedAt";

/// Column holding the last update time in timestamped schemas.
pub const UPDATED_AT_COLUMN: &str = "UpdatedAt";

/// Ordered field names of a store. The first field is the key.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Schema {
    fields: Vec<String>,

    /// Append `CreatedAt`/`UpdatedAt` columns.
    #[serde(default)]
    timestamps: bool,

    /// Non-key fields consulted by `search`.
    #[serde(default)]
    searchable: Vec<String>,
}

impl Schema {
    /// Create a schema from field names. The first name is the key field and
    /// the second, if any, is searchable.
    pub fn new<I, S>(fields: I) -> Result<Self>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let fields: Vec<String> = fields.into_iter().map(Into::into).collect();
        let searchable = fields.iter().skip(1).take(1).cloned().collect();
        let schema = Self {
            fields,
            timestamps: false,
            searchable,
        };
        schema.validate()?;
        Ok(schema)
    }

    /// Employee file layout: `Code,Name,Salary` plus timestamps.
    pub fn employees() -> Self {
        Self {
            fields: vec!["Code".into(), "Name".into(), "Salary".into()],
            timestamps: true,
            searchable: vec!["Name".into()],
        }
    }

    /// Shop inventory layout: `name,buy_price,sell_price,stock`.
    pub fn inventory() -> Self {
        Self {
            fields: vec![
                "name".into(),
                "buy_price".into(),
                "sell_price".into(),
                "stock".into(),
            ],
            timestamps: false,
            searchable: Vec::new(),
        }
    }

    pub fn with_timestamps(mut self) -> Self {
        self.timestamps = true;
        self
    }

    /// Replace the searchable fields. Each must be a non-key field.
    pub fn with_searchable<I, S>(mut self, fields: I) -> Result<Self>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.searchable = fields.into_iter().map(Into::into).collect();
        self.validate()?;
        Ok(self)
    }

    /// Check structural consistency. Deserialized schemas bypass `new`, so
    /// the store calls this when it binds.
    pub fn validate(&self) -> Result<()> {
        if self.fields.is_empty() {
            return Err(StoreError::Schema("schema has no fields".into()));
        }

        let mut seen = HashSet::new();
        for field in &self.fields {
            if field.is_empty() {
                return Err(StoreError::Schema("field names cannot be empty".into()));
            }
            if field == CREATED_AT_COLUMN || field == UPDATED_AT_COLUMN {
                return Err(StoreError::Schema(format!(
                    "field name {field} is reserved for timestamps"
                )));
            }
            if !seen.insert(field.as_str()) {
                return Err(StoreError::Schema(format!("duplicate field {field}")));
            }
        }

        for field in &self.searchable {
            if !self.value_fields().contains(field) {
                return Err(StoreError::Schema(format!(
                    "searchable field {field} is not a non-key field"
                )));
            }
        }

        Ok(())
    }

    pub fn key_field(&self) -> &str {
        self.fields.first().map(String::as_str).unwrap_or("")
    }

    /// All field names, key first.
    pub fn fields(&self) -> &[String] {
        &self.fields
    }

    /// Non-key field names.
    pub fn value_fields(&self) -> &[String] {
        self.fields.get(1..).unwrap_or(&[])
    }

    pub fn has_timestamps(&self) -> bool {
        self.timestamps
    }

    pub fn searchable(&self) -> &[String] {
        &self.searchable
    }

    /// On-disk column names: fields followed by timestamp columns.
    pub fn columns(&self) -> Vec<&str> {
        let mut columns: Vec<&str> = self.fields.iter().map(String::as_str).collect();
        if self.timestamps {
            columns.push(CREATED_AT_COLUMN);
            columns.push(UPDATED_AT_COLUMN);
        }
        columns
    }

    pub fn column_count(&self) -> usize {
        self.fields.len() + if self.timestamps { 2 } else { 0 }
    }

    /// Build a record from caller-supplied values. Every non-key field must be
    /// given exactly once; the result is ordered by the schema.
    pub fn build_record<I, K, V>(&self, key: &str, values: I, now: Option<Timestamp>) -> Result<Record>
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        let mut given: Vec<(String, String)> = Vec::new();
        for (field, value) in values {
            let field = field.into();
            if !self.value_fields().contains(&field) {
                return Err(StoreError::Schema(format!("unknown field {field}")));
            }
            if given.iter().any(|(f, _)| *f == field) {
                return Err(StoreError::Schema(format!("field {field} given twice")));
            }
            given.push((field, value.into()));
        }

        let mut fields = Vec::with_capacity(self.value_fields().len());
        for name in self.value_fields() {
            let position = given
                .iter()
                .position(|(field, _)| field == name)
                .ok_or_else(|| StoreError::Schema(format!("missing field {name}")))?;
            fields.push(given.swap_remove(position));
        }

        let now = if self.timestamps { now } else { None };
        Ok(Record {
            key: key.to_string(),
            fields,
            created_at: now,
            updated_at: now,
        })
    }

    /// Convert one on-disk row (in column order) into a record. The error is
    /// a message; formats attach the location.
    pub fn record_from_row(&self, row: Vec<String>) -> std::result::Result<Record, String> {
        if row.len() != self.column_count() {
            return Err(format!(
                "expected {} fields, found {}",
                self.column_count(),
                row.len()
            ));
        }

        let mut values = row.into_iter();
        let key = values.next().unwrap_or_default();
        let fields = self
            .value_fields()
            .iter()
            .cloned()
            .zip(values.by_ref())
            .collect();

        let (created_at, updated_at) = if self.timestamps {
            let created = parse_timestamp(CREATED_AT_COLUMN, values.next())?;
            let updated = parse_timestamp(UPDATED_AT_COLUMN, values.next())?;
            (created, updated)
        } else {
            (None, None)
        };

        Ok(Record {
            key,
            fields,
            created_at,
            updated_at,
        })
    }

    /// Flatten a record into on-disk column order.
    pub fn record_to_row(&self, record: &Record) -> Vec<String> {
        let mut row = Vec::with_capacity(self.column_count());
        row.push(record.key.clone());
        for name in self.value_fields() {
            row.push(record.field(name).unwrap_or_default().to_string());
        }
        if self.timestamps {
            row.push(render_timestamp(record.created_at));
            row.push(render_timestamp(record.updated_at));
        }
        row
    }

    /// Case-insensitive substring match on the key and searchable fields.
    /// `query` must already be lowercase.
    pub fn matches(&self, record: &Record, query: &str) -> bool {
        if record.key.to_lowercase().contains(query) {
            return true;
        }
        self.searchable.iter().any(|name| {
            record
                .field(name)
                .is_some_and(|value| value.to_lowercase().contains(query))
        })
    }
}

fn parse_timestamp(column: &str, value: Option<String>) -> std::result::Result<Option<Timestamp>, String> {
    match value.as_deref() {
        None | Some("") => Ok(None),
        Some(raw) => Timestamp::parse(raw)
            .map(Some)
            .ok_or_else(|| format!("invalid timestamp {raw:?} in column {column}")),
    }
}

fn render_timestamp(ts: Option<Timestamp>) -> String {
    ts.map(|ts| ts.to_string()).unwrap_or_default()
}
