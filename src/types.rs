//! Core types for the record store.

use chrono::{Local, NaiveDate, NaiveDateTime, Timelike};
use serde::{Deserialize, Serialize};
use std::fmt;

/// On-disk rendering of timestamps.
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Local wall-clock time with second precision.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Timestamp(pub NaiveDateTime);

impl Timestamp {
    /// Current time, truncated to whole seconds so it survives a round trip
    /// through [`TIMESTAMP_FORMAT`].
    pub fn now() -> Self {
        let now = Local::now().naive_local();
        Timestamp(now.with_nanosecond(0).unwrap_or(now))
    }

    /// Parse from the on-disk format.
    pub fn parse(s: &str) -> Option<Self> {
        NaiveDateTime::parse_from_str(s, TIMESTAMP_FORMAT)
            .ok()
            .map(Timestamp)
    }

    /// Calendar date part.
    pub fn date(&self) -> NaiveDate {
        self.0.date()
    }
}

impl fmt::Debug for Timestamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Timestamp({})", self)
    }
}

impl fmt::Display for Timestamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.format(TIMESTAMP_FORMAT))
    }
}

/// A single record in the store.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Record {
    /// Unique key (value of the schema's first field).
    pub key: String,

    /// Non-key field values, in schema order.
    pub fields: Vec<(String, String)>,

    /// When the record was added (timestamped schemas only).
    pub created_at: Option<Timestamp>,

    /// When the record was last changed (timestamped schemas only).
    pub updated_at: Option<Timestamp>,
}

impl Record {
    /// Value of a non-key field.
    pub fn field(&self, name: &str) -> Option<&str> {
        self.fields
            .iter()
            .find(|(field, _)| field == name)
            .map(|(_, value)| value.as_str())
    }

    /// Replace the value of an existing field. Returns false if the record
    /// has no such field.
    pub(crate) fn set_field(&mut self, name: &str, value: &str) -> bool {
        match self.fields.iter_mut().find(|(field, _)| field == name) {
            Some((_, existing)) => {
                *existing = value.to_string();
                true
            }
            None => false,
        }
    }

    /// Compare key and fields, ignoring timestamps.
    pub fn same_content(&self, other: &Record) -> bool {
        self.key == other.key && self.fields == other.fields
    }
}

/// What an update does to one field.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum FieldUpdate {
    /// Leave the stored value alone.
    Keep,
    /// Replace the stored value (an empty string clears the field).
    Set(String),
}

/// Per-field instructions for [`Store::update`](crate::Store::update).
///
/// Fields the patch does not mention are kept. Setting a field to the empty
/// string clears it; use [`RecordPatch::non_empty`] for the "blank means
/// unchanged" convention of form-driven callers.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct RecordPatch {
    updates: Vec<(String, FieldUpdate)>,
}

impl RecordPatch {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set a field to a new value.
    pub fn set(mut self, field: impl Into<String>, value: impl Into<String>) -> Self {
        self.updates
            .push((field.into(), FieldUpdate::Set(value.into())));
        self
    }

    /// Explicitly keep a field.
    pub fn keep(mut self, field: impl Into<String>) -> Self {
        self.updates.push((field.into(), FieldUpdate::Keep));
        self
    }

    /// Build a patch where empty values mean "keep" and anything else is set.
    pub fn non_empty<I, K, V>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        pairs
            .into_iter()
            .fold(Self::new(), |patch, (field, value)| {
                let value = value.into();
                if value.is_empty() {
                    patch.keep(field)
                } else {
                    patch.set(field, value)
                }
            })
    }

    /// Instructions in the order they were added; later entries for the same
    /// field win.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &FieldUpdate)> {
        self.updates.iter().map(|(field, update)| (field.as_str(), update))
    }

    pub fn is_empty(&self) -> bool {
        self.updates.is_empty()
    }
}

/// Store statistics.
#[derive(Clone, Debug, Default)]
pub struct StoreStats {
    pub record_count: u64,
    pub size_bytes: u64,
}
