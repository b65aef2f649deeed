//! The record store: one backing file, fully re-read on every operation.

use crate::error::{Result, StoreError};
use crate::formats::{FormatKind, RecordFormat};
use crate::schema::Schema;
use crate::subscriptions::{
    StoreEvent, SubscriptionConfig, SubscriptionHandle, SubscriptionId, SubscriptionManager,
};
use crate::types::{FieldUpdate, Record, RecordPatch, StoreStats, Timestamp};
use fs2::FileExt;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::ffi::OsString;
use std::fs::{self, File, OpenOptions};
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// Store configuration.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    /// Backing file.
    pub path: PathBuf,

    /// Field layout.
    pub schema: Schema,

    /// Encoding of the backing file.
    pub format: FormatKind,

    /// Whether to create the file if it doesn't exist.
    pub create_if_missing: bool,

    /// Hold an exclusive advisory lock on `<path>.lock` while open.
    pub lock: bool,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            path: PathBuf::from("./employees.csv"),
            schema: Schema::employees(),
            format: FormatKind::csv(),
            create_if_missing: true,
            lock: true,
        }
    }
}

impl StoreConfig {
    /// Config for `path` with the format chosen from its extension.
    pub fn new(path: impl Into<PathBuf>, schema: Schema) -> Self {
        let path = path.into();
        Self {
            format: FormatKind::from_path(&path),
            path,
            schema,
            ..Default::default()
        }
    }

    /// Employee records (`Code,Name,Salary` plus timestamps).
    pub fn employees(path: impl Into<PathBuf>) -> Self {
        Self::new(path, Schema::employees())
    }

    /// Shop inventory (`name,buy_price,sell_price,stock`).
    pub fn inventory(path: impl Into<PathBuf>) -> Self {
        Self::new(path, Schema::inventory())
    }

    pub fn with_format(mut self, format: FormatKind) -> Self {
        self.format = format;
        self
    }
}

/// A uniquely keyed record collection persisted in a single flat file.
///
/// Every operation reads the whole file; every mutation writes it back
/// before returning, so the file is the only source of truth. `add` on a
/// delimited file appends one line; other mutations rewrite the file through
/// a temporary sibling and an atomic rename.
pub struct Store {
    /// Store configuration.
    config: StoreConfig,

    /// Encoding strategy.
    format: Box<dyn RecordFormat>,

    /// Lock file for exclusive access.
    _lock_file: Option<File>,

    /// Change notifications.
    subscriptions: SubscriptionManager,

    /// Serializes read-modify-write sequences.
    write_lock: Mutex<()>,
}

impl Store {
    /// Open an existing store or create a new one.
    pub fn open_or_create(config: StoreConfig) -> Result<Self> {
        if config.path.exists() {
            Self::open(config)
        } else if config.create_if_missing {
            Self::create(config)
        } else {
            Err(StoreError::NotInitialized(config.path))
        }
    }

    /// Initialize the backing file if absent and bind to it. An existing
    /// file is left untouched.
    pub fn create(config: StoreConfig) -> Result<Self> {
        config.schema.validate()?;
        let format = config.format.strategy();
        check_columns(&config.schema, format.as_ref())?;

        if let Some(parent) = config.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }

        let lock_file = Self::acquire_lock(&config)?;

        if !config.path.exists() {
            let contents = format.initial_contents(&config.schema);
            write_atomic(&config.path, &contents)?;
            info!(path = ?config.path, format = format.name(), "initialized store");
        }

        Ok(Self::assemble(config, format, lock_file))
    }

    /// Bind to an existing backing file.
    pub fn open(config: StoreConfig) -> Result<Self> {
        config.schema.validate()?;
        let format = config.format.strategy();
        check_columns(&config.schema, format.as_ref())?;

        if !config.path.exists() {
            return Err(StoreError::NotInitialized(config.path));
        }

        let lock_file = Self::acquire_lock(&config)?;
        info!(path = ?config.path, format = format.name(), "opened store");

        Ok(Self::assemble(config, format, lock_file))
    }

    fn assemble(config: StoreConfig, format: Box<dyn RecordFormat>, lock_file: Option<File>) -> Self {
        Self {
            config,
            format,
            _lock_file: lock_file,
            subscriptions: SubscriptionManager::new(),
            write_lock: Mutex::new(()),
        }
    }

    // --- Reads ---

    /// Every record, in file order.
    pub fn list_all(&self) -> Result<Vec<Record>> {
        Ok(self.load()?.1)
    }

    /// Whether a record with `key` exists.
    pub fn exists(&self, key: &str) -> Result<bool> {
        Ok(self.list_all()?.iter().any(|r| r.key == key))
    }

    /// Look up a record by key.
    pub fn get(&self, key: &str) -> Result<Option<Record>> {
        Ok(self.list_all()?.into_iter().find(|r| r.key == key))
    }

    /// Records whose key or searchable fields contain `query`, ignoring case.
    pub fn search(&self, query: &str) -> Result<Vec<Record>> {
        let query = query.to_lowercase();
        let schema = &self.config.schema;
        let matches: Vec<Record> = self
            .list_all()?
            .into_iter()
            .filter(|r| schema.matches(r, &query))
            .collect();
        debug!(query = %query, matches = matches.len(), "search");
        Ok(matches)
    }

    // --- Mutations ---

    /// Add a record. Returns false, writing nothing, if `key` is taken.
    ///
    /// `fields` must name every non-key field of the schema exactly once.
    pub fn add<I, K, V>(&self, key: &str, fields: I) -> Result<bool>
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        let now = self.config.schema.has_timestamps().then(Timestamp::now);
        let record = self.config.schema.build_record(key, fields, now)?;
        self.validate_record(&record)?;

        let _lock = self.write_lock.lock();
        let (text, mut records) = self.load()?;

        if records.iter().any(|r| r.key == key) {
            debug!(key = %key, "add rejected: duplicate key");
            return Ok(false);
        }

        match self.format.encode_append(&self.config.schema, &record) {
            Some(line) => {
                let needs_newline = !text.is_empty() && !text.ends_with('\n');
                self.append(&line, needs_newline)?;
            }
            None => {
                records.push(record);
                self.rewrite(&records)?;
            }
        }

        debug!(key = %key, "added record");
        self.subscriptions.broadcast(StoreEvent::Added {
            key: key.to_string(),
        });
        Ok(true)
    }

    /// Apply `patch` to the record with `key` and rewrite the file.
    /// Returns false, writing nothing, if no record matches.
    pub fn update(&self, key: &str, patch: &RecordPatch) -> Result<bool> {
        self.validate_patch(patch)?;
        let updated = self.modify(key, |_| Ok((Some(patch.clone()), ())))?;
        Ok(updated.is_some())
    }

    /// Read-modify-write of one record under the write lock. `decide` sees
    /// the stored record and returns the patch to apply, or `None` to leave
    /// the file alone, plus a value handed back to the caller. Returns
    /// `None` if no record has `key`.
    pub(crate) fn modify<T, F>(&self, key: &str, decide: F) -> Result<Option<T>>
    where
        F: FnOnce(&Record) -> Result<(Option<RecordPatch>, T)>,
    {
        let _lock = self.write_lock.lock();
        let (_, mut records) = self.load()?;

        let Some(record) = records.iter_mut().find(|r| r.key == key) else {
            debug!(key = %key, "update: no such record");
            return Ok(None);
        };

        let (patch, value) = decide(record)?;
        let Some(patch) = patch else {
            return Ok(Some(value));
        };
        self.validate_patch(&patch)?;

        for (field, update) in patch.iter() {
            if let FieldUpdate::Set(new_value) = update {
                record.set_field(field, new_value);
            }
        }
        if self.config.schema.has_timestamps() {
            record.updated_at = Some(Timestamp::now());
        }

        self.rewrite(&records)?;

        debug!(key = %key, "updated record");
        self.subscriptions.broadcast(StoreEvent::Updated {
            key: key.to_string(),
        });
        Ok(Some(value))
    }

    /// Remove every record with `key`. Returns false, writing nothing, if
    /// none matched.
    pub fn delete(&self, key: &str) -> Result<bool> {
        let _lock = self.write_lock.lock();
        let (_, mut records) = self.load()?;

        let before = records.len();
        records.retain(|r| r.key != key);
        if records.len() == before {
            debug!(key = %key, "delete: no such record");
            return Ok(false);
        }

        self.rewrite(&records)?;

        debug!(key = %key, removed = before - records.len(), "deleted record");
        self.subscriptions.broadcast(StoreEvent::Deleted {
            key: key.to_string(),
        });
        Ok(true)
    }

    // --- Subscriptions ---

    /// Receive an event after each successful mutation.
    pub fn subscribe(&self, config: SubscriptionConfig) -> SubscriptionHandle {
        self.subscriptions.subscribe(config)
    }

    pub fn unsubscribe(&self, id: SubscriptionId) {
        self.subscriptions.unsubscribe(id);
    }

    // --- Store Operations ---

    /// Get store statistics.
    pub fn stats(&self) -> Result<StoreStats> {
        Ok(StoreStats {
            record_count: self.list_all()?.len() as u64,
            size_bytes: fs::metadata(&self.config.path)?.len(),
        })
    }

    /// Get the backing file path.
    pub fn path(&self) -> &Path {
        &self.config.path
    }

    pub fn schema(&self) -> &Schema {
        &self.config.schema
    }

    pub fn config(&self) -> &StoreConfig {
        &self.config
    }

    // --- Private Helpers ---

    /// Read and decode the backing file, returning the raw text as well.
    fn load(&self) -> Result<(String, Vec<Record>)> {
        let text = fs::read_to_string(&self.config.path)?;
        match self.format.decode(&self.config.schema, &text) {
            Ok(records) => Ok((text, records)),
            Err(e) => {
                warn!(path = ?self.config.path, error = %e, "failed to parse backing file");
                Err(e)
            }
        }
    }

    fn rewrite(&self, records: &[Record]) -> Result<()> {
        let contents = self.format.encode(&self.config.schema, records)?;
        write_atomic(&self.config.path, &contents)
    }

    fn append(&self, line: &str, needs_newline: bool) -> Result<()> {
        let mut file = OpenOptions::new().append(true).open(&self.config.path)?;
        if needs_newline {
            file.write_all(b"\n")?;
        }
        file.write_all(line.as_bytes())?;
        file.sync_all()?;
        Ok(())
    }

    fn validate_record(&self, record: &Record) -> Result<()> {
        let key_field = self.config.schema.key_field();
        if record.key.is_empty() {
            return Err(StoreError::InvalidValue {
                field: key_field.to_string(),
                value: String::new(),
            });
        }
        self.format.validate_value(key_field, &record.key)?;
        for (field, value) in &record.fields {
            self.format.validate_value(field, value)?;
        }
        Ok(())
    }

    fn validate_patch(&self, patch: &RecordPatch) -> Result<()> {
        let schema = &self.config.schema;
        for (field, update) in patch.iter() {
            if field == schema.key_field() {
                return Err(StoreError::Schema(format!(
                    "key field {field} cannot be updated"
                )));
            }
            if !schema.value_fields().iter().any(|f| f == field) {
                return Err(StoreError::Schema(format!("unknown field {field}")));
            }
            if let FieldUpdate::Set(value) = update {
                self.format.validate_value(field, value)?;
            }
        }
        Ok(())
    }

    fn acquire_lock(config: &StoreConfig) -> Result<Option<File>> {
        if !config.lock {
            return Ok(None);
        }

        let lock_path = sibling_path(&config.path, "", ".lock")?;
        let lock_file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(lock_path)?;

        lock_file
            .try_lock_exclusive()
            .map_err(|_| StoreError::Locked)?;

        Ok(Some(lock_file))
    }
}

/// Column names end up in the file too, so they must survive the format.
fn check_columns(schema: &Schema, format: &dyn RecordFormat) -> Result<()> {
    for column in schema.columns() {
        if format.validate_value(column, column).is_err() {
            return Err(StoreError::Schema(format!(
                "field name {column:?} cannot be stored in the {} format",
                format.name()
            )));
        }
    }
    Ok(())
}

/// `dir/<prefix><file name><suffix>` next to `path`.
fn sibling_path(path: &Path, prefix: &str, suffix: &str) -> Result<PathBuf> {
    let name = path.file_name().ok_or_else(|| {
        StoreError::Io(std::io::Error::new(
            ErrorKind::InvalidInput,
            format!("not a file path: {}", path.display()),
        ))
    })?;
    let mut sibling = OsString::from(prefix);
    sibling.push(name);
    sibling.push(suffix);
    Ok(path.with_file_name(sibling))
}

/// Write through a synced temporary sibling, then rename over `path`.
fn write_atomic(path: &Path, contents: &str) -> Result<()> {
    let tmp_path = sibling_path(path, ".", ".tmp")?;

    let result = (|| -> Result<()> {
        let mut file = File::create(&tmp_path)?;
        file.write_all(contents.as_bytes())?;
        file.sync_all()?;
        fs::rename(&tmp_path, path)?;
        Ok(())
    })();

    if result.is_err() {
        let _ = fs::remove_file(&tmp_path);
    }
    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn test_config(dir: &TempDir) -> StoreConfig {
        StoreConfig::new(
            dir.path().join("staff.csv"),
            Schema::new(["code", "name", "salary"]).unwrap(),
        )
    }

    #[test]
    fn test_create_writes_header() {
        let dir = TempDir::new().unwrap();
        let store = Store::create(test_config(&dir)).unwrap();

        let text = fs::read_to_string(store.path()).unwrap();
        assert_eq!(text, "code,name,salary\n");
        assert!(store.list_all().unwrap().is_empty());
    }

    #[test]
    fn test_create_leaves_existing_file() {
        let dir = TempDir::new().unwrap();
        let config = test_config(&dir);
        fs::write(&config.path, "code,name,salary\nE1,Ana,1000\n").unwrap();

        let store = Store::create(config).unwrap();
        assert_eq!(store.list_all().unwrap().len(), 1);
    }

    #[test]
    fn test_create_makes_parent_dirs() {
        let dir = TempDir::new().unwrap();
        let mut config = test_config(&dir);
        config.path = dir.path().join("nested/deeper/staff.csv");

        let store = Store::create(config).unwrap();
        assert!(store.path().exists());
    }

    #[test]
    fn test_field_name_with_delimiter_rejected() {
        let dir = TempDir::new().unwrap();
        let config = StoreConfig::new(
            dir.path().join("staff.csv"),
            Schema::new(["code", "first,last"]).unwrap(),
        );

        let result = Store::create(config.clone());
        assert!(matches!(result, Err(StoreError::Schema(_))));
        assert!(!config.path.exists());

        fs::write(&config.path, "code\n").unwrap();
        assert!(matches!(Store::open(config), Err(StoreError::Schema(_))));

        // The same names are fine in a document.
        let config = StoreConfig::new(
            dir.path().join("staff.json"),
            Schema::new(["code", "first,last"]).unwrap(),
        );
        let store = Store::create(config).unwrap();
        assert!(store.add("E1", [("first,last", "Ana Lima")]).unwrap());
        assert_eq!(store.list_all().unwrap().len(), 1);
    }

    #[test]
    fn test_add_appends_line() {
        let dir = TempDir::new().unwrap();
        let store = Store::create(test_config(&dir)).unwrap();

        assert!(store.add("E1", [("name", "Ana"), ("salary", "1000")]).unwrap());
        let text = fs::read_to_string(store.path()).unwrap();
        assert_eq!(text, "code,name,salary\nE1,Ana,1000\n");
    }

    #[test]
    fn test_add_after_missing_trailing_newline() {
        let dir = TempDir::new().unwrap();
        let config = test_config(&dir);
        fs::write(&config.path, "code,name,salary\nE1,Ana,1000").unwrap();

        let store = Store::create(config).unwrap();
        assert!(store.add("E2", [("name", "Bob"), ("salary", "2000")]).unwrap());
        assert_eq!(store.list_all().unwrap().len(), 2);
    }

    #[test]
    fn test_update_rewrites() {
        let dir = TempDir::new().unwrap();
        let store = Store::create(test_config(&dir)).unwrap();
        store.add("E1", [("name", "Ana"), ("salary", "1000")]).unwrap();
        store.add("E2", [("name", "Bob"), ("salary", "2000")]).unwrap();

        let patch = RecordPatch::new().set("salary", "1500");
        assert!(store.update("E1", &patch).unwrap());

        let text = fs::read_to_string(store.path()).unwrap();
        assert_eq!(text, "code,name,salary\nE1,Ana,1500\nE2,Bob,2000\n");
    }

    #[test]
    fn test_update_can_clear_field() {
        let dir = TempDir::new().unwrap();
        let store = Store::create(test_config(&dir)).unwrap();
        store.add("E1", [("name", "Ana"), ("salary", "1000")]).unwrap();

        assert!(store.update("E1", &RecordPatch::new().set("salary", "")).unwrap());
        let record = store.get("E1").unwrap().unwrap();
        assert_eq!(record.field("salary"), Some(""));
    }

    #[test]
    fn test_update_rejects_key_and_unknown_fields() {
        let dir = TempDir::new().unwrap();
        let store = Store::create(test_config(&dir)).unwrap();
        store.add("E1", [("name", "Ana"), ("salary", "1000")]).unwrap();

        let result = store.update("E1", &RecordPatch::new().set("code", "E9"));
        assert!(matches!(result, Err(StoreError::Schema(_))));

        let result = store.update("E1", &RecordPatch::new().set("age", "30"));
        assert!(matches!(result, Err(StoreError::Schema(_))));
    }

    #[test]
    fn test_delete_is_a_filter() {
        let dir = TempDir::new().unwrap();
        let config = test_config(&dir);
        // Hand-edited file with a duplicated key.
        fs::write(
            &config.path,
            "code,name,salary\nE1,Ana,1000\nE2,Bob,2000\nE1,Ana,1000\n",
        )
        .unwrap();

        let store = Store::create(config).unwrap();
        assert!(store.delete("E1").unwrap());

        let keys: Vec<String> = store.list_all().unwrap().into_iter().map(|r| r.key).collect();
        assert_eq!(keys, vec!["E2"]);
    }

    #[test]
    fn test_no_temp_file_left_behind() {
        let dir = TempDir::new().unwrap();
        let store = Store::create(test_config(&dir)).unwrap();
        store.add("E1", [("name", "Ana"), ("salary", "1000")]).unwrap();
        store.delete("E1").unwrap();

        assert!(!dir.path().join(".staff.csv.tmp").exists());
    }

    #[test]
    fn test_store_lock() {
        let dir = TempDir::new().unwrap();
        let _store = Store::create(test_config(&dir)).unwrap();

        let result = Store::open(test_config(&dir));
        assert!(matches!(result, Err(StoreError::Locked)));
    }

    #[test]
    fn test_lock_released_on_drop() {
        let dir = TempDir::new().unwrap();
        let store = Store::create(test_config(&dir)).unwrap();
        drop(store);

        assert!(Store::open(test_config(&dir)).is_ok());
    }

    #[test]
    fn test_unlocked_stores_share_file() {
        let dir = TempDir::new().unwrap();
        let mut config = test_config(&dir);
        config.lock = false;

        let a = Store::create(config.clone()).unwrap();
        let b = Store::open(config).unwrap();

        a.add("E1", [("name", "Ana"), ("salary", "1000")]).unwrap();
        // No cached state: b sees a's write immediately.
        assert!(b.exists("E1").unwrap());
    }

    #[test]
    fn test_stats() {
        let dir = TempDir::new().unwrap();
        let store = Store::create(test_config(&dir)).unwrap();
        store.add("E1", [("name", "Ana"), ("salary", "1000")]).unwrap();

        let stats = store.stats().unwrap();
        assert_eq!(stats.record_count, 1);
        assert_eq!(stats.size_bytes, "code,name,salary\nE1,Ana,1000\n".len() as u64);
    }

    #[test]
    fn test_sibling_path() {
        let path = Path::new("/data/staff.csv");
        assert_eq!(
            sibling_path(path, ".", ".tmp").unwrap(),
            PathBuf::from("/data/.staff.csv.tmp")
        );
        assert_eq!(
            sibling_path(path, "", ".lock").unwrap(),
            PathBuf::from("/data/staff.csv.lock")
        );
        assert!(sibling_path(Path::new("/"), "", ".lock").is_err());
    }
}
