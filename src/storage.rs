//! Document store for selfcontrol
//!
//! Each entity type lives in its own collection file inside the data
//! directory:
//!
//! ```text
//! ~/.selfcontrol/               # data directory
//!   selfcontrol.toml            # optional configuration
//!   tasks.json                  # Task collection
//!   tasks.json.lock             # lock guarding tasks.json
//!   timers.json                 # TaskTimer collection
//!   timers.json.lock
//! ```
//!
//! A collection file holds the id counter and the records in insertion
//! order. Ids come from `next_id`, which only grows, so an id is never handed
//! out twice even after its record is deleted.

use std::cmp::Ordering;
use std::fs;
use std::marker::PhantomData;
use std::path::{Path, PathBuf};

use serde::{de::DeserializeOwned, Deserialize, Serialize};
use serde_json::Value;

use crate::error::{EntityKind, Error, Result};
use crate::lock::{self, FileLock};

/// Schema tag written into every collection file
pub const STORE_SCHEMA_VERSION: &str = "selfcontrol.store.v1";

/// Name of the configuration file inside the data directory
pub const CONFIG_FILE: &str = "selfcontrol.toml";

/// A record type that can be kept in a [`Collection`]
pub trait Document: Serialize + DeserializeOwned + Clone {
    /// File stem of the collection (`tasks` -> `tasks.json`)
    const COLLECTION: &'static str;

    /// Reported in `NotFound` errors
    const KIND: EntityKind;

    fn id(&self) -> u64;

    fn set_id(&mut self, id: u64);

    /// Value that must be unique across the collection, if any
    fn unique_key(&self) -> Option<&str> {
        None
    }
}

fn first_id() -> u64 {
    1
}

fn default_schema_version() -> String {
    STORE_SCHEMA_VERSION.to_string()
}

/// In-memory contents of one collection file
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CollectionData<T> {
    #[serde(default = "default_schema_version")]
    pub schema_version: String,
    #[serde(default = "first_id")]
    next_id: u64,
    #[serde(default = "Vec::new")]
    records: Vec<T>,
    #[serde(skip)]
    dirty: bool,
}

impl<T> Default for CollectionData<T> {
    fn default() -> Self {
        Self {
            schema_version: default_schema_version(),
            next_id: first_id(),
            records: Vec::new(),
            dirty: false,
        }
    }
}

impl<T: Document> CollectionData<T> {
    pub fn iter(&self) -> impl Iterator<Item = &T> {
        self.records.iter()
    }

    pub fn get(&self, id: u64) -> Option<&T> {
        self.records.iter().find(|record| record.id() == id)
    }

    pub fn get_mut(&mut self, id: u64) -> Option<&mut T> {
        let record = self.records.iter_mut().find(|record| record.id() == id);
        if record.is_some() {
            self.dirty = true;
        }
        record
    }

    /// Insert a record, assigning it the next id
    pub fn insert(&mut self, mut record: T) -> Result<u64> {
        if let Some(key) = record.unique_key() {
            self.ensure_unique(key, None)?;
        }
        let id = self.next_id;
        record.set_id(id);
        self.records.push(record);
        self.next_id += 1;
        self.dirty = true;
        Ok(id)
    }

    /// Replace the record stored under `id`
    pub fn replace(&mut self, id: u64, mut record: T) -> Result<()> {
        let index = self.position(id)?;
        if let Some(key) = record.unique_key() {
            self.ensure_unique(key, Some(id))?;
        }
        record.set_id(id);
        self.records[index] = record;
        self.dirty = true;
        Ok(())
    }

    pub fn remove(&mut self, id: u64) -> Result<T> {
        let index = self.position(id)?;
        self.dirty = true;
        Ok(self.records.remove(index))
    }

    fn position(&self, id: u64) -> Result<usize> {
        self.records
            .iter()
            .position(|record| record.id() == id)
            .ok_or_else(|| Error::NotFound {
                kind: T::KIND,
                id: id.to_string(),
            })
    }

    fn ensure_unique(&self, key: &str, except: Option<u64>) -> Result<()> {
        let taken = self
            .records
            .iter()
            .filter(|record| Some(record.id()) != except)
            .any(|record| record.unique_key() == Some(key));
        if taken {
            return Err(Error::DuplicateName(key.to_string()));
        }
        Ok(())
    }
}

/// Handle to one collection file
#[derive(Debug, Clone)]
pub struct Collection<T> {
    path: PathBuf,
    lock_timeout_ms: u64,
    _marker: PhantomData<fn() -> T>,
}

impl<T: Document> Collection<T> {
    pub fn new(data_dir: &Path, lock_timeout_ms: u64) -> Self {
        Self {
            path: data_dir.join(format!("{}.json", T::COLLECTION)),
            lock_timeout_ms,
            _marker: PhantomData,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Read the current contents without taking the lock
    ///
    /// Writes go through an atomic rename, so an unlocked read always sees
    /// a complete file.
    pub fn load(&self) -> Result<CollectionData<T>> {
        if !self.path.exists() {
            return Ok(CollectionData::default());
        }
        let content = fs::read_to_string(&self.path)?;
        if content.trim().is_empty() {
            return Ok(CollectionData::default());
        }
        let data: CollectionData<T> = serde_json::from_str(&content)?;
        if data.schema_version != STORE_SCHEMA_VERSION {
            return Err(Error::OperationFailed(format!(
                "unsupported schema '{}' in {}",
                data.schema_version,
                self.path.display()
            )));
        }
        Ok(data)
    }

    /// Run a read-modify-write cycle under the collection lock
    ///
    /// The file is rewritten only when `f` succeeds and mutated something.
    pub fn transact<R, F>(&self, f: F) -> Result<R>
    where
        F: FnOnce(&mut CollectionData<T>) -> Result<R>,
    {
        let _lock = FileLock::acquire(lock::lock_path_for(&self.path), self.lock_timeout_ms)?;
        let mut data = self.load()?;
        let result = f(&mut data)?;
        if data.dirty {
            let json = serde_json::to_string_pretty(&data)?;
            lock::write_atomic(&self.path, json.as_bytes())?;
            tracing::debug!(
                collection = T::COLLECTION,
                records = data.records.len(),
                "collection written"
            );
        }
        Ok(result)
    }

    pub fn create(&self, record: T) -> Result<u64> {
        self.transact(|data| data.insert(record))
    }

    pub fn read(&self, id: u64) -> Result<T> {
        self.load()?.get(id).cloned().ok_or_else(|| Error::NotFound {
            kind: T::KIND,
            id: id.to_string(),
        })
    }

    pub fn update(&self, id: u64, record: T) -> Result<()> {
        self.transact(|data| data.replace(id, record))
    }

    pub fn delete(&self, id: u64) -> Result<()> {
        self.transact(|data| data.remove(id).map(|_| ()))
    }

    /// All records, in insertion order
    pub fn all(&self) -> Result<Vec<T>> {
        Ok(self.load()?.records)
    }

    /// Records whose serialized `field` equals `value`
    pub fn find(&self, field: &str, value: &Value) -> Result<Vec<T>> {
        let mut found = Vec::new();
        for record in self.load()?.records {
            if serde_json::to_value(&record)?.get(field) == Some(value) {
                found.push(record);
            }
        }
        Ok(found)
    }

    /// Records sorted by their serialized `field`; ties keep insertion order
    pub fn order_by(&self, field: &str) -> Result<Vec<T>> {
        let mut keyed = Vec::new();
        for record in self.load()?.records {
            let key = serde_json::to_value(&record)?
                .get(field)
                .cloned()
                .unwrap_or(Value::Null);
            keyed.push((key, record));
        }
        keyed.sort_by(|(left, _), (right, _)| compare_values(left, right));
        Ok(keyed.into_iter().map(|(_, record)| record).collect())
    }
}

fn value_rank(value: &Value) -> u8 {
    match value {
        Value::Null => 0,
        Value::Bool(_) => 1,
        Value::Number(_) => 2,
        Value::String(_) => 3,
        Value::Array(_) => 4,
        Value::Object(_) => 5,
    }
}

fn compare_values(left: &Value, right: &Value) -> Ordering {
    match (left, right) {
        (Value::Bool(a), Value::Bool(b)) => a.cmp(b),
        (Value::Number(a), Value::Number(b)) => match (a.as_i64(), b.as_i64()) {
            (Some(a), Some(b)) => a.cmp(&b),
            _ => a
                .as_f64()
                .partial_cmp(&b.as_f64())
                .unwrap_or(Ordering::Equal),
        },
        (Value::String(a), Value::String(b)) => a.cmp(b),
        (a, b) if value_rank(a) == value_rank(b) => a.to_string().cmp(&b.to_string()),
        (a, b) => value_rank(a).cmp(&value_rank(b)),
    }
}

/// Storage manager for a selfcontrol data directory
#[derive(Debug, Clone)]
pub struct Storage {
    data_dir: PathBuf,
    lock_timeout_ms: u64,
}

impl Storage {
    pub fn new(data_dir: PathBuf, lock_timeout_ms: u64) -> Self {
        Self {
            data_dir,
            lock_timeout_ms,
        }
    }

    /// Create the data directory if needed and return a handle to it
    pub fn open(data_dir: PathBuf, lock_timeout_ms: u64) -> Result<Self> {
        fs::create_dir_all(&data_dir)?;
        Ok(Self::new(data_dir, lock_timeout_ms))
    }

    pub fn data_dir(&self) -> &Path {
        &self.data_dir
    }

    pub fn is_initialized(&self) -> bool {
        self.data_dir.is_dir()
    }

    pub fn collection<T: Document>(&self) -> Collection<T> {
        Collection::new(&self.data_dir, self.lock_timeout_ms)
    }
}
