//! Embedded persistent store on sled.

use std::collections::BTreeMap;

use parking_lot::Mutex;
use sled::{Db, IVec, Tree};

use super::backend::{format_number, parse_float, parse_integer, MetricStore};
use super::StorageConfig;
use crate::error::Error;

/// Tree name for record fields.
const FIELDS_TREE: &str = "fields";

/// Tree name for set members.
const SETS_TREE: &str = "sets";

/// Separator between a record key and a field name (or a set and a member).
const SEPARATOR: u8 = 0;

#[derive(Clone)]
struct Trees {
    db: Db,
    fields: Tree,
    sets: Tree,
}

impl Trees {
    fn open(config: &StorageConfig) -> Result<Self, Error> {
        let db = config.to_sled_config().open()?;
        let fields = db.open_tree(FIELDS_TREE)?;
        let sets = db.open_tree(SETS_TREE)?;

        tracing::info!(
            path = %config.path.display(),
            temporary = config.temporary,
            recovered = db.was_recovered(),
            "opened metric store"
        );

        Ok(Self { db, fields, sets })
    }
}

/// Store persisting records and sets in a sled database.
///
/// Each record field is one tree entry keyed `[key][0x00][field]`, each set
/// member one entry keyed `[set][0x00][member]`. Numeric updates run as a
/// compare-and-swap loop on the single entry, so concurrent writers, even
/// across threads sharing the database, never lose an increment.
///
/// The database is opened on the first operation and the handle is kept for
/// the lifetime of the store.
pub struct SledStore {
    config: StorageConfig,
    trees: Mutex<Option<Trees>>,
}

impl SledStore {
    /// Create a store that opens the configured database on first use.
    pub fn new(config: StorageConfig) -> Self {
        Self {
            config,
            trees: Mutex::new(None),
        }
    }

    /// Create a store and open the database immediately.
    pub fn open(config: StorageConfig) -> Result<Self, Error> {
        let store = Self::new(config);
        store.trees()?;
        Ok(store)
    }

    /// The configuration this store was built from.
    pub fn config(&self) -> &StorageConfig {
        &self.config
    }

    /// Whether the database has been opened yet.
    pub fn is_open(&self) -> bool {
        self.trees.lock().is_some()
    }

    /// Get database size in bytes.
    pub fn size_on_disk(&self) -> Result<u64, Error> {
        Ok(self.trees()?.db.size_on_disk()?)
    }

    fn trees(&self) -> Result<Trees, Error> {
        let mut guard = self.trees.lock();
        if let Some(trees) = guard.as_ref() {
            return Ok(trees.clone());
        }
        let trees = Trees::open(&self.config)?;
        *guard = Some(trees.clone());
        Ok(trees)
    }

    /// Atomically replace one field with a value derived from its current value.
    fn update_field<T, F>(&self, key: &str, field: &str, mut apply: F) -> Result<T, Error>
    where
        F: FnMut(Option<&str>) -> Result<(String, T), Error>,
    {
        let trees = self.trees()?;
        let entry = entry_key(key, field);
        let mut current = trees.fields.get(&entry)?;

        loop {
            let raw = current.as_ref().map(|bytes| decode_text(key, field, bytes)).transpose()?;
            let (next, output) = apply(raw)?;

            match trees
                .fields
                .compare_and_swap(&entry, current.as_ref(), Some(next.into_bytes()))?
            {
                Ok(()) => return Ok(output),
                Err(conflict) => current = conflict.current,
            }
        }
    }
}

impl std::fmt::Debug for SledStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SledStore")
            .field("path", &self.config.path)
            .field("temporary", &self.config.temporary)
            .field("open", &self.is_open())
            .finish()
    }
}

impl MetricStore for SledStore {
    fn increment_integer(&self, key: &str, field: &str, delta: i64) -> Result<i64, Error> {
        self.update_field(key, field, |raw| {
            let current = match raw {
                Some(raw) => parse_integer(key, field, raw)?,
                None => 0,
            };
            let next = current
                .checked_add(delta)
                .ok_or_else(|| Error::InvalidValue(format!("increment of {} overflows", field)))?;
            Ok((next.to_string(), next))
        })
    }

    fn increment_float(&self, key: &str, field: &str, delta: f64) -> Result<f64, Error> {
        self.update_field(key, field, |raw| {
            let current = match raw {
                Some(raw) => parse_float(key, field, raw)?,
                None => 0.0,
            };
            let next = current + delta;
            if next.is_nan() {
                return Err(Error::InvalidValue(format!(
                    "increment of {} produces NaN",
                    field
                )));
            }
            Ok((format_number(next), next))
        })
    }

    fn set_field(&self, key: &str, field: &str, value: &str) -> Result<bool, Error> {
        let trees = self.trees()?;
        let previous = trees.fields.insert(entry_key(key, field), value.as_bytes())?;
        Ok(previous.is_none())
    }

    fn read_fields(&self, key: &str) -> Result<BTreeMap<String, String>, Error> {
        let trees = self.trees()?;
        let prefix = entry_prefix(key);
        let mut fields = BTreeMap::new();

        for result in trees.fields.scan_prefix(&prefix) {
            let (entry, value) = result?;
            let field = String::from_utf8_lossy(&entry[prefix.len()..]).into_owned();
            let value = decode_text(key, &field, &value)?.to_string();
            fields.insert(field, value);
        }

        Ok(fields)
    }

    fn add_member(&self, set: &str, member: &str) -> Result<bool, Error> {
        let trees = self.trees()?;
        let previous = trees.sets.insert(entry_key(set, member), &[][..])?;
        Ok(previous.is_none())
    }

    fn members(&self, set: &str) -> Result<Vec<String>, Error> {
        let trees = self.trees()?;
        let prefix = entry_prefix(set);

        trees
            .sets
            .scan_prefix(&prefix)
            .map(|result| -> Result<String, Error> {
                let (entry, _) = result?;
                Ok(String::from_utf8_lossy(&entry[prefix.len()..]).into_owned())
            })
            .collect()
    }

    fn remove_records_with_prefix(&self, prefix: &str) -> Result<usize, Error> {
        let trees = self.trees()?;
        remove_prefix(&trees.fields, prefix.as_bytes())
    }

    fn remove_set(&self, set: &str) -> Result<usize, Error> {
        let trees = self.trees()?;
        remove_prefix(&trees.sets, &entry_prefix(set))
    }

    fn flush(&self) -> Result<(), Error> {
        self.trees()?.db.flush()?;
        Ok(())
    }
}

/// Build the tree key for a record field or set member.
fn entry_key(key: &str, field: &str) -> Vec<u8> {
    let mut entry = entry_prefix(key);
    entry.extend_from_slice(field.as_bytes());
    entry
}

/// Prefix for scanning every field of a record (or member of a set).
fn entry_prefix(key: &str) -> Vec<u8> {
    let mut prefix = Vec::with_capacity(key.len() + 1);
    prefix.extend_from_slice(key.as_bytes());
    prefix.push(SEPARATOR);
    prefix
}

fn decode_text<'a>(key: &str, field: &str, bytes: &'a IVec) -> Result<&'a str, Error> {
    std::str::from_utf8(bytes).map_err(|e| Error::CorruptField {
        key: key.to_string(),
        field: field.to_string(),
        reason: e.to_string(),
    })
}

fn remove_prefix(tree: &Tree, prefix: &[u8]) -> Result<usize, Error> {
    let keys: Vec<IVec> = tree
        .scan_prefix(prefix)
        .keys()
        .collect::<Result<_, _>>()?;

    for key in &keys {
        tree.remove(key)?;
    }

    Ok(keys.len())
}
