//! In-process store backed by concurrent maps.

use std::collections::{BTreeMap, BTreeSet, HashMap};

use dashmap::DashMap;

use super::backend::{format_number, parse_float, parse_integer, MetricStore};
use crate::error::Error;

/// Store keeping every record and set in process memory.
///
/// Each record lives under one map entry, so the entry lock held by a
/// read-modify-write makes single-field operations atomic. Useful for tests
/// and for producers that share one process.
#[derive(Debug, Default)]
pub struct MemoryStore {
    records: DashMap<String, HashMap<String, String>>,
    sets: DashMap<String, BTreeSet<String>>,
}

impl MemoryStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of records currently held.
    pub fn record_count(&self) -> usize {
        self.records.len()
    }
}

impl MetricStore for MemoryStore {
    fn increment_integer(&self, key: &str, field: &str, delta: i64) -> Result<i64, Error> {
        let mut record = self.records.entry(key.to_string()).or_default();
        let current = match record.get(field) {
            Some(raw) => parse_integer(key, field, raw)?,
            None => 0,
        };
        let next = current
            .checked_add(delta)
            .ok_or_else(|| Error::InvalidValue(format!("increment of {} overflows", field)))?;
        record.insert(field.to_string(), next.to_string());
        Ok(next)
    }

    fn increment_float(&self, key: &str, field: &str, delta: f64) -> Result<f64, Error> {
        let mut record = self.records.entry(key.to_string()).or_default();
        let current = match record.get(field) {
            Some(raw) => parse_float(key, field, raw)?,
            None => 0.0,
        };
        let next = current + delta;
        if next.is_nan() {
            return Err(Error::InvalidValue(format!("increment of {} produces NaN", field)));
        }
        record.insert(field.to_string(), format_number(next));
        Ok(next)
    }

    fn set_field(&self, key: &str, field: &str, value: &str) -> Result<bool, Error> {
        let mut record = self.records.entry(key.to_string()).or_default();
        Ok(record
            .insert(field.to_string(), value.to_string())
            .is_none())
    }

    fn read_fields(&self, key: &str) -> Result<BTreeMap<String, String>, Error> {
        Ok(self
            .records
            .get(key)
            .map(|record| {
                record
                    .iter()
                    .map(|(field, value)| (field.clone(), value.clone()))
                    .collect()
            })
            .unwrap_or_default())
    }

    fn add_member(&self, set: &str, member: &str) -> Result<bool, Error> {
        Ok(self
            .sets
            .entry(set.to_string())
            .or_default()
            .insert(member.to_string()))
    }

    fn members(&self, set: &str) -> Result<Vec<String>, Error> {
        Ok(self
            .sets
            .get(set)
            .map(|members| members.iter().cloned().collect())
            .unwrap_or_default())
    }

    fn remove_records_with_prefix(&self, prefix: &str) -> Result<usize, Error> {
        let mut removed = 0;
        self.records.retain(|key, record| {
            if key.starts_with(prefix) {
                removed += record.len();
                false
            } else {
                true
            }
        });
        Ok(removed)
    }

    fn remove_set(&self, set: &str) -> Result<usize, Error> {
        Ok(self
            .sets
            .remove(set)
            .map(|(_, members)| members.len())
            .unwrap_or(0))
    }
}
