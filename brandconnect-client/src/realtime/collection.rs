//! Synced Collection - the in-memory mirror
//!
//! Holds at most one record per `id`. Order is arrival order; updates replace
//! in place.

use super::types::Record;
use std::collections::HashSet;
use tracing::warn;

#[derive(Debug, Clone)]
pub struct SyncedCollection<T> {
    records: Vec<T>,
    /// Ids whose current value came from an optimistic edit
    optimistic: HashSet<String>,
}

impl<T: Record> SyncedCollection<T> {
    pub fn new() -> Self {
        Self {
            records: Vec::new(),
            optimistic: HashSet::new(),
        }
    }

    /// Build from a query result, keeping the first record for each id
    pub fn from_records(records: Vec<T>) -> Self {
        let mut collection = Self::new();
        collection.replace_all(records);
        collection
    }

    pub fn records(&self) -> &[T] {
        &self.records
    }

    pub fn to_vec(&self) -> Vec<T> {
        self.records.clone()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn get(&self, id: &str) -> Option<&T> {
        self.records.iter().find(|record| record.id() == id)
    }

    pub fn contains(&self, id: &str) -> bool {
        self.position(id).is_some()
    }

    pub fn is_optimistic(&self, id: &str) -> bool {
        self.optimistic.contains(id)
    }

    fn position(&self, id: &str) -> Option<usize> {
        self.records.iter().position(|record| record.id() == id)
    }

    /// Authoritative reset; drops every optimistic edit
    pub fn replace_all(&mut self, records: Vec<T>) {
        let mut seen = HashSet::with_capacity(records.len());
        self.records = records
            .into_iter()
            .filter(|record| seen.insert(record.id().to_string()))
            .collect();
        self.optimistic.clear();
    }

    /// INSERT event. A confirmed record with the same id wins over the event;
    /// an optimistic placeholder is replaced in place. Returns whether the
    /// mirror changed.
    pub fn apply_insert(&mut self, record: T) -> bool {
        match self.position(record.id()) {
            Some(index) if self.optimistic.remove(record.id()) => {
                self.records[index] = record;
                true
            }
            Some(_) => false,
            None => {
                self.records.push(record);
                true
            }
        }
    }

    /// UPDATE event; dropped when the id is unknown
    pub fn apply_update(&mut self, record: T) -> bool {
        match self.position(record.id()) {
            Some(index) => {
                self.optimistic.remove(record.id());
                self.records[index] = record;
                true
            }
            None => false,
        }
    }

    /// DELETE event; returns the removed record
    pub fn apply_delete(&mut self, id: &str) -> Option<T> {
        let index = self.position(id)?;
        self.optimistic.remove(id);
        Some(self.records.remove(index))
    }

    /// Optimistic add. An existing record with the same id is replaced in
    /// place so the mirror never holds duplicates.
    pub fn add_optimistic(&mut self, record: T) {
        self.optimistic.insert(record.id().to_string());
        match self.position(record.id()) {
            Some(index) => self.records[index] = record,
            None => self.records.push(record),
        }
    }

    /// Optimistic in-place edit. The edit must not change the record's id;
    /// if it does, it is reverted. Returns whether a record was edited.
    pub fn update_optimistic<F>(&mut self, id: &str, patch: F) -> bool
    where
        F: FnOnce(&mut T),
    {
        let Some(index) = self.position(id) else {
            return false;
        };

        let original = self.records[index].clone();
        patch(&mut self.records[index]);
        if self.records[index].id() != id {
            warn!(id, "Optimistic edit changed the record id, reverting");
            self.records[index] = original;
            return false;
        }

        self.optimistic.insert(id.to_string());
        true
    }

    pub fn remove_optimistic(&mut self, id: &str) -> Option<T> {
        let index = self.position(id)?;
        self.optimistic.remove(id);
        Some(self.records.remove(index))
    }
}

impl<T: Record> Default for SyncedCollection<T> {
    fn default() -> Self {
        Self::new()
    }
}
