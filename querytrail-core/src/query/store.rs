use crate::query::types::QueryRecord;
use chrono::NaiveDateTime;
use std::collections::HashMap;
use std::collections::hash_map::Entry;

/// Live query records keyed by query id.
///
/// Nothing expires on its own. Callers remove records once they are consumed,
/// or apply one of the eviction helpers.
#[derive(Debug, Default)]
pub struct CorrelationStore {
    records: HashMap<String, QueryRecord>,
}

impl CorrelationStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, id: &str) -> Option<&QueryRecord> {
        self.records.get(id)
    }

    pub fn get_mut(&mut self, id: &str) -> Option<&mut QueryRecord> {
        self.records.get_mut(id)
    }

    pub fn contains(&self, id: &str) -> bool {
        self.records.contains_key(id)
    }

    /// Insert `record` unless its id is already present.
    ///
    /// Returns the stored record and whether it was newly inserted.
    pub fn insert_if_absent(&mut self, record: QueryRecord) -> (&mut QueryRecord, bool) {
        match self.records.entry(record.id.clone()) {
            Entry::Occupied(entry) => (entry.into_mut(), false),
            Entry::Vacant(entry) => (entry.insert(record), true),
        }
    }

    pub fn remove(&mut self, id: &str) -> Option<QueryRecord> {
        self.records.remove(id)
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &QueryRecord> {
        self.records.values()
    }

    /// Remove every record that started before `cutoff`.
    pub fn evict_older_than(&mut self, cutoff: NaiveDateTime) -> Vec<QueryRecord> {
        let stale: Vec<String> = self
            .records
            .values()
            .filter(|r| r.start < cutoff)
            .map(|r| r.id.clone())
            .collect();

        stale
            .iter()
            .filter_map(|id| self.records.remove(id))
            .collect()
    }

    /// Remove the oldest-started records until at most `capacity` remain.
    pub fn evict_oldest_beyond(&mut self, capacity: usize) -> Vec<QueryRecord> {
        if self.records.len() <= capacity {
            return Vec::new();
        }

        let mut by_age: Vec<(NaiveDateTime, String)> = self
            .records
            .values()
            .map(|r| (r.start, r.id.clone()))
            .collect();
        by_age.sort_unstable();

        let excess = self.records.len() - capacity;
        by_age
            .into_iter()
            .take(excess)
            .filter_map(|(_, id)| self.records.remove(&id))
            .collect()
    }
}
