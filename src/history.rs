//! History store
//!
//! Bounded, append-only ledger of past (age bucket, wellness index) outcomes.
//! Once full, each append evicts the oldest record. Records are never updated
//! or removed individually.

use crate::types::HistoryRecord;
use std::collections::VecDeque;

/// Default maximum number of retained records
pub const DEFAULT_HISTORY_CAPACITY: usize = 1000;

/// In-memory history, oldest record first
#[derive(Debug, Clone, PartialEq)]
pub struct HistoryStore {
    records: VecDeque<HistoryRecord>,
    capacity: usize,
}

impl Default for HistoryStore {
    fn default() -> Self {
        Self::new(DEFAULT_HISTORY_CAPACITY)
    }
}

impl HistoryStore {
    /// Create an empty store holding at most `capacity` records (minimum 1)
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            records: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    /// Append a record, evicting the oldest while over capacity
    pub fn append(&mut self, record: HistoryRecord) {
        self.records.push_back(record);
        while self.records.len() > self.capacity {
            self.records.pop_front();
        }
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// All records, oldest first
    pub fn records(&self) -> impl Iterator<Item = &HistoryRecord> {
        self.records.iter()
    }

    /// Records in the given age bucket, oldest first
    pub fn in_bucket<'a>(&'a self, age_bucket: &'a str) -> impl Iterator<Item = &'a HistoryRecord> {
        self.records.iter().filter(move |r| r.age_bucket == age_bucket)
    }

    /// Load a store from its JSON array representation.
    ///
    /// Arrays longer than `capacity` keep only their newest records.
    pub fn from_json(json: &str, capacity: usize) -> Result<Self, serde_json::Error> {
        let records: Vec<HistoryRecord> = serde_json::from_str(json)?;
        let mut store = Self::new(capacity);
        for record in records {
            store.append(record);
        }
        Ok(store)
    }

    /// Serialize as a JSON array, oldest record first
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(&self.records)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::WellnessIndex;
    use chrono::{Duration, TimeZone, Utc};
    use pretty_assertions::assert_eq;

    fn record(bucket: &str, index: i64, seq: i64) -> HistoryRecord {
        HistoryRecord {
            age_bucket: bucket.to_string(),
            wellness_index: WellnessIndex::new(index).unwrap(),
            recorded_at: Utc.with_ymd_and_hms(2024, 1, 15, 12, 0, 0).unwrap()
                + Duration::seconds(seq),
        }
    }

    #[test]
    fn test_capacity_never_exceeded() {
        let mut store = HistoryStore::new(DEFAULT_HISTORY_CAPACITY);
        for i in 0..1005 {
            store.append(record("30-39", (i % 100) + 1, i));
            assert!(store.len() <= DEFAULT_HISTORY_CAPACITY);
        }
        assert_eq!(store.len(), 1000);
    }

    #[test]
    fn test_oldest_evicted_first() {
        let mut store = HistoryStore::default();
        for i in 0..1005 {
            store.append(record("30-39", 50, i));
        }

        let first = Utc.with_ymd_and_hms(2024, 1, 15, 12, 0, 0).unwrap();
        // The first 5 records are gone; the survivors keep insertion order
        for i in 0..5 {
            let evicted = first + Duration::seconds(i);
            assert!(store.records().all(|r| r.recorded_at != evicted));
        }
        let times: Vec<_> = store.records().map(|r| r.recorded_at).collect();
        assert_eq!(times.first(), Some(&(first + Duration::seconds(5))));
        assert_eq!(times.last(), Some(&(first + Duration::seconds(1004))));
        assert!(times.windows(2).all(|w| w[0] < w[1]));
    }

    #[test]
    fn test_bucket_filter() {
        let mut store = HistoryStore::new(10);
        store.append(record("18-29", 40, 0));
        store.append(record("30-39", 60, 1));
        store.append(record("18-29", 70, 2));

        let indexes: Vec<u8> = store.in_bucket("18-29").map(|r| r.wellness_index.value()).collect();
        assert_eq!(indexes, vec![40, 70]);
        assert_eq!(store.in_bucket("70+").count(), 0);
    }

    #[test]
    fn test_json_round_trip_keeps_order() {
        let mut store = HistoryStore::new(10);
        store.append(record("18-29", 40, 0));
        store.append(record("30-39", 60, 1));

        let json = store.to_json().unwrap();
        assert!(json.starts_with('['));
        let loaded = HistoryStore::from_json(&json, 10).unwrap();
        assert_eq!(loaded, store);
    }

    #[test]
    fn test_load_trims_to_capacity() {
        let mut big = HistoryStore::new(20);
        for i in 0..20 {
            big.append(record("40-49", 10, i));
        }
        let loaded = HistoryStore::from_json(&big.to_json().unwrap(), 5).unwrap();
        assert_eq!(loaded.len(), 5);
        let first = loaded.records().next().unwrap();
        assert_eq!(first, &record("40-49", 10, 15));
    }
}
