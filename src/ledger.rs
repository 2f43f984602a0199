//! Shared, file-backed history
//!
//! Wraps a [`HistoryStore`] in a mutex so that multiple sessions completing at
//! once cannot interleave their read-rank-append sequences. Every operation on
//! a file-backed ledger re-reads the file in full and every append rewrites it
//! in full (temp file + rename). A missing or unreadable file loads as an
//! empty history.
//!
//! Ledgers opened on the same path within one process share a per-path lock,
//! so independent handles on one file never overwrite each other's records.
//! Concurrent writers in separate processes are not coordinated.

use std::collections::HashMap;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard, OnceLock};

use crate::error::ScanError;
use crate::history::{HistoryStore, DEFAULT_HISTORY_CAPACITY};
use crate::ranker::PercentileRanker;
use crate::types::{HistoryRecord, PercentileResult, WellnessIndex};

/// Per-path write locks shared by every ledger in the process
static FILE_LOCKS: OnceLock<Mutex<HashMap<PathBuf, Arc<Mutex<()>>>>> = OnceLock::new();

#[derive(Debug)]
struct LedgerState {
    store: HistoryStore,
    /// Last write to disk failed; memory holds records the file lacks
    unflushed: bool,
}

/// Mutex-guarded history with optional on-disk persistence
#[derive(Debug)]
pub struct HistoryLedger {
    path: Option<PathBuf>,
    file_lock: Option<Arc<Mutex<()>>>,
    state: Mutex<LedgerState>,
}

impl HistoryLedger {
    /// Ledger that never touches disk
    pub fn in_memory(capacity: usize) -> Self {
        Self {
            path: None,
            file_lock: None,
            state: Mutex::new(LedgerState {
                store: HistoryStore::new(capacity),
                unflushed: false,
            }),
        }
    }

    /// Open a file-backed ledger with the default capacity
    pub fn open(path: impl Into<PathBuf>) -> Self {
        Self::open_with_capacity(path, DEFAULT_HISTORY_CAPACITY)
    }

    /// Open a file-backed ledger. Never fails: unreadable history is empty.
    pub fn open_with_capacity(path: impl Into<PathBuf>, capacity: usize) -> Self {
        let path = path.into();
        let store = load_store(&path, capacity);
        Self {
            file_lock: Some(file_lock_for(&path)),
            path: Some(path),
            state: Mutex::new(LedgerState {
                store,
                unflushed: false,
            }),
        }
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    pub fn len(&self) -> Result<usize, ScanError> {
        self.read(|store| store.len())
    }

    pub fn is_empty(&self) -> Result<bool, ScanError> {
        self.read(|store| store.is_empty())
    }

    /// Copy of the current records, oldest first
    pub fn snapshot(&self) -> Result<Vec<HistoryRecord>, ScanError> {
        self.read(|store| store.records().cloned().collect())
    }

    /// Percentile of `wellness_index` within `age_bucket` against current history
    pub fn percentile(
        &self,
        age_bucket: &str,
        wellness_index: WellnessIndex,
    ) -> Result<PercentileResult, ScanError> {
        validate_bucket(age_bucket)?;
        self.read(|store| PercentileRanker::percentile(store, age_bucket, wellness_index))
    }

    /// Append an outcome stamped with the current time, then persist
    pub fn record_outcome(
        &self,
        age_bucket: &str,
        wellness_index: WellnessIndex,
    ) -> Result<(), ScanError> {
        validate_bucket(age_bucket)?;
        self.update(|store| store.append(HistoryRecord::now(age_bucket, wellness_index)))
    }

    /// Rank against the history as it stood before this outcome, then append it.
    ///
    /// Both steps happen under one lock, so concurrent callers never see each
    /// other's half-finished updates.
    pub fn rank_and_record(
        &self,
        age_bucket: &str,
        wellness_index: WellnessIndex,
    ) -> Result<PercentileResult, ScanError> {
        validate_bucket(age_bucket)?;
        self.update(|store| {
            let result = PercentileRanker::percentile(store, age_bucket, wellness_index);
            store.append(HistoryRecord::now(age_bucket, wellness_index));
            result
        })
    }

    /// Write the current history to disk. No-op for in-memory ledgers.
    pub fn flush(&self) -> Result<(), ScanError> {
        let _file_guard = self.lock_file()?;
        let mut state = self.lock_state()?;
        let result = self.persist(&state.store);
        state.unflushed = result.is_err();
        result
    }

    fn read<T>(&self, f: impl FnOnce(&HistoryStore) -> T) -> Result<T, ScanError> {
        let _file_guard = self.lock_file()?;
        let mut state = self.lock_state()?;
        self.refresh(&mut state);
        Ok(f(&state.store))
    }

    fn update<T>(&self, f: impl FnOnce(&mut HistoryStore) -> T) -> Result<T, ScanError> {
        let _file_guard = self.lock_file()?;
        let mut state = self.lock_state()?;
        self.refresh(&mut state);
        let output = f(&mut state.store);
        state.unflushed = !self.persist_or_warn(&state.store);
        Ok(output)
    }

    /// Reload from disk unless memory holds records a failed write never saved
    fn refresh(&self, state: &mut LedgerState) {
        if state.unflushed {
            return;
        }
        if let Some(path) = &self.path {
            state.store = load_store(path, state.store.capacity());
        }
    }

    // Lock order: file lock, then state
    fn lock_file(&self) -> Result<Option<MutexGuard<'_, ()>>, ScanError> {
        match &self.file_lock {
            Some(lock) => lock.lock().map(Some).map_err(|_| ScanError::LockPoisoned),
            None => Ok(None),
        }
    }

    fn lock_state(&self) -> Result<MutexGuard<'_, LedgerState>, ScanError> {
        self.state.lock().map_err(|_| ScanError::LockPoisoned)
    }

    fn persist(&self, store: &HistoryStore) -> Result<(), ScanError> {
        let Some(path) = &self.path else {
            return Ok(());
        };
        let json = store.to_json()?;
        write_atomically(path, &json)?;
        Ok(())
    }

    /// Returns whether the history reached disk
    fn persist_or_warn(&self, store: &HistoryStore) -> bool {
        match self.persist(store) {
            Ok(()) => true,
            Err(e) => {
                log::warn!(
                    "failed to persist history to {:?}, keeping {} records in memory: {}",
                    self.path,
                    store.len(),
                    e
                );
                false
            }
        }
    }
}

/// Shared lock for `path`, keyed by its canonical form so different spellings
/// of one file map to the same lock
fn file_lock_for(path: &Path) -> Arc<Mutex<()>> {
    let key = canonical_key(path);
    let registry = FILE_LOCKS.get_or_init(|| Mutex::new(HashMap::new()));
    let mut locks = match registry.lock() {
        Ok(locks) => locks,
        Err(poisoned) => poisoned.into_inner(),
    };
    Arc::clone(locks.entry(key).or_default())
}

fn canonical_key(path: &Path) -> PathBuf {
    if let Ok(canonical) = fs::canonicalize(path) {
        return canonical;
    }
    // File not created yet: canonicalize the directory instead
    match (path.parent(), path.file_name()) {
        (Some(parent), Some(name)) => {
            let parent = if parent.as_os_str().is_empty() {
                Path::new(".")
            } else {
                parent
            };
            fs::canonicalize(parent)
                .map(|dir| dir.join(name))
                .unwrap_or_else(|_| path.to_path_buf())
        }
        _ => path.to_path_buf(),
    }
}

fn validate_bucket(age_bucket: &str) -> Result<(), ScanError> {
    if age_bucket.trim().is_empty() {
        return Err(ScanError::EmptyAgeBucket);
    }
    Ok(())
}

fn load_store(path: &Path, capacity: usize) -> HistoryStore {
    let json = match fs::read_to_string(path) {
        Ok(json) => json,
        Err(e) if e.kind() == io::ErrorKind::NotFound => {
            log::debug!("no history at {}, starting empty", path.display());
            return HistoryStore::new(capacity);
        }
        Err(e) => {
            log::warn!("cannot read history at {}, starting empty: {}", path.display(), e);
            return HistoryStore::new(capacity);
        }
    };

    match HistoryStore::from_json(&json, capacity) {
        Ok(store) => {
            log::debug!("loaded {} history records from {}", store.len(), path.display());
            store
        }
        Err(e) => {
            log::warn!("corrupt history at {}, starting empty: {}", path.display(), e);
            HistoryStore::new(capacity)
        }
    }
}

fn write_atomically(path: &Path, contents: &str) -> io::Result<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent)?;
        }
    }
    let mut tmp_name = path.file_name().unwrap_or_default().to_os_string();
    tmp_name.push(".tmp");
    let tmp_path = path.with_file_name(tmp_name);
    fs::write(&tmp_path, contents)?;
    fs::rename(&tmp_path, path)
}
