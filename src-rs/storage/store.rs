use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

use chrono::Utc;
use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::{debug, error, info, warn};

use super::eviction::{compress_entries, evict, EvictionReport};
use super::medium::{MediumError, StorageMedium};
use super::types::{HistoryEntry, LastOutputs, StorageConfig, StorageKey, StoreError};
use crate::llm::ProviderConfig;

/// Typed key/value persistence for one module namespace.
///
/// Writes are serialized through an internal lock. History is kept bounded
/// by [`StorageConfig`]; quota failures get one recovery pass and one retry.
pub struct PersistentStore {
    namespace: String,
    medium: Arc<dyn StorageMedium>,
    write_lock: Mutex<()>,
    recoveries: AtomicUsize,
}

impl PersistentStore {
    pub fn new(namespace: &str, medium: Arc<dyn StorageMedium>) -> Self {
        Self {
            namespace: namespace.to_string(),
            medium,
            write_lock: Mutex::new(()),
            recoveries: AtomicUsize::new(0),
        }
    }

    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    /// Number of quota recovery passes run so far.
    pub fn recovery_passes(&self) -> usize {
        self.recoveries.load(Ordering::SeqCst)
    }

    pub fn get<T: DeserializeOwned + Default>(&self, key: &StorageKey) -> T {
        self.get_opt(key).unwrap_or_default()
    }

    /// `None` when the key is missing or its value no longer parses.
    pub fn get_opt<T: DeserializeOwned>(&self, key: &StorageKey) -> Option<T> {
        let raw = match self.medium.read(&key.to_string()) {
            Ok(raw) => raw?,
            Err(err) => {
                warn!(key = %key, error = %err, "storage read failed");
                return None;
            }
        };
        match serde_json::from_str(&raw) {
            Ok(value) => Some(value),
            Err(err) => {
                warn!(key = %key, error = %err, "discarding malformed stored value");
                None
            }
        }
    }

    pub fn set<T: Serialize>(&self, key: &StorageKey, value: &T) -> Result<(), StoreError> {
        let payload = serde_json::to_string(value)?;
        let _guard = self.lock();
        if *key != self.history_key() {
            if let Err(err) = self.evict_locked(0) {
                debug!(namespace = %self.namespace, error = %err, "pre-write eviction failed");
            }
        }
        self.write_with_recovery(key, payload, None)
    }

    pub fn remove(&self, key: &StorageKey) -> Result<(), StoreError> {
        let _guard = self.lock();
        self.medium.remove(&key.to_string()).map_err(|err| medium_error(key, err))
    }

    pub fn storage_config(&self) -> StorageConfig {
        self.get_opt::<StorageConfig>(&StorageKey::StorageConfig(self.namespace.clone()))
            .map(StorageConfig::validated)
            .unwrap_or_default()
    }

    pub fn set_storage_config(&self, cfg: StorageConfig) -> Result<StorageConfig, StoreError> {
        let cfg = cfg.validated();
        self.set(&StorageKey::StorageConfig(self.namespace.clone()), &cfg)?;
        Ok(cfg)
    }

    pub fn provider_config(&self) -> ProviderConfig {
        self.get::<ProviderConfig>(&StorageKey::ApiConfig).sanitized()
    }

    pub fn set_provider_config(&self, cfg: &ProviderConfig) -> Result<(), StoreError> {
        self.set(&StorageKey::ApiConfig, &cfg.clone().sanitized())
    }

    pub fn settings<T: DeserializeOwned + Default>(&self) -> T {
        self.get(&StorageKey::Settings(self.namespace.clone()))
    }

    pub fn save_settings<T: Serialize>(&self, value: &T) -> Result<(), StoreError> {
        self.set(&StorageKey::Settings(self.namespace.clone()), value)
    }

    pub fn last_outputs(&self) -> Option<LastOutputs> {
        self.get_opt(&StorageKey::LastOutputs(self.namespace.clone()))
    }

    pub fn save_outputs(&self, outputs: &LastOutputs) -> Result<(), StoreError> {
        self.set(&StorageKey::LastOutputs(self.namespace.clone()), outputs)
    }

    pub fn append_history(&self, entry: HistoryEntry) -> Result<(), StoreError> {
        let _guard = self.lock();
        let cfg = self.storage_config();
        let (mut entries, report) = evict(self.load_history(), &cfg, Utc::now(), 1);
        log_report(&self.namespace, &report);
        entries.push(entry);
        if cfg.compression_enabled {
            compress_entries(&mut entries, cfg.compress_above_chars);
        }
        let payload = serde_json::to_string(&entries)?;
        let newest_only = serde_json::to_string(&entries[entries.len() - 1..])?;
        self.write_with_recovery(&self.history_key(), payload, Some(newest_only))
    }

    /// History for display. Eviction runs first; if persisting the evicted
    /// list fails the evicted list is still returned.
    pub fn history(&self) -> Vec<HistoryEntry> {
        let _guard = self.lock();
        let cfg = self.storage_config();
        let (entries, report) = evict(self.load_history(), &cfg, Utc::now(), 0);
        if report.changed() {
            log_report(&self.namespace, &report);
            if let Err(err) = self.persist_history(&entries) {
                warn!(namespace = %self.namespace, error = %err, "could not persist evicted history");
            }
        }
        entries
    }

    pub fn evict_if_needed(&self) -> Result<EvictionReport, StoreError> {
        let _guard = self.lock();
        self.evict_locked(0)
    }

    pub fn clear_history(&self) -> Result<(), StoreError> {
        self.remove(&self.history_key())
    }

    fn lock(&self) -> MutexGuard<'_, ()> {
        self.write_lock.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn history_key(&self) -> StorageKey {
        StorageKey::History(self.namespace.clone())
    }

    fn load_history(&self) -> Vec<HistoryEntry> {
        self.get_opt(&self.history_key()).unwrap_or_default()
    }

    fn persist_history(&self, entries: &[HistoryEntry]) -> Result<(), StoreError> {
        let key = self.history_key();
        let payload = serde_json::to_string(entries)?;
        self.medium
            .write(&key.to_string(), &payload)
            .map_err(|err| medium_error(&key, err))
    }

    fn evict_locked(&self, reserve: usize) -> Result<EvictionReport, StoreError> {
        let cfg = self.storage_config();
        let (entries, report) = evict(self.load_history(), &cfg, Utc::now(), reserve);
        if report.changed() {
            log_report(&self.namespace, &report);
            self.persist_history(&entries)?;
        }
        Ok(report)
    }

    fn write_with_recovery(
        &self,
        key: &StorageKey,
        payload: String,
        compact: Option<String>,
    ) -> Result<(), StoreError> {
        let raw_key = key.to_string();
        match self.medium.write(&raw_key, &payload) {
            Ok(()) => return Ok(()),
            Err(MediumError::QuotaExceeded) => {}
            Err(err) => return Err(medium_error(key, err)),
        }

        warn!(key = %key, bytes = payload.len(), "storage quota exceeded, running recovery pass");
        self.recover_quota(key);
        self.recoveries.fetch_add(1, Ordering::SeqCst);

        let retry = compact.as_deref().unwrap_or(&payload);
        match self.medium.write(&raw_key, retry) {
            Ok(()) => {
                info!(key = %key, "write succeeded after quota recovery");
                Ok(())
            }
            Err(err) => {
                error!(key = %key, error = %err, "write failed after quota recovery");
                Err(medium_error(key, err))
            }
        }
    }

    /// Frees space: the namespace keeps only its newest history entry and
    /// loses its cached outputs. Other namespaces are touched only when
    /// `cross_namespace_recovery` is set.
    fn recover_quota(&self, writing: &StorageKey) {
        let history_key = self.history_key();
        if *writing != history_key {
            let entries = self.load_history();
            if entries.len() > 1 {
                let newest = &entries[entries.len() - 1..];
                if let Err(err) = self.persist_history(newest) {
                    warn!(error = %err, "could not shrink history during recovery");
                }
            }
        }

        let outputs_key = StorageKey::LastOutputs(self.namespace.clone());
        if *writing != outputs_key {
            let _ = self.medium.remove(&outputs_key.to_string());
        }

        if !self.storage_config().cross_namespace_recovery {
            return;
        }
        let keys = match self.medium.keys() {
            Ok(keys) => keys,
            Err(err) => {
                warn!(error = %err, "could not list keys during recovery");
                return;
            }
        };
        for raw in keys {
            let Some(key) = StorageKey::parse(&raw) else {
                continue;
            };
            let foreign = key.namespace().map(|ns| ns != self.namespace).unwrap_or(false);
            if foreign && !key.is_essential() {
                info!(key = %key, "dropping foreign namespace data during recovery");
                let _ = self.medium.remove(&raw);
            }
        }
    }
}

fn medium_error(key: &StorageKey, err: MediumError) -> StoreError {
    match err {
        MediumError::QuotaExceeded => StoreError::QuotaExceeded { key: key.to_string() },
        MediumError::Io(msg) => StoreError::Io(msg),
    }
}

fn log_report(namespace: &str, report: &EvictionReport) {
    if report.changed() {
        info!(
            namespace,
            expired = report.expired,
            trimmed = report.trimmed,
            compressed = report.compressed,
            "history evicted"
        );
    }
}

#[cfg(test)]
mod tests {
    use chrono::Duration;
    use serde_json::json;

    use super::*;
    use crate::llm::Role;
    use crate::storage::medium::MemoryMedium;

    fn store_with(quota: usize, cfg: StorageConfig) -> PersistentStore {
        let store = PersistentStore::new("diary", Arc::new(MemoryMedium::new(quota)));
        store.set_storage_config(cfg).unwrap();
        store
    }

    #[test]
    fn set_then_get_round_trips_json() {
        let store = store_with(64 * 1024, StorageConfig::default());
        let key = StorageKey::Settings("diary".into());
        let value = json!({"style": "letter", "length": 3, "tags": ["rain", "tea"], "nested": {"ok": true}});
        store.set(&key, &value).unwrap();
        let back: serde_json::Value = store.get(&key);
        assert_eq!(back, value);
    }

    #[test]
    fn missing_or_malformed_values_fall_back_to_default() {
        let medium = Arc::new(MemoryMedium::new(4096));
        medium.write("settings:diary", "{not json").unwrap();
        let store = PersistentStore::new("diary", medium);
        let value: Vec<String> = store.get(&StorageKey::Settings("diary".into()));
        assert!(value.is_empty());
        let missing: Option<LastOutputs> = store.last_outputs();
        assert!(missing.is_none());
    }

    #[test]
    fn twelve_inserts_leave_five_most_recent() {
        let cfg = StorageConfig {
            max_entries: 10,
            clean_threshold: 10,
            keep_recent_on_clean: 5,
            ..StorageConfig::default()
        };
        let store = store_with(256 * 1024, cfg);
        for i in 0..12 {
            store.append_history(HistoryEntry::new(Role::User, format!("entry {}", i))).unwrap();
        }
        let kept: Vec<String> = store.history().into_iter().map(|e| e.content).collect();
        let expected: Vec<String> = (7..12).map(|i| format!("entry {}", i)).collect();
        assert_eq!(kept, expected);
    }

    #[test]
    fn stored_history_overflows_by_at_most_the_newest_entry() {
        let raw = |store: &PersistentStore| {
            store
                .get_opt::<Vec<HistoryEntry>>(&StorageKey::History("diary".into()))
                .map_or(0, |entries| entries.len())
        };

        let tight = store_with(
            256 * 1024,
            StorageConfig {
                max_entries: 10,
                clean_threshold: 10,
                keep_recent_on_clean: 5,
                ..StorageConfig::default()
            },
        );
        for i in 0..11 {
            tight.append_history(HistoryEntry::new(Role::User, format!("entry {}", i))).unwrap();
            assert!(raw(&tight) <= 11);
        }
        assert_eq!(raw(&tight), 11);
        tight.evict_if_needed().unwrap();
        assert_eq!(raw(&tight), 5);

        let roomy = store_with(
            256 * 1024,
            StorageConfig {
                max_entries: 10,
                clean_threshold: 8,
                keep_recent_on_clean: 5,
                ..StorageConfig::default()
            },
        );
        for i in 0..30 {
            roomy.append_history(HistoryEntry::new(Role::User, format!("entry {}", i))).unwrap();
            assert!(raw(&roomy) <= 10);
        }
    }

    #[test]
    fn evict_bounds_count_and_age() {
        let cfg = StorageConfig {
            max_entries: 6,
            clean_threshold: 6,
            keep_recent_on_clean: 4,
            max_age_days: 3,
            ..StorageConfig::default()
        };
        let store = store_with(256 * 1024, cfg.clone());
        let now = Utc::now();
        let mut seeded: Vec<HistoryEntry> = (0..3)
            .map(|i| HistoryEntry::at(Role::User, format!("stale {}", i), now - Duration::days(10)))
            .collect();
        seeded.extend((0..8).map(|i| HistoryEntry::at(Role::User, format!("fresh {}", i), now)));
        store.set(&StorageKey::History("diary".into()), &seeded).unwrap();

        store.evict_if_needed().unwrap();
        let stored: Vec<HistoryEntry> = store.get(&StorageKey::History("diary".into()));
        assert!(stored.len() <= cfg.max_entries);
        assert_eq!(stored.len(), 4);
        assert!(stored.iter().all(|e| now - e.timestamp <= Duration::days(3)));
    }

    #[test]
    fn quota_failure_runs_one_recovery_then_reports() {
        let store = store_with(700, StorageConfig::default());
        let key = StorageKey::LastOutputs("diary".into());
        let first = LastOutputs {
            task_id: "t1".into(),
            complete: true,
            outputs: vec!["short".into()],
            saved_at: Utc::now(),
        };
        store.save_outputs(&first).unwrap();

        let huge = LastOutputs {
            outputs: vec!["x".repeat(4096)],
            ..first.clone()
        };
        let err = store.save_outputs(&huge).unwrap_err();
        assert_eq!(err, StoreError::QuotaExceeded { key: key.to_string() });
        assert_eq!(store.recovery_passes(), 1);
        // the rejected write left the previous value untouched
        assert_eq!(store.last_outputs(), Some(first));
    }

    #[test]
    fn recovery_frees_space_inside_namespace() {
        let store = store_with(1500, StorageConfig::default());
        for i in 0..6 {
            store
                .append_history(HistoryEntry::new(Role::Assistant, format!("{}{}", i, "y".repeat(60))))
                .unwrap();
        }
        let outputs = LastOutputs {
            task_id: "t9".into(),
            complete: true,
            outputs: vec!["z".repeat(700)],
            saved_at: Utc::now(),
        };
        store.save_outputs(&outputs).unwrap();
        assert_eq!(store.recovery_passes(), 1);
        assert_eq!(store.history().len(), 1);
        assert_eq!(store.last_outputs(), Some(outputs));
        // configuration survives recovery
        assert_eq!(store.storage_config(), StorageConfig::default());
    }

    #[test]
    fn recovery_leaves_other_namespaces_alone_by_default() {
        let medium: Arc<dyn StorageMedium> = Arc::new(MemoryMedium::new(1200));
        let diary = PersistentStore::new("diary", medium.clone());
        let theater = PersistentStore::new("theater", medium.clone());
        theater
            .append_history(HistoryEntry::new(Role::Assistant, "t".repeat(300)))
            .unwrap();
        diary
            .append_history(HistoryEntry::new(Role::Assistant, "d".repeat(300)))
            .unwrap();

        let big = LastOutputs {
            task_id: "t".into(),
            complete: true,
            outputs: vec!["q".repeat(400)],
            saved_at: Utc::now(),
        };
        assert!(diary.save_outputs(&big).is_err());
        assert_eq!(theater.history().len(), 1);

        diary
            .set_storage_config(StorageConfig {
                cross_namespace_recovery: true,
                ..StorageConfig::default()
            })
            .unwrap();
        diary.save_outputs(&big).unwrap();
        assert!(theater.history().is_empty());
    }
}
