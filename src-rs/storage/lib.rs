pub mod eviction;
pub mod medium;
pub mod store;
pub mod types;

pub use eviction::{EvictionReport, COMPRESSION_MARKER};
pub use medium::{FileMedium, MediumError, MemoryMedium, StorageMedium, DEFAULT_QUOTA_BYTES};
pub use store::PersistentStore;
pub use types::{HistoryEntry, LastOutputs, StorageConfig, StorageKey, StoreError};
