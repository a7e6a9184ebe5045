use std::collections::HashMap;
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use thiserror::Error;

pub const DEFAULT_QUOTA_BYTES: usize = 5 * 1024 * 1024;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum MediumError {
    #[error("quota exceeded")]
    QuotaExceeded,
    #[error("io error: {0}")]
    Io(String),
}

/// Finite key/value medium. Writes are all-or-nothing: a rejected write
/// leaves the previous value in place.
pub trait StorageMedium: Send + Sync {
    fn read(&self, key: &str) -> Result<Option<String>, MediumError>;
    fn write(&self, key: &str, value: &str) -> Result<(), MediumError>;
    fn remove(&self, key: &str) -> Result<(), MediumError>;
    fn keys(&self) -> Result<Vec<String>, MediumError>;
    fn used_bytes(&self) -> usize;
}

pub struct MemoryMedium {
    quota: usize,
    data: Mutex<HashMap<String, String>>,
}

impl MemoryMedium {
    pub fn new(quota: usize) -> Self {
        Self {
            quota,
            data: Mutex::new(HashMap::new()),
        }
    }
}

fn lock_error() -> MediumError {
    MediumError::Io("lock poisoned".to_string())
}

impl StorageMedium for MemoryMedium {
    fn read(&self, key: &str) -> Result<Option<String>, MediumError> {
        let map = self.data.lock().map_err(|_| lock_error())?;
        Ok(map.get(key).cloned())
    }

    fn write(&self, key: &str, value: &str) -> Result<(), MediumError> {
        let mut map = self.data.lock().map_err(|_| lock_error())?;
        let used: usize = map.iter().map(|(k, v)| k.len() + v.len()).sum();
        let current = map.get(key).map(|v| key.len() + v.len()).unwrap_or(0);
        if used - current + key.len() + value.len() > self.quota {
            return Err(MediumError::QuotaExceeded);
        }
        map.insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<(), MediumError> {
        let mut map = self.data.lock().map_err(|_| lock_error())?;
        map.remove(key);
        Ok(())
    }

    fn keys(&self) -> Result<Vec<String>, MediumError> {
        let map = self.data.lock().map_err(|_| lock_error())?;
        Ok(map.keys().cloned().collect())
    }

    fn used_bytes(&self) -> usize {
        match self.data.lock() {
            Ok(map) => map.iter().map(|(k, v)| k.len() + v.len()).sum(),
            Err(_) => 0,
        }
    }
}

/// One JSON file per key inside a directory, with a byte quota over the
/// whole directory.
pub struct FileMedium {
    dir: PathBuf,
    quota: usize,
    lock: Mutex<()>,
}

const FILE_SUFFIX: &str = ".json";

impl FileMedium {
    pub fn open(dir: impl AsRef<Path>, quota: usize) -> Result<Self, MediumError> {
        let dir = dir.as_ref().to_path_buf();
        fs::create_dir_all(&dir).map_err(io_error)?;
        Ok(Self {
            dir,
            quota,
            lock: Mutex::new(()),
        })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn path_for(&self, key: &str) -> PathBuf {
        self.dir.join(format!("{}{}", encode_key(key), FILE_SUFFIX))
    }

    fn entry_size(&self, key: &str) -> usize {
        fs::metadata(self.path_for(key))
            .map(|meta| key.len() + meta.len() as usize)
            .unwrap_or(0)
    }

    fn scan(&self) -> Result<Vec<String>, MediumError> {
        let mut keys = Vec::new();
        for item in fs::read_dir(&self.dir).map_err(io_error)? {
            let item = item.map_err(io_error)?;
            let name = item.file_name().to_string_lossy().to_string();
            if let Some(stem) = name.strip_suffix(FILE_SUFFIX) {
                keys.push(decode_key(stem));
            }
        }
        Ok(keys)
    }
}

fn io_error(err: std::io::Error) -> MediumError {
    MediumError::Io(err.to_string())
}

fn encode_key(key: &str) -> String {
    key.replace(':', "__")
}

fn decode_key(stem: &str) -> String {
    stem.replacen("__", ":", 1)
}

impl StorageMedium for FileMedium {
    fn read(&self, key: &str) -> Result<Option<String>, MediumError> {
        match fs::read_to_string(self.path_for(key)) {
            Ok(data) => Ok(Some(data)),
            Err(err) if err.kind() == ErrorKind::NotFound => Ok(None),
            Err(err) => Err(io_error(err)),
        }
    }

    fn write(&self, key: &str, value: &str) -> Result<(), MediumError> {
        let _guard = self.lock.lock().map_err(|_| lock_error())?;
        let used = self.used_bytes();
        let current = self.entry_size(key);
        if used - current.min(used) + key.len() + value.len() > self.quota {
            return Err(MediumError::QuotaExceeded);
        }
        let target = self.path_for(key);
        let tmp = target.with_extension("tmp");
        fs::write(&tmp, value).map_err(io_error)?;
        fs::rename(&tmp, &target).map_err(|err| {
            let _ = fs::remove_file(&tmp);
            io_error(err)
        })
    }

    fn remove(&self, key: &str) -> Result<(), MediumError> {
        let _guard = self.lock.lock().map_err(|_| lock_error())?;
        match fs::remove_file(self.path_for(key)) {
            Ok(()) => Ok(()),
            Err(err) if err.kind() == ErrorKind::NotFound => Ok(()),
            Err(err) => Err(io_error(err)),
        }
    }

    fn keys(&self) -> Result<Vec<String>, MediumError> {
        self.scan()
    }

    fn used_bytes(&self) -> usize {
        self.scan()
            .map(|keys| keys.iter().map(|k| self.entry_size(k)).sum())
            .unwrap_or(0)
    }
}
