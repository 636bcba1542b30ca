use super::{CacheEntry, CacheStore};
use crate::error::AppError;
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

/// One JSON file per key under a cache directory.
pub struct FileStore {
    dir: PathBuf,
    writes: AtomicU64,
}

impl FileStore {
    pub fn new(dir: impl Into<PathBuf>) -> Result<Self, AppError> {
        let dir = dir.into();
        fs::create_dir_all(&dir).map_err(|e| {
            AppError::CacheBackendUnavailable(format!(
                "Failed to create cache dir {}: {}",
                dir.display(),
                e
            ))
        })?;
        Ok(FileStore {
            dir,
            writes: AtomicU64::new(0),
        })
    }

    pub fn default_dir() -> PathBuf {
        dirs::home_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(".match_insights")
            .join("cache")
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn entry_path(&self, key: &str) -> PathBuf {
        self.dir.join(format!("{}.json", file_name(key)))
    }
}

/// Injective key -> file name mapping: anything outside `[A-Za-z0-9-]` is hex-escaped.
fn file_name(key: &str) -> String {
    let mut out = String::with_capacity(key.len());
    for byte in key.bytes() {
        if byte.is_ascii_alphanumeric() || byte == b'-' {
            out.push(byte as char);
        } else {
            out.push_str(&format!("_{:02x}", byte));
        }
    }
    out
}

impl CacheStore for FileStore {
    fn get(&self, key: &str) -> Result<Option<String>, AppError> {
        let path = self.entry_path(key);

        let content = match fs::read_to_string(&path) {
            Ok(content) => content,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
            Err(e) => {
                return Err(AppError::CacheBackendUnavailable(format!(
                    "Failed to read cache entry: {}",
                    e
                )))
            }
        };

        let entry: CacheEntry = match serde_json::from_str(&content) {
            Ok(entry) => entry,
            Err(e) => {
                // A torn or foreign file is a miss; the next set overwrites it.
                tracing::warn!(key, error = %e, "discarding unreadable cache entry");
                return Ok(None);
            }
        };

        if entry.key != key || entry.is_expired() {
            let _ = fs::remove_file(&path);
            return Ok(None);
        }
        Ok(Some(entry.value))
    }

    fn set(&self, key: &str, value: String, ttl: Duration) -> Result<(), AppError> {
        let entry = CacheEntry::new(key, value, ttl);
        let json = serde_json::to_string_pretty(&entry)?;

        // Write-then-rename so readers never observe a partial file.
        let path = self.entry_path(key);
        let seq = self.writes.fetch_add(1, Ordering::Relaxed);
        let tmp = path.with_extension(format!("json.{}.tmp", seq));
        fs::write(&tmp, json)
            .and_then(|_| fs::rename(&tmp, &path))
            .map_err(|e| {
                AppError::CacheBackendUnavailable(format!("Failed to write cache entry: {}", e))
            })
    }

    fn delete(&self, key: &str) -> Result<(), AppError> {
        match fs::remove_file(self.entry_path(key)) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(AppError::CacheBackendUnavailable(format!(
                "Failed to delete cache entry: {}",
                e
            ))),
        }
    }
}
