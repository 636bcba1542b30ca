mod file;
mod memory;

pub use file::FileStore;
pub use memory::MemoryStore;

use crate::error::AppError;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Key/value backend with per-key expiry.
///
/// Backend failures surface as [`AppError::CacheBackendUnavailable`], never as a
/// miss; the caller decides whether to degrade.
pub trait CacheStore: Send + Sync {
    fn get(&self, key: &str) -> Result<Option<String>, AppError>;

    fn set(&self, key: &str, value: String, ttl: Duration) -> Result<(), AppError>;

    /// Deleting an absent key is not an error.
    fn delete(&self, key: &str) -> Result<(), AppError>;
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheEntry {
    pub key: String,
    pub value: String,
    pub expires_at: DateTime<Utc>,
}

impl CacheEntry {
    pub fn new(key: &str, value: String, ttl: Duration) -> Self {
        let ttl = chrono::Duration::from_std(ttl).unwrap_or_else(|_| chrono::Duration::days(36_500));
        CacheEntry {
            key: key.to_string(),
            value,
            expires_at: Utc::now().checked_add_signed(ttl).unwrap_or(DateTime::<Utc>::MAX_UTC),
        }
    }

    pub fn is_expired(&self) -> bool {
        Utc::now() >= self.expires_at
    }
}
