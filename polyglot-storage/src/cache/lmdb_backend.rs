//! LMDB-backed cache implementation.
//!
//! Uses the heed crate (Rust bindings for LMDB) to provide a persistent,
//! memory-mapped key-value store. Freshness tokens and the generation counter
//! survive process restarts, so clients keep getting 304s after a deploy.
//!
//! # Atomicity
//!
//! LMDB serializes write transactions. `add` and `increment` read and write
//! inside a single write transaction, which makes them atomic across threads
//! and across processes sharing the same environment.

use std::path::Path;
use std::sync::RwLock;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use heed::types::Bytes;
use heed::{Database, Env, EnvOpenOptions, RoTxn, RwTxn};
use polyglot_core::{CacheError, PolyglotError, PolyglotResult};

use super::traits::{CacheBackend, CacheEntry, CacheStats, Retention};

/// Marker stored in the expiry slot for entries that never expire.
const NO_EXPIRY: i64 = i64::MIN;

/// Size of the `[stored_at][expires_at]` header.
const HEADER_LEN: usize = 16;

/// Error type for LMDB cache operations.
#[derive(Debug, thiserror::Error)]
pub enum LmdbCacheError {
    /// Failed to open or create the LMDB environment.
    #[error("Failed to open LMDB environment: {0}")]
    EnvOpen(String),

    /// Failed to open the database within the environment.
    #[error("Failed to open database: {0}")]
    DbOpen(String),

    /// Transaction error.
    #[error("Transaction error: {0}")]
    Transaction(String),

    /// Stored bytes could not be decoded.
    #[error("Deserialization error: {0}")]
    Deserialization(String),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<LmdbCacheError> for PolyglotError {
    fn from(e: LmdbCacheError) -> Self {
        match e {
            LmdbCacheError::Deserialization(reason) => PolyglotError::Cache(CacheError::Corrupt {
                key: String::new(),
                reason,
            }),
            LmdbCacheError::Transaction(reason) => {
                PolyglotError::Cache(CacheError::Transaction { reason })
            }
            other => PolyglotError::Cache(CacheError::Unavailable {
                reason: other.to_string(),
            }),
        }
    }
}

fn txn_err(e: heed::Error) -> LmdbCacheError {
    LmdbCacheError::Transaction(e.to_string())
}

fn encode_entry(value: &str, stored_at: DateTime<Utc>, expires_at: Option<DateTime<Utc>>) -> Vec<u8> {
    let mut bytes = Vec::with_capacity(HEADER_LEN + value.len());
    bytes.extend_from_slice(&stored_at.timestamp_millis().to_le_bytes());
    let expiry = expires_at.map_or(NO_EXPIRY, |at| at.timestamp_millis());
    bytes.extend_from_slice(&expiry.to_le_bytes());
    bytes.extend_from_slice(value.as_bytes());
    bytes
}

fn decode_entry(bytes: &[u8]) -> Result<CacheEntry, LmdbCacheError> {
    if bytes.len() < HEADER_LEN {
        return Err(LmdbCacheError::Deserialization(
            "entry shorter than header".into(),
        ));
    }
    let read_i64 = |range: std::ops::Range<usize>| -> Result<i64, LmdbCacheError> {
        let raw: [u8; 8] = bytes[range]
            .try_into()
            .map_err(|_| LmdbCacheError::Deserialization("Invalid timestamp".into()))?;
        Ok(i64::from_le_bytes(raw))
    };
    let stored_at = DateTime::from_timestamp_millis(read_i64(0..8)?).unwrap_or_else(Utc::now);
    let expiry = read_i64(8..16)?;
    let expires_at = if expiry == NO_EXPIRY {
        None
    } else {
        DateTime::from_timestamp_millis(expiry)
    };
    let value = std::str::from_utf8(&bytes[HEADER_LEN..])
        .map_err(|e| LmdbCacheError::Deserialization(e.to_string()))?
        .to_string();
    Ok(CacheEntry {
        value,
        stored_at,
        expires_at,
    })
}

/// LMDB-backed cache backend.
///
/// # Example
///
/// ```ignore
/// use polyglot_storage::cache::{CacheBackend, LmdbCacheBackend, Retention};
///
/// let backend = LmdbCacheBackend::new("/var/lib/polyglot/cache", 256)?;
/// backend.set("content:locales", "[\"en\"]", Retention::Forever).await?;
/// ```
pub struct LmdbCacheBackend {
    /// The LMDB environment.
    env: Env,
    /// The main database (single unnamed database).
    db: Database<Bytes, Bytes>,
    /// Hit/miss counters. Entry counts are read from LMDB.
    stats: RwLock<CacheStats>,
}

impl LmdbCacheBackend {
    /// Create a new LMDB cache backend.
    ///
    /// # Arguments
    ///
    /// * `path` - Directory where LMDB files will be stored
    /// * `max_size_mb` - Maximum size of the database in megabytes
    pub fn new<P: AsRef<Path>>(path: P, max_size_mb: usize) -> Result<Self, LmdbCacheError> {
        std::fs::create_dir_all(&path)?;

        // SAFETY: the environment is opened once per path per process; callers
        // must not open the same directory twice in one process.
        let env = unsafe {
            EnvOpenOptions::new()
                .map_size(max_size_mb * 1024 * 1024)
                .max_dbs(1)
                .open(path.as_ref())
        }
        .map_err(|e| LmdbCacheError::EnvOpen(e.to_string()))?;

        let mut wtxn = env.write_txn().map_err(txn_err)?;
        let db: Database<Bytes, Bytes> = env
            .create_database(&mut wtxn, None)
            .map_err(|e| LmdbCacheError::DbOpen(e.to_string()))?;
        wtxn.commit().map_err(txn_err)?;

        Ok(Self {
            env,
            db,
            stats: RwLock::new(CacheStats::default()),
        })
    }

    fn record(&self, hit: bool) {
        if let Ok(mut stats) = self.stats.write() {
            if hit {
                stats.hits += 1;
            } else {
                stats.misses += 1;
            }
        }
    }

    fn record_expiration(&self) {
        if let Ok(mut stats) = self.stats.write() {
            stats.expirations += 1;
        }
    }

    /// Read a live entry inside a write transaction, deleting it if expired.
    fn live_in_write(&self, wtxn: &mut RwTxn<'_>, key: &str) -> Result<Option<CacheEntry>, LmdbCacheError> {
        let Some(bytes) = self.db.get(wtxn, key.as_bytes()).map_err(txn_err)? else {
            return Ok(None);
        };
        let entry = decode_entry(bytes)?;
        if entry.is_expired(Utc::now()) {
            self.db.delete(wtxn, key.as_bytes()).map_err(txn_err)?;
            self.record_expiration();
            return Ok(None);
        }
        Ok(Some(entry))
    }

    fn read_entry(&self, rtxn: &RoTxn<'_>, key: &str) -> Result<Option<CacheEntry>, LmdbCacheError> {
        match self.db.get(rtxn, key.as_bytes()).map_err(txn_err)? {
            Some(bytes) => Ok(Some(decode_entry(bytes)?)),
            None => Ok(None),
        }
    }

    fn put_entry(
        &self,
        wtxn: &mut RwTxn<'_>,
        key: &str,
        value: &str,
        retention: Retention,
    ) -> Result<(), LmdbCacheError> {
        let now = Utc::now();
        let bytes = encode_entry(value, now, retention.expires_at(now));
        self.db
            .put(wtxn, key.as_bytes(), &bytes)
            .map_err(txn_err)
    }
}

#[async_trait]
impl CacheBackend for LmdbCacheBackend {
    async fn get(&self, key: &str) -> PolyglotResult<Option<CacheEntry>> {
        let rtxn = self.env.read_txn().map_err(txn_err)?;
        let entry = self.read_entry(&rtxn, key)?;
        drop(rtxn);

        match entry {
            Some(entry) if entry.is_expired(Utc::now()) => {
                // Expired entries are cleaned up lazily by the next writer.
                self.record(false);
                Ok(None)
            }
            Some(entry) => {
                self.record(true);
                Ok(Some(entry))
            }
            None => {
                self.record(false);
                Ok(None)
            }
        }
    }

    async fn set(&self, key: &str, value: &str, retention: Retention) -> PolyglotResult<()> {
        let mut wtxn = self.env.write_txn().map_err(txn_err)?;
        self.put_entry(&mut wtxn, key, value, retention)?;
        wtxn.commit().map_err(txn_err)?;
        Ok(())
    }

    async fn add(&self, key: &str, value: &str, retention: Retention) -> PolyglotResult<String> {
        let mut wtxn = self.env.write_txn().map_err(txn_err)?;
        if let Some(existing) = self.live_in_write(&mut wtxn, key)? {
            wtxn.commit().map_err(txn_err)?;
            return Ok(existing.value);
        }
        self.put_entry(&mut wtxn, key, value, retention)?;
        wtxn.commit().map_err(txn_err)?;
        Ok(value.to_string())
    }

    async fn delete(&self, key: &str) -> PolyglotResult<bool> {
        let mut wtxn = self.env.write_txn().map_err(txn_err)?;
        let live = self.live_in_write(&mut wtxn, key)?.is_some();
        if live {
            self.db.delete(&mut wtxn, key.as_bytes()).map_err(txn_err)?;
        }
        wtxn.commit().map_err(txn_err)?;
        Ok(live)
    }

    async fn delete_prefix(&self, prefix: &str) -> PolyglotResult<u64> {
        let mut wtxn = self.env.write_txn().map_err(txn_err)?;
        let keys: Vec<Vec<u8>> = {
            let iter = self
                .db
                .prefix_iter(&wtxn, prefix.as_bytes())
                .map_err(txn_err)?;
            let mut keys = Vec::new();
            for result in iter {
                let (key, _) = result.map_err(txn_err)?;
                keys.push(key.to_vec());
            }
            keys
        };

        let mut deleted = 0u64;
        for key in &keys {
            if self.db.delete(&mut wtxn, key).map_err(txn_err)? {
                deleted += 1;
            }
        }
        wtxn.commit().map_err(txn_err)?;
        Ok(deleted)
    }

    async fn increment(&self, key: &str) -> PolyglotResult<u64> {
        let mut wtxn = self.env.write_txn().map_err(txn_err)?;
        let current = match self.live_in_write(&mut wtxn, key)? {
            Some(entry) => entry.value.parse::<u64>().map_err(|e| CacheError::Corrupt {
                key: key.to_string(),
                reason: e.to_string(),
            })?,
            None => 0,
        };
        let next = current + 1;
        self.put_entry(&mut wtxn, key, &next.to_string(), Retention::Forever)?;
        wtxn.commit().map_err(txn_err)?;
        Ok(next)
    }

    async fn stats(&self) -> PolyglotResult<CacheStats> {
        let rtxn = self.env.read_txn().map_err(txn_err)?;
        let entry_count = self.db.len(&rtxn).map_err(txn_err)?;
        let stats = self
            .stats
            .read()
            .map(|s| s.clone())
            .unwrap_or_default();
        Ok(CacheStats {
            entry_count,
            ..stats
        })
    }
}
