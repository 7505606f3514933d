//! Verdict Cache
//!
//! Durable digest -> verdict store with verdict-dependent expiry and a
//! confidence score derived at lookup time.
//!
//! Features:
//! - Threat verdicts cache long, clean verdicts short, errors never
//! - Lookup past expiry is a miss; the rows are removed by the sweep
//! - Unreadable rows are dropped and treated as a miss, not a failure
//! - Hit count increments on every served lookup

mod confidence;
mod types;

pub use confidence::confidence as derive_confidence;
pub use types::{CachedVerdict, StoredVerdict, VerdictKind};

use std::sync::Arc;

use chrono::Utc;
use rusqlite::{params, OptionalExtension};

use crate::logic::config::CacheConfig;
use crate::logic::storage::{Database, StoreError};

pub struct VerdictCache {
    db: Arc<Database>,
    config: CacheConfig,
}

impl VerdictCache {
    pub fn new(db: Arc<Database>, config: CacheConfig) -> Self {
        Self { db, config }
    }

    /// Look up a digest.
    ///
    /// Returns `None` for absent, expired or unreadable rows. A served hit
    /// increments the row's hit count and carries a confidence derived from
    /// verdict kind, engine coverage, age and the new hit count.
    pub fn lookup(&self, digest: &str) -> Result<Option<CachedVerdict>, StoreError> {
        let now = Utc::now().timestamp();

        let row = {
            let conn = self.db.conn();
            conn.query_row(
                "SELECT file_name, file_size, verdict, cached_at, expires_at, hit_count
                 FROM verdict_cache WHERE digest = ?1",
                params![digest],
                |row| {
                    Ok((
                        row.get::<_, String>(0)?,
                        row.get::<_, i64>(1)?,
                        row.get::<_, String>(2)?,
                        row.get::<_, i64>(3)?,
                        row.get::<_, i64>(4)?,
                        row.get::<_, i64>(5)?,
                    ))
                },
            )
            .optional()?
        };

        let (file_name, file_size, verdict_json, cached_at, expires_at, hit_count) = match row {
            Some(row) => row,
            None => return Ok(None),
        };

        if now >= expires_at {
            return Ok(None);
        }

        let stored: StoredVerdict = match serde_json::from_str(&verdict_json) {
            Ok(v) => v,
            Err(e) => {
                log::warn!("Dropping unreadable cache row for {}: {}", digest, e);
                self.db
                    .conn()
                    .execute("DELETE FROM verdict_cache WHERE digest = ?1", params![digest])?;
                return Ok(None);
            }
        };

        let new_hits = hit_count + 1;
        self.db.conn().execute(
            "UPDATE verdict_cache SET hit_count = ?1 WHERE digest = ?2",
            params![new_hits, digest],
        )?;

        let confidence = confidence::confidence(
            stored.kind,
            stored.total_engines,
            new_hits as u32,
            cached_at,
            expires_at,
            now,
        );

        Ok(Some(CachedVerdict {
            digest: digest.to_string(),
            file_name,
            file_size: file_size as u64,
            kind: stored.kind,
            positives: stored.positives,
            total_engines: stored.total_engines,
            cached_at,
            expires_at,
            confidence,
            hit_count: new_hits as u32,
        }))
    }

    /// Insert or replace the verdict for a digest.
    ///
    /// Expiry depends on the verdict kind. Indeterminate (error) results
    /// are never cached. A replace starts a fresh hit count.
    pub fn store(
        &self,
        digest: &str,
        file_name: &str,
        file_size: u64,
        verdict: StoredVerdict,
    ) -> Result<(), StoreError> {
        let ttl_days = match verdict.kind {
            VerdictKind::Threat => self.config.threat_ttl_days,
            VerdictKind::Clean => self.config.clean_ttl_days,
            VerdictKind::Error => {
                log::debug!("Indeterminate result for {} not cached", digest);
                return Ok(());
            }
        };

        let now = Utc::now().timestamp();
        let expires_at = now + ttl_days * 86_400;
        let verdict_json = serde_json::to_string(&verdict)?;

        self.db.conn().execute(
            "INSERT OR REPLACE INTO verdict_cache
             (digest, file_name, file_size, verdict, cached_at, expires_at, hit_count)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, 0)",
            params![digest, file_name, file_size as i64, verdict_json, now, expires_at],
        )?;

        let swept = self.sweep_expired()?;
        if swept > 0 {
            log::debug!("Swept {} expired cache entries", swept);
        }

        Ok(())
    }

    /// Delete all rows past expiry, returning how many were removed
    pub fn sweep_expired(&self) -> Result<usize, StoreError> {
        let now = Utc::now().timestamp();
        let removed = self
            .db
            .conn()
            .execute("DELETE FROM verdict_cache WHERE expires_at <= ?1", params![now])?;
        Ok(removed)
    }

    /// Whether a served hit is strong enough to skip the remote scan
    pub fn is_trusted(&self, verdict: &CachedVerdict) -> bool {
        verdict.confidence >= self.config.trust_threshold
    }

    pub fn entry_count(&self) -> Result<usize, StoreError> {
        let count: i64 = self
            .db
            .conn()
            .query_row("SELECT COUNT(*) FROM verdict_cache", [], |row| row.get(0))?;
        Ok(count as usize)
    }
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn test_config() -> CacheConfig {
        CacheConfig {
            clean_ttl_days: 3,
            threat_ttl_days: 30,
            trust_threshold: 80.0,
        }
    }

    fn test_cache() -> (Arc<Database>, VerdictCache) {
        let db = Arc::new(Database::open_in_memory().unwrap());
        let cache = VerdictCache::new(Arc::clone(&db), test_config());
        (db, cache)
    }

    fn threat_verdict() -> StoredVerdict {
        StoredVerdict {
            kind: VerdictKind::Threat,
            positives: 12,
            total_engines: 70,
        }
    }

    #[test]
    fn test_store_then_lookup() {
        let (_db, cache) = test_cache();
        cache.store("abc123", "evil.exe", 2048, threat_verdict()).unwrap();

        let hit = cache.lookup("abc123").unwrap().unwrap();
        assert_eq!(hit.kind, VerdictKind::Threat);
        assert_eq!(hit.positives, 12);
        assert_eq!(hit.total_engines, 70);
        assert_eq!(hit.file_name, "evil.exe");
        assert_eq!(hit.hit_count, 1);
        assert!(hit.confidence > 80.0);

        let again = cache.lookup("abc123").unwrap().unwrap();
        assert_eq!(again.hit_count, 2);
    }

    #[test]
    fn test_unknown_digest_is_a_miss() {
        let (_db, cache) = test_cache();
        assert!(cache.lookup("nope").unwrap().is_none());
    }

    #[test]
    fn test_error_verdicts_are_not_cached() {
        let (_db, cache) = test_cache();
        cache
            .store(
                "abc123",
                "weird.bin",
                10,
                StoredVerdict {
                    kind: VerdictKind::Error,
                    positives: 0,
                    total_engines: 0,
                },
            )
            .unwrap();

        assert!(cache.lookup("abc123").unwrap().is_none());
        assert_eq!(cache.entry_count().unwrap(), 0);
    }

    #[test]
    fn test_expired_entry_is_a_miss_and_swept() {
        let (db, cache) = test_cache();
        cache.store("abc123", "old.exe", 10, threat_verdict()).unwrap();

        db.conn()
            .execute("UPDATE verdict_cache SET expires_at = 1", [])
            .unwrap();

        assert!(cache.lookup("abc123").unwrap().is_none());
        assert_eq!(cache.sweep_expired().unwrap(), 1);
        assert_eq!(cache.entry_count().unwrap(), 0);
    }

    #[test]
    fn test_corrupt_row_is_dropped_as_miss() {
        let (db, cache) = test_cache();
        cache.store("abc123", "mangled.exe", 10, threat_verdict()).unwrap();

        db.conn()
            .execute("UPDATE verdict_cache SET verdict = 'not json'", [])
            .unwrap();

        assert!(cache.lookup("abc123").unwrap().is_none());
        assert_eq!(cache.entry_count().unwrap(), 0);
    }

    #[test]
    fn test_threat_expiry_outlives_clean_expiry() {
        let (db, cache) = test_cache();
        cache.store("thr", "a.exe", 10, threat_verdict()).unwrap();
        cache
            .store(
                "cln",
                "b.txt",
                10,
                StoredVerdict {
                    kind: VerdictKind::Clean,
                    positives: 0,
                    total_engines: 70,
                },
            )
            .unwrap();

        let conn = db.conn();
        let threat_expiry: i64 = conn
            .query_row(
                "SELECT expires_at FROM verdict_cache WHERE digest = 'thr'",
                [],
                |row| row.get(0),
            )
            .unwrap();
        let clean_expiry: i64 = conn
            .query_row(
                "SELECT expires_at FROM verdict_cache WHERE digest = 'cln'",
                [],
                |row| row.get(0),
            )
            .unwrap();

        assert!(threat_expiry > clean_expiry);
    }

    #[test]
    fn test_trust_follows_threshold() {
        let (db, _) = test_cache();
        let strict = VerdictCache::new(
            Arc::clone(&db),
            CacheConfig {
                trust_threshold: 99.9,
                ..test_config()
            },
        );

        strict.store("abc123", "evil.exe", 10, threat_verdict()).unwrap();
        let hit = strict.lookup("abc123").unwrap().unwrap();
        assert!(!strict.is_trusted(&hit));

        let lenient = VerdictCache::new(Arc::clone(&db), test_config());
        let hit = lenient.lookup("abc123").unwrap().unwrap();
        assert!(lenient.is_trusted(&hit));
    }

    #[test]
    fn test_restore_replaces_and_resets_hits() {
        let (_db, cache) = test_cache();
        cache.store("abc123", "evil.exe", 10, threat_verdict()).unwrap();
        cache.lookup("abc123").unwrap();
        cache.lookup("abc123").unwrap();

        cache
            .store(
                "abc123",
                "evil.exe",
                10,
                StoredVerdict {
                    kind: VerdictKind::Clean,
                    positives: 0,
                    total_engines: 65,
                },
            )
            .unwrap();

        let hit = cache.lookup("abc123").unwrap().unwrap();
        assert_eq!(hit.kind, VerdictKind::Clean);
        assert_eq!(hit.hit_count, 1);
    }
}
