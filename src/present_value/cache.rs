//! Memo store for commutation columns
//!
//! A column holds one commutation quantity for every age `0..=OMEGA` under a
//! fixed (sex, table, rate, cohort origin). Columns are computed on first request and kept
//! for the lifetime of the cache; nothing is ever invalidated, which is sound
//! only because tables and rates are immutable once loaded.
//!
//! Inserts follow insert-if-absent: when two callers race on the same key the
//! first stored column wins and both get it back, so every caller observes the
//! same bits. Reads share a lock and never wait on each other.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, PoisonError, RwLock};

use serde::Serialize;

use super::commutation::Quantity;
use crate::mortality::{Sex, TableId};

/// Key of one cached column
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ColumnKey {
    pub quantity: Quantity,
    pub sex: Sex,
    pub table: TableId,
    /// Age at which the cohort starts with `RADIX` lives
    pub origin: u32,
    rate_bits: u64,
}

impl ColumnKey {
    pub fn new(quantity: Quantity, sex: Sex, table: TableId, rate: f64) -> Self {
        Self {
            quantity,
            sex,
            table,
            origin: 0,
            rate_bits: rate.to_bits(),
        }
    }

    /// Same column for a cohort restarted at `origin`
    pub fn rebased(self, origin: u32) -> Self {
        Self { origin, ..self }
    }

    pub fn rate(&self) -> f64 {
        f64::from_bits(self.rate_bits)
    }
}

/// Snapshot of cache usage
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
    pub entries: usize,
}

impl CacheStats {
    pub fn hit_rate(&self) -> f64 {
        let total = self.hits + self.misses;
        if total == 0 {
            0.0
        } else {
            self.hits as f64 / total as f64
        }
    }
}

#[derive(Debug, Default)]
pub struct CommutationCache {
    columns: RwLock<HashMap<ColumnKey, Arc<[f64]>>>,
    hits: AtomicU64,
    misses: AtomicU64,
}

impl CommutationCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Cached column, recording a hit or a miss
    pub fn get(&self, key: &ColumnKey) -> Option<Arc<[f64]>> {
        let found = self
            .columns
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(key)
            .cloned();

        let counter = if found.is_some() { &self.hits } else { &self.misses };
        counter.fetch_add(1, Ordering::Relaxed);
        found
    }

    /// Store `column` unless `key` is already present; returns the stored column
    pub fn insert_if_absent(&self, key: ColumnKey, column: Arc<[f64]>) -> Arc<[f64]> {
        let mut columns = self.columns.write().unwrap_or_else(PoisonError::into_inner);
        Arc::clone(columns.entry(key).or_insert(column))
    }

    /// Cached column for `key`, computing it with `build` on a miss
    ///
    /// `build` runs outside the lock, so concurrent misses on one key may
    /// both compute; only the first result is kept.
    pub fn get_or_try_insert_with<E>(
        &self,
        key: ColumnKey,
        build: impl FnOnce() -> Result<Vec<f64>, E>,
    ) -> Result<Arc<[f64]>, E> {
        if let Some(column) = self.get(&key) {
            return Ok(column);
        }
        let column: Arc<[f64]> = build()?.into();
        Ok(self.insert_if_absent(key, column))
    }

    pub fn len(&self) -> usize {
        self.columns.read().unwrap_or_else(PoisonError::into_inner).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn stats(&self) -> CacheStats {
        CacheStats {
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            entries: self.len(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn key(rate: f64) -> ColumnKey {
        ColumnKey::new(Quantity::Dx, Sex::Male, TableId::Iam2012Basic, rate)
    }

    #[test]
    fn test_first_writer_wins() {
        let cache = CommutationCache::new();

        let first = cache.insert_if_absent(key(0.02), vec![1.0, 2.0].into());
        let second = cache.insert_if_absent(key(0.02), vec![9.0, 9.0].into());

        assert_eq!(&*first, &[1.0, 2.0]);
        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn test_keys_distinguish_rates() {
        let cache = CommutationCache::new();
        cache.insert_if_absent(key(0.02), vec![1.0].into());

        assert!(cache.get(&key(0.02)).is_some());
        assert!(cache.get(&key(0.0200001)).is_none());
        assert_eq!(key(0.0175).rate(), 0.0175);
    }

    #[test]
    fn test_keys_distinguish_origins() {
        let cache = CommutationCache::new();
        cache.insert_if_absent(key(0.02), vec![1.0].into());

        assert!(cache.get(&key(0.02).rebased(0)).is_some());
        assert!(cache.get(&key(0.02).rebased(122)).is_none());
        assert_eq!(key(0.02).rebased(122).origin, 122);
    }

    #[test]
    fn test_stats() {
        let cache = CommutationCache::new();
        assert!(cache.is_empty());

        let built = cache
            .get_or_try_insert_with(key(0.01), || Ok::<_, ()>(vec![3.0]))
            .unwrap();
        let again = cache
            .get_or_try_insert_with(key(0.01), || Err(()))
            .unwrap();
        assert!(Arc::ptr_eq(&built, &again));

        let stats = cache.stats();
        assert_eq!(stats, CacheStats { hits: 1, misses: 1, entries: 1 });
        assert!((stats.hit_rate() - 0.5).abs() < 1e-12);
    }

    #[test]
    fn test_failed_build_is_not_cached() {
        let cache = CommutationCache::new();
        let result = cache.get_or_try_insert_with(key(0.03), || Err::<Vec<f64>, _>("no table"));
        assert_eq!(result.unwrap_err(), "no table");
        assert!(cache.is_empty());
    }
}
