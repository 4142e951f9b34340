use async_trait::async_trait;
use dashmap::DashMap;
use redis::aio::ConnectionManager;
use redis::AsyncCommands;
use redis_utils::{with_timeout, RedisPool};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use thiserror::Error;
use tracing::{debug, warn};

use crate::metrics::views::record_op;

/// Item type used for post view counters.
pub const POST_ITEM_TYPE: &str = "post";

#[derive(Debug, Error)]
pub enum CounterError {
    /// The store could not be reached or timed out
    #[error("counter store unavailable: {0}")]
    StoreUnavailable(String),

    /// The key could not be formed from the supplied identifiers
    #[error("invalid counter key: {0}")]
    InvalidKey(String),
}

/// Key/value backend for view counters.
///
/// `incr` must be atomic with respect to concurrent callers.
#[async_trait]
pub trait CounterStore: Send + Sync {
    /// Atomically add one to `key`, creating it at zero first. Returns the new value.
    async fn incr(&self, key: &str) -> Result<i64, CounterError>;

    async fn get(&self, key: &str) -> Result<Option<i64>, CounterError>;

    /// Fetch several keys in one round-trip. Output is aligned with `keys`.
    async fn mget(&self, keys: &[String]) -> Result<Vec<Option<i64>>, CounterError>;
}

/// Redis-backed store: `INCR`, `GET` and `MGET` against a shared connection manager.
#[derive(Clone)]
pub struct RedisCounterStore {
    redis: ConnectionManager,
    command_timeout: Duration,
}

impl RedisCounterStore {
    pub fn new(pool: &RedisPool) -> Self {
        Self::from_manager(pool.manager(), pool.command_timeout())
    }

    pub fn from_manager(redis: ConnectionManager, command_timeout: Duration) -> Self {
        Self {
            redis,
            command_timeout,
        }
    }
}

fn unavailable(err: redis::RedisError) -> CounterError {
    CounterError::StoreUnavailable(err.to_string())
}

#[async_trait]
impl CounterStore for RedisCounterStore {
    async fn incr(&self, key: &str) -> Result<i64, CounterError> {
        let mut conn = self.redis.clone();
        with_timeout(self.command_timeout, conn.incr(key, 1))
            .await
            .map_err(unavailable)
    }

    async fn get(&self, key: &str) -> Result<Option<i64>, CounterError> {
        let mut conn = self.redis.clone();
        with_timeout(self.command_timeout, conn.get(key))
            .await
            .map_err(unavailable)
    }

    async fn mget(&self, keys: &[String]) -> Result<Vec<Option<i64>>, CounterError> {
        if keys.is_empty() {
            return Ok(Vec::new());
        }

        let mut conn = self.redis.clone();
        with_timeout(
            self.command_timeout,
            redis::cmd("MGET").arg(keys).query_async(&mut conn),
        )
        .await
        .map_err(unavailable)
    }
}

/// Process-local store for development and tests.
#[derive(Default)]
pub struct InMemoryCounterStore {
    values: DashMap<String, i64>,
}

impl InMemoryCounterStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl CounterStore for InMemoryCounterStore {
    async fn incr(&self, key: &str) -> Result<i64, CounterError> {
        let mut entry = self.values.entry(key.to_string()).or_insert(0);
        *entry += 1;
        Ok(*entry)
    }

    async fn get(&self, key: &str) -> Result<Option<i64>, CounterError> {
        Ok(self.values.get(key).map(|v| *v))
    }

    async fn mget(&self, keys: &[String]) -> Result<Vec<Option<i64>>, CounterError> {
        Ok(keys
            .iter()
            .map(|key| self.values.get(key).map(|v| *v))
            .collect())
    }
}

/// Per-item view counter.
///
/// Keys have the form `<item_type>:<item_id>:views`. Counters are never
/// decremented or reset here, and a counter that was never incremented reads
/// as zero.
#[derive(Clone)]
pub struct ViewCounter {
    store: Arc<dyn CounterStore>,
    item_type: &'static str,
}

impl ViewCounter {
    /// Counter for posts.
    pub fn new(store: Arc<dyn CounterStore>) -> Self {
        Self::for_item_type(store, POST_ITEM_TYPE)
    }

    pub fn for_item_type(store: Arc<dyn CounterStore>, item_type: &'static str) -> Self {
        Self { store, item_type }
    }

    pub fn key(&self, item_id: i64) -> Result<String, CounterError> {
        counter_key(self.item_type, item_id)
    }

    /// Add one view to `item_id`.
    pub async fn increment(&self, item_id: i64) -> Result<(), CounterError> {
        let key = self.key(item_id)?;
        let started = Instant::now();
        let result = self.store.incr(&key).await;
        record_op("increment", result.is_ok(), started.elapsed().as_secs_f64());

        let count = result?;
        debug!(key = %key, count, "view recorded");
        Ok(())
    }

    /// Current count for `item_id`; zero when the key does not exist.
    pub async fn read(&self, item_id: i64) -> Result<i64, CounterError> {
        let key = self.key(item_id)?;
        let started = Instant::now();
        let result = self.store.get(&key).await;
        record_op("read", result.is_ok(), started.elapsed().as_secs_f64());

        Ok(result?.unwrap_or(0).max(0))
    }

    /// Counts for several items in a single store round-trip.
    pub async fn read_many(&self, item_ids: &[i64]) -> Result<HashMap<i64, i64>, CounterError> {
        if item_ids.is_empty() {
            return Ok(HashMap::new());
        }

        let keys = item_ids
            .iter()
            .map(|id| self.key(*id))
            .collect::<Result<Vec<_>, _>>()?;

        let started = Instant::now();
        let result = self.store.mget(&keys).await;
        record_op("read_many", result.is_ok(), started.elapsed().as_secs_f64());

        let values = result?;
        Ok(item_ids
            .iter()
            .zip(values.into_iter().chain(std::iter::repeat(None)))
            .map(|(id, value)| (*id, value.unwrap_or(0).max(0)))
            .collect())
    }

    /// Increment without failing the caller. Store errors are logged.
    pub async fn record_view(&self, item_id: i64) {
        if let Err(err) = self.increment(item_id).await {
            warn!(item_type = self.item_type, item_id, error = %err, "failed to record view");
        }
    }

    /// Count for display; `None` when the store is unavailable.
    pub async fn display_views(&self, item_id: i64) -> Option<i64> {
        match self.read(item_id).await {
            Ok(count) => Some(count),
            Err(err) => {
                warn!(item_type = self.item_type, item_id, error = %err, "failed to read views");
                None
            }
        }
    }

    /// Counts for display; empty when the store is unavailable.
    pub async fn display_views_many(&self, item_ids: &[i64]) -> HashMap<i64, i64> {
        match self.read_many(item_ids).await {
            Ok(counts) => counts,
            Err(err) => {
                warn!(item_type = self.item_type, error = %err, "failed to read views");
                HashMap::new()
            }
        }
    }
}

/// Build `<item_type>:<item_id>:views`.
pub fn counter_key(item_type: &str, item_id: i64) -> Result<String, CounterError> {
    if item_type.is_empty() || item_type.contains(':') || item_type.contains(char::is_whitespace)
    {
        return Err(CounterError::InvalidKey(format!(
            "item type '{}' is not a valid key segment",
            item_type
        )));
    }
    if item_id <= 0 {
        return Err(CounterError::InvalidKey(format!(
            "item id {} must be positive",
            item_id
        )));
    }

    Ok(format!("{}:{}:views", item_type, item_id))
}

#[cfg(test)]
pub(crate) mod test_support {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Store whose every call fails, counting attempts.
    #[derive(Default)]
    pub(crate) struct DownStore {
        calls: AtomicUsize,
    }

    impl DownStore {
        pub(crate) fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }

        fn refuse(&self) -> CounterError {
            self.calls.fetch_add(1, Ordering::SeqCst);
            CounterError::StoreUnavailable("connection refused".into())
        }
    }

    #[async_trait]
    impl CounterStore for DownStore {
        async fn incr(&self, _key: &str) -> Result<i64, CounterError> {
            Err(self.refuse())
        }

        async fn get(&self, _key: &str) -> Result<Option<i64>, CounterError> {
            Err(self.refuse())
        }

        async fn mget(&self, _keys: &[String]) -> Result<Vec<Option<i64>>, CounterError> {
            Err(self.refuse())
        }
    }
}
