//! # Outbox Relay Redis Adapter
//!
//! Redis-backed dead-letter store. Entries are plain string keys written with
//! `PSETEX`, so Redis expires them on its own; listing walks the keyspace
//! with a cursor `SCAN` rather than blocking the server with `KEYS`.

use async_trait::async_trait;
use outbox_relay_core::error::{RelayError, RelayResult};
use outbox_relay_core::traits::DeadLetterStore;
use redis::aio::MultiplexedConnection;
use redis::Client;
use std::collections::BTreeSet;
use std::time::Duration;

/// Keys requested per `SCAN` round trip.
pub const DEFAULT_SCAN_COUNT: usize = 100;

/// Dead-letter store over a multiplexed Redis connection.
///
/// The connection is cloned per command and is safe to share across tasks.
#[derive(Clone)]
pub struct RedisDeadLetterStore {
    conn: MultiplexedConnection,
    scan_count: usize,
}

impl RedisDeadLetterStore {
    /// Creates a store from an open connection.
    pub fn new(conn: MultiplexedConnection) -> Self {
        Self {
            conn,
            scan_count: DEFAULT_SCAN_COUNT,
        }
    }

    /// Connects to Redis at `url`.
    pub async fn connect(url: &str) -> RelayResult<Self> {
        let client = Client::open(url).map_err(|e| RelayError::store(e.to_string()))?;
        let conn = client
            .get_multiplexed_async_connection()
            .await
            .map_err(|e| RelayError::store(e.to_string()))?;

        tracing::info!(url = %url, "Connected to Redis dead-letter store");
        Ok(Self::new(conn))
    }

    /// Sets the `SCAN` batch size hint.
    pub fn scan_count(mut self, count: usize) -> Self {
        self.scan_count = count.max(1);
        self
    }
}

/// Converts a TTL to the millisecond argument `PSETEX` accepts.
///
/// Redis rejects non-positive expiries, so sub-millisecond TTLs round up.
fn ttl_millis(ttl: Duration) -> u64 {
    u64::try_from(ttl.as_millis()).unwrap_or(u64::MAX).max(1)
}

#[async_trait]
impl DeadLetterStore for RedisDeadLetterStore {
    async fn save(&self, key: &str, payload: &[u8], ttl: Duration) -> RelayResult<()> {
        let mut conn = self.conn.clone();
        let _: () = redis::cmd("PSETEX")
            .arg(key)
            .arg(ttl_millis(ttl))
            .arg(payload)
            .query_async(&mut conn)
            .await
            .map_err(|e| RelayError::store(e.to_string()))?;
        Ok(())
    }

    async fn get(&self, key: &str) -> RelayResult<Vec<u8>> {
        let mut conn = self.conn.clone();
        let value: Option<Vec<u8>> = redis::cmd("GET")
            .arg(key)
            .query_async(&mut conn)
            .await
            .map_err(|e| RelayError::store(e.to_string()))?;

        value.ok_or_else(|| RelayError::not_found(key))
    }

    async fn delete(&self, key: &str) -> RelayResult<()> {
        let mut conn = self.conn.clone();
        let _: i64 = redis::cmd("DEL")
            .arg(key)
            .query_async(&mut conn)
            .await
            .map_err(|e| RelayError::store(e.to_string()))?;
        Ok(())
    }

    async fn list(&self, pattern: &str) -> RelayResult<Vec<String>> {
        let mut conn = self.conn.clone();
        // SCAN may return a key more than once across batches.
        let mut keys = BTreeSet::new();
        let mut cursor: u64 = 0;

        loop {
            let (next, batch): (u64, Vec<String>) = redis::cmd("SCAN")
                .arg(cursor)
                .arg("MATCH")
                .arg(pattern)
                .arg("COUNT")
                .arg(self.scan_count)
                .query_async(&mut conn)
                .await
                .map_err(|e| RelayError::store(e.to_string()))?;

            keys.extend(batch);
            if next == 0 {
                break;
            }
            cursor = next;
        }

        Ok(keys.into_iter().collect())
    }
}
