use async_trait::async_trait;
use glob::Pattern;
use outbox_relay_core::error::{RelayError, RelayResult};
use outbox_relay_core::traits::DeadLetterStore;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;
use tokio::time::Instant;

#[derive(Debug, Clone)]
struct Entry {
    payload: Vec<u8>,
    expires_at: Instant,
}

impl Entry {
    fn is_live(&self, now: Instant) -> bool {
        now < self.expires_at
    }
}

/// In-memory dead-letter store.
///
/// Entries expire after their TTL; expired entries are invisible to every
/// operation and are pruned on write. Listing understands the same glob
/// syntax as the Redis adapter (`*`, `?`, `[..]` classes and `\` escapes).
#[derive(Debug, Clone, Default)]
pub struct InMemoryDeadLetterStore {
    entries: Arc<RwLock<HashMap<String, Entry>>>,
    fail_saves: Arc<AtomicBool>,
    fail_deletes: Arc<AtomicBool>,
}

impl InMemoryDeadLetterStore {
    /// Creates an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes every subsequent `save` fail with a store error.
    pub fn set_fail_saves(&self, fail: bool) {
        self.fail_saves.store(fail, Ordering::SeqCst);
    }

    /// Makes every subsequent `delete` fail with a store error.
    pub fn set_fail_deletes(&self, fail: bool) {
        self.fail_deletes.store(fail, Ordering::SeqCst);
    }

    /// Returns true if a live entry exists under `key`.
    pub async fn contains(&self, key: &str) -> bool {
        let now = Instant::now();
        self.entries
            .read()
            .await
            .get(key)
            .is_some_and(|entry| entry.is_live(now))
    }

    /// Returns the number of live entries.
    pub async fn len(&self) -> usize {
        let now = Instant::now();
        self.entries
            .read()
            .await
            .values()
            .filter(|entry| entry.is_live(now))
            .count()
    }

    /// Returns true if the store holds no live entries.
    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }

    /// Clears all stored data.
    pub async fn clear(&self) {
        self.entries.write().await.clear();
    }
}

#[async_trait]
impl DeadLetterStore for InMemoryDeadLetterStore {
    async fn save(&self, key: &str, payload: &[u8], ttl: Duration) -> RelayResult<()> {
        if self.fail_saves.load(Ordering::SeqCst) {
            return Err(RelayError::store("injected save failure"));
        }

        let now = Instant::now();
        let mut entries = self.entries.write().await;
        entries.retain(|_, entry| entry.is_live(now));
        entries.insert(
            key.to_string(),
            Entry {
                payload: payload.to_vec(),
                expires_at: now + ttl,
            },
        );
        Ok(())
    }

    async fn get(&self, key: &str) -> RelayResult<Vec<u8>> {
        let now = Instant::now();
        let entries = self.entries.read().await;
        entries
            .get(key)
            .filter(|entry| entry.is_live(now))
            .map(|entry| entry.payload.clone())
            .ok_or_else(|| RelayError::not_found(key))
    }

    async fn delete(&self, key: &str) -> RelayResult<()> {
        if self.fail_deletes.load(Ordering::SeqCst) {
            return Err(RelayError::store("injected delete failure"));
        }

        self.entries.write().await.remove(key);
        Ok(())
    }

    async fn list(&self, pattern: &str) -> RelayResult<Vec<String>> {
        let matcher = key_pattern(pattern)?;
        let now = Instant::now();
        let entries = self.entries.read().await;
        let mut keys: Vec<String> = entries
            .iter()
            .filter(|(key, entry)| entry.is_live(now) && matcher.matches(key))
            .map(|(key, _)| key.clone())
            .collect();
        keys.sort();
        Ok(keys)
    }
}

/// Compiles a Redis-style key pattern.
///
/// Escaped metacharacters (`\*`, `\?`, `\[`, `\]`) become single-character
/// classes. Runs of `*` collapse since `glob` reserves `**` for paths.
fn key_pattern(pattern: &str) -> RelayResult<Pattern> {
    let mut translated = String::with_capacity(pattern.len());
    let mut chars = pattern.chars();
    while let Some(c) = chars.next() {
        match c {
            '\\' => match chars.next() {
                Some(escaped @ ('*' | '?' | '[' | ']')) => {
                    translated.push('[');
                    translated.push(escaped);
                    translated.push(']');
                }
                Some(escaped) => translated.push(escaped),
                None => translated.push('\\'),
            },
            '*' if translated.ends_with('*') => {}
            _ => translated.push(c),
        }
    }

    Pattern::new(&translated)
        .map_err(|e| RelayError::store(format!("invalid key pattern {pattern:?}: {e}")))
}
