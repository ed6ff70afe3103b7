use std::collections::HashMap;
use std::sync::{Arc, RwLock};
use std::time::{Duration, Instant};

use log::{debug, info};
use tokio::task::JoinHandle;

pub const VERIFY_CODE: &str = "verifyCode";

#[derive(Debug, Clone, Copy)]
pub struct CacheSpec {
    pub ttl: Duration,
    pub cache_null_values: bool,
}

struct Entry<V> {
    value: V,
    expires_at: Instant,
}

/// Named caches, each with its own time-to-live. Expired entries are dropped
/// lazily on read and by [`TtlCache::purge_expired`].
pub struct TtlCache<V> {
    specs: HashMap<String, CacheSpec>,
    default_spec: CacheSpec,
    entries: RwLock<HashMap<(String, String), Entry<V>>>,
}

impl<V: Clone> TtlCache<V> {
    pub fn new(default_ttl: Duration) -> Self {
        Self {
            specs: HashMap::new(),
            default_spec: CacheSpec {
                ttl: default_ttl,
                cache_null_values: false,
            },
            entries: RwLock::new(HashMap::new()),
        }
    }

    pub fn with_cache(mut self, name: &str, spec: CacheSpec) -> Self {
        self.specs.insert(name.to_string(), spec);
        self
    }

    fn spec(&self, cache: &str) -> CacheSpec {
        self.specs.get(cache).copied().unwrap_or(self.default_spec)
    }

    pub fn get(&self, cache: &str, key: &str) -> Option<V> {
        let id = (cache.to_string(), key.to_string());
        {
            let entries = self.entries.read().ok()?;
            match entries.get(&id) {
                Some(e) if e.expires_at > Instant::now() => return Some(e.value.clone()),
                None => return None,
                Some(_) => {}
            }
        }
        if let Ok(mut entries) = self.entries.write() {
            entries.remove(&id);
        }
        None
    }

    /// Stores `value`; a `None` is skipped unless the cache keeps nulls, in
    /// which case it evicts the key.
    pub fn put(&self, cache: &str, key: &str, value: Option<V>) {
        let spec = self.spec(cache);
        let Ok(mut entries) = self.entries.write() else {
            return;
        };
        let id = (cache.to_string(), key.to_string());
        match value {
            Some(value) => {
                entries.insert(
                    id,
                    Entry {
                        value,
                        expires_at: Instant::now() + spec.ttl,
                    },
                );
            }
            None if spec.cache_null_values => {
                entries.remove(&id);
            }
            None => {}
        }
    }

    pub fn evict(&self, cache: &str, key: &str) {
        if let Ok(mut entries) = self.entries.write() {
            entries.remove(&(cache.to_string(), key.to_string()));
        }
    }

    pub fn clear(&self, cache: &str) {
        if let Ok(mut entries) = self.entries.write() {
            entries.retain(|(name, _), _| name != cache);
        }
    }

    pub fn purge_expired(&self) -> usize {
        let Ok(mut entries) = self.entries.write() else {
            return 0;
        };
        let before = entries.len();
        let now = Instant::now();
        entries.retain(|_, e| e.expires_at > now);
        before - entries.len()
    }
}

impl<V: Clone + Send + Sync + 'static> TtlCache<V> {
    /// Purges expired entries every `period` until the handle is aborted.
    /// Must be called inside a tokio runtime.
    pub fn spawn_purger(self: Arc<Self>, period: Duration) -> JoinHandle<()> {
        tokio::spawn(async move {
            let mut ticks = tokio::time::interval(period);
            ticks.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            loop {
                ticks.tick().await;
                let purged = self.purge_expired();
                if purged > 0 {
                    info!("purged {purged} expired cache entries");
                }
            }
        })
    }
}

/// Verification codes keyed by an identity (phone, email, ...).
#[derive(Clone)]
pub struct VerifyCodeCache {
    cache: Arc<TtlCache<String>>,
}

impl VerifyCodeCache {
    pub fn new(cache: Arc<TtlCache<String>>) -> Self {
        Self { cache }
    }

    /// Backing cache with `verifyCode` kept one minute.
    pub fn default_backend() -> TtlCache<String> {
        TtlCache::new(Duration::from_secs(60)).with_cache(
            VERIFY_CODE,
            CacheSpec {
                ttl: Duration::from_secs(60),
                cache_null_values: false,
            },
        )
    }

    pub fn get_verify_code_by(&self, identify: &str) -> Option<String> {
        let code = self.cache.get(VERIFY_CODE, identify);
        debug!("verify code of {identify}: {code:?}");
        code
    }

    pub fn upsert_verify_code_by(&self, identify: &str, value: &str) -> String {
        self.cache
            .put(VERIFY_CODE, identify, Some(value.to_string()));
        value.to_string()
    }

    pub fn remove_verify_code_by(&self, identify: &str) {
        self.cache.evict(VERIFY_CODE, identify);
    }

    pub fn clear_all_verify_code(&self) {
        self.cache.clear(VERIFY_CODE);
    }

    /// Starts the background sweep of the backing cache.
    pub fn spawn_purger(&self, period: Duration) -> JoinHandle<()> {
        self.cache.clone().spawn_purger(period)
    }
}

impl Default for VerifyCodeCache {
    fn default() -> Self {
        Self::new(Arc::new(Self::default_backend()))
    }
}

#[cfg(test)]
mod tests {
    use std::thread::sleep;

    use super::*;

    #[test]
    fn upsert_then_get_then_remove() {
        let codes = VerifyCodeCache::default();
        assert_eq!(codes.get_verify_code_by("+95-1"), None);
        assert_eq!(codes.upsert_verify_code_by("+95-1", "123456"), "123456");
        assert_eq!(codes.get_verify_code_by("+95-1").as_deref(), Some("123456"));
        codes.upsert_verify_code_by("+95-1", "654321");
        assert_eq!(codes.get_verify_code_by("+95-1").as_deref(), Some("654321"));
        codes.remove_verify_code_by("+95-1");
        assert_eq!(codes.get_verify_code_by("+95-1"), None);
    }

    #[test]
    fn clear_all_only_touches_verify_codes() {
        let backend = Arc::new(VerifyCodeCache::default_backend());
        backend.put("other", "k", Some("v".to_string()));
        let codes = VerifyCodeCache::new(backend.clone());
        codes.upsert_verify_code_by("a", "1");
        codes.upsert_verify_code_by("b", "2");
        codes.clear_all_verify_code();
        assert_eq!(codes.get_verify_code_by("a"), None);
        assert_eq!(codes.get_verify_code_by("b"), None);
        assert_eq!(backend.get("other", "k").as_deref(), Some("v"));
    }

    #[test]
    fn entries_expire() {
        let cache = TtlCache::new(Duration::from_millis(30));
        cache.put("c", "k", Some(1));
        assert_eq!(cache.get("c", "k"), Some(1));
        sleep(Duration::from_millis(60));
        assert_eq!(cache.get("c", "k"), None);

        cache.put("c", "a", Some(2));
        sleep(Duration::from_millis(60));
        assert_eq!(cache.purge_expired(), 1);
    }

    #[tokio::test]
    async fn purger_sweeps_entries_nobody_reads() {
        let backend = Arc::new(TtlCache::new(Duration::from_millis(20)));
        backend.put("c", "stale", Some(1));
        let purger = backend.clone().spawn_purger(Duration::from_millis(10));

        tokio::time::sleep(Duration::from_millis(120)).await;
        purger.abort();
        assert_eq!(backend.purge_expired(), 0);
        assert!(backend.entries.read().unwrap().is_empty());
    }

    #[tokio::test]
    async fn verify_code_purger_keeps_live_codes() {
        let codes = VerifyCodeCache::default();
        codes.upsert_verify_code_by("a", "1");
        let purger = codes.spawn_purger(Duration::from_millis(10));

        tokio::time::sleep(Duration::from_millis(50)).await;
        purger.abort();
        assert_eq!(codes.get_verify_code_by("a").as_deref(), Some("1"));
    }

    #[test]
    fn nulls_are_not_cached() {
        let cache: TtlCache<String> = TtlCache::new(Duration::from_secs(60));
        cache.put("c", "k", None);
        assert_eq!(cache.get("c", "k"), None);

        cache.put("c", "k", Some("x".into()));
        cache.put("c", "k", None);
        assert_eq!(cache.get("c", "k").as_deref(), Some("x"));
    }
}
