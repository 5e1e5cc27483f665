/// 进程内响应缓存
///
/// 固定容量，条目带过期时间，容量满时由 LruCache 淘汰最久未访问的条目。
/// 供列表类接口缓存序列化后的 JSON 响应。

use lru::LruCache;
use serde::Serialize;
use serde_json::Value;
use std::future::Future;
use std::num::NonZeroUsize;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tracing::debug;

struct CacheEntry {
    value: Value,
    expires_at: Instant,
}

struct CacheInner {
    /// 容量为 0 时不缓存任何条目
    entries: Option<LruCache<String, CacheEntry>>,
    /// 每次失效时递增，用于丢弃失效前开始加载的结果
    generation: u64,
    hits: u64,
    misses: u64,
}

impl CacheInner {
    fn new(capacity: usize) -> Self {
        Self {
            entries: NonZeroUsize::new(capacity).map(LruCache::new),
            generation: 0,
            hits: 0,
            misses: 0,
        }
    }

    fn len(&self) -> usize {
        self.entries.as_ref().map_or(0, LruCache::len)
    }

    /// 删除满足条件的条目，返回删除数量
    fn remove_where(&mut self, matches: impl Fn(&str, &CacheEntry) -> bool) -> usize {
        let Some(entries) = self.entries.as_mut() else {
            return 0;
        };

        let keys: Vec<String> = entries
            .iter()
            .filter(|(key, entry)| matches(key.as_str(), entry))
            .map(|(key, _)| key.clone())
            .collect();

        for key in &keys {
            entries.pop(key);
        }
        keys.len()
    }
}

/// 缓存统计
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct CacheStats {
    pub size: usize,
    pub capacity: usize,
    pub hits: u64,
    pub misses: u64,
}

/// LRU 响应缓存（可克隆，内部共享）
#[derive(Clone)]
pub struct ResponseCache {
    inner: Arc<Mutex<CacheInner>>,
    capacity: usize,
    default_ttl: Duration,
}

impl ResponseCache {
    pub fn new(capacity: usize, default_ttl: Duration) -> Self {
        Self {
            inner: Arc::new(Mutex::new(CacheInner::new(capacity))),
            capacity,
            default_ttl,
        }
    }

    /// 读取缓存，过期条目会被顺带删除
    pub async fn get(&self, key: &str) -> Option<Value> {
        let mut guard = self.inner.lock().await;
        let inner = &mut *guard;
        let now = Instant::now();

        let value = inner.entries.as_mut().and_then(|entries| {
            match entries.get(key).map(|entry| now < entry.expires_at) {
                Some(true) => entries.peek(key).map(|entry| entry.value.clone()),
                Some(false) => {
                    entries.pop(key);
                    None
                }
                None => None,
            }
        });

        if value.is_some() {
            inner.hits += 1;
        } else {
            inner.misses += 1;
        }
        value
    }

    /// 使用默认过期时间写入
    pub async fn set(&self, key: impl Into<String>, value: Value) {
        self.set_with_ttl(key, value, self.default_ttl).await;
    }

    pub async fn set_with_ttl(&self, key: impl Into<String>, value: Value, ttl: Duration) {
        let mut inner = self.inner.lock().await;
        let Some(entries) = inner.entries.as_mut() else {
            return;
        };

        let key = key.into();
        let entry = CacheEntry {
            value,
            expires_at: Instant::now() + ttl,
        };
        match entries.push(key.clone(), entry) {
            Some((evicted, _)) if evicted != key => debug!("缓存已满，淘汰条目: {}", evicted),
            _ => {}
        }
    }

    pub async fn clear(&self) {
        let mut inner = self.inner.lock().await;
        if let Some(entries) = inner.entries.as_mut() {
            entries.clear();
        }
        inner.generation += 1;
    }

    /// 删除匹配模式的全部条目，`*` 匹配任意字符序列，如 `networks:*`
    pub async fn invalidate_pattern(&self, pattern: &str) -> usize {
        let mut inner = self.inner.lock().await;
        inner.generation += 1;
        inner.remove_where(|key, _| wildcard_match(pattern, key))
    }

    /// 删除所有已过期条目
    pub async fn cleanup(&self) -> usize {
        let now = Instant::now();
        self.inner
            .lock()
            .await
            .remove_where(|_, entry| now >= entry.expires_at)
    }

    pub async fn stats(&self) -> CacheStats {
        let inner = self.inner.lock().await;
        CacheStats {
            size: inner.len(),
            capacity: self.capacity,
            hits: inner.hits,
            misses: inner.misses,
        }
    }

    /// 命中则直接返回，否则执行 `load` 并缓存其结果
    ///
    /// 加载期间若发生过失效，结果照常返回但不写入缓存。
    pub async fn get_or_try_insert_with<F, Fut, E>(&self, key: &str, load: F) -> Result<Value, E>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<Value, E>>,
    {
        if let Some(value) = self.get(key).await {
            return Ok(value);
        }

        let generation = self.inner.lock().await.generation;
        let value = load().await?;

        let mut inner = self.inner.lock().await;
        if inner.generation != generation {
            debug!("缓存已在加载期间失效，跳过写入: {}", key);
            return Ok(value);
        }
        if let Some(entries) = inner.entries.as_mut() {
            entries.put(
                key.to_string(),
                CacheEntry {
                    value: value.clone(),
                    expires_at: Instant::now() + self.default_ttl,
                },
            );
        }
        Ok(value)
    }

    /// 启动定期清理过期条目的后台任务
    pub fn start_cleanup_task(&self, interval: Duration) -> JoinHandle<()> {
        let cache = self.clone();
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            // 第一次 tick 立即返回
            ticker.tick().await;

            loop {
                ticker.tick().await;
                let removed = cache.cleanup().await;
                if removed > 0 {
                    debug!("缓存清理: 删除了 {} 个过期条目", removed);
                }
            }
        })
    }
}

/// 列表接口的缓存键: `<resource>:list:<k=v&...>`，参数按名称排序并跳过空值
pub fn list_cache_key(resource: &str, params: &[(&str, Option<String>)]) -> String {
    let mut present: Vec<(&str, &str)> = params
        .iter()
        .filter_map(|(name, value)| value.as_deref().map(|v| (*name, v)))
        .collect();
    present.sort_by(|a, b| a.0.cmp(b.0));

    let query = present
        .iter()
        .map(|(name, value)| format!("{}={}", name, value))
        .collect::<Vec<_>>()
        .join("&");

    format!("{}:list:{}", resource, query)
}

/// 仅支持 `*` 的通配匹配
fn wildcard_match(pattern: &str, key: &str) -> bool {
    let (p, k) = (pattern.as_bytes(), key.as_bytes());
    let (mut pi, mut ki) = (0, 0);
    let mut star: Option<usize> = None;
    let mut mark = 0;

    while ki < k.len() {
        if pi < p.len() && p[pi] == b'*' {
            star = Some(pi);
            pi += 1;
            mark = ki;
        } else if pi < p.len() && p[pi] == k[ki] {
            pi += 1;
            ki += 1;
        } else if let Some(s) = star {
            pi = s + 1;
            mark += 1;
            ki = mark;
        } else {
            return false;
        }
    }

    while pi < p.len() && p[pi] == b'*' {
        pi += 1;
    }
    pi == p.len()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tokio::sync::oneshot;

    fn cache(capacity: usize) -> ResponseCache {
        ResponseCache::new(capacity, Duration::from_secs(60))
    }

    #[tokio::test]
    async fn test_get_and_set() {
        let cache = cache(10);
        assert_eq!(cache.get("networks:list:").await, None);

        cache.set("networks:list:", json!({"total": 3})).await;
        assert_eq!(cache.get("networks:list:").await, Some(json!({"total": 3})));

        let stats = cache.stats().await;
        assert_eq!(stats.size, 1);
        assert_eq!(stats.hits, 1);
        assert_eq!(stats.misses, 1);
    }

    #[tokio::test]
    async fn test_expired_entries() {
        let cache = cache(10);
        cache.set_with_ttl("stale", json!(1), Duration::ZERO).await;
        cache.set("fresh", json!(2)).await;

        assert_eq!(cache.cleanup().await, 1);
        assert_eq!(cache.get("stale").await, None);
        assert_eq!(cache.get("fresh").await, Some(json!(2)));

        cache.set_with_ttl("stale", json!(1), Duration::ZERO).await;
        assert_eq!(cache.get("stale").await, None);
        assert_eq!(cache.stats().await.size, 1);
    }

    #[tokio::test]
    async fn test_lru_eviction() {
        let cache = cache(2);
        cache.set("a", json!("a")).await;
        cache.set("b", json!("b")).await;

        // 访问 a 后，b 成为最久未访问的条目
        assert!(cache.get("a").await.is_some());
        cache.set("c", json!("c")).await;

        assert!(cache.get("a").await.is_some());
        assert_eq!(cache.get("b").await, None);
        assert!(cache.get("c").await.is_some());
        assert_eq!(cache.stats().await.size, 2);
    }

    #[tokio::test]
    async fn test_overwrite_does_not_evict() {
        let cache = cache(2);
        cache.set("a", json!(1)).await;
        cache.set("b", json!(2)).await;
        cache.set("a", json!(3)).await;

        assert_eq!(cache.get("a").await, Some(json!(3)));
        assert_eq!(cache.get("b").await, Some(json!(2)));
    }

    #[tokio::test]
    async fn test_zero_capacity_disables_cache() {
        let cache = cache(0);
        cache.set("a", json!(1)).await;
        assert_eq!(cache.get("a").await, None);
    }

    #[tokio::test]
    async fn test_invalidate_pattern() {
        let cache = cache(10);
        cache.set("networks:list:page=1", json!(1)).await;
        cache.set("networks:list:page=2", json!(2)).await;
        cache.set("networks:detail:abc", json!(3)).await;
        cache.set("devices:list:", json!(4)).await;

        assert_eq!(cache.invalidate_pattern("networks:list:*").await, 2);
        assert_eq!(cache.invalidate_pattern("*:detail:*").await, 1);
        assert_eq!(cache.get("devices:list:").await, Some(json!(4)));

        cache.clear().await;
        assert_eq!(cache.stats().await.size, 0);
    }

    #[tokio::test]
    async fn test_get_or_try_insert_with() {
        let cache = cache(10);
        let first: Result<Value, String> = cache
            .get_or_try_insert_with("k", || async { Ok(json!("loaded")) })
            .await;
        assert_eq!(first.unwrap(), json!("loaded"));

        let second: Result<Value, String> = cache
            .get_or_try_insert_with("k", || async { Err("should not run".to_string()) })
            .await;
        assert_eq!(second.unwrap(), json!("loaded"));

        let failed: Result<Value, String> = cache
            .get_or_try_insert_with("other", || async { Err("boom".to_string()) })
            .await;
        assert!(failed.is_err());
        assert_eq!(cache.get("other").await, None);
    }

    #[tokio::test]
    async fn test_invalidation_during_load_skips_insert() {
        let cache = cache(10);
        let (started_tx, started_rx) = oneshot::channel::<()>();
        let (release_tx, release_rx) = oneshot::channel::<()>();

        let loader = {
            let cache = cache.clone();
            tokio::spawn(async move {
                cache
                    .get_or_try_insert_with("networks:list:", || async move {
                        let _ = started_tx.send(());
                        let _ = release_rx.await;
                        Ok::<_, String>(json!({"total": 1}))
                    })
                    .await
            })
        };

        started_rx.await.unwrap();
        cache.invalidate_pattern("networks:*").await;
        release_tx.send(()).unwrap();

        // 调用方仍拿到加载结果，但旧数据不会进入缓存
        assert_eq!(loader.await.unwrap().unwrap(), json!({"total": 1}));
        assert_eq!(cache.get("networks:list:").await, None);

        let fresh: Result<Value, String> = cache
            .get_or_try_insert_with("networks:list:", || async { Ok(json!({"total": 2})) })
            .await;
        assert_eq!(fresh.unwrap(), json!({"total": 2}));
        assert_eq!(cache.get("networks:list:").await, Some(json!({"total": 2})));
    }

    #[test]
    fn test_cache_keys() {
        let key = list_cache_key(
            "networks",
            &[
                ("page", Some("2".to_string())),
                ("search", None),
                ("limit", Some("50".to_string())),
            ],
        );
        assert_eq!(key, "networks:list:limit=50&page=2");
    }

    #[test]
    fn test_wildcard_match() {
        assert!(wildcard_match("networks:*", "networks:list:page=1"));
        assert!(wildcard_match("*:list", "devices:list"));
        assert!(wildcard_match("a*b*c", "axxbyyc"));
        assert!(!wildcard_match("a*b*c", "axxbyy"));
        assert!(!wildcard_match("networks:*", "devices:list"));
        assert!(wildcard_match("exact", "exact"));
        assert!(!wildcard_match("exact", "exactly"));
    }
}
