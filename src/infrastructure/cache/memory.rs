//! In-Memory Audio Cache - 内存音频缓存
//!
//! 单上下文的合成音频句柄存储。条目按固定 TTL 过期，总量有上限；
//! 淘汰先清过期条目，再按创建时间从旧到新删。条目移除即丢弃缓存的
//! `Arc`，底层资源在最后一个读者放手时释放恰好一次。

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use crate::application::ports::{AudioCachePort, AudioData, CacheError, CacheStats};

/// 缓存配置
#[derive(Debug, Clone)]
pub struct AudioCacheConfig {
    /// 条目存活时间
    pub ttl: Duration,
    /// 最大条目数
    pub max_entries: usize,
}

impl Default for AudioCacheConfig {
    fn default() -> Self {
        Self {
            ttl: Duration::from_secs(86_400),
            max_entries: 50,
        }
    }
}

struct CacheSlot {
    audio: Arc<AudioData>,
    created_at: DateTime<Utc>,
    /// 插入序号；淘汰时打破创建时间的平局
    seq: u64,
}

/// 内存音频缓存
pub struct InMemoryAudioCache {
    entries: DashMap<String, CacheSlot>,
    ttl: chrono::Duration,
    max_entries: usize,
    seq: AtomicU64,
    hit_count: AtomicU64,
    miss_count: AtomicU64,
    expired_evictions: AtomicU64,
    capacity_evictions: AtomicU64,
}

impl InMemoryAudioCache {
    pub fn new(config: AudioCacheConfig) -> Self {
        let ttl = chrono::Duration::from_std(config.ttl)
            .unwrap_or_else(|_| chrono::Duration::try_days(1).unwrap_or(chrono::Duration::zero()));
        Self {
            entries: DashMap::new(),
            ttl,
            max_entries: config.max_entries,
            seq: AtomicU64::new(0),
            hit_count: AtomicU64::new(0),
            miss_count: AtomicU64::new(0),
            expired_evictions: AtomicU64::new(0),
            capacity_evictions: AtomicU64::new(0),
        }
    }

    pub fn with_defaults() -> Self {
        Self::new(AudioCacheConfig::default())
    }

    pub fn arc(self) -> Arc<Self> {
        Arc::new(self)
    }

    fn is_expired(&self, slot: &CacheSlot, now: DateTime<Utc>) -> bool {
        now - slot.created_at > self.ttl
    }

    /// 淘汰：先清过期条目，再按创建时间删最旧的直到回到上限内
    fn evict(&self) {
        let now = Utc::now();

        let expired: Vec<String> = self
            .entries
            .iter()
            .filter(|entry| self.is_expired(entry.value(), now))
            .map(|entry| entry.key().clone())
            .collect();
        for key in expired {
            if self.entries.remove(&key).is_some() {
                self.expired_evictions.fetch_add(1, Ordering::Relaxed);
                tracing::debug!(key = %key, "Expired cache entry evicted");
            }
        }

        while self.entries.len() > self.max_entries {
            let oldest = self
                .entries
                .iter()
                .min_by_key(|entry| (entry.value().created_at, entry.value().seq))
                .map(|entry| entry.key().clone());

            match oldest {
                Some(key) => {
                    if self.entries.remove(&key).is_some() {
                        self.capacity_evictions.fetch_add(1, Ordering::Relaxed);
                        tracing::debug!(key = %key, "Oldest cache entry evicted over capacity");
                    }
                }
                None => break,
            }
        }
    }
}

impl AudioCachePort for InMemoryAudioCache {
    fn get(&self, key: &str) -> Result<Option<Arc<AudioData>>, CacheError> {
        let now = Utc::now();

        // 在分片锁内拷出结果，释放锁之后再做移除
        let hit = match self.entries.get(key) {
            None => {
                self.miss_count.fetch_add(1, Ordering::Relaxed);
                return Ok(None);
            }
            Some(slot) => {
                if self.is_expired(slot.value(), now) {
                    None
                } else {
                    Some(Arc::clone(&slot.value().audio))
                }
            }
        };

        match hit {
            Some(audio) => {
                self.hit_count.fetch_add(1, Ordering::Relaxed);
                Ok(Some(audio))
            }
            None => {
                // 读取时惰性过期
                if self.entries.remove(key).is_some() {
                    self.expired_evictions.fetch_add(1, Ordering::Relaxed);
                    tracing::debug!(key = %key, "Expired cache entry removed on read");
                }
                self.miss_count.fetch_add(1, Ordering::Relaxed);
                Ok(None)
            }
        }
    }

    fn put(&self, key: &str, audio: Arc<AudioData>) {
        let slot = CacheSlot {
            audio,
            created_at: Utc::now(),
            seq: self.seq.fetch_add(1, Ordering::Relaxed),
        };
        self.entries.insert(key.to_string(), slot);
        tracing::debug!(key = %key, entries = self.entries.len(), "Audio cached");
        self.evict();
    }

    fn clear(&self) {
        self.entries.clear();
    }

    fn len(&self) -> usize {
        self.entries.len()
    }

    fn stats(&self) -> CacheStats {
        CacheStats {
            entries: self.entries.len(),
            hit_count: self.hit_count.load(Ordering::Relaxed),
            miss_count: self.miss_count.load(Ordering::Relaxed),
            expired_evictions: self.expired_evictions.load(Ordering::Relaxed),
            capacity_evictions: self.capacity_evictions.load(Ordering::Relaxed),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Weak;

    fn audio(url: &str) -> Arc<AudioData> {
        Arc::new(AudioData::new(url))
    }

    fn small_cache(max_entries: usize) -> InMemoryAudioCache {
        InMemoryAudioCache::new(AudioCacheConfig {
            ttl: Duration::from_secs(60),
            max_entries,
        })
    }

    #[test]
    fn test_put_get_round_trip() {
        let cache = small_cache(10);
        let handle = audio("https://cdn.example.com/a.mp3");

        cache.put("k1", Arc::clone(&handle));
        let fetched = cache.get("k1").unwrap().unwrap();

        assert!(Arc::ptr_eq(&handle, &fetched));
        assert_eq!(cache.stats().hit_count, 1);
    }

    #[test]
    fn test_miss_counts() {
        let cache = small_cache(10);
        assert!(cache.get("absent").unwrap().is_none());
        assert_eq!(cache.stats().miss_count, 1);
    }

    #[tokio::test]
    async fn test_lazy_expiry_on_read() {
        let cache = InMemoryAudioCache::new(AudioCacheConfig {
            ttl: Duration::from_millis(20),
            max_entries: 10,
        });
        cache.put("k1", audio("u"));

        tokio::time::sleep(Duration::from_millis(40)).await;

        assert!(cache.get("k1").unwrap().is_none());
        assert_eq!(cache.len(), 0);
        assert_eq!(cache.stats().expired_evictions, 1);
    }

    #[test]
    fn test_capacity_never_exceeded_after_put() {
        let cache = small_cache(5);
        for i in 0..20 {
            cache.put(&format!("k{}", i), audio(&format!("u{}", i)));
            assert!(cache.len() <= 5);
        }
    }

    #[test]
    fn test_oldest_entry_released_over_capacity() {
        let cache = small_cache(50);

        let first = audio("u0");
        let weak: Weak<AudioData> = Arc::downgrade(&first);
        cache.put("k0", first);

        for i in 1..=50 {
            cache.put(&format!("k{}", i), audio(&format!("u{}", i)));
        }

        assert_eq!(cache.len(), 50);
        assert!(cache.get("k0").unwrap().is_none());
        // 缓存持有最后一个引用；淘汰随即释放了它
        assert!(weak.upgrade().is_none());
        assert_eq!(cache.stats().capacity_evictions, 1);
    }

    #[test]
    fn test_entry_survives_while_a_reader_holds_it() {
        let cache = small_cache(1);
        cache.put("k0", audio("u0"));
        let reader = cache.get("k0").unwrap().unwrap();

        // 条目被淘汰不能作废读者手里的句柄
        cache.put("k1", audio("u1"));
        assert!(cache.get("k0").unwrap().is_none());
        assert_eq!(reader.url, "u0");
    }

    #[test]
    fn test_clear_releases_everything() {
        let cache = small_cache(10);
        let handle = audio("u0");
        let weak = Arc::downgrade(&handle);
        cache.put("k0", handle);

        cache.clear();

        assert!(cache.is_empty());
        assert!(weak.upgrade().is_none());
    }
}
