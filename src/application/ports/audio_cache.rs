//! Audio Cache Port - 合成音频复用
//!
//! 内容寻址存储，(规范化文本前缀, voice id) 映射到合成音频句柄。
//! 句柄是共享 `Arc`：移除条目即丢弃缓存持有的引用，资源在最后一个
//! 读者放手时释放，双重释放和释放后读取无法表达。

use std::sync::Arc;
use thiserror::Error;

use super::speech_provider::AudioData;

/// 缓存错误
#[derive(Debug, Error)]
pub enum CacheError {
    /// 条目无法读回；调用方按未命中处理
    #[error("cache entry unreadable: {0}")]
    Unreadable(String),
}

/// 缓存统计
#[derive(Debug, Clone, Default)]
pub struct CacheStats {
    pub entries: usize,
    pub hit_count: u64,
    pub miss_count: u64,
    pub expired_evictions: u64,
    pub capacity_evictions: u64,
}

/// Audio Cache Port
///
/// 读写都由 orchestrator 同步发起，不会观察到写了一半的条目
pub trait AudioCachePort: Send + Sync {
    /// 取条目；过期条目被移除并按未命中上报
    fn get(&self, key: &str) -> Result<Option<Arc<AudioData>>, CacheError>;

    /// 插入条目，然后跑一遍淘汰（先过期，再按创建时间最旧直到上限内）
    fn put(&self, key: &str, audio: Arc<AudioData>);

    /// 丢弃所有条目，释放缓存持有的全部句柄
    fn clear(&self);

    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn stats(&self) -> CacheStats;
}

/// 规范化文本参与 key 计算的字符数上限，
/// 粘贴整篇文档也不会让 key 无限增长
pub const KEY_TEXT_PREFIX_CHARS: usize = 256;

/// 由请求文本和 voice id 派生缓存 key
///
/// 规范化前缀相同的两个请求有意碰撞：这是缓存不是档案，
/// 同前缀不同后缀的文本共用一个槽位是接受的近似
pub fn cache_key(text: &str, voice_id: &str) -> String {
    let normalized = text
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase();
    let prefix: String = normalized.chars().take(KEY_TEXT_PREFIX_CHARS).collect();
    let digest = md5::compute(prefix.as_bytes());
    format!("{:x}:{}", digest, voice_id)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cache_key_normalizes_whitespace_and_case() {
        assert_eq!(
            cache_key("Hello   World", "v1"),
            cache_key("hello world", "v1")
        );
    }

    #[test]
    fn test_cache_key_distinguishes_voices() {
        assert_ne!(cache_key("hello", "v1"), cache_key("hello", "v2"));
    }

    #[test]
    fn test_cache_key_collides_on_shared_prefix() {
        let prefix = "a ".repeat(KEY_TEXT_PREFIX_CHARS);
        let long_a = format!("{}first tail", prefix);
        let long_b = format!("{}second tail", prefix);
        assert_eq!(cache_key(&long_a, "v1"), cache_key(&long_b, "v1"));
    }

    #[test]
    fn test_cache_key_differs_for_different_short_texts() {
        assert_ne!(cache_key("hello", "v1"), cache_key("goodbye", "v1"));
    }
}
