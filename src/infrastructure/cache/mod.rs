//! Audio Cache - 音频缓存实现

mod memory;

pub use memory::{AudioCacheConfig, InMemoryAudioCache};
