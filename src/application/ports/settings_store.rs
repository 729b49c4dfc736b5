//! Settings Store Port - 持久化共享状态
//!
//! 状态 owner 启动时读一次；之后 owner 的内存副本即权威，
//! 每次变更都写穿到存储

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// 速率钳制边界
pub const MIN_RATE: f32 = 0.5;
pub const MAX_RATE: f32 = 3.0;
pub const DEFAULT_RATE: f32 = 1.0;

/// 跨上下文共享的进程级用户设置
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SharedState {
    /// 总开关
    pub enabled: bool,
    /// 播放速率倍数，钳制在 [MIN_RATE, MAX_RATE]
    pub rate: f32,
    /// 用户显式指定的语音（如有）
    pub selected_voice_id: Option<String>,
}

impl SharedState {
    pub fn clamp_rate(rate: f32) -> f32 {
        rate.clamp(MIN_RATE, MAX_RATE)
    }
}

impl Default for SharedState {
    fn default() -> Self {
        Self {
            enabled: true,
            rate: DEFAULT_RATE,
            selected_voice_id: None,
        }
    }
}

/// 设置存储错误
#[derive(Debug, Error)]
pub enum SettingsError {
    #[error("settings store error: {0}")]
    Store(String),

    #[error("settings serialization error: {0}")]
    Serialization(String),
}

/// Settings Store Port
pub trait SettingsStorePort: Send + Sync {
    /// 加载持久化状态；记录缺失时返回默认值
    fn load(&self) -> Result<SharedState, SettingsError>;

    /// 写穿状态
    fn save(&self, state: &SharedState) -> Result<(), SettingsError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rate_clamp() {
        assert_eq!(SharedState::clamp_rate(0.1), MIN_RATE);
        assert_eq!(SharedState::clamp_rate(9.0), MAX_RATE);
        assert_eq!(SharedState::clamp_rate(1.25), 1.25);
    }

    #[test]
    fn test_defaults() {
        let state = SharedState::default();
        assert!(state.enabled);
        assert_eq!(state.rate, DEFAULT_RATE);
        assert!(state.selected_voice_id.is_none());
    }
}
