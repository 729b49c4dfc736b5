//! Speech Provider Contract - 合成适配器统一契约
//!
//! 两个合成适配器（设备端和云端）暴露同一契约：
//! synthesize(text, voice, rate) 解析为可播放句柄，或带类型化失败拒绝。
//! 失败变体携带的信息足以驱动 orchestrator 的单次回退策略；
//! 适配器自身从不重试。

use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

use super::device_speech::DeviceUtterance;
use crate::application::error::PlaybackErrorKind;

/// 类型化的合成失败
#[derive(Debug, Error)]
pub enum SynthesisError {
    /// 设备端：引擎未在限时内发出 "started" 信号
    #[error("engine never started the utterance within {waited:?}")]
    NeverStarted { waited: Duration },

    /// 设备端：引擎明确上报错误
    #[error("engine reported an error: {0}")]
    EngineReported(String),

    /// 主动取消；绝不视为需要恢复的失败
    #[error("utterance canceled")]
    Canceled,

    /// 云端：服务不可达
    #[error("voice service unreachable: {0}")]
    Unreachable(String),

    /// 云端：请求超时
    #[error("voice service request timed out")]
    Timeout,

    /// 云端：服务拒绝该 voice id
    #[error("voice service rejected voice id: {0}")]
    VoiceRejected(String),

    /// 云端：服务拒绝请求本身（如文本超长）；从不重试
    #[error("voice service rejected the request: {0}")]
    RequestRejected(String),

    /// 云端：响应体无法解析
    #[error("invalid response from voice service: {0}")]
    InvalidResponse(String),
}

impl SynthesisError {
    /// 云端失败是否有资格走那一次设备端回退
    pub fn allows_fallback(&self) -> bool {
        matches!(
            self,
            SynthesisError::Unreachable(_)
                | SynthesisError::Timeout
                | SynthesisError::VoiceRejected(_)
                | SynthesisError::InvalidResponse(_)
        )
    }

    /// 该失败呈现给用户的分类
    pub fn user_kind(&self) -> PlaybackErrorKind {
        match self {
            SynthesisError::NeverStarted { .. } | SynthesisError::Timeout => {
                PlaybackErrorKind::ProviderTimeout
            }
            SynthesisError::Unreachable(_) => PlaybackErrorKind::NetworkUnavailable,
            _ => PlaybackErrorKind::ProviderRejected,
        }
    }
}

/// 云端服务合成的音频产物
///
/// `server_cached` 反映的是服务自身的缓存，与本地音频缓存无关
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AudioData {
    pub url: String,
    pub cost_units: u32,
    pub server_cached: bool,
    /// 已知的播放时长（生产方能给出时）
    pub duration_ms: Option<u64>,
}

impl AudioData {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            cost_units: 0,
            server_cached: false,
            duration_ms: None,
        }
    }
}

/// 合成派发成功的结果
pub enum SynthesizedSpeech {
    /// 设备端路径：引擎已经在朗读
    Live(DeviceUtterance),
    /// 云端路径：音频就绪，可交给播放器（和缓存）
    Audio(Arc<AudioData>),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fallback_eligibility() {
        assert!(SynthesisError::Unreachable("refused".into()).allows_fallback());
        assert!(SynthesisError::Timeout.allows_fallback());
        assert!(SynthesisError::VoiceRejected("v9".into()).allows_fallback());
        assert!(!SynthesisError::RequestRejected("too long".into()).allows_fallback());
        assert!(!SynthesisError::Canceled.allows_fallback());
        assert!(!SynthesisError::EngineReported("boom".into()).allows_fallback());
    }

    #[test]
    fn test_user_kind_mapping() {
        assert_eq!(
            SynthesisError::Unreachable("x".into()).user_kind(),
            PlaybackErrorKind::NetworkUnavailable
        );
        assert_eq!(
            SynthesisError::NeverStarted {
                waited: Duration::from_secs(3)
            }
            .user_kind(),
            PlaybackErrorKind::ProviderTimeout
        );
        assert_eq!(
            SynthesisError::RequestRejected("x".into()).user_kind(),
            PlaybackErrorKind::ProviderRejected
        );
    }
}
