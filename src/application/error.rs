//! Playback Error Taxonomy - 面向用户的播放失败分类
//!
//! 凡是挺过 orchestrator 单次回退策略的失败，都以这里的某个分类呈现
//! 给 UI 层，绝不以未处理的异常形式泄漏

use serde::{Deserialize, Serialize};

/// 呈现给用户的播放失败分类
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PlaybackErrorKind {
    /// 没有语音覆盖请求的语言；提示性，不是致命错误
    NoVoiceForLanguage,
    /// Provider 未在限时内响应
    ProviderTimeout,
    /// Provider 明确拒绝请求或上报错误
    ProviderRejected,
    /// 云端服务不可达
    NetworkUnavailable,
    /// 缓存句柄不可读；降级为缓存未命中
    CacheUnreadable,
}

impl PlaybackErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            PlaybackErrorKind::NoVoiceForLanguage => "no_voice_for_language",
            PlaybackErrorKind::ProviderTimeout => "provider_timeout",
            PlaybackErrorKind::ProviderRejected => "provider_rejected",
            PlaybackErrorKind::NetworkUnavailable => "network_unavailable",
            PlaybackErrorKind::CacheUnreadable => "cache_unreadable",
        }
    }
}

impl std::fmt::Display for PlaybackErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}
