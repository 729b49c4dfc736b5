//! Playback Session - 播放会话

use std::sync::Arc;
use uuid::Uuid;

use crate::application::ports::{DeviceSpeechPort, PlaybackControl};
use crate::domain::voice::Voice;

/// 播放状态机状态
///
/// `Ended` 和 `Error` 对单次请求是终态；二者都复位到 `Idle`
/// 迎接下一次请求
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlaybackStatus {
    Idle,
    Resolving,
    Synthesizing,
    Playing,
    Paused,
    Ended,
    Error,
}

impl PlaybackStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            PlaybackStatus::Idle => "idle",
            PlaybackStatus::Resolving => "resolving",
            PlaybackStatus::Synthesizing => "synthesizing",
            PlaybackStatus::Playing => "playing",
            PlaybackStatus::Paused => "paused",
            PlaybackStatus::Ended => "ended",
            PlaybackStatus::Error => "error",
        }
    }

    /// 处于此状态的会话是否仍占有播放槽位
    pub fn is_active(&self) -> bool {
        matches!(
            self,
            PlaybackStatus::Resolving
                | PlaybackStatus::Synthesizing
                | PlaybackStatus::Playing
                | PlaybackStatus::Paused
        )
    }
}

impl std::fmt::Display for PlaybackStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// 会话的实际发声来源
pub enum ActiveSource {
    /// 设备端引擎原生朗读中
    Device { engine: Arc<dyn DeviceSpeechPort> },
    /// 音频播放器驱动合成产物
    Audio {
        control: PlaybackControl,
        from_cache: bool,
    },
}

/// 当前（或最近一次）的唯一播放
pub struct PlaybackSession {
    pub id: Uuid,
    pub text: String,
    pub voice: Option<Voice>,
    pub rate: f32,
    pub status: PlaybackStatus,
    pub source: Option<ActiveSource>,
}

impl PlaybackSession {
    pub fn new(text: impl Into<String>, rate: f32) -> Self {
        Self {
            id: Uuid::new_v4(),
            text: text.into(),
            voice: None,
            rate,
            status: PlaybackStatus::Resolving,
            source: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_active_states() {
        assert!(PlaybackStatus::Playing.is_active());
        assert!(PlaybackStatus::Paused.is_active());
        assert!(PlaybackStatus::Resolving.is_active());
        assert!(!PlaybackStatus::Idle.is_active());
        assert!(!PlaybackStatus::Ended.is_active());
        assert!(!PlaybackStatus::Error.is_active());
    }

    #[test]
    fn test_new_session_starts_resolving() {
        let session = PlaybackSession::new("hello", 1.0);
        assert_eq!(session.status, PlaybackStatus::Resolving);
        assert!(session.voice.is_none());
        assert!(session.source.is_none());
    }
}
