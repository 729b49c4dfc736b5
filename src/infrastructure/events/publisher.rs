//! Event Publisher - 播放事件发布
//!
//! Orchestrator 的状态变化通过一条广播 channel 扇出给所有订阅者
//! （UI 层、日志、测试）。发布永不阻塞也永不让调用方失败。

use serde::Serialize;
use std::sync::Arc;
use tokio::sync::broadcast;
use uuid::Uuid;

use crate::application::error::PlaybackErrorKind;
use crate::domain::voice::ProviderKind;

/// Orchestrator 状态变化事件
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "event", content = "data")]
pub enum PlaybackEvent {
    /// 播放开始
    Started {
        session_id: Uuid,
        voice_id: String,
        provider: ProviderKind,
        from_cache: bool,
    },
    /// 播放暂停
    Paused { session_id: Uuid },
    /// 播放恢复
    Resumed { session_id: Uuid },
    /// 播放完整结束
    Ended { session_id: Uuid },
    /// 没有语音覆盖请求的语言；提示性
    NoVoice { language: String },
    /// 一个挺过回退策略的失败
    PlaybackFailed {
        session_id: Uuid,
        kind: PlaybackErrorKind,
        message: String,
    },
}

/// 播放事件发布器
pub struct EventPublisher {
    channel: broadcast::Sender<PlaybackEvent>,
}

impl EventPublisher {
    pub fn new() -> Self {
        let (tx, _) = broadcast::channel(64);
        Self { channel: tx }
    }

    pub fn arc(self) -> Arc<Self> {
        Arc::new(self)
    }

    pub fn subscribe(&self) -> broadcast::Receiver<PlaybackEvent> {
        self.channel.subscribe()
    }

    pub fn publish(&self, event: PlaybackEvent) {
        if let Err(e) = self.channel.send(event) {
            tracing::debug!(error = %e, "Failed to publish event (no receivers)");
        }
    }
}

impl Default for EventPublisher {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_subscribe_and_publish() {
        let publisher = EventPublisher::new();
        let mut rx = publisher.subscribe();

        publisher.publish(PlaybackEvent::NoVoice {
            language: "sw".to_string(),
        });

        match rx.recv().await.unwrap() {
            PlaybackEvent::NoVoice { language } => assert_eq!(language, "sw"),
            other => panic!("unexpected event: {:?}", other),
        }
    }

    #[test]
    fn test_publish_without_receivers_is_silent() {
        let publisher = EventPublisher::new();
        publisher.publish(PlaybackEvent::Ended {
            session_id: Uuid::new_v4(),
        });
    }

    #[test]
    fn test_event_serialization_shape() {
        let event = PlaybackEvent::NoVoice {
            language: "fr".to_string(),
        };
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["event"], "NoVoice");
        assert_eq!(json["data"]["language"], "fr");
    }
}
