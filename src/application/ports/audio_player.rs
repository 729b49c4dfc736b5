//! Audio Player Port - 缓存/云端音频的播放
//!
//! 播放器负责一个在播产物的计时，并交回一个控制句柄。
//! 暂停、恢复和在播调速都不打断底层资源。

use async_trait::async_trait;
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::{mpsc, watch};

use super::speech_provider::AudioData;

/// 播放失败
#[derive(Debug, Error)]
pub enum PlayerError {
    /// 音频句柄不可读；调用方降级为缓存未命中
    #[error("audio handle unreadable: {0}")]
    Unreadable(String),

    #[error("playback failed: {0}")]
    Failed(String),
}

/// 在播实例接受的命令
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum PlayerCommand {
    Pause,
    Resume,
    SetRate(f32),
    Stop,
}

/// 一个在播实例的控制句柄
///
/// 可克隆：orchestrator 在会话上留一份发命令，在请求任务里
/// 留一份等待播放结束
#[derive(Clone, Debug)]
pub struct PlaybackControl {
    commands: mpsc::UnboundedSender<PlayerCommand>,
    finished: watch::Receiver<bool>,
}

impl PlaybackControl {
    /// 构建控制句柄，以及播放器实现驱动的两个 channel 端
    pub fn channel() -> (
        Self,
        mpsc::UnboundedReceiver<PlayerCommand>,
        watch::Sender<bool>,
    ) {
        let (cmd_tx, cmd_rx) = mpsc::unbounded_channel();
        let (fin_tx, fin_rx) = watch::channel(false);
        (
            Self {
                commands: cmd_tx,
                finished: fin_rx,
            },
            cmd_rx,
            fin_tx,
        )
    }

    pub fn pause(&self) -> bool {
        self.commands.send(PlayerCommand::Pause).is_ok()
    }

    pub fn resume(&self) -> bool {
        self.commands.send(PlayerCommand::Resume).is_ok()
    }

    /// 在播应用新速率；返回播放实例是否接受
    pub fn set_rate(&self, rate: f32) -> bool {
        self.commands.send(PlayerCommand::SetRate(rate)).is_ok()
    }

    pub fn stop(&self) {
        let _ = self.commands.send(PlayerCommand::Stop);
    }

    pub fn is_finished(&self) -> bool {
        *self.finished.borrow()
    }

    /// 等到播放结束或被停止
    pub async fn wait_finished(&mut self) {
        while !*self.finished.borrow() {
            if self.finished.changed().await.is_err() {
                break;
            }
        }
    }
}

/// 音频播放器契约
#[async_trait]
pub trait AudioPlayerPort: Send + Sync {
    /// 以 `rate` 开始播放 `audio`；播放启动后即返回
    async fn play(&self, audio: Arc<AudioData>, rate: f32) -> Result<PlaybackControl, PlayerError>;
}
