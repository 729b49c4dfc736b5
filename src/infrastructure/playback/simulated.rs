//! Simulated Audio Player - 按时长推进的音频播放器
//!
//! 产物按已知长度除以速率"播放"，支持在播暂停/恢复/调速。
//! 真正渲染采样是宿主表面的事；这个播放器只负责计时和控制协议。

use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::{sleep, Instant};

use crate::application::ports::{
    AudioData, AudioPlayerPort, PlaybackControl, PlayerCommand, PlayerError,
};

#[derive(Debug, Clone)]
pub struct SimulatedPlayerConfig {
    /// 没有已知时长的产物按此长度计
    pub default_duration: Duration,
}

impl Default for SimulatedPlayerConfig {
    fn default() -> Self {
        Self {
            default_duration: Duration::from_millis(1500),
        }
    }
}

/// 只管计时的音频播放器
pub struct SimulatedAudioPlayer {
    config: SimulatedPlayerConfig,
}

impl SimulatedAudioPlayer {
    pub fn new(config: SimulatedPlayerConfig) -> Self {
        Self { config }
    }

    pub fn with_defaults() -> Self {
        Self::new(SimulatedPlayerConfig::default())
    }

    pub fn arc(self) -> Arc<Self> {
        Arc::new(self)
    }
}

/// 调速后的剩余墙钟时间：同样的内容按新速率播
fn rescale(remaining: Duration, old_rate: f32, new_rate: f32) -> Duration {
    remaining.mul_f32(old_rate / new_rate)
}

#[async_trait]
impl AudioPlayerPort for SimulatedAudioPlayer {
    async fn play(&self, audio: Arc<AudioData>, rate: f32) -> Result<PlaybackControl, PlayerError> {
        if audio.url.is_empty() {
            return Err(PlayerError::Unreadable("empty audio url".to_string()));
        }

        let base = audio
            .duration_ms
            .map(Duration::from_millis)
            .unwrap_or(self.config.default_duration);
        let mut rate = rate.max(0.1);

        let (control, mut commands, finished) = PlaybackControl::channel();

        tracing::debug!(url = %audio.url, length = ?base, rate, "Playback started");

        tokio::spawn(async move {
            let mut remaining = rescale(base, 1.0, rate);
            loop {
                let slice = Instant::now();
                tokio::select! {
                    _ = sleep(remaining) => break,
                    cmd = commands.recv() => {
                        remaining = remaining.checked_sub(slice.elapsed()).unwrap_or_default();
                        match cmd {
                            // 所有控制句柄都被丢弃等同于停止
                            None | Some(PlayerCommand::Stop) => {
                                let _ = finished.send(true);
                                return;
                            }
                            Some(PlayerCommand::Pause) => {
                                loop {
                                    match commands.recv().await {
                                        Some(PlayerCommand::Resume) => break,
                                        Some(PlayerCommand::SetRate(new_rate)) => {
                                            let new_rate = new_rate.max(0.1);
                                            remaining = rescale(remaining, rate, new_rate);
                                            rate = new_rate;
                                        }
                                        None | Some(PlayerCommand::Stop) => {
                                            let _ = finished.send(true);
                                            return;
                                        }
                                        Some(PlayerCommand::Pause) => {}
                                    }
                                }
                            }
                            Some(PlayerCommand::Resume) => {}
                            Some(PlayerCommand::SetRate(new_rate)) => {
                                let new_rate = new_rate.max(0.1);
                                remaining = rescale(remaining, rate, new_rate);
                                rate = new_rate;
                            }
                        }
                    }
                }
            }
            let _ = finished.send(true);
        });

        Ok(control)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn timed_audio(ms: u64) -> Arc<AudioData> {
        let mut audio = AudioData::new("https://cdn.example.com/a.mp3");
        audio.duration_ms = Some(ms);
        Arc::new(audio)
    }

    #[tokio::test]
    async fn test_playback_runs_to_completion() {
        let player = SimulatedAudioPlayer::with_defaults();
        let mut control = player.play(timed_audio(20), 1.0).await.unwrap();

        control.wait_finished().await;
        assert!(control.is_finished());
    }

    #[tokio::test]
    async fn test_stop_finishes_early() {
        let player = SimulatedAudioPlayer::with_defaults();
        let mut control = player.play(timed_audio(60_000), 1.0).await.unwrap();

        control.stop();
        tokio::time::timeout(Duration::from_millis(200), control.wait_finished())
            .await
            .expect("stop must finish playback promptly");
    }

    #[tokio::test]
    async fn test_pause_holds_playback_open() {
        let player = SimulatedAudioPlayer::with_defaults();
        let control = player.play(timed_audio(30), 1.0).await.unwrap();

        assert!(control.pause());
        tokio::time::sleep(Duration::from_millis(80)).await;
        // 比整段音频还长，但暂停中的播放不许结束
        assert!(!control.is_finished());

        assert!(control.resume());
        let mut waiter = control.clone();
        tokio::time::timeout(Duration::from_millis(200), waiter.wait_finished())
            .await
            .expect("resumed playback must run out");
    }

    #[tokio::test]
    async fn test_live_rate_change_keeps_playing() {
        let player = SimulatedAudioPlayer::with_defaults();
        let mut control = player.play(timed_audio(40_000), 1.0).await.unwrap();

        // 长音频大幅提速后，剩余等待时间急剧缩短
        assert!(control.set_rate(2000.0));
        tokio::time::timeout(Duration::from_millis(500), control.wait_finished())
            .await
            .expect("rate change must apply live");
    }

    #[tokio::test]
    async fn test_unreadable_audio_is_rejected() {
        let player = SimulatedAudioPlayer::with_defaults();
        let err = player
            .play(Arc::new(AudioData::new("")), 1.0)
            .await
            .unwrap_err();
        assert!(matches!(err, PlayerError::Unreadable(_)));
    }
}
