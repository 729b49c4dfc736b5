//! Espeak Device Engine - 进程外设备端语音
//!
//! 驱动 `espeak-ng` 可执行文件：spawn 即 "started"，正常退出即
//! "ended"，取消即 kill。没有原生暂停也没有在播调速；
//! 这两样由 orchestrator 走先停再重播。

use async_trait::async_trait;
use std::process::Stdio;
use std::sync::{Arc, Mutex};
use tokio::process::Command;
use tokio::sync::mpsc;

use crate::application::ports::{DeviceEvent, DeviceSpeechPort, UtteranceRequest};
use crate::domain::voice::Voice;

/// Espeak 引擎配置
#[derive(Debug, Clone)]
pub struct EspeakEngineConfig {
    /// 可执行文件名或路径
    pub binary: String,
    /// 速率 1.0 对应的每分钟词数
    pub base_wpm: u32,
}

impl Default for EspeakEngineConfig {
    fn default() -> Self {
        Self {
            binary: "espeak-ng".to_string(),
            base_wpm: 175,
        }
    }
}

/// 进程外语音引擎
pub struct EspeakDeviceEngine {
    config: EspeakEngineConfig,
    current: Mutex<Option<mpsc::UnboundedSender<()>>>,
}

impl EspeakDeviceEngine {
    pub fn new(config: EspeakEngineConfig) -> Self {
        Self {
            config,
            current: Mutex::new(None),
        }
    }

    pub fn with_defaults() -> Self {
        Self::new(EspeakEngineConfig::default())
    }

    pub fn arc(self) -> Arc<Self> {
        Arc::new(self)
    }

    fn wpm_for(&self, rate: f32) -> u32 {
        let wpm = (self.config.base_wpm as f32 * rate).round() as i64;
        wpm.clamp(80, 450) as u32
    }
}

#[async_trait]
impl DeviceSpeechPort for EspeakDeviceEngine {
    fn speak(&self, request: UtteranceRequest) -> mpsc::Receiver<DeviceEvent> {
        let (tx, rx) = mpsc::channel(8);

        // 先顶掉当前活跃的语句
        self.cancel();
        let (kill_tx, mut kill_rx) = mpsc::unbounded_channel();
        if let Ok(mut current) = self.current.lock() {
            *current = Some(kill_tx);
        }

        let binary = self.config.binary.clone();
        let wpm = self.wpm_for(request.rate);
        let amplitude = (request.volume.clamp(0.0, 1.0) * 200.0).round() as u32;

        tokio::spawn(async move {
            let mut cmd = Command::new(&binary);
            cmd.arg("-s")
                .arg(wpm.to_string())
                .arg("-a")
                .arg(amplitude.to_string());
            if let Some(voice) = &request.voice_id {
                cmd.arg("-v").arg(voice);
            }
            cmd.arg(&request.text)
                .stdout(Stdio::null())
                .stderr(Stdio::piped())
                .kill_on_drop(true);

            let mut child = match cmd.spawn() {
                Ok(child) => child,
                Err(e) => {
                    let _ = tx
                        .send(DeviceEvent::Error(format!("failed to run {}: {}", binary, e)))
                        .await;
                    return;
                }
            };

            let _ = tx.send(DeviceEvent::Started).await;

            tokio::select! {
                status = child.wait() => match status {
                    Ok(status) if status.success() => {
                        let _ = tx.send(DeviceEvent::Ended).await;
                    }
                    Ok(status) => {
                        let _ = tx
                            .send(DeviceEvent::Error(format!("espeak exited with {}", status)))
                            .await;
                    }
                    Err(e) => {
                        let _ = tx.send(DeviceEvent::Error(e.to_string())).await;
                    }
                },
                _ = kill_rx.recv() => {
                    let _ = child.start_kill();
                    let _ = child.wait().await;
                    let _ = tx.send(DeviceEvent::Canceled).await;
                }
            }
        });

        rx
    }

    fn cancel(&self) {
        if let Ok(mut current) = self.current.lock() {
            if let Some(kill) = current.take() {
                let _ = kill.send(());
            }
        }
    }

    fn pause(&self) -> bool {
        tracing::debug!("espeak has no native pause");
        false
    }

    fn resume(&self) -> bool {
        false
    }

    fn set_rate(&self, _rate: f32) -> bool {
        // 速率在进程启动时就定死了
        false
    }

    async fn voices(&self) -> Vec<Voice> {
        let output = Command::new(&self.config.binary)
            .arg("--voices")
            .output()
            .await;

        match output {
            Ok(out) if out.status.success() => {
                parse_voice_listing(&String::from_utf8_lossy(&out.stdout))
            }
            Ok(out) => {
                tracing::warn!(
                    stderr = %String::from_utf8_lossy(&out.stderr),
                    "espeak voice listing failed"
                );
                Vec::new()
            }
            Err(e) => {
                tracing::warn!(error = %e, "espeak not available");
                Vec::new()
            }
        }
    }
}

/// 解析 `espeak-ng --voices` 的输出
///
/// 列布局: Pty Language Age/Gender VoiceName File ...
fn parse_voice_listing(listing: &str) -> Vec<Voice> {
    listing
        .lines()
        .skip(1)
        .filter_map(|line| {
            let fields: Vec<&str> = line.split_whitespace().collect();
            if fields.len() < 4 {
                return None;
            }
            let language = fields[1];
            let name = fields[3];
            Some(Voice::on_device(language, language, name, true))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_voice_listing() {
        let listing = "\
Pty Language       Age/Gender VoiceName          File                 Other Languages
 5  af              --/M      Afrikaans          gmw/af
 5  en-gb           --/M      English_(Great_Britain) gmw/en
 5  fr-fr           --/M      French_(France)    roa/fr";

        let voices = parse_voice_listing(listing);
        assert_eq!(voices.len(), 3);
        assert_eq!(voices[1].id, "en-gb");
        assert_eq!(voices[1].display_name, "English_(Great_Britain)");
        assert!(voices[1].is_local);
        assert!(voices[2].matches_tag("fr"));
    }

    #[test]
    fn test_wpm_scaling() {
        let engine = EspeakDeviceEngine::with_defaults();
        assert_eq!(engine.wpm_for(1.0), 175);
        assert_eq!(engine.wpm_for(2.0), 350);
        // 两端钳制
        assert_eq!(engine.wpm_for(0.1), 80);
        assert_eq!(engine.wpm_for(10.0), 450);
    }
}
