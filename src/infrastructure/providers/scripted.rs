//! Scripted Device Engine - 可编排行为的进程内语音引擎
//!
//! 在测试和离线运行时顶替真实的设备端引擎。行为枚举复现了适配器
//! 必须扛住的故障模式，包括闲置后静默吞掉第一条语句的那种引擎。

use async_trait::async_trait;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::time::{sleep, Instant};

use crate::application::ports::{DeviceEvent, DeviceSpeechPort, UtteranceRequest};
use crate::domain::voice::Voice;

/// 引擎如何对待提交的语句
#[derive(Debug, Clone)]
pub enum ScriptedBehavior {
    /// 正常朗读：短延迟后 started，时长走完后 ended
    Normal,
    /// 接受语句但不发任何信号
    NeverStarts,
    /// 启动延迟后上报一个明确错误
    FailsWith(String),
    /// 静默吞掉第一条语句；之后正常朗读
    SwallowsUnprimed,
}

#[derive(Debug, Clone)]
pub struct ScriptedEngineConfig {
    pub behavior: ScriptedBehavior,
    /// "started" 信号前的延迟
    pub start_delay: Duration,
    /// 每条语句的模拟朗读时长
    pub utterance_duration: Duration,
    /// 是否接受在播调速
    pub live_rate: bool,
    pub voices: Vec<Voice>,
}

impl Default for ScriptedEngineConfig {
    fn default() -> Self {
        Self {
            behavior: ScriptedBehavior::Normal,
            start_delay: Duration::from_millis(5),
            utterance_duration: Duration::from_millis(40),
            live_rate: false,
            voices: vec![Voice::on_device("device-en", "en-US", "Samantha", true)],
        }
    }
}

enum EngineCmd {
    Cancel,
    Pause,
    Resume,
}

/// 脚本化进程内引擎
pub struct ScriptedDeviceEngine {
    config: ScriptedEngineConfig,
    primed: AtomicBool,
    current: Mutex<Option<mpsc::UnboundedSender<EngineCmd>>>,
    completed: Arc<AtomicUsize>,
}

impl ScriptedDeviceEngine {
    pub fn new(config: ScriptedEngineConfig) -> Self {
        Self {
            config,
            primed: AtomicBool::new(false),
            current: Mutex::new(None),
            completed: Arc::new(AtomicUsize::new(0)),
        }
    }

    pub fn normal() -> Self {
        Self::new(ScriptedEngineConfig::default())
    }

    pub fn with_behavior(behavior: ScriptedBehavior) -> Self {
        Self::new(ScriptedEngineConfig {
            behavior,
            ..ScriptedEngineConfig::default()
        })
    }

    pub fn arc(self) -> Arc<Self> {
        Arc::new(self)
    }

    /// 完整读完的语句数
    pub fn completed_count(&self) -> usize {
        self.completed.load(Ordering::Relaxed)
    }

    fn register(&self) -> mpsc::UnboundedReceiver<EngineCmd> {
        // 新语句顶掉当前活跃的那条
        self.cancel();
        let (tx, rx) = mpsc::unbounded_channel();
        if let Ok(mut current) = self.current.lock() {
            *current = Some(tx);
        }
        rx
    }
}

#[async_trait]
impl DeviceSpeechPort for ScriptedDeviceEngine {
    fn speak(&self, request: UtteranceRequest) -> mpsc::Receiver<DeviceEvent> {
        let (tx, rx) = mpsc::channel(8);
        let mut cmds = self.register();

        let behavior = match self.config.behavior {
            ScriptedBehavior::SwallowsUnprimed if !self.primed.swap(true, Ordering::SeqCst) => {
                ScriptedBehavior::NeverStarts
            }
            ScriptedBehavior::SwallowsUnprimed => ScriptedBehavior::Normal,
            ref other => other.clone(),
        };

        let start_delay = self.config.start_delay;
        let duration = self.config.utterance_duration;
        let completed = Arc::clone(&self.completed);
        tracing::trace!(text_len = request.text.len(), volume = request.volume, "Scripted utterance submitted");

        tokio::spawn(async move {
            match behavior {
                ScriptedBehavior::NeverStarts => {
                    // 保持 channel 打开，到被取消为止一言不发
                    loop {
                        match cmds.recv().await {
                            Some(EngineCmd::Cancel) | None => {
                                let _ = tx.send(DeviceEvent::Canceled).await;
                                return;
                            }
                            _ => {}
                        }
                    }
                }
                ScriptedBehavior::FailsWith(msg) => {
                    sleep(start_delay).await;
                    let _ = tx.send(DeviceEvent::Error(msg)).await;
                }
                ScriptedBehavior::Normal | ScriptedBehavior::SwallowsUnprimed => {
                    // 启动延迟，可取消
                    tokio::select! {
                        _ = sleep(start_delay) => {}
                        cmd = cmds.recv() => {
                            if matches!(cmd, Some(EngineCmd::Cancel) | None) {
                                let _ = tx.send(DeviceEvent::Canceled).await;
                                return;
                            }
                        }
                    }

                    if tx.send(DeviceEvent::Started).await.is_err() {
                        return;
                    }

                    let mut remaining = duration;
                    loop {
                        let slice = Instant::now();
                        tokio::select! {
                            _ = sleep(remaining) => {
                                completed.fetch_add(1, Ordering::Relaxed);
                                let _ = tx.send(DeviceEvent::Ended).await;
                                return;
                            }
                            cmd = cmds.recv() => {
                                remaining = remaining
                                    .checked_sub(slice.elapsed())
                                    .unwrap_or_default();
                                match cmd {
                                    Some(EngineCmd::Cancel) | None => {
                                        let _ = tx.send(DeviceEvent::Canceled).await;
                                        return;
                                    }
                                    Some(EngineCmd::Pause) => {
                                        loop {
                                            match cmds.recv().await {
                                                Some(EngineCmd::Resume) => break,
                                                Some(EngineCmd::Cancel) | None => {
                                                    let _ = tx.send(DeviceEvent::Canceled).await;
                                                    return;
                                                }
                                                Some(EngineCmd::Pause) => {}
                                            }
                                        }
                                    }
                                    Some(EngineCmd::Resume) => {}
                                }
                            }
                        }
                    }
                }
            }
        });

        rx
    }

    fn cancel(&self) {
        if let Ok(mut current) = self.current.lock() {
            if let Some(tx) = current.take() {
                let _ = tx.send(EngineCmd::Cancel);
            }
        }
    }

    fn pause(&self) -> bool {
        if let Ok(current) = self.current.lock() {
            if let Some(tx) = current.as_ref() {
                return tx.send(EngineCmd::Pause).is_ok();
            }
        }
        false
    }

    fn resume(&self) -> bool {
        if let Ok(current) = self.current.lock() {
            if let Some(tx) = current.as_ref() {
                return tx.send(EngineCmd::Resume).is_ok();
            }
        }
        false
    }

    fn set_rate(&self, _rate: f32) -> bool {
        self.config.live_rate
    }

    async fn voices(&self) -> Vec<Voice> {
        self.config.voices.clone()
    }
}
