//! Device Speech Port - 设备端语音引擎抽象
//!
//! 引擎是"请求 + 事件响应"式的协作方：提交一条语句，接收
//! started/ended/error 信号。首句正确性没有保证（见设备端适配器的
//! 预热处理）。取消是引擎级别的：同一时刻最多一条语句在播。

use async_trait::async_trait;
use std::sync::Arc;
use tokio::sync::mpsc;

use crate::domain::voice::Voice;

/// 每条语句的完成信号
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeviceEvent {
    /// 引擎开始朗读
    Started,
    /// 引擎正常读完
    Ended,
    /// 语句被主动取消；不是失败
    Canceled,
    /// 引擎明确上报错误
    Error(String),
}

/// 一次语句提交
#[derive(Debug, Clone)]
pub struct UtteranceRequest {
    pub text: String,
    /// 引擎语音 id；None 表示由引擎选默认
    pub voice_id: Option<String>,
    /// 播放速率倍数
    pub rate: f32,
    /// 音量 0.0（静音）到 1.0
    pub volume: f32,
}

impl UtteranceRequest {
    pub fn new(text: impl Into<String>, voice_id: Option<String>, rate: f32) -> Self {
        Self {
            text: text.into(),
            voice_id,
            rate,
            volume: 1.0,
        }
    }

    /// 一条近静音的短预热句
    pub fn primer() -> Self {
        Self {
            text: ".".to_string(),
            voice_id: None,
            rate: 2.0,
            volume: 0.0,
        }
    }
}

/// 设备端语音引擎契约
#[async_trait]
pub trait DeviceSpeechPort: Send + Sync {
    /// 提交一条语句；信号从返回的 channel 送达
    ///
    /// channel 在没有任何事件的情况下关闭，说明引擎已经消失
    fn speak(&self, request: UtteranceRequest) -> mpsc::Receiver<DeviceEvent>;

    /// 取消当前语句（如有）；空闲时调用必须安全
    fn cancel(&self);

    /// 暂停当前语句；返回引擎是否支持
    fn pause(&self) -> bool;

    /// 恢复暂停的语句；返回引擎是否支持
    fn resume(&self) -> bool;

    /// 不打断当前语句直接应用新速率；返回引擎是否支持在播调速
    fn set_rate(&self, rate: f32) -> bool;

    /// 引擎当前提供的语音列表
    async fn voices(&self) -> Vec<Voice>;
}

/// 设备端适配器交给 orchestrator 的在播语句
///
/// "started" 信号已被消费；剩余事件驱动播放中的会话。控制操作
/// 委托给引擎，引擎持有唯一的活跃语句。
pub struct DeviceUtterance {
    engine: Arc<dyn DeviceSpeechPort>,
    events: mpsc::Receiver<DeviceEvent>,
    finished: bool,
}

impl std::fmt::Debug for DeviceUtterance {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DeviceUtterance")
            .field("finished", &self.finished)
            .finish_non_exhaustive()
    }
}

impl DeviceUtterance {
    pub fn new(engine: Arc<dyn DeviceSpeechPort>, events: mpsc::Receiver<DeviceEvent>) -> Self {
        Self {
            engine,
            events,
            finished: false,
        }
    }

    /// 标记一条在适配器返回之前就已结束的语句
    pub fn finished(engine: Arc<dyn DeviceSpeechPort>, events: mpsc::Receiver<DeviceEvent>) -> Self {
        Self {
            engine,
            events,
            finished: true,
        }
    }

    pub fn is_finished(&self) -> bool {
        self.finished
    }

    /// 驱动此语句的引擎，用于 pause/resume/cancel 控制
    pub fn controls(&self) -> Arc<dyn DeviceSpeechPort> {
        Arc::clone(&self.engine)
    }

    /// 下一个完成信号；None 表示引擎已消失
    pub async fn next_event(&mut self) -> Option<DeviceEvent> {
        self.events.recv().await
    }
}
