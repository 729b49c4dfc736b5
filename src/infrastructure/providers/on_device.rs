//! On-Device Synthesis Provider - 设备端合成适配器
//!
//! 包装一个 [`DeviceSpeechPort`] 引擎。有的引擎在闲置一段时间后会
//! 吞掉或读坏第一条语句，所以正式语句之前先发一条近静音的预热句并
//! 等它结束。预热等待和 "started" 信号等待各带各的超时；
//! 从不发完成事件的引擎拖不死请求。

use std::sync::Arc;
use std::time::Duration;
use tokio::time::timeout;

use crate::application::ports::{
    DeviceEvent, DeviceSpeechPort, DeviceUtterance, SynthesisError, UtteranceRequest,
};
use crate::domain::voice::Voice;

/// 设备端适配器配置
#[derive(Debug, Clone)]
pub struct OnDeviceProviderConfig {
    /// 每条正式语句前是否派发预热句
    pub primer_enabled: bool,
    /// 预热等待上限
    pub primer_timeout: Duration,
    /// "started" 等待上限
    pub start_timeout: Duration,
}

impl Default for OnDeviceProviderConfig {
    fn default() -> Self {
        Self {
            primer_enabled: true,
            primer_timeout: Duration::from_millis(1500),
            start_timeout: Duration::from_millis(3000),
        }
    }
}

/// 设备端合成适配器
pub struct OnDeviceProvider {
    engine: Arc<dyn DeviceSpeechPort>,
    config: OnDeviceProviderConfig,
}

impl OnDeviceProvider {
    pub fn new(engine: Arc<dyn DeviceSpeechPort>, config: OnDeviceProviderConfig) -> Self {
        Self { engine, config }
    }

    /// 用设备端语音朗读 `text`
    ///
    /// 引擎实际开始朗读后才返回；返回的语句携带剩余的完成信号
    pub async fn synthesize(
        &self,
        text: &str,
        voice: &Voice,
        rate: f32,
    ) -> Result<DeviceUtterance, SynthesisError> {
        if self.config.primer_enabled {
            self.run_primer().await;
        }

        let request = UtteranceRequest::new(text, Some(voice.id.clone()), rate);
        let mut events = self.engine.speak(request);

        match timeout(self.config.start_timeout, events.recv()).await {
            Err(_) => {
                tracing::warn!(
                    voice_id = %voice.id,
                    waited = ?self.config.start_timeout,
                    "Engine never started the utterance"
                );
                self.engine.cancel();
                Err(SynthesisError::NeverStarted {
                    waited: self.config.start_timeout,
                })
            }
            Ok(None) => Err(SynthesisError::EngineReported(
                "engine closed the event channel".to_string(),
            )),
            Ok(Some(DeviceEvent::Started)) => {
                Ok(DeviceUtterance::new(Arc::clone(&self.engine), events))
            }
            // 超短语句可能在观察到 "started" 之前就读完了
            Ok(Some(DeviceEvent::Ended)) => {
                Ok(DeviceUtterance::finished(Arc::clone(&self.engine), events))
            }
            Ok(Some(DeviceEvent::Canceled)) => Err(SynthesisError::Canceled),
            Ok(Some(DeviceEvent::Error(msg))) => Err(SynthesisError::EngineReported(msg)),
        }
    }

    /// 派发近静音预热句并等它过去
    ///
    /// 预热是绕过引擎毛病的手段，不是闸门：失败和超时只记日志，
    /// 正式请求照常进行
    async fn run_primer(&self) {
        let mut events = self.engine.speak(UtteranceRequest::primer());

        let completed = timeout(self.config.primer_timeout, async {
            loop {
                match events.recv().await {
                    Some(DeviceEvent::Started) => continue,
                    Some(DeviceEvent::Ended)
                    | Some(DeviceEvent::Canceled)
                    | Some(DeviceEvent::Error(_))
                    | None => break,
                }
            }
        })
        .await;

        if completed.is_err() {
            tracing::debug!("Primer utterance never completed, canceling it");
            self.engine.cancel();
        }
    }

    /// 取消引擎当前正在读的内容
    pub fn cancel(&self) {
        self.engine.cancel();
    }

    /// 引擎当前提供的语音列表
    pub async fn voices(&self) -> Vec<Voice> {
        self.engine.voices().await
    }

    pub fn engine(&self) -> Arc<dyn DeviceSpeechPort> {
        Arc::clone(&self.engine)
    }
}
