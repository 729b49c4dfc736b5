//! Speech Providers - 合成适配器
//!
//! 统一契约后面的两个合成适配器，以及设备端适配器可驱动的引擎。
//! Provider 派发是封闭集合：一次请求恰好解析到设备端或云端一次。

mod cloud;
mod espeak;
mod on_device;
mod scripted;

pub use cloud::{CloudProvider, CloudProviderConfig};
pub use espeak::{EspeakDeviceEngine, EspeakEngineConfig};
pub use on_device::{OnDeviceProvider, OnDeviceProviderConfig};
pub use scripted::{ScriptedBehavior, ScriptedDeviceEngine, ScriptedEngineConfig};

use crate::domain::voice::{ProviderKind, VoiceCatalog};

/// 封闭的一对合成适配器
pub struct ProviderSet {
    pub on_device: OnDeviceProvider,
    pub cloud: CloudProvider,
}

impl ProviderSet {
    pub fn new(on_device: OnDeviceProvider, cloud: CloudProvider) -> Self {
        Self { on_device, cloud }
    }

    /// 从两个 provider 拉取最新语音列表并刷入目录
    ///
    /// 每次成功上报整体替换该 provider 的条目；云端列举失败时
    /// 保留之前的条目，而不是清空覆盖
    pub async fn refresh_catalog(&self, catalog: &VoiceCatalog) {
        let device_voices = self.on_device.voices().await;
        catalog.refresh(ProviderKind::OnDevice, device_voices);

        match self.cloud.voices().await {
            Ok(voices) => catalog.refresh(ProviderKind::Cloud, voices),
            Err(e) => {
                tracing::warn!(error = %e, "Cloud voice listing failed, keeping previous entries");
            }
        }
    }
}
