//! Voice Catalog - 语音目录
//!
//! 按 provider 维护已知语音集合，provider 上报可用性时整体刷新。
//! 解析优先级：会话内记住的选择 > 云端覆盖 > 设备端覆盖

use dashmap::DashMap;
use std::sync::Arc;

use super::value_objects::{primary_subtag, ProviderKind, Voice};

/// 跨 provider 的已知语音目录
pub struct VoiceCatalog {
    /// provider -> 语音列表，保持 provider 上报顺序
    by_provider: DashMap<ProviderKind, Vec<Voice>>,
    /// 语言主子标签 -> 本会话自动选中的语音
    session_picks: DashMap<String, Voice>,
}

impl VoiceCatalog {
    pub fn new() -> Self {
        Self {
            by_provider: DashMap::new(),
            session_picks: DashMap::new(),
        }
    }

    pub fn arc(self) -> Arc<Self> {
        Arc::new(self)
    }

    /// 整体替换某个 provider 的语音列表
    ///
    /// 不做按 id 修补：provider 之前的条目整体丢弃，列表形态变化时
    /// 不会留下过期重复项。指向被替换集合的会话选择一并丢弃。
    pub fn refresh(&self, provider: ProviderKind, voices: Vec<Voice>) {
        tracing::debug!(
            provider = %provider,
            count = voices.len(),
            "Voice catalog refreshed"
        );
        self.session_picks.retain(|_, v| v.provider != provider);
        self.by_provider.insert(provider, voices);
    }

    /// 语言标签的最佳语音；无覆盖时返回 None
    ///
    /// 优先级：本会话此语言的早先自动选择、首个覆盖该语言的云端语音、
    /// 首个前缀匹配的设备端语音（离线合成的优先）。None 表示"无覆盖"，
    /// 由调用方呈现给用户，不是错误。
    pub fn best_for(&self, language_tag: &str) -> Option<Voice> {
        let primary = primary_subtag(language_tag).to_string();

        if let Some(pick) = self.session_picks.get(&primary) {
            return Some(pick.value().clone());
        }

        let resolved = self
            .cloud_voice_for(language_tag)
            .or_else(|| self.device_voice_for(language_tag));

        if let Some(voice) = &resolved {
            self.session_picks.insert(primary, voice.clone());
        }
        resolved
    }

    /// 首个覆盖该语言的云端语音
    pub fn cloud_voice_for(&self, language_tag: &str) -> Option<Voice> {
        self.by_provider.get(&ProviderKind::Cloud).and_then(|voices| {
            voices
                .iter()
                .find(|v| v.matches_tag(language_tag))
                .cloned()
        })
    }

    /// 首个前缀匹配该语言的设备端语音，离线合成的优先
    pub fn device_voice_for(&self, language_tag: &str) -> Option<Voice> {
        self.by_provider
            .get(&ProviderKind::OnDevice)
            .and_then(|voices| {
                voices
                    .iter()
                    .find(|v| v.is_local && v.matches_tag(language_tag))
                    .or_else(|| voices.iter().find(|v| v.matches_tag(language_tag)))
                    .cloned()
            })
    }

    /// 跨 provider 按 id 查找语音
    pub fn find(&self, voice_id: &str) -> Option<Voice> {
        self.by_provider
            .iter()
            .find_map(|entry| entry.value().iter().find(|v| v.id == voice_id).cloned())
    }

    /// Provider 是否上报过至少一个语音
    pub fn has_provider(&self, provider: ProviderKind) -> bool {
        self.by_provider
            .get(&provider)
            .map(|v| !v.is_empty())
            .unwrap_or(false)
    }

    /// 所有已知语音，云端在前
    pub fn all(&self) -> Vec<Voice> {
        let mut voices = Vec::new();
        for provider in [ProviderKind::Cloud, ProviderKind::OnDevice] {
            if let Some(entry) = self.by_provider.get(&provider) {
                voices.extend(entry.iter().cloned());
            }
        }
        voices
    }
}

impl Default for VoiceCatalog {
    fn default() -> Self {
        Self::new()
    }
}
