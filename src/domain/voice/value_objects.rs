//! Voice Context - Value Objects

use serde::{Deserialize, Serialize};

/// 语音所属的合成后端
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProviderKind {
    OnDevice,
    Cloud,
}

impl ProviderKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ProviderKind::OnDevice => "on_device",
            ProviderKind::Cloud => "cloud",
        }
    }
}

impl std::fmt::Display for ProviderKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Provider 上报的一个合成选项
///
/// 上报后不可变；provider 每次上报语音列表时目录整体重建，不做原地修改
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Voice {
    /// Provider 分配的不透明标识
    pub id: String,
    /// 所属 provider
    pub provider: ProviderKind,
    /// BCP-47 风格语言标签，如 "fr" 或 "en-GB"
    pub language_tag: String,
    /// 展示名称
    pub display_name: String,
    /// 仅设备端语音：是否完全离线合成
    #[serde(default)]
    pub is_local: bool,
}

impl Voice {
    pub fn cloud(id: impl Into<String>, language_tag: impl Into<String>, display_name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            provider: ProviderKind::Cloud,
            language_tag: language_tag.into(),
            display_name: display_name.into(),
            is_local: false,
        }
    }

    pub fn on_device(
        id: impl Into<String>,
        language_tag: impl Into<String>,
        display_name: impl Into<String>,
        is_local: bool,
    ) -> Self {
        Self {
            id: id.into(),
            provider: ProviderKind::OnDevice,
            language_tag: language_tag.into(),
            display_name: display_name.into(),
            is_local,
        }
    }

    /// 是否按语言标签前缀覆盖 `tag`
    ///
    /// "fr-FR" 匹配 "fr" 和 "fr-FR"，不匹配 "de"
    pub fn matches_tag(&self, tag: &str) -> bool {
        primary_subtag(&self.language_tag) == primary_subtag(tag)
    }
}

/// BCP-47 风格标签的主子标签（"fr-FR" -> "fr"）
pub fn primary_subtag(tag: &str) -> &str {
    tag.split(['-', '_']).next().unwrap_or(tag)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_primary_subtag() {
        assert_eq!(primary_subtag("fr-FR"), "fr");
        assert_eq!(primary_subtag("zh_CN"), "zh");
        assert_eq!(primary_subtag("en"), "en");
    }

    #[test]
    fn test_matches_tag_by_prefix() {
        let voice = Voice::on_device("v1", "fr-FR", "Thomas", true);
        assert!(voice.matches_tag("fr"));
        assert!(voice.matches_tag("fr-FR"));
        assert!(!voice.matches_tag("de"));
    }
}
