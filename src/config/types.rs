//! Configuration Types

use serde::Deserialize;
use std::path::PathBuf;

/// 应用顶层配置
#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    /// 朗读默认项（语言等）
    #[serde(default)]
    pub speech: SpeechConfig,

    /// 设备端引擎配置
    #[serde(default)]
    pub device: DeviceConfig,

    /// 云端合成服务配置
    #[serde(default)]
    pub cloud: CloudConfig,

    /// 音频缓存配置
    #[serde(default)]
    pub cache: CacheConfig,

    /// 持久化设置存储配置
    #[serde(default)]
    pub settings: SettingsConfig,

    /// 日志配置
    #[serde(default)]
    pub log: LogConfig,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            speech: SpeechConfig::default(),
            device: DeviceConfig::default(),
            cloud: CloudConfig::default(),
            cache: CacheConfig::default(),
            settings: SettingsConfig::default(),
            log: LogConfig::default(),
        }
    }
}

/// 朗读默认项
#[derive(Debug, Clone, Deserialize)]
pub struct SpeechConfig {
    /// 检测无结果时的回退语言标签
    #[serde(default = "default_language")]
    pub default_language: String,
}

fn default_language() -> String {
    "en".to_string()
}

impl Default for SpeechConfig {
    fn default() -> Self {
        Self {
            default_language: default_language(),
        }
    }
}

/// 设备端语音引擎配置
#[derive(Debug, Clone, Deserialize)]
pub struct DeviceConfig {
    /// 引擎后端: "espeak" 或 "scripted"
    #[serde(default = "default_engine")]
    pub engine: String,

    /// 正式朗读前是否先发一条近静音的预热句
    #[serde(default = "default_primer_enabled")]
    pub primer_enabled: bool,

    /// 预热句等待上限（毫秒）
    #[serde(default = "default_primer_timeout_ms")]
    pub primer_timeout_ms: u64,

    /// 等待引擎 "started" 信号的上限（毫秒）
    #[serde(default = "default_start_timeout_ms")]
    pub start_timeout_ms: u64,
}

fn default_engine() -> String {
    "espeak".to_string()
}

fn default_primer_enabled() -> bool {
    true
}

fn default_primer_timeout_ms() -> u64 {
    1500
}

fn default_start_timeout_ms() -> u64 {
    3000
}

impl Default for DeviceConfig {
    fn default() -> Self {
        Self {
            engine: default_engine(),
            primer_enabled: default_primer_enabled(),
            primer_timeout_ms: default_primer_timeout_ms(),
            start_timeout_ms: default_start_timeout_ms(),
        }
    }
}

/// 云端合成服务配置
#[derive(Debug, Clone, Deserialize)]
pub struct CloudConfig {
    /// 服务基础 URL
    #[serde(default = "default_cloud_url")]
    pub base_url: String,

    /// 请求超时时间（秒）
    #[serde(default = "default_cloud_timeout")]
    pub timeout_secs: u64,

    /// 超过此字符数的请求在本地直接拒绝
    #[serde(default = "default_max_text_len")]
    pub max_text_len: usize,
}

fn default_cloud_url() -> String {
    "http://localhost:7030".to_string()
}

fn default_cloud_timeout() -> u64 {
    30
}

fn default_max_text_len() -> usize {
    4000
}

impl Default for CloudConfig {
    fn default() -> Self {
        Self {
            base_url: default_cloud_url(),
            timeout_secs: default_cloud_timeout(),
            max_text_len: default_max_text_len(),
        }
    }
}

/// 音频缓存配置
#[derive(Debug, Clone, Deserialize)]
pub struct CacheConfig {
    /// 条目存活时间（秒）
    #[serde(default = "default_cache_ttl")]
    pub ttl_secs: u64,

    /// 最大缓存条目数
    #[serde(default = "default_cache_max_entries")]
    pub max_entries: usize,
}

fn default_cache_ttl() -> u64 {
    86_400
}

fn default_cache_max_entries() -> usize {
    50
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            ttl_secs: default_cache_ttl(),
            max_entries: default_cache_max_entries(),
        }
    }
}

/// 持久化设置存储配置
#[derive(Debug, Clone, Deserialize)]
pub struct SettingsConfig {
    /// Sled 数据库路径
    #[serde(default = "default_settings_path")]
    pub path: PathBuf,
}

fn default_settings_path() -> PathBuf {
    PathBuf::from("data/settings.sled")
}

impl Default for SettingsConfig {
    fn default() -> Self {
        Self {
            path: default_settings_path(),
        }
    }
}

/// 日志配置
#[derive(Debug, Clone, Deserialize)]
pub struct LogConfig {
    /// 日志级别: trace, debug, info, warn, error
    #[serde(default = "default_log_level")]
    pub level: String,

    /// 是否输出 JSON 格式日志
    #[serde(default)]
    pub json: bool,
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            json: false,
        }
    }
}
