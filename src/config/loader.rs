//! Configuration Loader
//!
//! 实现多源配置加载与合并逻辑
//!
//! 优先级（从高到低）：
//! 1. 环境变量
//! 2. 配置文件（config.toml）
//! 3. 默认值

use config::{Config, ConfigError as ConfigCrateError, Environment, File};
use std::path::Path;
use thiserror::Error;

use super::types::AppConfig;

/// 配置加载错误
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to load configuration: {0}")]
    LoadError(String),

    #[error("Failed to parse configuration: {0}")]
    ParseError(String),

    #[error("Configuration validation failed: {0}")]
    ValidationError(String),
}

impl From<ConfigCrateError> for ConfigError {
    fn from(err: ConfigCrateError) -> Self {
        ConfigError::LoadError(err.to_string())
    }
}

/// 配置文件搜索路径
const CONFIG_FILE_NAMES: &[&str] = &["config", "config.local"];

/// 加载应用配置
///
/// 按优先级从高到低合并配置：
/// 1. 环境变量（前缀 `LECTOR_`，层级分隔符 `__`）
/// 2. 配置文件（config.toml 或 config.local.toml）
/// 3. 默认值
///
/// # 环境变量示例
/// - `LECTOR_CLOUD__BASE_URL=http://voice.example.com`
/// - `LECTOR_CACHE__MAX_ENTRIES=100`
/// - `LECTOR_DEVICE__PRIMER_ENABLED=false`
pub fn load_config() -> Result<AppConfig, ConfigError> {
    load_config_from_path(None)
}

/// 从指定路径加载配置
///
/// # 参数
/// - `config_path` - 可选的配置文件路径，如果为 None 则使用默认搜索路径
pub fn load_config_from_path(config_path: Option<&Path>) -> Result<AppConfig, ConfigError> {
    let mut builder = Config::builder();

    // 1. 首先设置默认值（最低优先级）
    builder = builder
        .set_default("speech.default_language", "en")?
        .set_default("device.engine", "espeak")?
        .set_default("device.primer_enabled", true)?
        .set_default("device.primer_timeout_ms", 1500)?
        .set_default("device.start_timeout_ms", 3000)?
        .set_default("cloud.base_url", "http://localhost:7030")?
        .set_default("cloud.timeout_secs", 30)?
        .set_default("cloud.max_text_len", 4000)?
        .set_default("cache.ttl_secs", 86_400)?
        .set_default("cache.max_entries", 50)?
        .set_default("settings.path", "data/settings.sled")?
        .set_default("log.level", "info")?
        .set_default("log.json", false)?;

    // 2. 添加配置文件（如果存在）
    if let Some(path) = config_path {
        builder = builder.add_source(File::from(path).required(true));
    } else {
        // 搜索默认配置文件
        for name in CONFIG_FILE_NAMES {
            builder = builder.add_source(File::with_name(name).required(false));
        }
    }

    // 3. 添加环境变量（最高优先级）
    // 前缀: LECTOR_
    // 层级分隔符: __ (双下划线)
    builder = builder.add_source(
        Environment::with_prefix("LECTOR")
            .prefix_separator("_")
            .separator("__")
            .try_parsing(true),
    );

    // 4. 构建配置
    let config = builder.build()?;

    // 5. 反序列化为 AppConfig
    let app_config: AppConfig = config
        .try_deserialize()
        .map_err(|e| ConfigError::ParseError(format!("Failed to deserialize config: {}", e)))?;

    // 6. 验证配置
    validate_config(&app_config)?;

    Ok(app_config)
}

/// 验证配置合法性
fn validate_config(config: &AppConfig) -> Result<(), ConfigError> {
    if config.cloud.base_url.is_empty() {
        return Err(ConfigError::ValidationError(
            "Cloud base URL cannot be empty".to_string(),
        ));
    }

    if config.cloud.max_text_len == 0 {
        return Err(ConfigError::ValidationError(
            "Cloud max text length cannot be 0".to_string(),
        ));
    }

    if config.cache.max_entries == 0 {
        return Err(ConfigError::ValidationError(
            "Cache max entries cannot be 0".to_string(),
        ));
    }

    match config.device.engine.as_str() {
        "espeak" | "scripted" => {}
        other => {
            return Err(ConfigError::ValidationError(format!(
                "Unknown device engine: {}",
                other
            )));
        }
    }

    Ok(())
}

/// 启动时打印生效的配置
pub fn print_config(config: &AppConfig) {
    tracing::info!("=== Application Configuration ===");
    tracing::info!("Default Language: {}", config.speech.default_language);
    tracing::info!("Device Engine: {}", config.device.engine);
    tracing::info!(
        "Primer: enabled={} timeout={}ms",
        config.device.primer_enabled,
        config.device.primer_timeout_ms
    );
    tracing::info!("Cloud URL: {}", config.cloud.base_url);
    tracing::info!("Cloud Timeout: {}s", config.cloud.timeout_secs);
    tracing::info!(
        "Cache: ttl={}s max_entries={}",
        config.cache.ttl_secs,
        config.cache.max_entries
    );
    tracing::info!("Settings Store: {:?}", config.settings.path);
    tracing::info!("Log Level: {}", config.log.level);
    tracing::info!("=================================");
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = AppConfig::default();
        assert_eq!(config.speech.default_language, "en");
        assert_eq!(config.cache.ttl_secs, 86_400);
        assert_eq!(config.cache.max_entries, 50);
        assert!(config.device.primer_enabled);
    }

    #[test]
    fn test_validation_passes_for_default_config() {
        let config = AppConfig::default();
        assert!(validate_config(&config).is_ok());
    }

    #[test]
    fn test_validation_error_for_empty_cloud_url() {
        let mut config = AppConfig::default();
        config.cloud.base_url = String::new();
        assert!(validate_config(&config).is_err());
    }

    #[test]
    fn test_validation_error_for_zero_cache_cap() {
        let mut config = AppConfig::default();
        config.cache.max_entries = 0;
        assert!(validate_config(&config).is_err());
    }

    #[test]
    fn test_validation_error_for_unknown_engine() {
        let mut config = AppConfig::default();
        config.device.engine = "festival".to_string();
        assert!(validate_config(&config).is_err());
    }
}
