//! Lector - 划词朗读语音编排引擎
//!
//! 组装整套引擎并用 stdin 驱动：普通行直接朗读，
//! 斜杠命令映射到 orchestrator 的控制面

use std::sync::Arc;
use std::time::Duration;

use lector::application::orchestrator::{OrchestratorConfig, SpeechOrchestrator};
use lector::application::ports::DeviceSpeechPort;
use lector::config::{load_config, print_config};
use lector::domain::voice::VoiceCatalog;
use lector::infrastructure::cache::{AudioCacheConfig, InMemoryAudioCache};
use lector::infrastructure::events::EventPublisher;
use lector::infrastructure::persistence::sled::SledSettingsStore;
use lector::infrastructure::playback::SimulatedAudioPlayer;
use lector::infrastructure::providers::{
    CloudProvider, CloudProviderConfig, EspeakDeviceEngine, EspeakEngineConfig, OnDeviceProvider,
    OnDeviceProviderConfig, ProviderSet, ScriptedDeviceEngine,
};
use lector::infrastructure::sync::{ContextSync, StateOwner};
use tokio::io::AsyncBufReadExt;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // 加载配置（优先级：环境变量 > 配置文件 > 默认值）
    let config = load_config().map_err(|e| anyhow::anyhow!("Failed to load config: {}", e))?;

    // 初始化日志
    let log_filter = format!("{},lector={}", config.log.level, config.log.level);
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&log_filter));
    if config.log.json {
        tracing_subscriber::fmt().json().with_env_filter(env_filter).init();
    } else {
        tracing_subscriber::fmt().with_env_filter(env_filter).init();
    }

    tracing::info!("Lector - speech orchestration engine");
    print_config(&config);

    // 确保数据目录存在
    if let Some(parent) = config.settings.path.parent() {
        tokio::fs::create_dir_all(parent).await?;
    }

    // 共享状态 owner 加本上下文的句柄
    let store = SledSettingsStore::open(&config.settings.path)?.arc();
    let owner = StateOwner::spawn(store);
    let context = ContextSync::connect(&owner).await;

    // 按配置选设备端引擎；"scripted" 让没装 espeak-ng 的机器
    // 也能把程序跑起来
    let device_engine: Arc<dyn DeviceSpeechPort> = match config.device.engine.as_str() {
        "scripted" => ScriptedDeviceEngine::normal().arc(),
        _ => EspeakDeviceEngine::new(EspeakEngineConfig::default()).arc(),
    };

    let on_device = OnDeviceProvider::new(
        device_engine,
        OnDeviceProviderConfig {
            primer_enabled: config.device.primer_enabled,
            primer_timeout: Duration::from_millis(config.device.primer_timeout_ms),
            start_timeout: Duration::from_millis(config.device.start_timeout_ms),
        },
    );
    let cloud = CloudProvider::new(CloudProviderConfig {
        base_url: config.cloud.base_url.clone(),
        timeout_secs: config.cloud.timeout_secs,
        max_text_len: config.cloud.max_text_len,
    })?;
    let providers = Arc::new(ProviderSet::new(on_device, cloud));

    let catalog = VoiceCatalog::new().arc();
    providers.refresh_catalog(&catalog).await;
    tracing::info!(voices = catalog.all().len(), "Voice catalog ready");

    let cache = InMemoryAudioCache::new(AudioCacheConfig {
        ttl: Duration::from_secs(config.cache.ttl_secs),
        max_entries: config.cache.max_entries,
    })
    .arc();
    let player = SimulatedAudioPlayer::with_defaults().arc();
    let events = EventPublisher::new().arc();

    // 把 orchestrator 事件转发进日志；真实宿主在这里喂自己的 UI
    let mut event_rx = events.subscribe();
    tokio::spawn(async move {
        while let Ok(event) = event_rx.recv().await {
            tracing::info!(event = ?event, "Playback event");
        }
    });

    let orchestrator = SpeechOrchestrator::new(
        OrchestratorConfig {
            default_language: config.speech.default_language.clone(),
        },
        providers,
        Arc::clone(&catalog),
        cache,
        player,
        events,
        Arc::clone(&context),
    );

    tracing::info!(
        "Type text to speak it; /pause /resume /stop /rate <x> /voice <id> /on /off /voices /quit"
    );

    let mut lines = tokio::io::BufReader::new(tokio::io::stdin()).lines();
    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                tracing::info!("Received shutdown signal");
                break;
            }
            line = lines.next_line() => {
                let Some(line) = line? else { break };
                let line = line.trim();
                if line.is_empty() {
                    continue;
                }

                if let Some(command) = line.strip_prefix('/') {
                    let mut parts = command.split_whitespace();
                    match parts.next() {
                        Some("pause") => orchestrator.pause(),
                        Some("resume") => orchestrator.resume(),
                        Some("stop") => orchestrator.stop(),
                        Some("rate") => match parts.next().and_then(|v| v.parse::<f32>().ok()) {
                            Some(rate) => orchestrator.set_rate(rate).await,
                            None => tracing::warn!("Usage: /rate <multiplier>"),
                        },
                        Some("voice") => orchestrator.set_voice(parts.next().map(str::to_string)),
                        Some("on") => context.set_enabled(true),
                        Some("off") => context.set_enabled(false),
                        Some("voices") => {
                            for voice in catalog.all() {
                                tracing::info!(
                                    id = %voice.id,
                                    language = %voice.language_tag,
                                    provider = %voice.provider,
                                    "{}",
                                    voice.display_name
                                );
                            }
                        }
                        Some("quit") | Some("exit") => break,
                        _ => tracing::warn!("Unknown command: {}", line),
                    }
                } else {
                    orchestrator.play(line);
                }
            }
        }
    }

    orchestrator.shutdown();
    tracing::info!("Shutdown complete");
    Ok(())
}
