//! Speech Orchestrator - 语音编排状态机
//!
//! 持有"现在在播什么"：解析语音、查音频缓存、派发到 provider，
//! 并驱动播放状态机
//!
//!   Idle -> Resolving -> (CacheHit | Synthesizing) -> Playing <-> Paused
//!        -> Ended -> Idle
//!
//! Error 可从 Resolving/Synthesizing/Playing 进入，呈现后总是复位到
//! Idle。请求作为 spawn 出的任务运行，按代数计数器设检查点：
//! 先停后起加上代数递增，让所有过期步骤都变成 no-op，播放权
//! 始终只属于一个会话。回退策略只存在于这里：每次请求至多一次
//! 云端到设备端的回退，不再级联。

mod session;

pub use session::{ActiveSource, PlaybackSession, PlaybackStatus};

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, Weak};
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::timeout;

use crate::application::error::PlaybackErrorKind;
use crate::application::ports::{
    cache_key, AudioCachePort, AudioData, AudioPlayerPort, DeviceEvent, DeviceUtterance,
    PlaybackControl, PlayerError, SharedState, SynthesisError, SynthesizedSpeech,
};
use crate::domain::language;
use crate::domain::voice::{ProviderKind, Voice, VoiceCatalog};
use crate::infrastructure::events::{EventPublisher, PlaybackEvent};
use crate::infrastructure::providers::ProviderSet;
use crate::infrastructure::sync::ContextSync;

/// 重播前等待旧资源确认释放的上限
const RELEASE_TIMEOUT: Duration = Duration::from_millis(500);

#[derive(Debug, Clone)]
pub struct OrchestratorConfig {
    /// 检测无结果时使用的语言标签
    pub default_language: String,
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            default_language: language::DEFAULT_LANGUAGE.to_string(),
        }
    }
}

struct Inner {
    session: Option<PlaybackSession>,
    task: Option<JoinHandle<()>>,
}

/// 播放状态机
pub struct SpeechOrchestrator {
    config: OrchestratorConfig,
    providers: Arc<ProviderSet>,
    catalog: Arc<VoiceCatalog>,
    cache: Arc<dyn AudioCachePort>,
    player: Arc<dyn AudioPlayerPort>,
    events: Arc<EventPublisher>,
    sync: Arc<ContextSync>,
    inner: Mutex<Inner>,
    /// 每次撤下会话时递增；持有旧值的在途步骤无法再提交
    generation: AtomicU64,
    self_ref: Weak<SpeechOrchestrator>,
}

impl SpeechOrchestrator {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        config: OrchestratorConfig,
        providers: Arc<ProviderSet>,
        catalog: Arc<VoiceCatalog>,
        cache: Arc<dyn AudioCachePort>,
        player: Arc<dyn AudioPlayerPort>,
        events: Arc<EventPublisher>,
        sync: Arc<ContextSync>,
    ) -> Arc<Self> {
        let orchestrator = Arc::new_cyclic(|weak| Self {
            config,
            providers,
            catalog,
            cache,
            player,
            events,
            sync,
            inner: Mutex::new(Inner {
                session: None,
                task: None,
            }),
            generation: AtomicU64::new(0),
            self_ref: weak.clone(),
        });

        // 任一上下文关掉共享开关，本上下文立即撤下播放，
        // 不等下一次用户操作
        let weak = Arc::downgrade(&orchestrator);
        orchestrator.sync.on_disabled(move || {
            if let Some(orchestrator) = weak.upgrade() {
                tracing::info!("Speech disabled, tearing down playback");
                orchestrator.stop();
            }
        });

        orchestrator
    }

    /// 朗读 `text`；重复提交当前文本是 no-op
    pub fn play(&self, text: &str) {
        self.submit(text, self.sync.rate(), false);
    }

    /// 朗读 `text`，即使它就是当前文本
    pub fn replay(&self, text: &str) {
        self.submit(text, self.sync.rate(), true);
    }

    fn submit(&self, text: &str, rate: f32, force: bool) {
        // 只查缓存的开关副本；广播负责保鲜
        if !self.sync.enabled() {
            tracing::debug!("Speech disabled, ignoring request");
            return;
        }

        let text = text.trim();
        if text.is_empty() {
            return;
        }

        let Some(this) = self.self_ref.upgrade() else {
            return;
        };

        let mut inner = self.lock_inner();

        if !force {
            if let Some(session) = &inner.session {
                if session.status.is_active() && session.text == text {
                    tracing::debug!("Duplicate request for active text, ignoring");
                    return;
                }
            }
        }

        // 先停后起：上一个会话先完全释放
        self.teardown_locked(&mut inner);

        let generation = self.generation.fetch_add(1, Ordering::SeqCst) + 1;
        let session = PlaybackSession::new(text, rate);
        tracing::info!(session_id = %session.id, text_len = text.len(), "Playback requested");
        inner.session = Some(session);

        let text = text.to_string();
        inner.task = Some(tokio::spawn(async move {
            this.run_request(generation, text, rate).await;
        }));
    }

    /// 无条件取消当前活动并回到 Idle
    ///
    /// 任何状态下可调且幂等：连停两次、或 Idle 时再停，什么都不改变
    pub fn stop(&self) {
        let mut inner = self.lock_inner();
        self.teardown_locked(&mut inner);
    }

    /// 停止播放、释放缓存并清掉会话
    pub fn shutdown(&self) {
        self.stop();
        let stats = self.cache.stats();
        tracing::info!(
            entries = stats.entries,
            hits = stats.hit_count,
            misses = stats.miss_count,
            "Releasing audio cache"
        );
        self.cache.clear();
        tracing::info!("Orchestrator shut down");
    }

    /// 暂停当前播放（来源支持时）
    pub fn pause(&self) {
        let mut inner = self.lock_inner();
        let Some(session) = inner.session.as_mut() else {
            return;
        };
        if session.status != PlaybackStatus::Playing {
            return;
        }

        let paused = match &session.source {
            Some(ActiveSource::Device { engine }) => engine.pause(),
            Some(ActiveSource::Audio { control, .. }) => control.pause(),
            None => false,
        };

        if paused {
            session.status = PlaybackStatus::Paused;
            self.events.publish(PlaybackEvent::Paused {
                session_id: session.id,
            });
        } else {
            tracing::debug!("Active source does not support pause");
        }
    }

    /// 恢复暂停的播放
    pub fn resume(&self) {
        let mut inner = self.lock_inner();
        let Some(session) = inner.session.as_mut() else {
            return;
        };
        if session.status != PlaybackStatus::Paused {
            return;
        }

        let resumed = match &session.source {
            Some(ActiveSource::Device { engine }) => engine.resume(),
            Some(ActiveSource::Audio { control, .. }) => control.resume(),
            None => false,
        };

        if resumed {
            session.status = PlaybackStatus::Playing;
            self.events.publish(PlaybackEvent::Resumed {
                session_id: session.id,
            });
        }
    }

    /// 修改会话速率
    ///
    /// 新速率经 sync owner 共享。对当前播放：来源有在播调速路径时
    /// 直接应用；否则从解析重启请求，且必须等上一个来源确认释放
    pub async fn set_rate(&self, rate: f32) {
        let rate = SharedState::clamp_rate(rate);
        self.sync.set_rate(rate);

        enum Restart {
            No,
            Audio(PlaybackControl, String),
            Device(String),
        }

        let restart = {
            let mut inner = self.lock_inner();
            let Some(session) = inner.session.as_mut() else {
                return;
            };
            if !matches!(
                session.status,
                PlaybackStatus::Playing | PlaybackStatus::Paused
            ) {
                return;
            }
            session.rate = rate;

            match &session.source {
                Some(ActiveSource::Audio { control, .. }) => {
                    if control.set_rate(rate) {
                        tracing::debug!(rate, "Rate applied live to audio playback");
                        Restart::No
                    } else {
                        Restart::Audio(control.clone(), session.text.clone())
                    }
                }
                Some(ActiveSource::Device { engine }) => {
                    if engine.set_rate(rate) {
                        tracing::debug!(rate, "Rate applied live by the engine");
                        Restart::No
                    } else {
                        Restart::Device(session.text.clone())
                    }
                }
                None => Restart::No,
            }
        };

        match restart {
            Restart::No => {}
            Restart::Audio(control, text) => {
                self.stop();
                let mut waiter = control;
                if timeout(RELEASE_TIMEOUT, waiter.wait_finished()).await.is_err() {
                    tracing::warn!("Previous playback did not confirm release in time");
                }
                self.submit(&text, rate, true);
            }
            Restart::Device(text) => {
                // 引擎取消是同步的，直接重播
                self.stop();
                self.submit(&text, rate, true);
            }
        }
    }

    /// 把用户显式选择的语音记入共享状态
    pub fn set_voice(&self, voice_id: Option<String>) {
        self.sync.set_voice(voice_id);
    }

    /// 从两个 provider 拉取最新语音列表
    pub async fn refresh_voices(&self) {
        self.providers.refresh_catalog(&self.catalog).await;
    }

    pub fn status(&self) -> PlaybackStatus {
        self.lock_inner()
            .session
            .as_ref()
            .map(|s| s.status)
            .unwrap_or(PlaybackStatus::Idle)
    }

    pub fn current_text(&self) -> Option<String> {
        self.lock_inner().session.as_ref().map(|s| s.text.clone())
    }

    // ---- 请求流水线 ----

    async fn run_request(self: Arc<Self>, generation: u64, text: String, rate: f32) {
        let language = language::detect_or(&text, &self.config.default_language).to_string();
        tracing::debug!(language = %language, "Resolving voice");

        let Some(voice) = self.resolve_voice(&language) else {
            // 这是信号不是错误：呈现给用户然后回家
            tracing::info!(language = %language, "No voice coverage for language");
            self.events.publish(PlaybackEvent::NoVoice { language });
            self.reset_idle(generation);
            return;
        };

        if !self.assign_voice(generation, &voice) {
            return;
        }

        let key = cache_key(&text, &voice.id);
        let cached = match self.cache.get(&key) {
            Ok(cached) => cached,
            Err(e) => {
                // 不可读条目降级为未命中，不往上抛
                tracing::warn!(error = %e, "Cache read failed, treating as miss");
                None
            }
        };

        if let Some(audio) = cached {
            tracing::debug!(key = %key, "Cache hit, skipping synthesis");
            match self.play_audio(generation, audio, true, rate, &voice).await {
                Ok(()) => return,
                Err(e) => {
                    tracing::warn!(error = %e, "Cached playback failed, synthesizing fresh");
                }
            }
        }

        if !self.set_status(generation, PlaybackStatus::Synthesizing) {
            return;
        }

        match self.synthesize_with_fallback(&text, voice, rate).await {
            Ok((SynthesizedSpeech::Audio(audio), used_voice)) => {
                // 播放开始前先写缓存，TTL 内的相同请求就是命中
                self.cache.put(&key, Arc::clone(&audio));
                if let Err(e) = self
                    .play_audio(generation, audio, false, rate, &used_voice)
                    .await
                {
                    self.fail(generation, PlaybackErrorKind::ProviderRejected, e.to_string());
                }
            }
            Ok((SynthesizedSpeech::Live(utterance), used_voice)) => {
                self.play_live(generation, utterance, &used_voice).await;
            }
            Err(SynthesisError::Canceled) => {
                tracing::debug!("Synthesis canceled");
            }
            Err(e) => {
                self.fail(generation, e.user_kind(), e.to_string());
            }
        }
    }

    /// 解析请求的目标语音
    ///
    /// 显式指定的语音只要还在目录里就优先。指定语音已不可用时，
    /// 回退到检测语言的默认云端语音，再回退到目录解析；
    /// 指定语音不可用绝不让请求直接失败。
    fn resolve_voice(&self, language: &str) -> Option<Voice> {
        if let Some(id) = self.sync.selected_voice_id() {
            if let Some(voice) = self.catalog.find(&id) {
                return Some(voice);
            }
            tracing::debug!(voice_id = %id, "Selected voice unavailable, falling back");
            if let Some(voice) = self.catalog.cloud_voice_for(language) {
                return Some(voice);
            }
        }
        self.catalog.best_for(language)
    }

    /// 派发合成，带那一次既定回退
    ///
    /// 有资格恢复的云端失败换同语言的设备端语音试恰好一次；
    /// 设备端失败已无路可退，从不级联。
    async fn synthesize_with_fallback(
        &self,
        text: &str,
        voice: Voice,
        rate: f32,
    ) -> Result<(SynthesizedSpeech, Voice), SynthesisError> {
        match voice.provider {
            ProviderKind::Cloud => match self.providers.cloud.synthesize(text, &voice, rate).await
            {
                Ok(audio) => Ok((SynthesizedSpeech::Audio(audio), voice)),
                Err(e) if e.allows_fallback() => {
                    let Some(device_voice) = self.catalog.device_voice_for(&voice.language_tag)
                    else {
                        return Err(e);
                    };
                    tracing::warn!(
                        error = %e,
                        fallback_voice = %device_voice.id,
                        "Cloud synthesis failed, falling back to on-device voice"
                    );
                    let utterance = self
                        .providers
                        .on_device
                        .synthesize(text, &device_voice, rate)
                        .await?;
                    Ok((SynthesizedSpeech::Live(utterance), device_voice))
                }
                Err(e) => Err(e),
            },
            ProviderKind::OnDevice => {
                let utterance = self.providers.on_device.synthesize(text, &voice, rate).await?;
                Ok((SynthesizedSpeech::Live(utterance), voice))
            }
        }
    }

    async fn play_audio(
        &self,
        generation: u64,
        audio: Arc<AudioData>,
        from_cache: bool,
        rate: f32,
        voice: &Voice,
    ) -> Result<(), PlayerError> {
        let control = self.player.play(audio, rate).await?;

        {
            let mut inner = self.lock_inner();
            if self.stale(generation) {
                control.stop();
                return Ok(());
            }
            let Some(session) = inner.session.as_mut() else {
                control.stop();
                return Ok(());
            };
            session.voice = Some(voice.clone());
            session.rate = rate;
            session.status = PlaybackStatus::Playing;
            session.source = Some(ActiveSource::Audio {
                control: control.clone(),
                from_cache,
            });
            tracing::info!(
                session_id = %session.id,
                voice_id = %voice.id,
                from_cache,
                "Playback started"
            );
            self.events.publish(PlaybackEvent::Started {
                session_id: session.id,
                voice_id: voice.id.clone(),
                provider: voice.provider,
                from_cache,
            });
        }

        let mut waiter = control;
        waiter.wait_finished().await;
        self.finish(generation);
        Ok(())
    }

    async fn play_live(
        &self,
        generation: u64,
        mut utterance: DeviceUtterance,
        voice: &Voice,
    ) {
        let engine = utterance.controls();

        {
            let mut inner = self.lock_inner();
            if self.stale(generation) {
                engine.cancel();
                return;
            }
            let Some(session) = inner.session.as_mut() else {
                engine.cancel();
                return;
            };
            session.voice = Some(voice.clone());
            session.status = PlaybackStatus::Playing;
            session.source = Some(ActiveSource::Device {
                engine: Arc::clone(&engine),
            });
            tracing::info!(
                session_id = %session.id,
                voice_id = %voice.id,
                "Device playback started"
            );
            self.events.publish(PlaybackEvent::Started {
                session_id: session.id,
                voice_id: voice.id.clone(),
                provider: voice.provider,
                from_cache: false,
            });
        }

        if utterance.is_finished() {
            self.finish(generation);
            return;
        }

        loop {
            match utterance.next_event().await {
                Some(DeviceEvent::Ended) => {
                    self.finish(generation);
                    return;
                }
                Some(DeviceEvent::Canceled) => {
                    // 状态迁移归撤下逻辑管
                    tracing::debug!("Device utterance canceled");
                    return;
                }
                Some(DeviceEvent::Error(message)) => {
                    self.fail(generation, PlaybackErrorKind::ProviderRejected, message);
                    return;
                }
                Some(DeviceEvent::Started) => continue,
                None => {
                    self.fail(
                        generation,
                        PlaybackErrorKind::ProviderRejected,
                        "engine closed the event stream".to_string(),
                    );
                    return;
                }
            }
        }
    }

    // ---- 状态簿记 ----

    fn lock_inner(&self) -> MutexGuard<'_, Inner> {
        match self.inner.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    fn stale(&self, generation: u64) -> bool {
        self.generation.load(Ordering::SeqCst) != generation
    }

    fn teardown_locked(&self, inner: &mut Inner) {
        self.generation.fetch_add(1, Ordering::SeqCst);

        if let Some(task) = inner.task.take() {
            task.abort();
        }

        if let Some(mut session) = inner.session.take() {
            match session.source.take() {
                Some(ActiveSource::Device { engine }) => engine.cancel(),
                Some(ActiveSource::Audio { control, .. }) => control.stop(),
                None => {
                    // 解析或合成途中，设备引擎可能已经在读预热句
                    // 或正式语句
                    if matches!(
                        session.status,
                        PlaybackStatus::Resolving | PlaybackStatus::Synthesizing
                    ) {
                        self.providers.on_device.cancel();
                    }
                }
            }
            tracing::debug!(
                session_id = %session.id,
                from = %session.status,
                "Session torn down"
            );
        }
    }

    fn set_status(&self, generation: u64, status: PlaybackStatus) -> bool {
        let mut inner = self.lock_inner();
        if self.stale(generation) {
            return false;
        }
        match inner.session.as_mut() {
            Some(session) => {
                session.status = status;
                true
            }
            None => false,
        }
    }

    fn assign_voice(&self, generation: u64, voice: &Voice) -> bool {
        let mut inner = self.lock_inner();
        if self.stale(generation) {
            return false;
        }
        match inner.session.as_mut() {
            Some(session) => {
                session.voice = Some(voice.clone());
                true
            }
            None => false,
        }
    }

    fn reset_idle(&self, generation: u64) {
        let mut inner = self.lock_inner();
        if self.stale(generation) {
            return;
        }
        inner.session = None;
        inner.task = None;
    }

    fn finish(&self, generation: u64) {
        let mut inner = self.lock_inner();
        if self.stale(generation) {
            return;
        }
        if let Some(mut session) = inner.session.take() {
            session.status = PlaybackStatus::Ended;
            tracing::info!(session_id = %session.id, "Playback ended");
            self.events.publish(PlaybackEvent::Ended {
                session_id: session.id,
            });
        }
        inner.task = None;
    }

    fn fail(&self, generation: u64, kind: PlaybackErrorKind, message: String) {
        let mut inner = self.lock_inner();
        if self.stale(generation) {
            return;
        }
        if let Some(mut session) = inner.session.take() {
            session.status = PlaybackStatus::Error;
            tracing::warn!(
                session_id = %session.id,
                kind = %kind,
                error = %message,
                "Playback failed"
            );
            self.events.publish(PlaybackEvent::PlaybackFailed {
                session_id: session.id,
                kind,
                message,
            });
        }
        inner.task = None;
    }
}
