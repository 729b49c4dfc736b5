//! Context Sync Handle - 上下文侧同步句柄
//!
//! 一个浏览上下文看到的共享状态。读取只打内存副本；owner 的广播是
//! 唯一的保鲜机制。这是刻意的取舍：每次划词都要查 `enabled`，
//! 不能每次都付一遍存储读取的代价。关闭广播到达时立即执行注册的
//! 撤下钩子，不等用户操作。

use std::sync::{Arc, Mutex, RwLock};
use tokio::sync::{broadcast, oneshot};
use uuid::Uuid;

use super::owner::{OwnerHandle, StateRequest};
use crate::application::ports::SharedState;

type DisabledHook = Box<dyn Fn() + Send + Sync>;

/// 单个上下文的共享状态句柄
pub struct ContextSync {
    context_id: Uuid,
    owner: OwnerHandle,
    state: RwLock<SharedState>,
    disabled_hooks: Mutex<Vec<DisabledHook>>,
}

impl ContextSync {
    /// 加入同步协议：先订阅，再显式问一次当前状态
    ///
    /// 订阅先于显式拉取，夹在中间到达的广播不会丢，
    /// 最多被应用两次
    pub async fn connect(owner: &OwnerHandle) -> Arc<Self> {
        let updates = owner.subscribe();

        let (tx, rx) = oneshot::channel();
        owner.request(StateRequest::Get { reply: tx });
        let state = match rx.await {
            Ok(state) => state,
            Err(_) => {
                tracing::warn!("State owner unavailable, starting from defaults");
                SharedState::default()
            }
        };

        let context = Arc::new(Self {
            context_id: Uuid::new_v4(),
            owner: owner.clone(),
            state: RwLock::new(state),
            disabled_hooks: Mutex::new(Vec::new()),
        });

        tokio::spawn(Arc::clone(&context).listen(updates));

        tracing::debug!(context_id = %context.context_id, "Context joined sync");
        context
    }

    async fn listen(self: Arc<Self>, mut updates: broadcast::Receiver<SharedState>) {
        loop {
            match updates.recv().await {
                Ok(new_state) => self.apply(new_state),
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    tracing::warn!(
                        context_id = %self.context_id,
                        skipped,
                        "Missed broadcasts, next one self-corrects"
                    );
                }
                Err(broadcast::error::RecvError::Closed) => break,
            }
        }
        tracing::debug!(context_id = %self.context_id, "Context left sync");
    }

    fn apply(&self, new_state: SharedState) {
        let was_enabled = {
            let mut state = match self.state.write() {
                Ok(guard) => guard,
                Err(poisoned) => poisoned.into_inner(),
            };
            let was = state.enabled;
            *state = new_state.clone();
            was
        };

        tracing::debug!(
            context_id = %self.context_id,
            enabled = new_state.enabled,
            rate = new_state.rate,
            "Shared state applied"
        );

        if was_enabled && !new_state.enabled {
            let hooks = match self.disabled_hooks.lock() {
                Ok(guard) => guard,
                Err(poisoned) => poisoned.into_inner(),
            };
            for hook in hooks.iter() {
                hook();
            }
        }
    }

    fn snapshot(&self) -> SharedState {
        match self.state.read() {
            Ok(guard) => guard.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }

    /// 缓存的开关副本；不读存储
    pub fn enabled(&self) -> bool {
        self.snapshot().enabled
    }

    pub fn rate(&self) -> f32 {
        self.snapshot().rate
    }

    pub fn selected_voice_id(&self) -> Option<String> {
        self.snapshot().selected_voice_id
    }

    pub fn context_id(&self) -> Uuid {
        self.context_id
    }

    /// 请求 owner 拨总开关
    pub fn set_enabled(&self, enabled: bool) {
        self.owner.request(StateRequest::SetEnabled(enabled));
    }

    /// 请求新的会话速率；由 owner 钳制
    pub fn set_rate(&self, rate: f32) {
        self.owner.request(StateRequest::SetRate(rate));
    }

    /// 请求新的语音指定
    pub fn set_voice(&self, voice_id: Option<String>) {
        self.owner.request(StateRequest::SetVoice(voice_id));
    }

    /// 广播把开关拨到关时运行 `hook`
    pub fn on_disabled(&self, hook: impl Fn() + Send + Sync + 'static) {
        let mut hooks = match self.disabled_hooks.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        hooks.push(Box::new(hook));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infrastructure::persistence::memory::InMemorySettingsStore;
    use crate::infrastructure::sync::StateOwner;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    async fn wait_until(condition: impl Fn() -> bool) {
        tokio::time::timeout(Duration::from_millis(500), async {
            while !condition() {
                tokio::time::sleep(Duration::from_millis(5)).await;
            }
        })
        .await
        .expect("condition never held");
    }

    #[tokio::test]
    async fn test_late_context_fetches_current_state() {
        let store = InMemorySettingsStore::with_state(SharedState {
            enabled: false,
            rate: 1.5,
            selected_voice_id: Some("neural-en-1".to_string()),
        })
        .arc();
        let owner = StateOwner::spawn(store);

        // 还没有任何广播；显式拉取必须覆盖启动场景
        let context = ContextSync::connect(&owner).await;
        assert!(!context.enabled());
        assert_eq!(context.rate(), 1.5);
        assert_eq!(
            context.selected_voice_id(),
            Some("neural-en-1".to_string())
        );
    }

    #[tokio::test]
    async fn test_change_in_one_context_reaches_another() {
        let owner = StateOwner::spawn(InMemorySettingsStore::new().arc());
        let context_a = ContextSync::connect(&owner).await;
        let context_b = ContextSync::connect(&owner).await;

        context_a.set_rate(2.0);

        let b = Arc::clone(&context_b);
        wait_until(move || (b.rate() - 2.0).abs() < f32::EPSILON).await;
        assert_eq!(context_b.rate(), 2.0);
    }

    #[tokio::test]
    async fn test_disable_broadcast_runs_teardown_hooks() {
        let owner = StateOwner::spawn(InMemorySettingsStore::new().arc());
        let context_a = ContextSync::connect(&owner).await;
        let context_b = ContextSync::connect(&owner).await;

        let torn_down = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&torn_down);
        context_b.on_disabled(move || {
            counter.fetch_add(1, Ordering::SeqCst);
        });

        context_a.set_enabled(false);

        let hits = Arc::clone(&torn_down);
        wait_until(move || hits.load(Ordering::SeqCst) == 1).await;
        assert!(!context_b.enabled());
    }

    #[tokio::test]
    async fn test_reenabling_does_not_run_hooks() {
        let owner = StateOwner::spawn(InMemorySettingsStore::new().arc());
        let context = ContextSync::connect(&owner).await;

        let torn_down = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&torn_down);
        context.on_disabled(move || {
            counter.fetch_add(1, Ordering::SeqCst);
        });

        context.set_enabled(false);
        {
            let c = Arc::clone(&context);
            wait_until(move || !c.enabled()).await;
        }
        context.set_enabled(true);
        {
            let c = Arc::clone(&context);
            wait_until(move || c.enabled()).await;
        }

        assert_eq!(torn_down.load(Ordering::SeqCst), 1);
    }
}
