//! Shared-State Owner - 共享状态的唯一写者
//!
//! 持久化设置的唯一写者。变更经它的请求队列串行化；
//! 每个被接受的变更先写穿设置存储，再广播给所有在线上下文。

use std::sync::Arc;
use tokio::sync::{broadcast, mpsc, oneshot};

use crate::application::ports::{SettingsStorePort, SharedState};

/// 上下文可以发给 owner 的请求
#[derive(Debug)]
pub enum StateRequest {
    /// 晚启动上下文的显式一次性状态拉取
    Get {
        reply: oneshot::Sender<SharedState>,
    },
    SetEnabled(bool),
    SetRate(f32),
    SetVoice(Option<String>),
}

/// 运行中 owner 的可克隆地址
#[derive(Clone)]
pub struct OwnerHandle {
    requests: mpsc::UnboundedSender<StateRequest>,
    broadcast: broadcast::Sender<SharedState>,
}

impl OwnerHandle {
    pub fn subscribe(&self) -> broadcast::Receiver<SharedState> {
        self.broadcast.subscribe()
    }

    pub fn request(&self, request: StateRequest) {
        if self.requests.send(request).is_err() {
            tracing::warn!("State owner is gone, request dropped");
        }
    }
}

/// 权威设置 owner
pub struct StateOwner {
    state: SharedState,
    store: Arc<dyn SettingsStorePort>,
    requests: mpsc::UnboundedReceiver<StateRequest>,
    broadcast: broadcast::Sender<SharedState>,
}

impl StateOwner {
    /// 加载持久化状态并启动 owner 任务
    pub fn spawn(store: Arc<dyn SettingsStorePort>) -> OwnerHandle {
        let state = store.load().unwrap_or_else(|e| {
            tracing::warn!(error = %e, "Settings load failed, starting from defaults");
            SharedState::default()
        });

        tracing::info!(
            enabled = state.enabled,
            rate = state.rate,
            selected_voice = ?state.selected_voice_id,
            "State owner started"
        );

        let (req_tx, req_rx) = mpsc::unbounded_channel();
        let (bcast_tx, _) = broadcast::channel(16);

        let owner = Self {
            state,
            store,
            requests: req_rx,
            broadcast: bcast_tx.clone(),
        };
        tokio::spawn(owner.run());

        OwnerHandle {
            requests: req_tx,
            broadcast: bcast_tx,
        }
    }

    async fn run(mut self) {
        while let Some(request) = self.requests.recv().await {
            match request {
                StateRequest::Get { reply } => {
                    let _ = reply.send(self.state.clone());
                }
                StateRequest::SetEnabled(enabled) => {
                    if self.state.enabled != enabled {
                        self.state.enabled = enabled;
                        self.persist_and_broadcast();
                    }
                }
                StateRequest::SetRate(rate) => {
                    let rate = SharedState::clamp_rate(rate);
                    if (self.state.rate - rate).abs() > f32::EPSILON {
                        self.state.rate = rate;
                        self.persist_and_broadcast();
                    }
                }
                StateRequest::SetVoice(voice_id) => {
                    if self.state.selected_voice_id != voice_id {
                        self.state.selected_voice_id = voice_id;
                        self.persist_and_broadcast();
                    }
                }
            }
        }
        tracing::debug!("State owner stopped");
    }

    /// 先写穿，再通知所有在线上下文
    ///
    /// 持久化失败只记日志，不拦广播：各上下文内存里的一致
    /// 比磁盘副本重要
    fn persist_and_broadcast(&self) {
        if let Err(e) = self.store.save(&self.state) {
            tracing::error!(error = %e, "Failed to persist settings");
        }
        if self.broadcast.send(self.state.clone()).is_err() {
            tracing::debug!("No live contexts to notify");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infrastructure::persistence::memory::InMemorySettingsStore;
    use std::time::Duration;

    async fn get_state(handle: &OwnerHandle) -> SharedState {
        let (tx, rx) = oneshot::channel();
        handle.request(StateRequest::Get { reply: tx });
        tokio::time::timeout(Duration::from_millis(200), rx)
            .await
            .expect("owner must answer")
            .expect("owner must not drop the reply")
    }

    #[tokio::test]
    async fn test_get_returns_loaded_state() {
        let store = InMemorySettingsStore::with_state(SharedState {
            enabled: false,
            rate: 2.0,
            selected_voice_id: None,
        })
        .arc();
        let handle = StateOwner::spawn(store);

        let state = get_state(&handle).await;
        assert!(!state.enabled);
        assert_eq!(state.rate, 2.0);
    }

    #[tokio::test]
    async fn test_change_is_persisted_and_broadcast() {
        let store = InMemorySettingsStore::new().arc();
        let handle = StateOwner::spawn(store.clone());
        let mut updates = handle.subscribe();

        handle.request(StateRequest::SetEnabled(false));

        let broadcasted = tokio::time::timeout(Duration::from_millis(200), updates.recv())
            .await
            .unwrap()
            .unwrap();
        assert!(!broadcasted.enabled);
        assert!(!store.load().unwrap().enabled);
    }

    #[tokio::test]
    async fn test_rate_is_clamped() {
        let store = InMemorySettingsStore::new().arc();
        let handle = StateOwner::spawn(store);
        let mut updates = handle.subscribe();

        handle.request(StateRequest::SetRate(99.0));

        let broadcasted = tokio::time::timeout(Duration::from_millis(200), updates.recv())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(broadcasted.rate, crate::application::ports::MAX_RATE);
    }

    #[tokio::test]
    async fn test_no_op_change_does_not_broadcast() {
        let store = InMemorySettingsStore::new().arc();
        let handle = StateOwner::spawn(store);
        let mut updates = handle.subscribe();

        // 默认值本来就是 enabled=true
        handle.request(StateRequest::SetEnabled(true));
        // 随后强制一个真实变更作为栅栏
        handle.request(StateRequest::SetEnabled(false));

        let first = tokio::time::timeout(Duration::from_millis(200), updates.recv())
            .await
            .unwrap()
            .unwrap();
        assert!(!first.enabled);
    }
}
