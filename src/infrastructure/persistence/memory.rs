//! In-Memory Settings Store - 内存设置存储

use std::sync::{Arc, Mutex};

use crate::application::ports::{SettingsError, SettingsStorePort, SharedState};

/// 没有磁盘后备的设置存储；状态随进程消亡
pub struct InMemorySettingsStore {
    state: Mutex<SharedState>,
}

impl InMemorySettingsStore {
    pub fn new() -> Self {
        Self::with_state(SharedState::default())
    }

    pub fn with_state(state: SharedState) -> Self {
        Self {
            state: Mutex::new(state),
        }
    }

    pub fn arc(self) -> Arc<Self> {
        Arc::new(self)
    }
}

impl Default for InMemorySettingsStore {
    fn default() -> Self {
        Self::new()
    }
}

impl SettingsStorePort for InMemorySettingsStore {
    fn load(&self) -> Result<SharedState, SettingsError> {
        match self.state.lock() {
            Ok(state) => Ok(state.clone()),
            Err(poisoned) => Ok(poisoned.into_inner().clone()),
        }
    }

    fn save(&self, state: &SharedState) -> Result<(), SettingsError> {
        match self.state.lock() {
            Ok(mut guard) => {
                *guard = state.clone();
                Ok(())
            }
            Err(poisoned) => {
                *poisoned.into_inner() = state.clone();
                Ok(())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_round_trip() {
        let store = InMemorySettingsStore::new();
        let state = SharedState {
            enabled: false,
            rate: 2.0,
            selected_voice_id: None,
        };
        store.save(&state).unwrap();
        assert_eq!(store.load().unwrap(), state);
    }
}
