//! Sled-based Settings Store - Sled 设置存储
//!
//! 一条 bincode 编码的记录保存共享状态。记录缺失或不可读时返回
//! 默认值，坏掉的存储永远拦不住引擎启动。

use sled::Db;
use std::path::Path;
use std::sync::Arc;

use crate::application::ports::{SettingsError, SettingsStorePort, SharedState};

const SETTINGS_KEY: &str = "settings:shared";

/// Sled 设置存储
pub struct SledSettingsStore {
    db: Db,
}

impl SledSettingsStore {
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, SettingsError> {
        let db = sled::open(path.as_ref()).map_err(|e| SettingsError::Store(e.to_string()))?;
        tracing::info!(path = %path.as_ref().display(), "Settings store opened");
        Ok(Self { db })
    }

    pub fn arc(self) -> Arc<Self> {
        Arc::new(self)
    }
}

impl SettingsStorePort for SledSettingsStore {
    fn load(&self) -> Result<SharedState, SettingsError> {
        match self.db.get(SETTINGS_KEY) {
            Ok(Some(bytes)) => match bincode::deserialize::<SharedState>(&bytes) {
                Ok(state) => Ok(state),
                Err(e) => {
                    tracing::warn!(error = %e, "Settings record unreadable, using defaults");
                    Ok(SharedState::default())
                }
            },
            Ok(None) => Ok(SharedState::default()),
            Err(e) => Err(SettingsError::Store(e.to_string())),
        }
    }

    fn save(&self, state: &SharedState) -> Result<(), SettingsError> {
        let bytes = bincode::serialize(state)
            .map_err(|e| SettingsError::Serialization(e.to_string()))?;
        self.db
            .insert(SETTINGS_KEY, bytes)
            .map_err(|e| SettingsError::Store(e.to_string()))?;
        self.db
            .flush()
            .map_err(|e| SettingsError::Store(e.to_string()))?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_missing_record_yields_defaults() {
        let dir = tempdir().unwrap();
        let store = SledSettingsStore::open(dir.path().join("settings.sled")).unwrap();

        let state = store.load().unwrap();
        assert_eq!(state, SharedState::default());
    }

    #[test]
    fn test_save_load_round_trip() {
        let dir = tempdir().unwrap();
        let store = SledSettingsStore::open(dir.path().join("settings.sled")).unwrap();

        let state = SharedState {
            enabled: false,
            rate: 1.5,
            selected_voice_id: Some("neural-fr-1".to_string()),
        };
        store.save(&state).unwrap();

        assert_eq!(store.load().unwrap(), state);
    }
}
