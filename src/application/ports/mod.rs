//! Application Ports - 出站接口定义

mod audio_cache;
mod audio_player;
mod device_speech;
mod settings_store;
mod speech_provider;

pub use audio_cache::{cache_key, AudioCachePort, CacheError, CacheStats, KEY_TEXT_PREFIX_CHARS};
pub use audio_player::{AudioPlayerPort, PlaybackControl, PlayerCommand, PlayerError};
pub use device_speech::{DeviceEvent, DeviceSpeechPort, DeviceUtterance, UtteranceRequest};
pub use settings_store::{
    SettingsError, SettingsStorePort, SharedState, DEFAULT_RATE, MAX_RATE, MIN_RATE,
};
pub use speech_provider::{AudioData, SynthesisError, SynthesizedSpeech};
