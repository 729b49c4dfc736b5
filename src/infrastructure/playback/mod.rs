//! Audio Playback - 音频播放

mod simulated;

pub use simulated::{SimulatedAudioPlayer, SimulatedPlayerConfig};
