//! Playback Events - 播放事件

mod publisher;

pub use publisher::{EventPublisher, PlaybackEvent};
