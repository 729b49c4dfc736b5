//! Lector - 划词朗读语音编排引擎
//!
//! 分层架构:
//! - Domain: language/, voice/ (语言检测 + 语音目录)
//! - Application: ports, orchestrator (播放状态机)
//! - Infrastructure: providers, cache, playback, persistence, sync, events

pub mod application;
pub mod config;
pub mod domain;
pub mod infrastructure;

pub use config::{load_config, AppConfig};
