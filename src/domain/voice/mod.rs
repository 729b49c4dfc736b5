//! Voice Context - 语音上下文
//!
//! 语音值对象与已知语音目录

mod catalog;
mod value_objects;

pub use catalog::VoiceCatalog;
pub use value_objects::{primary_subtag, ProviderKind, Voice};
