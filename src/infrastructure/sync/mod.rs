//! Cross-Context Sync - 跨上下文状态同步
//!
//! 唯一的 owner 持有共享的 enabled/rate/voice 设置；每个浏览上下文持有
//! 一个 [`ContextSync`] 句柄和内存副本。变更请求发给 owner，owner 先
//! 持久化再广播；各上下文应用广播，开关关闭时立即撤下播放。晚启动的
//! 上下文主动询问一次当前状态，而不是等下一次广播。

mod context;
mod owner;

pub use context::ContextSync;
pub use owner::{OwnerHandle, StateOwner, StateRequest};
