//! # 命名通道
//!
//! 通道把“名字 + 所属协议栈配置 + 状态机 + 原始驱动句柄”绑定为一个
//! 独占所有权的值：工厂建造、生命周期管理器持有并串行驱动迁移。
//! 同一配置建出的多个通道除共享只读的 [`StackConfiguration`] 外不共享
//! 任何可变状态。

use std::fmt;
use std::sync::Arc;

use murmur_core::channel::ChannelState;
use murmur_core::driver::RawChannel;
use murmur_core::stack::StackConfiguration;

/// 一条已建造的命名通道。
///
/// # 教案式注释
/// - **意图 (Why)**：把状态机与原始句柄封在同一结构里，状态迁移与驱动
///   调用只能经由生命周期管理器的串行入口发生；
/// - **契约 (What)**：
///   - 新建通道处于 [`ChannelState::Disconnected`]，无集群归属；
///   - `cluster` 仅在 Connected 期间为 `Some`；
///   - 本结构不是并发安全的，跨线程使用必须由持有者加锁；
/// - **风险 (Trade-offs)**：原始句柄以 `Box<dyn RawChannel>` 持有，
///   牺牲一次动态分发换取对组通信库类型的完全隔离。
pub struct Channel {
    name: Arc<str>,
    stack: Arc<StackConfiguration>,
    state: ChannelState,
    cluster: Option<String>,
    raw: Box<dyn RawChannel>,
}

impl Channel {
    pub(crate) fn new(
        name: impl Into<Arc<str>>,
        stack: Arc<StackConfiguration>,
        raw: Box<dyn RawChannel>,
    ) -> Self {
        Self {
            name: name.into(),
            stack,
            state: ChannelState::Disconnected,
            cluster: None,
            raw,
        }
    }

    /// 通道名。
    pub fn name(&self) -> &str {
        &self.name
    }

    /// 通道名的共享句柄。
    pub fn name_arc(&self) -> &Arc<str> {
        &self.name
    }

    /// 所属协议栈配置（只读共享）。
    pub fn stack(&self) -> &Arc<StackConfiguration> {
        &self.stack
    }

    /// 当前状态。
    pub fn state(&self) -> ChannelState {
        self.state
    }

    /// 当前加入的集群名（仅 Connected 期间为 `Some`）。
    pub fn cluster(&self) -> Option<&str> {
        self.cluster.as_deref()
    }

    pub(crate) fn raw_mut(&mut self) -> &mut dyn RawChannel {
        self.raw.as_mut()
    }

    pub(crate) fn mark_connected(&mut self, cluster: &str) {
        self.state = ChannelState::Connected;
        self.cluster = Some(cluster.to_string());
    }

    pub(crate) fn mark_disconnected(&mut self) {
        self.state = ChannelState::Disconnected;
        self.cluster = None;
    }

    pub(crate) fn mark_closed(&mut self) {
        self.state = ChannelState::Closed;
        self.cluster = None;
    }
}

impl fmt::Debug for Channel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Channel")
            .field("name", &self.name)
            .field("stack", &self.stack.name())
            .field("generation", &self.stack.generation())
            .field("state", &self.state)
            .field("cluster", &self.cluster)
            .finish_non_exhaustive()
    }
}
