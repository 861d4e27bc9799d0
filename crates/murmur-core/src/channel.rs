//! # 通道状态机
//!
//! 通道的生命周期是一个三态状态机：
//!
//! ```text
//! Disconnected --connect(cluster)--> Connected --disconnect()--> Disconnected --close()--> Closed
//! ```
//!
//! `Closed` 为终态；任何针对已关闭通道的操作都以
//! [`ChannelError::Closed`](crate::error::ChannelError::Closed) 拒绝。
//! 状态迁移由 `murmur-channel` 的生命周期管理器按通道名串行执行，
//! 本模块只承载状态语义本身。

/// 命名通道的连接状态。
///
/// # 教案式注释
/// - **意图 (Why)**：以显式枚举表达生命周期阶段，让非法迁移在匹配时
///   一目了然，而非散落在布尔标志里；
/// - **契约 (What)**：
///   - `Disconnected`：已建成、未入群；可 `connect` 或 `close`；
///   - `Connected`：已加入某集群；可 `disconnect` 或 `close`；
///   - `Closed`：资源已释放，终态，任何生命周期操作均被拒绝；
/// - **风险 (Trade-offs)**：状态本身不携带集群名等上下文，相关信息由
///   通道结构另行持有，避免状态比较被无关字段干扰。
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum ChannelState {
    /// 已建成，尚未加入任何集群。
    Disconnected,
    /// 已加入集群，可收发组播。
    Connected,
    /// 已关闭并释放资源；终态。
    Closed,
}

impl ChannelState {
    /// 是否处于终态。
    pub fn is_closed(self) -> bool {
        matches!(self, ChannelState::Closed)
    }

    /// 是否已加入集群。
    pub fn is_connected(self) -> bool {
        matches!(self, ChannelState::Connected)
    }
}
