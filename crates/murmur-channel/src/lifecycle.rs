//! # 通道生命周期管理器
//!
//! ## 核心意图（Why）
//! - 以通道名为粒度串行化 connect/disconnect/close 的状态迁移：同名
//!   操作互斥、异名操作并行（`DashMap` 分片 + 每通道互斥锁）；
//! - 承诺两条清理铁律：连接失败的通道**立即关闭**（不存在“失败却还
//!   占着资源”的中间态）；拆卸路径**永远走得完**（库侧退群失败只记
//!   日志，状态照常迁移）。
//!
//! ## 状态机契约（What）
//! ```text
//! Disconnected --connect--> Connected --disconnect--> Disconnected --close--> Closed
//! ```
//! - `Closed` 终态：connect/disconnect 一律拒绝；重复 close 幂等无害；
//! - 重复 connect 到同一集群幂等；换集群必须先 disconnect；
//! - `state()` 即“已连接信号”：依赖方（如分叉）据此等待，依赖次序
//!   本身由宿主层的服务依赖声明保证，本层不做跨通道编排。

use std::sync::Arc;

use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use parking_lot::Mutex;
use tracing::warn;

use murmur_core::channel::ChannelState;
use murmur_core::error::{ChannelError, DriverError, codes};

use crate::channel::Channel;

/// 命名通道的生命周期管理器。
///
/// # 教案式注释
/// - **意图 (Why)**：集中持有全部在册通道，通道在登记后由管理器独占
///   所有权，外界只能通过名字发起串行化操作；
/// - **契约 (What)**：
///   - `register`：同名重复登记拒绝（[`ChannelError::AlreadyRegistered`]）；
///   - 所有按名操作对未登记名返回 [`ChannelError::NotRegistered`]；
///   - 单通道失败不波及其它通道（锁粒度 = 单通道）；
/// - **风险 (Trade-offs)**：持锁期间的 `connect` 会阻塞同名后续操作
///   直至库侧超时，这正是“同名串行”纪律的代价。
#[derive(Debug, Default)]
pub struct ChannelLifecycleManager {
    channels: DashMap<Arc<str>, Mutex<Channel>>,
}

impl ChannelLifecycleManager {
    /// 起一个空管理器。
    pub fn new() -> Self {
        Self::default()
    }

    /// 登记一条新建通道，管理器自此独占其所有权。
    pub fn register(&self, channel: Channel) -> Result<(), ChannelError> {
        let name = channel.name_arc().clone();
        match self.channels.entry(name) {
            Entry::Occupied(occupied) => Err(ChannelError::AlreadyRegistered {
                channel: occupied.key().to_string(),
            }),
            Entry::Vacant(vacant) => {
                vacant.insert(Mutex::new(channel));
                Ok(())
            }
        }
    }

    /// 让指定通道加入集群（阻塞直至完成、失败或库侧超时）。
    ///
    /// # 教案式注释
    /// - **契约 (What)**：
    ///   - Disconnected → 调驱动入群；成功则 Connected；
    ///   - 失败则**立即关闭**该通道（转入 Closed），并以
    ///     [`ChannelError::Connect`] 包装原始错误上抛——绝不留下
    ///     “半启动”通道；
    ///   - Connected 且集群相同 → 幂等成功；集群不同 → 拒绝；
    ///   - Closed → [`ChannelError::Closed`]；
    /// - **后置条件**：无论成败，通道都处于可解释的终定状态
    ///   （Connected 或 Closed）。
    pub fn connect(&self, name: &str, cluster: &str) -> Result<(), ChannelError> {
        self.with_channel(name, |channel| match channel.state() {
            ChannelState::Closed => Err(ChannelError::Closed {
                channel: name.to_string(),
            }),
            ChannelState::Connected => {
                if channel.cluster() == Some(cluster) {
                    Ok(())
                } else {
                    Err(ChannelError::Connect {
                        channel: name.to_string(),
                        cluster: cluster.to_string(),
                        source: DriverError::new(
                            codes::CONNECT,
                            "channel is already connected to a different cluster",
                        ),
                    })
                }
            }
            ChannelState::Disconnected => match channel.raw_mut().connect(cluster) {
                Ok(()) => {
                    channel.mark_connected(cluster);
                    Ok(())
                }
                Err(source) => {
                    channel.raw_mut().close();
                    channel.mark_closed();
                    Err(ChannelError::Connect {
                        channel: name.to_string(),
                        cluster: cluster.to_string(),
                        source,
                    })
                }
            },
        })?
    }

    /// 让指定通道退出集群（尽力而为，库侧失败只记日志）。
    pub fn disconnect(&self, name: &str) -> Result<(), ChannelError> {
        self.with_channel(name, |channel| match channel.state() {
            ChannelState::Closed => Err(ChannelError::Closed {
                channel: name.to_string(),
            }),
            ChannelState::Disconnected => Ok(()),
            ChannelState::Connected => {
                Self::warn_if_forks_remain(name, channel, "disconnecting");
                if let Err(err) = channel.raw_mut().disconnect() {
                    warn!(channel = name, %err, "driver failed to leave the cluster; continuing teardown");
                }
                channel.mark_disconnected();
                Ok(())
            }
        })?
    }

    /// 关闭指定通道并释放资源；无条件、幂等。
    pub fn close(&self, name: &str) -> Result<(), ChannelError> {
        self.with_channel(name, |channel| {
            if channel.state().is_closed() {
                return;
            }
            Self::warn_if_forks_remain(name, channel, "closing");
            if channel.state().is_connected() {
                if let Err(err) = channel.raw_mut().disconnect() {
                    warn!(channel = name, %err, "driver failed to leave the cluster; continuing teardown");
                }
            }
            channel.raw_mut().close();
            channel.mark_closed();
        })
    }

    /// 关闭并注销指定通道。
    pub fn remove(&self, name: &str) -> Result<(), ChannelError> {
        self.close(name)?;
        self.channels.remove(name);
        Ok(())
    }

    /// 查询通道当前状态（“已连接信号”的载体）。
    pub fn state(&self, name: &str) -> Option<ChannelState> {
        self.channels.get(name).map(|cell| cell.lock().state())
    }

    /// 便捷查询：通道是否处于 Connected。
    pub fn is_connected(&self, name: &str) -> bool {
        self.state(name).is_some_and(ChannelState::is_connected)
    }

    /// 在持有单通道锁的前提下执行 `op`。
    pub(crate) fn with_channel<R>(
        &self,
        name: &str,
        op: impl FnOnce(&mut Channel) -> R,
    ) -> Result<R, ChannelError> {
        let cell = self
            .channels
            .get(name)
            .ok_or_else(|| ChannelError::NotRegistered {
                channel: name.to_string(),
            })?;
        let mut channel = cell.lock();
        Ok(op(&mut channel))
    }

    /// 分叉仍在册时的拆卸次序告警（观测到的设计缺口：只告警，不硬拦）。
    fn warn_if_forks_remain(name: &str, channel: &mut Channel, action: &str) {
        if let Some(layer) = channel.raw_mut().find_fork_layer() {
            let forks = layer.fork_names();
            if !forks.is_empty() {
                warn!(
                    channel = name,
                    forks = ?forks,
                    "{action} a channel that still has registered forks; forks should be removed first"
                );
            }
        }
    }
}
