//! # 分叉组合器
//!
//! ## 核心意图（Why）
//! - 在一条**已连接**父通道的共享传输上派生轻量子通道：父通道流水线里
//!   的分叉复用层按分叉名路由消息，子通道只叠加自己的额外协议，不再
//!   重建传输层；
//! - 摘除分叉只动复用层的登记，永不触碰父通道本体——父通道的退群与
//!   关闭是独立动作。
//!
//! ## 次序缺口（Trade-offs）
//! - “先摘分叉、再拆父通道”的次序要求只以日志告警兜底，没有硬性运行
//!   时闸门：这是从观察到的设计中有意继承的缺口（宿主层的服务依赖
//!   声明才是次序的真正执法者）。

use std::sync::Arc;

use tracing::warn;

use murmur_core::channel::ChannelState;
use murmur_core::error::ChannelError;
use murmur_core::spec::ProtocolSpec;
use murmur_core::stack::StackConfiguration;

use crate::factory::ChannelFactory;
use crate::lifecycle::ChannelLifecycleManager;

/// 分叉组合器：面向已连接父通道派生/摘除分叉。
///
/// # 教案式注释
/// - **意图 (Why)**：组合器持有生命周期管理器引用，所有父通道访问都
///   经由管理器的单通道锁，天然遵守“同名串行”纪律；
/// - **契约 (What)**：
///   - [`create_fork`](ForkComposer::create_fork)：父通道必须已登记、
///     处于 Connected、且流水线含分叉复用层；校验失败时**不发生任何
///     流水线变更**；
///   - [`remove_fork`](ForkComposer::remove_fork)：尽力而为，任何异常
///     情形（父通道已拆、复用层缺失、分叉名未知）都只记告警；
/// - **风险 (Trade-offs)**：分叉句柄不持有父通道所有权，仅存名字引用，
///   父通道先行拆除时分叉句柄随之失效。
pub struct ForkComposer {
    manager: Arc<ChannelLifecycleManager>,
    factory: ChannelFactory,
}

impl ForkComposer {
    /// 以生命周期管理器与通道工厂构造组合器。
    pub fn new(manager: Arc<ChannelLifecycleManager>, factory: ChannelFactory) -> Self {
        Self { manager, factory }
    }

    /// 为已连接父通道准备一个分叉通道工厂。
    ///
    /// # 教案式注释
    /// - **契约 (What)**：
    ///   - 父通道未登记 → [`ChannelError::NotRegistered`]；
    ///   - 父通道 Closed → [`ChannelError::Closed`]；Disconnected →
    ///     [`ChannelError::NotConnected`]；
    ///   - 流水线无分叉复用层 → [`ChannelError::ForkUnsupported`]，
    ///     且保证未发生任何流水线变更（本步只探测不登记）；
    /// - **后置条件**：返回的工厂携带父通道栈配置快照，真正的子流水线
    ///   登记发生在 [`ForkChannelFactory::create_channel`]。
    pub fn create_fork(
        &self,
        parent: &str,
        fork_name: &str,
        extra_protocols: Vec<ProtocolSpec>,
    ) -> Result<ForkChannelFactory, ChannelError> {
        let stack = self.manager.with_channel(parent, |channel| {
            match channel.state() {
                ChannelState::Closed => Err(ChannelError::Closed {
                    channel: parent.to_string(),
                }),
                ChannelState::Disconnected => Err(ChannelError::NotConnected {
                    channel: parent.to_string(),
                }),
                ChannelState::Connected => {
                    if channel.raw_mut().find_fork_layer().is_none() {
                        Err(ChannelError::ForkUnsupported {
                            channel: parent.to_string(),
                        })
                    } else {
                        Ok(Arc::clone(channel.stack()))
                    }
                }
            }
        })??;

        Ok(ForkChannelFactory {
            manager: Arc::clone(&self.manager),
            factory: self.factory.clone(),
            parent: Arc::from(parent),
            fork_name: Arc::from(fork_name),
            extra_protocols,
            stack,
        })
    }

    /// 从父通道的复用层摘除指定分叉；永不触碰父通道本体。
    pub fn remove_fork(&self, parent: &str, fork_name: &str) {
        let outcome = self.manager.with_channel(parent, |channel| {
            if !channel.state().is_connected() {
                // 次序缺口：父通道已先行拆除，只告警。
                warn!(
                    parent,
                    fork = fork_name,
                    "removing a fork from a channel that is no longer connected; \
                     forks should be removed before the parent is torn down"
                );
            }
            match channel.raw_mut().find_fork_layer() {
                Some(layer) => layer.unregister_fork(fork_name),
                None => false,
            }
        });
        match outcome {
            Ok(true) => {}
            Ok(false) => {
                warn!(parent, fork = fork_name, "fork was not registered; nothing removed");
            }
            Err(err) => {
                warn!(parent, fork = fork_name, %err, "parent channel is gone; nothing removed");
            }
        }
    }
}

/// 分叉通道工厂：在父通道复用层下登记子流水线。
#[derive(Debug)]
pub struct ForkChannelFactory {
    manager: Arc<ChannelLifecycleManager>,
    factory: ChannelFactory,
    parent: Arc<str>,
    fork_name: Arc<str>,
    extra_protocols: Vec<ProtocolSpec>,
    stack: Arc<StackConfiguration>,
}

impl ForkChannelFactory {
    /// 分叉名。
    pub fn fork_name(&self) -> &str {
        &self.fork_name
    }

    /// 父通道名。
    pub fn parent(&self) -> &str {
        &self.parent
    }

    /// 建造并登记一条分叉通道。
    ///
    /// # 教案式注释
    /// - **契约 (What)**：
    ///   - 额外协议按声明序建造（属性注入与统计解析与主工厂同一套
    ///     规则，统计默认值取父通道栈配置）；
    ///   - 同名分叉已在册 → [`ChannelError::ForkAlreadyRegistered`]；
    ///   - 登记成功后返回的句柄即视为 Connected：其消息路径完全复用
    ///     父通道的已连接传输；
    /// - **风险 (Trade-offs)**：句柄销毁不会自动摘除登记，拆卸必须
    ///   显式走 [`ForkComposer::remove_fork`]。
    pub fn create_channel(&self, name: &str) -> Result<ForkChannel, ChannelError> {
        let mut stages = Vec::with_capacity(self.extra_protocols.len());
        for spec in &self.extra_protocols {
            stages.push(self.factory.build_stage(spec, &self.stack)?);
        }

        self.manager.with_channel(&self.parent, |channel| {
            match channel.state() {
                ChannelState::Closed => {
                    return Err(ChannelError::Closed {
                        channel: self.parent.to_string(),
                    });
                }
                ChannelState::Disconnected => {
                    return Err(ChannelError::NotConnected {
                        channel: self.parent.to_string(),
                    });
                }
                ChannelState::Connected => {}
            }
            let layer = channel
                .raw_mut()
                .find_fork_layer()
                .ok_or_else(|| ChannelError::ForkUnsupported {
                    channel: self.parent.to_string(),
                })?;
            if layer.fork_names().iter().any(|fork| fork == self.fork_name.as_ref()) {
                return Err(ChannelError::ForkAlreadyRegistered {
                    channel: self.parent.to_string(),
                    fork: self.fork_name.to_string(),
                });
            }
            layer.register_fork(&self.fork_name, std::mem::take(&mut stages))?;
            Ok(())
        })??;

        Ok(ForkChannel {
            name: Arc::from(name),
            fork_name: Arc::clone(&self.fork_name),
            parent: Arc::clone(&self.parent),
            state: ChannelState::Connected,
        })
    }
}

/// 分叉通道句柄：共享父通道传输的派生子通道。
///
/// - **契约 (What)**：句柄对父通道是非占有引用（只存名字）；其生命
///   周期以复用层登记为准，句柄本身 drop 不产生任何副作用；
/// - **风险 (Trade-offs)**：父通道先行拆除后句柄失效，这正是次序缺口
///   告警想要暴露的场景。
#[derive(Clone, Debug)]
pub struct ForkChannel {
    name: Arc<str>,
    fork_name: Arc<str>,
    parent: Arc<str>,
    state: ChannelState,
}

impl ForkChannel {
    /// 分叉通道名。
    pub fn name(&self) -> &str {
        &self.name
    }

    /// 所属分叉名（复用层登记键）。
    pub fn fork_name(&self) -> &str {
        &self.fork_name
    }

    /// 父通道名（非占有引用）。
    pub fn parent(&self) -> &str {
        &self.parent
    }

    /// 句柄视角的状态。
    pub fn state(&self) -> ChannelState {
        self.state
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::{BTreeMap, BTreeSet};

    use murmur_core::binding::{SocketBinding, SocketBindingRegistry};
    use murmur_core::registry::{ProtocolModel, ProtocolModelRegistry};
    use murmur_core::spec::ProtocolKind;
    use murmur_core::test_stubs::{StubDriver, StubLedger};
    use murmur_stack::{SpecResolver, StackAssembler};
    use tracing_test::traced_test;

    use crate::lifecycle::ChannelLifecycleManager;

    fn registry() -> Arc<ProtocolModelRegistry> {
        Arc::new(
            ProtocolModelRegistry::builder()
                .protocol(
                    "org.jgroups",
                    "TCP",
                    ProtocolModel::new(ProtocolKind::Transport)
                        .field("bind_addr")
                        .field("bind_port"),
                )
                .protocol(
                    "org.jgroups",
                    "PING",
                    ProtocolModel::new(ProtocolKind::Protocol),
                )
                .protocol(
                    "org.jgroups",
                    "FORK",
                    ProtocolModel::new(ProtocolKind::ForkMux),
                )
                .protocol(
                    "org.jgroups",
                    "COUNTER",
                    ProtocolModel::new(ProtocolKind::Protocol)
                        .default_property("bypass_backups", "false"),
                )
                .freeze(),
        )
    }

    /// 建一条父通道并登记；`with_fork_layer` 决定流水线里是否含 FORK。
    fn harness(
        driver: StubDriver,
        with_fork_layer: bool,
    ) -> (ForkComposer, Arc<ChannelLifecycleManager>, Arc<StubLedger>) {
        let ledger = driver.ledger();
        let resolver = SpecResolver::new(registry());
        let assembler = StackAssembler::new(Arc::new(BTreeSet::<String>::new()));
        let transport = resolver
            .resolve("org.jgroups", "TCP", BTreeMap::new(), Some("jgroups-tcp"), None)
            .expect("TCP 应可解析");
        let mut protocols = vec![resolver
            .resolve("org.jgroups", "PING", BTreeMap::new(), None, None)
            .expect("PING 应可解析")];
        if with_fork_layer {
            protocols.push(
                resolver
                    .resolve("org.jgroups", "FORK", BTreeMap::new(), None, None)
                    .expect("FORK 应可解析"),
            );
        }
        let stack = Arc::new(
            assembler
                .assemble("tcp", Some(transport), protocols, None, false, None)
                .expect("合法栈应装配成功"),
        );
        let factory = ChannelFactory::new(
            Arc::new(driver),
            Arc::new(SocketBindingRegistry::from_bindings([SocketBinding::new(
                "jgroups-tcp",
                "127.0.0.1",
                7600,
            )])),
        );
        let manager = Arc::new(ChannelLifecycleManager::new());
        manager
            .register(factory.create_channel(&stack, "parent").expect("父通道应建成"))
            .expect("父通道登记应成功");
        let composer = ForkComposer::new(Arc::clone(&manager), factory);
        (composer, manager, ledger)
    }

    fn counter_spec() -> ProtocolSpec {
        SpecResolver::new(registry())
            .resolve("org.jgroups", "COUNTER", BTreeMap::new(), None, None)
            .expect("COUNTER 应可解析")
    }

    #[test]
    fn fork_on_connected_parent_registers_and_reports_connected() {
        let (composer, manager, ledger) = harness(StubDriver::new(registry()), true);
        manager.connect("parent", "myCluster").expect("入群应成功");

        let fork_factory = composer
            .create_fork("parent", "web", vec![counter_spec()])
            .expect("含 FORK 的已连接父通道应可派生");
        let fork = fork_factory.create_channel("web-ch").expect("分叉应建成");

        assert_eq!(fork.name(), "web-ch");
        assert_eq!(fork.fork_name(), "web");
        assert_eq!(fork.parent(), "parent");
        assert!(fork.state().is_connected(), "分叉句柄应直接可用");
        assert_eq!(StubLedger::get(&ledger.fork_registrations), 1);
        // 父通道状态不受派生影响。
        assert!(manager.is_connected("parent"));
    }

    #[test]
    fn parent_without_fork_layer_is_refused_without_side_effects() {
        let (composer, manager, ledger) = harness(StubDriver::new(registry()), false);
        manager.connect("parent", "myCluster").expect("入群应成功");

        let err = composer
            .create_fork("parent", "web", vec![counter_spec()])
            .expect_err("无复用层应拒绝派生");
        assert!(matches!(err, ChannelError::ForkUnsupported { .. }));
        assert_eq!(
            StubLedger::get(&ledger.fork_registrations),
            0,
            "拒绝派生时不得发生任何流水线变更"
        );
        assert!(manager.is_connected("parent"), "父通道状态必须原封不动");
    }

    #[test]
    fn duplicate_fork_names_are_refused() {
        let (composer, manager, ledger) = harness(StubDriver::new(registry()), true);
        manager.connect("parent", "myCluster").expect("入群应成功");

        composer
            .create_fork("parent", "web", vec![counter_spec()])
            .expect("首次派生")
            .create_channel("web-1")
            .expect("首个分叉应建成");
        let err = composer
            .create_fork("parent", "web", vec![counter_spec()])
            .expect("工厂本身可重建")
            .create_channel("web-2")
            .expect_err("同名分叉应拒绝");
        assert!(matches!(err, ChannelError::ForkAlreadyRegistered { .. }));
        assert_eq!(StubLedger::get(&ledger.fork_registrations), 1);
    }

    #[test]
    fn unconnected_or_unknown_parents_are_refused() {
        let (composer, _manager, _ledger) = harness(StubDriver::new(registry()), true);

        let err = composer
            .create_fork("parent", "web", vec![])
            .expect_err("未连接的父通道应拒绝派生");
        assert!(matches!(err, ChannelError::NotConnected { .. }));

        let err = composer
            .create_fork("ghost", "web", vec![])
            .expect_err("未登记的父通道应拒绝派生");
        assert!(matches!(err, ChannelError::NotRegistered { .. }));
    }

    #[traced_test]
    #[test]
    fn remove_fork_is_best_effort_and_never_touches_the_parent() {
        let (composer, manager, ledger) = harness(StubDriver::new(registry()), true);
        manager.connect("parent", "myCluster").expect("入群应成功");
        composer
            .create_fork("parent", "web", vec![counter_spec()])
            .expect("派生")
            .create_channel("web-ch")
            .expect("分叉应建成");

        // 未知分叉名只告警。
        composer.remove_fork("parent", "nope");
        assert!(logs_contain("nothing removed"));
        assert_eq!(StubLedger::get(&ledger.fork_removals), 0);

        // 正常摘除。
        composer.remove_fork("parent", "web");
        assert_eq!(StubLedger::get(&ledger.fork_removals), 1);
        assert!(manager.is_connected("parent"), "摘除分叉不得触碰父通道");

        // 父通道已不在册时同样只告警。
        composer.remove_fork("ghost", "web");
        assert!(logs_contain("parent channel is gone"));
    }

    #[traced_test]
    #[test]
    fn tearing_down_parent_with_live_forks_warns_about_ordering() {
        let (composer, manager, _ledger) = harness(StubDriver::new(registry()), true);
        manager.connect("parent", "myCluster").expect("入群应成功");
        composer
            .create_fork("parent", "web", vec![counter_spec()])
            .expect("派生")
            .create_channel("web-ch")
            .expect("分叉应建成");

        // 带着在册分叉直接退群：允许，但必须有次序告警。
        manager.disconnect("parent").expect("退群本身允许");
        assert!(logs_contain("fork"), "应记录次序缺口告警");

        // 父通道已非 Connected 后再摘分叉：同样是告警路径。
        composer.remove_fork("parent", "web");
        assert!(logs_contain("no longer connected"));
    }
}
