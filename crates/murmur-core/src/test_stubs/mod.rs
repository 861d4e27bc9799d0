//! # 内存态驱动桩
//!
//! ## 核心意图（Why）
//! - 让 `murmur-stack` / `murmur-channel` 的测试在不触碰任何真实网络的
//!   前提下走完“建造 → 串联 → 连接 → 分叉 → 拆卸”的完整路径；
//! - 通过共享账本（[`StubLedger`]）暴露副作用计数，供测试断言
//!   “失败连接已触发关闭”“分叉失败未造成流水线变更”这类清理性质。
//!
//! ## 契约边界（What）
//! - 桩满足 [`GroupDriver`] 全家桶契约，但不模拟成员协商、重传等库内
//!   语义；连接失败通过 [`StubDriver::fail_cluster`] 脚本化；
//! - 桩以协议名 `FORK` 识别分叉复用层：流水线中出现该阶段时，建成的
//!   通道才会提供 [`ForkLayer`]。

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use crate::channel::ChannelState;
use crate::driver::{ForkLayer, GroupDriver, PropertyError, ProtocolBuilder, ProtocolHandle, RawChannel};
use crate::error::{DriverError, codes};
use crate::registry::ProtocolModelRegistry;
use crate::spec::ProtocolSpec;

/// 桩的副作用账本，测试据此断言清理行为确已发生。
#[derive(Debug, Default)]
pub struct StubLedger {
    /// 建成的通道数量。
    pub built_channels: AtomicUsize,
    /// 成功入群次数。
    pub connects: AtomicUsize,
    /// `close` 实际生效次数（幂等的重复关闭不计入）。
    pub closes: AtomicUsize,
    /// 分叉子流水线注册次数。
    pub fork_registrations: AtomicUsize,
    /// 分叉子流水线摘除次数。
    pub fork_removals: AtomicUsize,
}

impl StubLedger {
    fn bump(counter: &AtomicUsize) {
        counter.fetch_add(1, Ordering::SeqCst);
    }

    /// 读取计数器当前值。
    pub fn get(counter: &AtomicUsize) -> usize {
        counter.load(Ordering::SeqCst)
    }
}

/// 内存态 [`GroupDriver`] 实现。
///
/// - **契约 (What)**：属性键合法性取自注入的协议模型注册表，与真实
///   驱动“协议实现自行声明字段”的行为保持同构；
/// - **脚本化失败 (How)**：`fail_cluster` 登记拒绝入群的集群名；
///   `fail_disconnect` 让退群动作返回错误（用于验证“退群失败仅记日志”）。
#[derive(Debug)]
pub struct StubDriver {
    registry: Arc<ProtocolModelRegistry>,
    fail_clusters: BTreeSet<String>,
    fail_disconnect: bool,
    ledger: Arc<StubLedger>,
}

impl StubDriver {
    /// 以协议模型注册表起一个桩驱动。
    pub fn new(registry: Arc<ProtocolModelRegistry>) -> Self {
        Self {
            registry,
            fail_clusters: BTreeSet::new(),
            fail_disconnect: false,
            ledger: Arc::new(StubLedger::default()),
        }
    }

    /// 脚本化：拒绝指定集群的入群请求。
    pub fn fail_cluster(mut self, cluster: impl Into<String>) -> Self {
        self.fail_clusters.insert(cluster.into());
        self
    }

    /// 脚本化：让所有退群动作失败。
    pub fn fail_disconnect(mut self) -> Self {
        self.fail_disconnect = true;
        self
    }

    /// 共享账本句柄。
    pub fn ledger(&self) -> Arc<StubLedger> {
        Arc::clone(&self.ledger)
    }
}

impl ProtocolBuilder for StubDriver {
    fn build_protocol(&self, spec: &ProtocolSpec) -> Result<Box<dyn ProtocolHandle>, DriverError> {
        let model = self.registry.model(spec.module(), spec.name()).ok_or_else(|| {
            DriverError::new(
                codes::BUILD,
                format!(
                    "no protocol model for `{}` in module `{}`",
                    spec.name(),
                    spec.module()
                ),
            )
        })?;
        Ok(Box::new(StubProtocol {
            name: spec.name().to_string(),
            known: model.fields().clone(),
            properties: BTreeMap::new(),
            statistics: false,
        }))
    }
}

impl GroupDriver for StubDriver {
    fn assemble_pipeline(
        &self,
        stages: Vec<Box<dyn ProtocolHandle>>,
    ) -> Result<Box<dyn RawChannel>, DriverError> {
        if stages.is_empty() {
            return Err(DriverError::new(codes::ASSEMBLE, "empty pipeline"));
        }
        let has_fork_layer = stages.iter().any(|stage| stage.name() == "FORK");
        StubLedger::bump(&self.ledger.built_channels);
        Ok(Box::new(StubChannel {
            stage_names: stages.iter().map(|s| s.name().to_string()).collect(),
            state: ChannelState::Disconnected,
            fork: has_fork_layer.then(|| StubForkLayer {
                forks: BTreeMap::new(),
                ledger: Arc::clone(&self.ledger),
            }),
            fail_clusters: self.fail_clusters.clone(),
            fail_disconnect: self.fail_disconnect,
            ledger: Arc::clone(&self.ledger),
        }))
    }
}

/// 单个协议实例的内存桩。
#[derive(Debug)]
pub struct StubProtocol {
    name: String,
    known: BTreeSet<String>,
    properties: BTreeMap<String, String>,
    statistics: bool,
}

impl ProtocolHandle for StubProtocol {
    fn name(&self) -> &str {
        &self.name
    }

    fn set_property(&mut self, key: &str, value: &str) -> Result<(), PropertyError> {
        if !self.known.contains(key) {
            return Err(PropertyError::Unknown {
                protocol: self.name.clone(),
                key: key.to_string(),
            });
        }
        self.properties.insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn enable_statistics(&mut self, enabled: bool) {
        self.statistics = enabled;
    }
}

/// 原始通道的内存桩。
#[derive(Debug)]
pub struct StubChannel {
    stage_names: Vec<String>,
    state: ChannelState,
    fork: Option<StubForkLayer>,
    fail_clusters: BTreeSet<String>,
    fail_disconnect: bool,
    ledger: Arc<StubLedger>,
}

impl StubChannel {
    /// 流水线阶段名（按序），供测试核对建造顺序。
    pub fn stage_names(&self) -> &[String] {
        &self.stage_names
    }
}

impl RawChannel for StubChannel {
    fn connect(&mut self, cluster: &str) -> Result<(), DriverError> {
        if self.fail_clusters.contains(cluster) {
            return Err(DriverError::new(
                codes::CONNECT,
                format!("stub refuses to join cluster `{cluster}`"),
            ));
        }
        self.state = ChannelState::Connected;
        StubLedger::bump(&self.ledger.connects);
        Ok(())
    }

    fn disconnect(&mut self) -> Result<(), DriverError> {
        self.state = ChannelState::Disconnected;
        if self.fail_disconnect {
            return Err(DriverError::new(codes::DISCONNECT, "stub disconnect failure"));
        }
        Ok(())
    }

    fn close(&mut self) {
        if !self.state.is_closed() {
            self.state = ChannelState::Closed;
            StubLedger::bump(&self.ledger.closes);
        }
    }

    fn find_fork_layer(&mut self) -> Option<&mut dyn ForkLayer> {
        self.fork.as_mut().map(|layer| layer as &mut dyn ForkLayer)
    }
}

/// 分叉复用层的内存桩。
#[derive(Debug)]
pub struct StubForkLayer {
    forks: BTreeMap<String, Vec<String>>,
    ledger: Arc<StubLedger>,
}

impl ForkLayer for StubForkLayer {
    fn register_fork(
        &mut self,
        fork_name: &str,
        stages: Vec<Box<dyn ProtocolHandle>>,
    ) -> Result<(), DriverError> {
        if self.forks.contains_key(fork_name) {
            return Err(DriverError::new(
                codes::MUX,
                format!("fork `{fork_name}` already registered"),
            ));
        }
        self.forks.insert(
            fork_name.to_string(),
            stages.iter().map(|s| s.name().to_string()).collect(),
        );
        StubLedger::bump(&self.ledger.fork_registrations);
        Ok(())
    }

    fn unregister_fork(&mut self, fork_name: &str) -> bool {
        let removed = self.forks.remove(fork_name).is_some();
        if removed {
            StubLedger::bump(&self.ledger.fork_removals);
        }
        removed
    }

    fn fork_names(&self) -> Vec<String> {
        self.forks.keys().cloned().collect()
    }
}
