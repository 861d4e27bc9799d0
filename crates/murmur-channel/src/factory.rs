//! # 通道工厂
//!
//! ## 核心意图（Why）
//! - 把只读的 [`StackConfiguration`] 兑现为一条未连接的命名通道：传输层
//!   先建、协议按声明序逐个建、属性经变换流水线注入、统计开关按三态
//!   规则落定、最后交驱动串联为线性流水线；
//! - 绑定解析属于宿主层职责，工厂只做“是否已解析”的闸门：任何未解析
//!   的必需绑定都会在建造任何阶段之前被整体收集并拒绝。
//!
//! ## 行为契约（What）
//! - 建造无连接副作用：返回的通道处于 Disconnected 状态；
//! - 同一配置、不同名字的多次建造互不相干，仅共享不可变配置；
//! - 未知属性键走宽松路径：`warn!` 后跳过，绝不中断建造。

use std::sync::Arc;

use tracing::warn;

use murmur_core::binding::SocketBindingRegistry;
use murmur_core::driver::{GroupDriver, ProtocolHandle};
use murmur_core::error::{ChannelError, MissingBinding};
use murmur_core::spec::ProtocolSpec;
use murmur_core::stack::StackConfiguration;
use murmur_stack::transform::{TransformContext, effective_properties};

use crate::channel::Channel;

/// 通道工厂：持有驱动与已解析绑定注册表。
///
/// # 教案式注释
/// - **意图 (Why)**：工厂是无状态的（两个 `Arc` 字段均只读），可廉价
///   克隆、跨线程共享，由宿主在任意管理操作线程上调用；
/// - **契约 (What)**：[`create_channel`](ChannelFactory::create_channel)
///   失败时不返回部分构造的通道，也不遗留任何驱动侧资源——阶段句柄
///   在流水线串联之前全部由本函数持有，出错即随栈回收；
/// - **风险 (Trade-offs)**：绑定检查与建造是两次遍历，换取“建造前
///   尽数报告缺失绑定”的诊断质量。
#[derive(Clone, Debug)]
pub struct ChannelFactory {
    driver: Arc<dyn GroupDriver>,
    bindings: Arc<SocketBindingRegistry>,
}

impl ChannelFactory {
    /// 以驱动与绑定注册表构造工厂。
    pub fn new(driver: Arc<dyn GroupDriver>, bindings: Arc<SocketBindingRegistry>) -> Self {
        Self { driver, bindings }
    }

    /// 按配置建造一条未连接通道。
    ///
    /// # 教案式注释
    /// - **契约 (What)**：
    ///   - 先整体校验绑定：传输层与各协议声明的绑定名必须全部可解析，
    ///     否则以 [`ChannelError::MissingBinding`] 一次性列出全部缺失；
    ///   - 建造顺序：传输层 → 协议（声明序）；顺序即流水线序；
    ///   - 统计开关：协议级覆盖优先，未覆盖时继承栈级默认；
    /// - **后置条件**：返回 Disconnected 状态的通道；配置引用计数 +1，
    ///   规格本身在阶段建成后即不再被引用。
    pub fn create_channel(
        &self,
        stack: &Arc<StackConfiguration>,
        channel_name: &str,
    ) -> Result<Channel, ChannelError> {
        let mut missing = Vec::new();
        for spec in stack.pipeline_order() {
            for binding in spec.required_socket_bindings() {
                if self.bindings.resolve(binding).is_none() {
                    missing.push(MissingBinding {
                        protocol: spec.name().to_string(),
                        binding: binding.clone(),
                    });
                }
            }
        }
        if !missing.is_empty() {
            return Err(ChannelError::MissingBinding {
                channel: channel_name.to_string(),
                missing,
            });
        }

        let mut stages = Vec::with_capacity(1 + stack.protocols().len());
        for spec in stack.pipeline_order() {
            stages.push(self.build_stage(spec, stack)?);
        }
        let raw = self.driver.assemble_pipeline(stages)?;
        Ok(Channel::new(channel_name, Arc::clone(stack), raw))
    }

    /// 建造单个流水线阶段并完成属性与统计注入。
    pub(crate) fn build_stage(
        &self,
        spec: &ProtocolSpec,
        stack: &StackConfiguration,
    ) -> Result<Box<dyn ProtocolHandle>, ChannelError> {
        let mut handle = self.driver.build_protocol(spec)?;

        let binding = spec
            .required_socket_bindings()
            .iter()
            .next()
            .and_then(|name| self.bindings.resolve(name));
        let ctx = TransformContext {
            topology: stack.topology(),
            binding,
        };
        for (key, value) in effective_properties(spec, &ctx) {
            if let Err(err) = handle.set_property(&key, &value) {
                // 宽松兼容：未知键不致命，记告警后继续注入其余属性。
                warn!(
                    protocol = spec.name(),
                    property = key.as_str(),
                    %err,
                    "skipping property the protocol implementation does not know"
                );
            }
        }
        handle.enable_statistics(spec.effective_statistics(stack.statistics_enabled()));
        Ok(handle)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;

    use murmur_core::binding::SocketBinding;
    use murmur_core::channel::ChannelState;
    use murmur_core::registry::{ProtocolModel, ProtocolModelRegistry};
    use murmur_core::spec::ProtocolKind;
    use murmur_core::test_stubs::StubDriver;
    use murmur_stack::{SpecResolver, StackAssembler};
    use tracing_test::traced_test;

    fn registry() -> Arc<ProtocolModelRegistry> {
        Arc::new(
            ProtocolModelRegistry::builder()
                .protocol(
                    "org.jgroups",
                    "TCP",
                    ProtocolModel::new(ProtocolKind::Transport)
                        .field("bind_addr")
                        .field("bind_port")
                        .default_property("sock_conn_timeout", "2000"),
                )
                .protocol(
                    "org.jgroups",
                    "PING",
                    ProtocolModel::new(ProtocolKind::Protocol).default_property("timeout", "3000"),
                )
                .protocol(
                    "org.jgroups",
                    "GMS",
                    ProtocolModel::new(ProtocolKind::Protocol).field("join_timeout"),
                )
                .freeze(),
        )
    }

    fn stack(
        resolver: &SpecResolver,
        ping_overrides: BTreeMap<String, String>,
    ) -> Arc<StackConfiguration> {
        let assembler = StackAssembler::new(Arc::new(std::collections::BTreeSet::<String>::new()));
        let transport = resolver
            .resolve("org.jgroups", "TCP", BTreeMap::new(), Some("jgroups-tcp"), None)
            .expect("TCP 应可解析");
        let protocols = vec![
            resolver
                .resolve("org.jgroups", "PING", ping_overrides, None, None)
                .expect("PING 应可解析"),
            resolver
                .resolve("org.jgroups", "GMS", BTreeMap::new(), None, None)
                .expect("GMS 应可解析"),
        ];
        Arc::new(
            assembler
                .assemble("tcp", Some(transport), protocols, None, true, None)
                .expect("合法栈应装配成功"),
        )
    }

    fn factory_with(bindings: SocketBindingRegistry) -> (ChannelFactory, Arc<murmur_core::test_stubs::StubLedger>) {
        let driver = StubDriver::new(registry());
        let ledger = driver.ledger();
        (
            ChannelFactory::new(Arc::new(driver), Arc::new(bindings)),
            ledger,
        )
    }

    #[test]
    fn unresolved_bindings_are_collected_before_any_stage_is_built() {
        let resolver = SpecResolver::new(registry());
        let stack = stack(&resolver, BTreeMap::new());
        let (factory, ledger) = factory_with(SocketBindingRegistry::default());

        let err = factory
            .create_channel(&stack, "ch1")
            .expect_err("缺失绑定应拒绝建造");
        match err {
            ChannelError::MissingBinding { missing, .. } => {
                assert_eq!(missing.len(), 1);
                assert_eq!(missing[0].protocol, "TCP");
                assert_eq!(missing[0].binding, "jgroups-tcp");
            }
            other => panic!("应为 MissingBinding: {other}"),
        }
        assert_eq!(
            murmur_core::test_stubs::StubLedger::get(&ledger.built_channels),
            0,
            "拒绝必须发生在任何阶段建造之前"
        );
    }

    #[test]
    fn two_channels_from_one_stack_are_independent() {
        let resolver = SpecResolver::new(registry());
        let stack = stack(&resolver, BTreeMap::new());
        let (factory, _ledger) = factory_with(SocketBindingRegistry::from_bindings([
            SocketBinding::new("jgroups-tcp", "127.0.0.1", 7600),
        ]));

        let ch1 = factory.create_channel(&stack, "ch1").expect("ch1 应建成");
        let ch2 = factory.create_channel(&stack, "ch2").expect("ch2 应建成");
        assert_eq!(ch1.state(), ChannelState::Disconnected);
        assert_eq!(ch2.state(), ChannelState::Disconnected);
        assert_eq!(ch1.stack().generation(), ch2.stack().generation());
        assert_ne!(ch1.name(), ch2.name());
    }

    #[traced_test]
    #[test]
    fn unknown_override_property_warns_but_channel_still_builds() {
        let resolver = SpecResolver::new(registry());
        // PING 的模型没有 `no_such_field`：解析期与建造期各告警一次。
        let stack = stack(
            &resolver,
            BTreeMap::from([("no_such_field".to_string(), "7".to_string())]),
        );
        let (factory, _ledger) = factory_with(SocketBindingRegistry::from_bindings([
            SocketBinding::new("jgroups-tcp", "127.0.0.1", 7600),
        ]));

        let channel = factory
            .create_channel(&stack, "ch1")
            .expect("未知属性不应阻断建造");
        assert_eq!(channel.state(), ChannelState::Disconnected);
        assert!(logs_contain("does not know"), "应记录属性注入告警");
    }
}
