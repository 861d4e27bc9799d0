//! # 声明式协议栈描述层
//!
//! ## 核心意图（Why）
//! - 宿主层以 TOML 等格式声明协议栈（镜像原管理模型里“栈 = 传输层 +
//!   协议序列 + 可选中继”的结构），本模块负责把声明逐条交给解析器、
//!   再整体交给装配器；
//! - 描述里协议出现的次序就是栈次序，反序列化与构建全程不重排。
//!
//! ## 行为契约（What）
//! - [`build_stack`] 要么返回完整 [`StackConfiguration`]，要么把解析/
//!   装配错误原样上抛；不返回部分结果。

use std::collections::BTreeMap;

use serde::Deserialize;

use murmur_core::error::StackError;
use murmur_core::stack::{RelaySpec, RemoteSite, StackConfiguration, Topology};

use crate::assemble::StackAssembler;
use crate::resolve::SpecResolver;

fn default_module() -> String {
    "org.jgroups".to_string()
}

/// 单个协议的声明。
///
/// - **契约 (What)**：`type` 为协议名；`module` 缺省为 `org.jgroups`；
///   `properties` 为覆盖属性；`socket_binding` 为要求宿主解析的绑定名；
///   `statistics` 为协议级统计开关（缺省继承栈级）。
#[derive(Clone, Debug, Deserialize)]
pub struct ProtocolDescriptor {
    #[serde(rename = "type")]
    pub protocol_type: String,
    #[serde(default = "default_module")]
    pub module: String,
    #[serde(default)]
    pub properties: BTreeMap<String, String>,
    #[serde(default)]
    pub socket_binding: Option<String>,
    #[serde(default)]
    pub statistics: Option<bool>,
}

/// 中继远端站点的声明。
#[derive(Clone, Debug, Deserialize)]
pub struct RemoteSiteDescriptor {
    pub name: String,
    pub cluster: String,
    pub channel: String,
}

/// 站点中继的声明。
#[derive(Clone, Debug, Deserialize)]
pub struct RelayDescriptor {
    pub site: String,
    #[serde(default)]
    pub properties: BTreeMap<String, String>,
    #[serde(default)]
    pub remote_sites: Vec<RemoteSiteDescriptor>,
}

/// 传输层拓扑的声明。
#[derive(Clone, Debug, Default, Deserialize)]
pub struct TopologyDescriptor {
    #[serde(default)]
    pub site: Option<String>,
    #[serde(default)]
    pub rack: Option<String>,
    #[serde(default)]
    pub machine: Option<String>,
}

/// 一份完整协议栈的声明。
///
/// # 教案式注释
/// - **意图 (Why)**：让“添加协议栈”的管理操作以数据形式到达本层，
///   序列化格式由宿主选择（测试里用 TOML）；
/// - **契约 (What)**：`protocols` 的数组次序即流水线次序；`statistics`
///   为栈级统计默认值；
/// - **风险 (Trade-offs)**：描述层不做任何校验，未知协议、重复名等
///   问题留给解析器与装配器给出结构化诊断。
#[derive(Clone, Debug, Deserialize)]
pub struct StackDescriptor {
    pub name: String,
    #[serde(default)]
    pub statistics: bool,
    pub transport: ProtocolDescriptor,
    #[serde(default)]
    pub protocols: Vec<ProtocolDescriptor>,
    #[serde(default)]
    pub relay: Option<RelayDescriptor>,
    #[serde(default)]
    pub topology: Option<TopologyDescriptor>,
}

/// 把声明逐条解析并整体装配为只读配置。
pub fn build_stack(
    descriptor: &StackDescriptor,
    resolver: &SpecResolver,
    assembler: &StackAssembler,
) -> Result<StackConfiguration, StackError> {
    let resolve = |proto: &ProtocolDescriptor| {
        resolver.resolve(
            &proto.module,
            &proto.protocol_type,
            proto.properties.clone(),
            proto.socket_binding.as_deref(),
            proto.statistics,
        )
    };

    let transport = resolve(&descriptor.transport)?;
    let protocols = descriptor
        .protocols
        .iter()
        .map(resolve)
        .collect::<Result<Vec<_>, _>>()?;

    let relay = descriptor.relay.as_ref().map(|relay| {
        RelaySpec::new(
            relay.site.clone(),
            relay.properties.clone(),
            relay
                .remote_sites
                .iter()
                .map(|site| {
                    RemoteSite::new(site.name.clone(), site.cluster.clone(), site.channel.clone())
                })
                .collect(),
        )
    });

    let topology = descriptor.topology.as_ref().map(|t| Topology {
        site: t.site.clone(),
        rack: t.rack.clone(),
        machine: t.machine.clone(),
    });

    assembler.assemble(
        &descriptor.name,
        Some(transport),
        protocols,
        relay,
        descriptor.statistics,
        topology,
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeSet;
    use std::sync::Arc;

    use murmur_core::registry::{ProtocolModel, ProtocolModelRegistry};
    use murmur_core::spec::{ProtocolKind, ProtocolSpec};

    fn fixtures() -> (SpecResolver, StackAssembler) {
        let registry = ProtocolModelRegistry::builder()
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
                "NAKACK2",
                ProtocolModel::new(ProtocolKind::Protocol).field("use_mcast_xmit"),
            )
            .protocol(
                "org.jgroups",
                "GMS",
                ProtocolModel::new(ProtocolKind::Protocol).field("join_timeout"),
            )
            .freeze();
        let resolver = SpecResolver::new(Arc::new(registry));
        let assembler = StackAssembler::new(Arc::new(BTreeSet::<String>::new()));
        (resolver, assembler)
    }

    #[test]
    fn toml_described_stack_builds_in_declared_order() {
        let descriptor: StackDescriptor = toml::from_str(
            r#"
            name = "tcp"
            statistics = true

            [transport]
            type = "TCP"
            socket_binding = "jgroups-tcp"

            [[protocols]]
            type = "PING"
            properties = { timeout = "5000" }

            [[protocols]]
            type = "NAKACK2"

            [[protocols]]
            type = "GMS"
            statistics = false
            "#,
        )
        .expect("TOML 声明应可反序列化");

        let (resolver, assembler) = fixtures();
        let stack = build_stack(&descriptor, &resolver, &assembler).expect("声明栈应装配成功");

        let names: Vec<&str> = stack.protocols().iter().map(ProtocolSpec::name).collect();
        assert_eq!(names, ["PING", "NAKACK2", "GMS"]);
        assert!(stack.statistics_enabled());
        assert_eq!(stack.protocols()[2].statistics(), Some(false));
        assert!(
            stack
                .transport()
                .required_socket_bindings()
                .contains("jgroups-tcp")
        );
        assert_eq!(
            stack.protocols()[0]
                .override_properties()
                .get("timeout")
                .map(String::as_str),
            Some("5000")
        );
    }

    #[test]
    fn unknown_protocol_in_descriptor_surfaces_resolution_error() {
        let descriptor: StackDescriptor = toml::from_str(
            r#"
            name = "bad"

            [transport]
            type = "TCP"

            [[protocols]]
            type = "NOPE"
            "#,
        )
        .expect("TOML 声明应可反序列化");

        let (resolver, assembler) = fixtures();
        let err = build_stack(&descriptor, &resolver, &assembler).expect_err("未知协议应失败");
        assert!(matches!(err, StackError::ProtocolNotFound { ref protocol, .. } if protocol == "NOPE"));
    }
}
