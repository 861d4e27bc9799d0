//! # 协议栈装配器
//!
//! ## 核心意图（Why）
//! - 把传输层、有序协议序列与可选中继装配为一份只读
//!   [`StackConfiguration`]，并在构造之前做完全部结构校验；
//! - 校验采用“先收集后汇报”：跑完所有规则后把全部违例一次性上抛，
//!   让管理员一次修正到位，而非在首个违例处快速失败。
//!
//! ## 结构不变量（What）
//! - 恰好一个传输层（缺失与重复都是违例）；
//! - 协议序列非空且协议名互不重复（重复名**全部**列出）；
//! - 中继（若存在）站点名非空、远端站点互不重复、通道引用可在注入的
//!   [`ChannelCatalog`] 中解析；
//! - 顺序铁律：输出的协议次序与声明次序逐位相同，永不重排、去重或
//!   排序——次序就是线缆级流水线次序。

use std::collections::BTreeSet;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use murmur_core::error::{StackError, StackViolation};
use murmur_core::spec::{ProtocolKind, ProtocolSpec};
use murmur_core::stack::{ChannelCatalog, RelaySpec, StackConfiguration, Topology};

/// 协议栈装配器。
///
/// # 教案式注释
/// - **意图 (Why)**：集中承载装配校验与配置代际管理；同一装配器产出的
///   配置 generation 严格递增，结构性重建据此区分新旧；
/// - **契约 (What)**：
///   - 注入的 [`ChannelCatalog`] 用于校验中继远端站点的通道引用；
///   - [`assemble`](StackAssembler::assemble) 要么返回完整配置、要么
///     返回携带全部违例的 [`StackError::Validation`]，没有中间态；
/// - **风险 (Trade-offs)**：generation 用 `AtomicU64` 管理，装配器本身
///   可跨线程共享；目录是装配时刻的快照语义，之后的通道增删不回溯。
#[derive(Debug)]
pub struct StackAssembler {
    catalog: Arc<dyn ChannelCatalog>,
    generation: AtomicU64,
}

impl StackAssembler {
    /// 以通道目录构造装配器。
    pub fn new(catalog: Arc<dyn ChannelCatalog>) -> Self {
        Self {
            catalog,
            generation: AtomicU64::new(0),
        }
    }

    /// 装配一份协议栈配置。
    ///
    /// # 教案式注释
    /// - **契约 (What)**：
    ///   - `transport`：传输层规格；`None` 或角色不是
    ///     [`ProtocolKind::Transport`] 均记为违例；
    ///   - `protocols`：声明顺序的协议序列；不得为空、不得混入第二个
    ///     传输层、协议名不得重复；
    ///   - `relay`：可选中继；站点名、远端站点与通道引用逐条校验；
    /// - **后置条件**：成功时 generation 递增一次并固化进配置；失败时
    ///   装配器状态不变（代际不消耗）。
    pub fn assemble(
        &self,
        name: &str,
        transport: Option<ProtocolSpec>,
        protocols: Vec<ProtocolSpec>,
        relay: Option<RelaySpec>,
        statistics_enabled: bool,
        topology: Option<Topology>,
    ) -> Result<StackConfiguration, StackError> {
        let mut violations = Vec::new();

        match &transport {
            None => violations.push(StackViolation::TransportNotDefined),
            Some(spec) if spec.kind() != ProtocolKind::Transport => {
                violations.push(StackViolation::TransportNotDefined);
            }
            Some(_) => {}
        }

        if protocols.is_empty() {
            violations.push(StackViolation::NoProtocols);
        }

        for spec in &protocols {
            if spec.kind() == ProtocolKind::Transport {
                violations.push(StackViolation::DuplicateTransport {
                    protocol: spec.name().to_string(),
                });
            }
        }

        // 重复协议名：按首次重复出现的声明顺序各报一次。
        let mut seen = BTreeSet::new();
        let mut reported = BTreeSet::new();
        for spec in &protocols {
            if !seen.insert(spec.name().to_string()) && reported.insert(spec.name().to_string()) {
                violations.push(StackViolation::DuplicateProtocol {
                    protocol: spec.name().to_string(),
                });
            }
        }

        if let Some(relay) = &relay {
            self.validate_relay(relay, &mut violations);
        }

        if !violations.is_empty() {
            return Err(StackError::Validation {
                stack: name.to_string(),
                violations,
            });
        }

        let transport = transport.expect("违例为空时传输层必然存在");
        let generation = self.generation.fetch_add(1, Ordering::SeqCst) + 1;
        Ok(StackConfiguration::assembled(
            name,
            generation,
            transport,
            protocols,
            relay,
            statistics_enabled,
            topology,
        ))
    }

    fn validate_relay(&self, relay: &RelaySpec, violations: &mut Vec<StackViolation>) {
        if relay.site().trim().is_empty() {
            violations.push(StackViolation::RelaySiteEmpty);
        }

        let mut seen = BTreeSet::new();
        let mut reported = BTreeSet::new();
        for site in relay.remote_sites() {
            if !seen.insert(site.name().to_string()) && reported.insert(site.name().to_string()) {
                violations.push(StackViolation::DuplicateRemoteSite {
                    site: site.name().to_string(),
                });
            }
            if !self.catalog.contains(site.channel()) {
                violations.push(StackViolation::UnresolvableRemoteChannel {
                    site: site.name().to_string(),
                    channel: site.channel().to_string(),
                });
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::{BTreeMap, BTreeSet};

    use murmur_core::stack::RemoteSite;
    use proptest::prelude::*;

    fn spec(name: &str, kind: ProtocolKind) -> ProtocolSpec {
        ProtocolSpec::resolved(
            name,
            "org.jgroups",
            kind,
            BTreeMap::new(),
            BTreeMap::new(),
            BTreeSet::new(),
            None,
        )
    }

    fn assembler() -> StackAssembler {
        StackAssembler::new(Arc::new(BTreeSet::from(["bridge".to_string()])))
    }

    #[test]
    fn declaration_order_is_preserved_exactly() {
        let stack = assembler()
            .assemble(
                "tcp",
                Some(spec("TCP", ProtocolKind::Transport)),
                vec![
                    spec("PING", ProtocolKind::Protocol),
                    spec("NAKACK2", ProtocolKind::Protocol),
                    spec("GMS", ProtocolKind::Protocol),
                ],
                None,
                true,
                None,
            )
            .expect("合法栈应装配成功");
        let names: Vec<&str> = stack.protocols().iter().map(ProtocolSpec::name).collect();
        assert_eq!(names, ["PING", "NAKACK2", "GMS"]);
        assert_eq!(stack.transport().name(), "TCP");
        assert!(stack.statistics_enabled());
        assert_eq!(stack.generation(), 1);
    }

    #[test]
    fn missing_transport_and_empty_protocols_are_both_reported() {
        let err = assembler()
            .assemble("broken", None, Vec::new(), None, false, None)
            .expect_err("缺传输层且协议为空应失败");
        let violations = err.violations();
        assert!(violations.contains(&StackViolation::TransportNotDefined));
        assert!(violations.contains(&StackViolation::NoProtocols));
        assert_eq!(violations.len(), 2, "应汇报全部违例: {violations:?}");
    }

    #[test]
    fn second_transport_inside_protocol_list_is_a_violation() {
        let err = assembler()
            .assemble(
                "two-transports",
                Some(spec("TCP", ProtocolKind::Transport)),
                vec![
                    spec("UDP", ProtocolKind::Transport),
                    spec("PING", ProtocolKind::Protocol),
                ],
                None,
                false,
                None,
            )
            .expect_err("第二个传输层应失败");
        assert!(err.violations().contains(&StackViolation::DuplicateTransport {
            protocol: "UDP".to_string()
        }));
    }

    #[test]
    fn every_duplicate_protocol_name_is_listed() {
        let err = assembler()
            .assemble(
                "dupes",
                Some(spec("TCP", ProtocolKind::Transport)),
                vec![
                    spec("PING", ProtocolKind::Protocol),
                    spec("PING", ProtocolKind::Protocol),
                    spec("GMS", ProtocolKind::Protocol),
                    spec("GMS", ProtocolKind::Protocol),
                    spec("GMS", ProtocolKind::Protocol),
                ],
                None,
                false,
                None,
            )
            .expect_err("重复协议名应失败");
        let dupes: Vec<String> = err
            .violations()
            .iter()
            .filter_map(|v| match v {
                StackViolation::DuplicateProtocol { protocol } => Some(protocol.clone()),
                _ => None,
            })
            .collect();
        assert_eq!(dupes, ["PING", "GMS"], "全部重复名各报一次");
    }

    #[test]
    fn relay_violations_are_collected_alongside() {
        let relay = RelaySpec::new(
            "",
            BTreeMap::new(),
            vec![
                RemoteSite::new("nyc", "nyc-cluster", "bridge"),
                RemoteSite::new("nyc", "nyc-cluster", "no-such-channel"),
            ],
        );
        let err = assembler()
            .assemble(
                "relayed",
                Some(spec("TCP", ProtocolKind::Transport)),
                vec![spec("PING", ProtocolKind::Protocol)],
                Some(relay),
                false,
                None,
            )
            .expect_err("中继违例应失败");
        let violations = err.violations();
        assert!(violations.contains(&StackViolation::RelaySiteEmpty));
        assert!(violations.contains(&StackViolation::DuplicateRemoteSite {
            site: "nyc".to_string()
        }));
        assert!(violations.contains(&StackViolation::UnresolvableRemoteChannel {
            site: "nyc".to_string(),
            channel: "no-such-channel".to_string(),
        }));
    }

    #[test]
    fn well_formed_relay_passes() {
        let relay = RelaySpec::new(
            "sfo",
            BTreeMap::new(),
            vec![RemoteSite::new("nyc", "nyc-cluster", "bridge")],
        );
        let stack = assembler()
            .assemble(
                "relayed",
                Some(spec("TCP", ProtocolKind::Transport)),
                vec![spec("PING", ProtocolKind::Protocol)],
                Some(relay),
                false,
                None,
            )
            .expect("合法中继应通过");
        assert_eq!(stack.relay().map(|r| r.site()), Some("sfo"));
    }

    #[test]
    fn generation_increments_per_successful_assembly() {
        let assembler = assembler();
        for expected in 1..=3u64 {
            let stack = assembler
                .assemble(
                    "tcp",
                    Some(spec("TCP", ProtocolKind::Transport)),
                    vec![spec("PING", ProtocolKind::Protocol)],
                    None,
                    false,
                    None,
                )
                .expect("合法栈应装配成功");
            assert_eq!(stack.generation(), expected);
        }
        // 失败的装配不消耗代际。
        let _ = assembler.assemble("broken", None, Vec::new(), None, false, None);
        let stack = assembler
            .assemble(
                "tcp",
                Some(spec("TCP", ProtocolKind::Transport)),
                vec![spec("PING", ProtocolKind::Protocol)],
                None,
                false,
                None,
            )
            .expect("合法栈应装配成功");
        assert_eq!(stack.generation(), 4);
    }

    proptest! {
        /// 任意互不重名的协议序列，装配后次序逐位保持声明次序。
        #[test]
        fn arbitrary_unique_orderings_survive_assembly(
            names in proptest::collection::btree_set("[A-Z][A-Z0-9_]{0,11}", 1..16)
                .prop_map(|set| set.into_iter().collect::<Vec<_>>())
                .prop_shuffle()
        ) {
            let protocols: Vec<ProtocolSpec> = names
                .iter()
                .map(|name| spec(name, ProtocolKind::Protocol))
                .collect();
            let stack = assembler()
                .assemble(
                    "prop",
                    Some(spec("TCP", ProtocolKind::Transport)),
                    protocols,
                    None,
                    false,
                    None,
                )
                .expect("互不重名的序列应装配成功");
            let assembled: Vec<&str> = stack.protocols().iter().map(ProtocolSpec::name).collect();
            let declared: Vec<&str> = names.iter().map(String::as_str).collect();
            prop_assert_eq!(assembled, declared);
        }
    }
}
