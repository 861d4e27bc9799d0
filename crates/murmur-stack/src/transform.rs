//! # 属性变换流水线
//!
//! ## 核心意图（Why）
//! - 配置行为若以层层包裹的装饰器链叠加（套接字绑定包装拓扑、拓扑再
//!   包装线程池……），继承层次深且顺序隐晦；这里采用一组按固定次序
//!   应用的纯函数，每步接收上一步的属性集并返回新值；
//! - 变换次序即合并语义：默认属性 → 覆盖属性（覆盖优先）→ 拓扑折算 →
//!   绑定地址折算，后者可以覆盖前者。
//!
//! ## 行为契约（What）
//! - 所有变换都不修改输入：`PropertySet` 按值流动，规格与上下文只读；
//! - 拓扑与绑定折算仅作用于传输层规格，对普通协议是恒等变换。

use std::collections::BTreeMap;

use murmur_core::binding::SocketBinding;
use murmur_core::spec::{ProtocolKind, ProtocolSpec};
use murmur_core::stack::Topology;

/// 属性集：协议属性键到字符串值的有序映射。
pub type PropertySet = BTreeMap<String, String>;

/// 单步属性变换的函数形态。
pub type Transform = fn(PropertySet, &ProtocolSpec, &TransformContext<'_>) -> PropertySet;

/// 变换流水线的只读上下文。
///
/// - **契约 (What)**：`topology` 为协议栈声明的拓扑元数据；`binding` 为
///   宿主层针对该协议解析到的套接字绑定（传输层通常恰有一个）；
/// - **风险 (Trade-offs)**：上下文按协议逐个构造，借用保证零拷贝。
#[derive(Clone, Copy, Debug)]
pub struct TransformContext<'a> {
    pub topology: Option<&'a Topology>,
    pub binding: Option<&'a SocketBinding>,
}

/// 固定次序的变换流水线。
pub const PIPELINE: &[Transform] = &[
    apply_defaults,
    apply_overrides,
    apply_topology,
    apply_binding_address,
];

/// 对单个规格应用完整流水线，得到生效属性集。
pub fn effective_properties(spec: &ProtocolSpec, ctx: &TransformContext<'_>) -> PropertySet {
    PIPELINE
        .iter()
        .fold(PropertySet::new(), |props, transform| transform(props, spec, ctx))
}

/// 第一步：铺入注册表默认属性。
fn apply_defaults(mut props: PropertySet, spec: &ProtocolSpec, _ctx: &TransformContext<'_>) -> PropertySet {
    for (key, value) in spec.default_properties() {
        props.insert(key.clone(), value.clone());
    }
    props
}

/// 第二步：铺入覆盖属性；与默认值冲突时覆盖优先。
fn apply_overrides(mut props: PropertySet, spec: &ProtocolSpec, _ctx: &TransformContext<'_>) -> PropertySet {
    for (key, value) in spec.override_properties() {
        props.insert(key.clone(), value.clone());
    }
    props
}

/// 第三步：把拓扑元数据折算为传输层属性（`site_id`/`rack_id`/`machine_id`）。
fn apply_topology(mut props: PropertySet, spec: &ProtocolSpec, ctx: &TransformContext<'_>) -> PropertySet {
    if spec.kind() != ProtocolKind::Transport {
        return props;
    }
    if let Some(topology) = ctx.topology {
        if let Some(site) = &topology.site {
            props.insert("site_id".to_string(), site.clone());
        }
        if let Some(rack) = &topology.rack {
            props.insert("rack_id".to_string(), rack.clone());
        }
        if let Some(machine) = &topology.machine {
            props.insert("machine_id".to_string(), machine.clone());
        }
    }
    props
}

/// 第四步：把已解析绑定折算为传输层地址属性（`bind_addr`/`bind_port`）。
fn apply_binding_address(
    mut props: PropertySet,
    spec: &ProtocolSpec,
    ctx: &TransformContext<'_>,
) -> PropertySet {
    if spec.kind() != ProtocolKind::Transport {
        return props;
    }
    if let Some(binding) = ctx.binding {
        props.insert("bind_addr".to_string(), binding.host().to_string());
        props.insert("bind_port".to_string(), binding.port().to_string());
    }
    props
}
