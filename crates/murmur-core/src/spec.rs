//! # 协议规格模型
//!
//! ## 核心意图（Why）
//! - 把“某个协议以何种参数出现在某个协议栈里”凝固为一份不可变的规格值，
//!   供通道工厂在真正构建运行时协议实例前反复只读引用；
//! - 以单次构造函数取代“先配置后构建”的两阶段生命周期，消除半构造对象
//!   在并发场景下的观察窗口。
//!
//! ## 行为契约（What）
//! - [`ProtocolSpec`] 一经 [`ProtocolSpec::resolved`] 构造即不可变；
//! - 默认属性与覆盖属性分开保存：生效顺序（默认 → 覆盖，覆盖优先）由
//!   `murmur-stack` 的属性变换流水线统一裁决，本模块不做合并；
//! - 统计开关为三态：`Some(v)` 表示协议级覆盖，`None` 表示回落到
//!   协议栈级默认值。
//!
//! ## 风险提示（Trade-offs）
//! - 属性统一采用 `String → String` 映射，放弃编译期类型约束，换取与
//!   外部协议实现演进解耦的宽松兼容（未知键仅告警，不拒绝）。

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

/// 协议在流水线中的角色。
///
/// # 教案式注释
/// - **意图 (Why)**：装配校验需要区分“传输层”“普通协议”“分叉复用层”与
///   “站点中继”，否则无法表达“恰好一个传输层、中继居末”的结构不变量；
/// - **契约 (What)**：角色由注册表中的协议模型声明，解析时拷贝到规格里，
///   之后不再变化；
/// - **风险 (Trade-offs)**：角色枚举是封闭集合，新增角色属于破坏性变更，
///   需要同步修订装配校验规则。
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum ProtocolKind {
    /// 流水线最底层，负责真实网络 I/O。
    Transport,
    /// 常规协议层，按声明顺序叠放在传输层之上。
    Protocol,
    /// 分叉复用层，允许在共享传输上挂载派生子通道。
    ForkMux,
    /// 站点中继层，桥接多个独立集群；若存在则位于栈顶。
    Relay,
}

/// 单个协议的不可变构建规格。
///
/// # 教案式注释
/// - **意图 (Why)**：把协议名、所属模块、角色、属性与套接字绑定需求
///   打包为一份只读值，作为“声明式描述 → 运行时实例”转换的中间产物；
/// - **契约 (What)**：
///   - 由 `murmur-stack` 的解析器构造，构造后所有字段只读；
///   - `required_socket_bindings` 中的绑定名必须在通道创建前由宿主层
///     完成解析，否则工厂拒绝建造；
///   - 规格可被多个通道共享（`Arc<str>` 字段保证克隆廉价）；
/// - **风险 (Trade-offs)**：规格不持有运行时协议实例的任何引用，真正的
///   构建延迟到通道工厂，规格本身在实例建成后即可丢弃。
#[derive(Clone, Debug)]
pub struct ProtocolSpec {
    name: Arc<str>,
    module: Arc<str>,
    kind: ProtocolKind,
    default_properties: BTreeMap<String, String>,
    override_properties: BTreeMap<String, String>,
    required_socket_bindings: BTreeSet<String>,
    statistics: Option<bool>,
}

impl ProtocolSpec {
    /// 由解析器一次性构造完整规格。
    ///
    /// # 教案式注释
    /// - **意图 (Why)**：单一构造入口杜绝“部分初始化”的中间态；
    /// - **契约 (What)**：
    ///   - `name` / `module`：协议标识与其所属模块命名空间；
    ///   - `defaults`：来自协议模型注册表的默认属性快照；
    ///   - `overrides`：管理层声明的覆盖属性，合并时优先于默认值；
    ///   - `bindings`：该协议要求宿主解析的套接字绑定名集合；
    ///   - `statistics`：协议级统计开关，`None` 时继承协议栈默认；
    /// - **后置条件**：返回值不可变，可安全跨线程只读共享。
    pub fn resolved(
        name: impl Into<Arc<str>>,
        module: impl Into<Arc<str>>,
        kind: ProtocolKind,
        defaults: BTreeMap<String, String>,
        overrides: BTreeMap<String, String>,
        bindings: BTreeSet<String>,
        statistics: Option<bool>,
    ) -> Self {
        Self {
            name: name.into(),
            module: module.into(),
            kind,
            default_properties: defaults,
            override_properties: overrides,
            required_socket_bindings: bindings,
            statistics,
        }
    }

    /// 协议名，例如 `TCP`、`PING`、`NAKACK2`。
    pub fn name(&self) -> &str {
        &self.name
    }

    /// 协议名的共享句柄，便于零拷贝存入索引结构。
    pub fn name_arc(&self) -> &Arc<str> {
        &self.name
    }

    /// 协议所属模块命名空间。
    pub fn module(&self) -> &str {
        &self.module
    }

    /// 协议在流水线中的角色。
    pub fn kind(&self) -> ProtocolKind {
        self.kind
    }

    /// 注册表提供的默认属性。
    pub fn default_properties(&self) -> &BTreeMap<String, String> {
        &self.default_properties
    }

    /// 管理层声明的覆盖属性。
    pub fn override_properties(&self) -> &BTreeMap<String, String> {
        &self.override_properties
    }

    /// 该协议要求解析的套接字绑定名集合。
    pub fn required_socket_bindings(&self) -> &BTreeSet<String> {
        &self.required_socket_bindings
    }

    /// 协议级统计开关（未设置时由协议栈默认值兜底）。
    pub fn statistics(&self) -> Option<bool> {
        self.statistics
    }

    /// 三态统计解析：协议级覆盖优先，其次回落协议栈默认。
    pub fn effective_statistics(&self, stack_default: bool) -> bool {
        self.statistics.unwrap_or(stack_default)
    }
}
