//! # 协议模型注册表
//!
//! ## 核心意图（Why）
//! - 用显式注册表取代运行时的全局插件发现：注册表在进程
//!   初始化时一次性填充、冻结，然后以 `Arc` 注入解析器，发现状态
//!   从此可见、可测试、不可变；
//! - 注册表同时承担“协议默认属性”职责：每个协议模型携带默认属性
//!   快照，解析时拷入规格。
//!
//! ## 行为契约（What）
//! - 构建期：[`ProtocolModelRegistryBuilder`] 以 `(module, name)` 为键
//!   登记 [`ProtocolModel`]；重复登记以后者覆盖前者；
//! - 冻结后：[`ProtocolModelRegistry::model`] 只读查询，无任何副作用。

use std::collections::{BTreeMap, BTreeSet};

use crate::spec::ProtocolKind;

/// 单个协议类型的构建元数据。
///
/// # 教案式注释
/// - **意图 (Why)**：描述“这个协议是什么角色、认识哪些属性键、默认值
///   是什么”，是解析器裁决宽松告警与默认属性的依据；
/// - **契约 (What)**：`fields` 为协议实现声明的可设置属性键全集；覆盖
///   属性若不在其中，解析器记 `warn!` 但仍然保留该键（宽松兼容）；
/// - **风险 (Trade-offs)**：`fields` 与真实协议实现之间的一致性由注册
///   方维护，注册表本身无法校验。
#[derive(Clone, Debug)]
pub struct ProtocolModel {
    kind: ProtocolKind,
    fields: BTreeSet<String>,
    defaults: BTreeMap<String, String>,
}

impl ProtocolModel {
    /// 以指定角色起一个空模型。
    pub fn new(kind: ProtocolKind) -> Self {
        Self {
            kind,
            fields: BTreeSet::new(),
            defaults: BTreeMap::new(),
        }
    }

    /// 登记一个可设置属性键（消费式链式调用）。
    pub fn field(mut self, name: impl Into<String>) -> Self {
        self.fields.insert(name.into());
        self
    }

    /// 登记一条默认属性；键同时计入可设置集合。
    pub fn default_property(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        let key = key.into();
        self.fields.insert(key.clone());
        self.defaults.insert(key, value.into());
        self
    }

    /// 协议角色。
    pub fn kind(&self) -> ProtocolKind {
        self.kind
    }

    /// 可设置属性键全集。
    pub fn fields(&self) -> &BTreeSet<String> {
        &self.fields
    }

    /// 默认属性快照。
    pub fn defaults(&self) -> &BTreeMap<String, String> {
        &self.defaults
    }

    /// 判断属性键是否为协议实现所认识。
    pub fn knows_field(&self, key: &str) -> bool {
        self.fields.contains(key)
    }
}

/// 冻结后的协议模型注册表（只读）。
#[derive(Debug, Default)]
pub struct ProtocolModelRegistry {
    modules: BTreeMap<String, BTreeMap<String, ProtocolModel>>,
}

impl ProtocolModelRegistry {
    /// 起一个空的注册表构建器。
    pub fn builder() -> ProtocolModelRegistryBuilder {
        ProtocolModelRegistryBuilder::default()
    }

    /// 查询 `(module, name)` 对应的协议模型。
    pub fn model(&self, module: &str, name: &str) -> Option<&ProtocolModel> {
        self.modules.get(module).and_then(|m| m.get(name))
    }

    /// 注册表中的协议总数（跨模块累计）。
    pub fn len(&self) -> usize {
        self.modules.values().map(BTreeMap::len).sum()
    }

    /// 注册表是否为空。
    pub fn is_empty(&self) -> bool {
        self.modules.values().all(BTreeMap::is_empty)
    }
}

/// 注册表构建器：初始化期填充，`freeze` 之后不再变化。
///
/// - **契约 (What)**：重复登记同一 `(module, name)` 时后者覆盖前者；
/// - **风险 (Trade-offs)**：构建器非并发安全，应在单线程初始化阶段完成
///   填充后再冻结共享。
#[derive(Debug, Default)]
pub struct ProtocolModelRegistryBuilder {
    modules: BTreeMap<String, BTreeMap<String, ProtocolModel>>,
}

impl ProtocolModelRegistryBuilder {
    /// 在指定模块命名空间下登记一个协议模型。
    pub fn protocol(
        mut self,
        module: impl Into<String>,
        name: impl Into<String>,
        model: ProtocolModel,
    ) -> Self {
        self.modules
            .entry(module.into())
            .or_default()
            .insert(name.into(), model);
        self
    }

    /// 冻结为只读注册表。
    pub fn freeze(self) -> ProtocolModelRegistry {
        ProtocolModelRegistry {
            modules: self.modules,
        }
    }
}
