//! # 协议规格解析器
//!
//! ## 核心意图（Why）
//! - 把管理层的“协议类型 + 模块 + 覆盖属性”声明解析为不可变的
//!   [`ProtocolSpec`]：命中注册表模型、拷贝默认属性、登记绑定需求；
//! - 解析是纯函数式的：除宽松兼容的 `warn!` 日志外没有任何副作用，
//!   运行时协议实例的构建完全延迟到通道工厂。
//!
//! ## 宽松兼容（Trade-offs）
//! - 覆盖属性引用了协议实现不认识的键时**不拒绝**，仅记 `warn!` 并保留
//!   该键——协议实现在演进中可能先于（或晚于）模型登记获得新字段，拒绝
//!   会破坏前后向兼容。

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

use tracing::warn;

use murmur_core::error::StackError;
use murmur_core::registry::ProtocolModelRegistry;
use murmur_core::spec::ProtocolSpec;

/// 协议规格解析器：持有冻结的协议模型注册表。
///
/// # 教案式注释
/// - **意图 (Why)**：注册表在进程初始化时填充并冻结，解析器只是它的
///   只读视图加一层解析语义，可被任意多线程共享；
/// - **契约 (What)**：[`resolve`](SpecResolver::resolve) 失败时返回
///   [`StackError::ProtocolNotFound`]，此外不产生错误；
/// - **风险 (Trade-offs)**：解析器不缓存结果——规格构造成本是几次
///   映射拷贝，缓存带来的失效复杂度得不偿失。
#[derive(Clone, Debug)]
pub struct SpecResolver {
    registry: Arc<ProtocolModelRegistry>,
}

impl SpecResolver {
    /// 以冻结注册表构造解析器。
    pub fn new(registry: Arc<ProtocolModelRegistry>) -> Self {
        Self { registry }
    }

    /// 解析一条协议声明为不可变规格。
    ///
    /// # 教案式注释
    /// - **契约 (What)**：
    ///   - `module` / `name`：协议模型的注册表坐标；未命中返回
    ///     [`StackError::ProtocolNotFound`]；
    ///   - `overrides`：管理层覆盖属性；未知键记 `warn!` 后保留；
    ///   - `socket_binding`：该协议要求宿主解析的绑定名（若有）；
    ///   - `statistics`：协议级统计开关，`None` 表示继承栈级默认；
    /// - **后置条件**：返回的规格携带模型默认属性快照与协议角色，
    ///   此后不再依赖注册表。
    pub fn resolve(
        &self,
        module: &str,
        name: &str,
        overrides: BTreeMap<String, String>,
        socket_binding: Option<&str>,
        statistics: Option<bool>,
    ) -> Result<ProtocolSpec, StackError> {
        let model = self.registry.model(module, name).ok_or_else(|| {
            StackError::ProtocolNotFound {
                module: module.to_string(),
                protocol: name.to_string(),
            }
        })?;

        for key in overrides.keys() {
            if !model.knows_field(key) {
                warn!(
                    protocol = name,
                    property = key.as_str(),
                    "override property has no matching field on the protocol; \
                     keeping it for forward compatibility"
                );
            }
        }

        let bindings: BTreeSet<String> = socket_binding
            .map(|binding| BTreeSet::from([binding.to_string()]))
            .unwrap_or_default();

        Ok(ProtocolSpec::resolved(
            name,
            module,
            model.kind(),
            model.defaults().clone(),
            overrides,
            bindings,
            statistics,
        ))
    }
}
