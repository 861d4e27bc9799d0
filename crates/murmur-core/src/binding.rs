//! # 套接字绑定模型
//!
//! 绑定解析是宿主层（管理/服务层）的职责：协议声明它需要哪些绑定名，
//! 宿主层在通道创建之前完成解析并填充注册表。本模块只承载解析结果的
//! 只读形态；通道工厂发现未解析绑定时以
//! [`ChannelError::MissingBinding`](crate::error::ChannelError::MissingBinding)
//! 拒绝建造。

use std::collections::BTreeMap;

/// 一条已解析的套接字绑定。
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct SocketBinding {
    name: String,
    host: String,
    port: u16,
}

impl SocketBinding {
    /// 构造已解析绑定。
    pub fn new(name: impl Into<String>, host: impl Into<String>, port: u16) -> Self {
        Self {
            name: name.into(),
            host: host.into(),
            port,
        }
    }

    /// 绑定名。
    pub fn name(&self) -> &str {
        &self.name
    }

    /// 绑定主机地址。
    pub fn host(&self) -> &str {
        &self.host
    }

    /// 绑定端口。
    pub fn port(&self) -> u16 {
        self.port
    }
}

/// 冻结后的绑定注册表：宿主层初始化时填充，此后只读注入。
///
/// - **契约 (What)**：`resolve` 命中返回绑定引用，未命中返回 `None`，
///   由调用方决定是否构成错误；
/// - **风险 (Trade-offs)**：注册表是装配时刻的快照，运行期的绑定变更
///   需要重建注册表并重启依赖通道。
#[derive(Debug, Default)]
pub struct SocketBindingRegistry {
    bindings: BTreeMap<String, SocketBinding>,
}

impl SocketBindingRegistry {
    /// 由已解析绑定集合构造注册表。
    pub fn from_bindings(bindings: impl IntoIterator<Item = SocketBinding>) -> Self {
        Self {
            bindings: bindings
                .into_iter()
                .map(|binding| (binding.name.clone(), binding))
                .collect(),
        }
    }

    /// 按绑定名查询。
    pub fn resolve(&self, name: &str) -> Option<&SocketBinding> {
        self.bindings.get(name)
    }
}
