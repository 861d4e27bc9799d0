//! # murmur-core Prelude
//!
//! ## 教案级说明（Why）
//! - 为上层 crate 提供稳定、浅路径的导入入口，避免业务代码里出现大量
//!   `murmur_core::driver::...` 深层路径；
//! - 仅收录跨模块高频依赖的契约类型，边缘类型仍建议使用明确命名空间。
//!
//! ## 契约定义（What）
//! - 成功导入后可稳定访问下列 re-export；新增导出遵循向后兼容原则。

pub use crate::binding::{SocketBinding, SocketBindingRegistry};
pub use crate::channel::ChannelState;
pub use crate::driver::{ForkLayer, GroupDriver, PropertyError, ProtocolBuilder, ProtocolHandle, RawChannel};
pub use crate::error::{ChannelError, DriverError, MissingBinding, StackError, StackViolation, codes};
pub use crate::registry::{ProtocolModel, ProtocolModelRegistry, ProtocolModelRegistryBuilder};
pub use crate::spec::{ProtocolKind, ProtocolSpec};
pub use crate::stack::{ChannelCatalog, RelaySpec, RemoteSite, StackConfiguration, Topology};
