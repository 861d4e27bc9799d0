#![deny(unsafe_code)]

//! # murmur-stack
//!
//! ## 定位与职责（Why）
//! - 承担“声明式协议栈描述 → 只读 [`StackConfiguration`]”的全部解析期
//!   工作：协议规格解析、属性变换流水线与装配校验；
//! - 全部操作同步、CPU 密集、无副作用（唯一例外是宽松兼容的 `warn!`
//!   日志），失败时不返回任何部分构造的结果。
//!
//! ## 架构嵌入（Where）
//! - `resolve` 模块把 `(module, name, 覆盖属性)` 解析为
//!   [`ProtocolSpec`]（协议规格注册表契约的实现）；
//! - `transform` 模块提供按固定次序应用的可组合属性变换，取代层层
//!   包裹的装饰器式配置链；
//! - `assemble` 模块执行“先收集后汇报”的装配校验并产出配置代际；
//! - `descriptor` 模块是 serde 反序列化友好的声明层，供宿主以 TOML
//!   等格式直接描述协议栈。
//!
//! [`StackConfiguration`]: murmur_core::stack::StackConfiguration
//! [`ProtocolSpec`]: murmur_core::spec::ProtocolSpec

pub mod assemble;
pub mod descriptor;
pub mod resolve;
pub mod transform;

pub use assemble::StackAssembler;
pub use descriptor::{
    ProtocolDescriptor, RelayDescriptor, RemoteSiteDescriptor, StackDescriptor,
    TopologyDescriptor, build_stack,
};
pub use resolve::SpecResolver;
pub use transform::{TransformContext, effective_properties};
