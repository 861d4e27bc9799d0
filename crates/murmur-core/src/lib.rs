#![deny(unsafe_code)]

//! # murmur-core
//!
//! ## 定位与职责（Why）
//! - 为“组通信协议栈组合层”提供跨 crate 共享的稳定契约：协议规格、协议栈配置、
//!   通道状态机、驱动接口以及统一的错误域；
//! - 上层的解析/装配 crate（`murmur-stack`）与运行时生命周期 crate
//!   （`murmur-channel`）只通过这里定义的类型协作，避免彼此产生隐式耦合。
//!
//! ## 架构嵌入（Where）
//! - `spec` 与 `stack` 模块承载不可变的数据模型：一次构建、只读共享；
//! - `driver` 模块定义对外部组通信库（协议流水线的真正实现方）的消费契约；
//! - `registry` 模块提供显式的协议模型注册表，取代运行时全局发现：
//!   进程初始化时填充、冻结后注入使用方；
//! - `error` 模块集中声明全部错误语义，统一 `thiserror` 风格诊断信息；
//! - `test_stubs` 模块提供内存态驱动桩，供各 crate 的测试复用。
//!
//! ## 契约策略（Trade-offs）
//! - 数据模型一律在构造后不可变：结构性变更通过重建新值（携带新的 generation）
//!   表达，依赖旧值的通道需要重启，而非就地修改；
//! - 驱动契约刻意保持同步签名：连接可能阻塞调用线程，超时与取消由底层
//!   组通信库自行约束，本层不建模取消令牌。

pub mod binding;
pub mod channel;
pub mod driver;
pub mod error;
pub mod registry;
pub mod spec;
pub mod stack;

/// 测试桩命名空间。
///
/// - **意图说明 (Why)**：让 `murmur-stack` / `murmur-channel` 的测试无需各自
///   重复实现内存态驱动；
/// - **契约定位 (What)**：桩实现满足 `driver` 模块的全部契约，但不做任何
///   真实网络 I/O；
/// - **风险提示 (Trade-offs)**：桩的行为以“可脚本化失败”为限，不模拟
///   成员协商、重传等库内部语义。
pub mod test_stubs;

pub mod prelude;

pub use binding::{SocketBinding, SocketBindingRegistry};
pub use channel::ChannelState;
pub use error::{ChannelError, DriverError, StackError, StackViolation};
pub use spec::{ProtocolKind, ProtocolSpec};
pub use stack::{ChannelCatalog, RelaySpec, RemoteSite, StackConfiguration, Topology};
