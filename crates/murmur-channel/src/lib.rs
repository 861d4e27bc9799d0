#![deny(unsafe_code)]

//! # murmur-channel
//!
//! ## 定位与职责（Why）
//! - 承担协议栈配置的运行时侧：按配置建造未连接通道（工厂）、以通道名
//!   串行化 connect/disconnect/close 的状态迁移（生命周期管理器）、在已
//!   连接通道的共享传输上派生/摘除分叉子通道（分叉组合器）；
//! - 启停次序与清理保证是本 crate 的核心契约：连接失败的通道立即关闭
//!   （不泄漏半启动资源）；拆卸路径永远走得完（库侧失败只记日志）。
//!
//! ## 架构嵌入（Where）
//! - `factory` 模块消费 `murmur-core` 的驱动契约与 `murmur-stack` 的
//!   属性变换流水线；
//! - `lifecycle` 模块以 `DashMap` + 每通道互斥锁实现“同名串行、异名
//!   并行”的迁移纪律；
//! - `fork` 模块定位父通道流水线中的分叉复用层完成子流水线挂载。
//!
//! ## 并发模型（Trade-offs）
//! - 调用均为同步阻塞：`connect` 可能阻塞至库侧超时；本层不拥有线程池
//!   也不建模取消；
//! - 一个通道的失败不会波及其它通道：状态彼此独立，锁粒度为单通道。

pub mod channel;
pub mod factory;
pub mod fork;
pub mod lifecycle;

pub use channel::Channel;
pub use factory::ChannelFactory;
pub use fork::{ForkChannel, ForkChannelFactory, ForkComposer};
pub use lifecycle::ChannelLifecycleManager;
