//! # 驱动契约：对外部组通信库的消费接口
//!
//! ## 核心意图（Why）
//! - 本层只“配置”组通信，不重写它：可靠组播、故障检测、视图同步等全部
//!   留在外部库内。这里定义的 trait 就是本层对该库的全部认知面；
//! - 属性注入走显式的类型化契约（[`ProtocolHandle::set_property`]），
//!   而非反射式字段注入：每个协议实现自行声明它认识哪些属性键。
//!
//! ## 行为契约（What）
//! - [`ProtocolBuilder::build_protocol`]：按规格构建一个流水线阶段；
//! - [`GroupDriver::assemble_pipeline`]：把有序阶段串成线性流水线并返回
//!   原始通道句柄（传输层位于最底层）；
//! - [`RawChannel`]：connect / disconnect / close 三个生命周期操作，加上
//!   在流水线中定位分叉复用层的 `find_fork_layer`；
//! - [`ForkLayer`]：分叉子流水线的注册与注销。
//!
//! ## 并发与阻塞模型（Trade-offs）
//! - 全部接口为同步签名：`connect` 可能阻塞调用线程直至入群完成或库侧
//!   超时，本层不建模取消令牌，也不额外施加超时；
//! - `RawChannel` 不要求并发安全：同一通道的生命周期迁移由上层按通道名
//!   串行化，契约见 `murmur-channel` 的生命周期管理器。

use thiserror::Error;

use crate::error::DriverError;
use crate::spec::ProtocolSpec;

/// 属性注入失败的形态。
///
/// - **契约 (What)**：`Unknown` 表示协议实现不认识该属性键。按宽松兼容
///   设计，调用方应将其降级为 `warn!` 日志并继续，绝不中断建造。
#[derive(Clone, Debug, Eq, PartialEq, Error)]
pub enum PropertyError {
    /// 协议实现没有同名字段/设置器。
    #[error("protocol `{protocol}` has no property `{key}`")]
    Unknown { protocol: String, key: String },
}

/// 单个运行时协议实例的句柄（一个流水线阶段）。
///
/// # 教案式注释
/// - **意图 (Why)**：在不依赖具体库类型的前提下完成属性注入与统计开关
///   设置，建造期结束后句柄即交由流水线持有；
/// - **契约 (What)**：
///   - `set_property`：类型化属性注入，未知键返回
///     [`PropertyError::Unknown`]（调用方宽松处理）；
///   - `enable_statistics`：设置该阶段的统计采集开关；
/// - **风险 (Trade-offs)**：属性值统一为字符串，解析语义由协议实现
///   自行负责。
pub trait ProtocolHandle: Send {
    /// 协议名（与规格中的 `name` 一致）。
    fn name(&self) -> &str;

    /// 注入一条属性；未知键返回 [`PropertyError::Unknown`]。
    fn set_property(&mut self, key: &str, value: &str) -> Result<(), PropertyError>;

    /// 设置统计采集开关。
    fn enable_statistics(&mut self, enabled: bool);
}

/// 按规格构建单个流水线阶段的能力。
pub trait ProtocolBuilder: Send + Sync {
    /// 构建一个协议实例；规格在实例建成后即可丢弃。
    fn build_protocol(&self, spec: &ProtocolSpec) -> Result<Box<dyn ProtocolHandle>, DriverError>;
}

/// 外部组通信库的完整消费契约。
///
/// # 教案式注释
/// - **意图 (Why)**：通道工厂只通过本 trait 与库交互，测试时可用
///   [`test_stubs`](crate::test_stubs) 中的内存桩整体替换；
/// - **契约 (What)**：`assemble_pipeline` 接收的阶段顺序即流水线顺序
///   （下标 0 为传输层），实现不得重排；
/// - **风险 (Trade-offs)**：返回 `Box<dyn RawChannel>` 牺牲一次动态分发，
///   换取对库内部类型的完全隔离。
pub trait GroupDriver: ProtocolBuilder + std::fmt::Debug {
    /// 把有序阶段串成线性流水线，返回未连接的原始通道。
    fn assemble_pipeline(
        &self,
        stages: Vec<Box<dyn ProtocolHandle>>,
    ) -> Result<Box<dyn RawChannel>, DriverError>;
}

/// 组通信库暴露的原始通道句柄。
///
/// # 教案式注释
/// - **意图 (Why)**：承载真正的入群/退群/关闭动作，并允许上层在流水线
///   中定位分叉复用层；
/// - **契约 (What)**：
///   - `connect`：阻塞直至入群完成或库侧超时；失败后由上层负责 `close`；
///   - `disconnect`：尽力而为；失败只应被记日志，上层仍会继续迁移状态；
///   - `close`：无条件且幂等，重复调用无害；
///   - `find_fork_layer`：流水线含分叉复用层时返回其可变引用；
/// - **风险 (Trade-offs)**：句柄不承诺并发安全，生命周期操作必须由
///   持有者串行化。
pub trait RawChannel: Send {
    /// 加入指定集群；阻塞调用线程直至完成或超时。
    fn connect(&mut self, cluster: &str) -> Result<(), DriverError>;

    /// 退出集群；尽力而为。
    fn disconnect(&mut self) -> Result<(), DriverError>;

    /// 关闭并释放资源；无条件、幂等。
    fn close(&mut self);

    /// 在流水线中定位分叉复用层。
    fn find_fork_layer(&mut self) -> Option<&mut dyn ForkLayer>;
}

/// 分叉复用层：在共享传输上挂载/摘除派生子流水线。
///
/// # 教案式注释
/// - **意图 (Why)**：分叉通道复用父通道的传输层，只叠加自己的额外
///   协议；复用层按分叉名路由消息到对应子流水线；
/// - **契约 (What)**：
///   - `register_fork`：同名分叉重复注册应失败（[`DriverError`]，
///     错误码 `driver.mux`）；
///   - `unregister_fork`：返回是否确有摘除；对未知分叉名返回 `false`；
///   - `fork_names`：当前在册分叉名快照，供拆卸次序告警使用；
/// - **风险 (Trade-offs)**：摘除分叉永不触碰父通道本体，父通道的
///   disconnect/close 是独立动作。
pub trait ForkLayer: Send {
    /// 以分叉名登记一条子流水线。
    fn register_fork(
        &mut self,
        fork_name: &str,
        stages: Vec<Box<dyn ProtocolHandle>>,
    ) -> Result<(), DriverError>;

    /// 摘除指定分叉的子流水线；返回是否确有摘除。
    fn unregister_fork(&mut self, fork_name: &str) -> bool;

    /// 当前在册的分叉名快照。
    fn fork_names(&self) -> Vec<String>;
}
