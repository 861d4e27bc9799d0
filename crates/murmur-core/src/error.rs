//! # error 模块说明
//!
//! ## 角色定位（Why）
//! - 为协议栈组合层集中定义全部错误语义：解析/装配期错误同步返回调用方、
//!   中止本次请求；连接期错误先自动清理再上抛；拆卸期错误只记日志不上抛；
//! - 校验错误采用“先收集后汇报”：一次性列出全部违例，而非在首个违例处
//!   快速失败，方便管理员一次修正到位。
//!
//! ## 设计要求（What）
//! - 所有错误类型实现 `thiserror::Error`，兼容 `std::error::Error` 生态；
//! - 驱动侧错误（[`DriverError`]）携带 `<域>.<语义>` 形式的稳定错误码，
//!   供日志、指标与告警系统做机读分类；
//! - “未知覆盖属性”刻意不设错误值：它是 `warn!` 级日志事件（宽松兼容
//!   行为），绝不会让解析或建造失败。
//!
//! ## 扩展建议（How）
//! - 新增违例种类时同步扩展 [`StackViolation`]，保持 Display 文本可直接
//!   反馈给管理员（指明哪个协议、违反哪条约束）。

use std::borrow::Cow;
use std::fmt;

use thiserror::Error;

/// 驱动错误码命名空间，`<域>.<语义>` 形式的稳定字符串。
pub mod codes {
    /// 构建单个协议实例失败。
    pub const BUILD: &str = "driver.build";
    /// 串联流水线失败。
    pub const ASSEMBLE: &str = "driver.assemble";
    /// 加入集群失败。
    pub const CONNECT: &str = "driver.connect";
    /// 退出集群失败（仅记日志，永不上抛至调用方）。
    pub const DISCONNECT: &str = "driver.disconnect";
    /// 分叉复用层的注册/注销失败。
    pub const MUX: &str = "driver.mux";
}

/// 外部组通信库上抛的驱动错误。
///
/// # 教案式注释
/// - **意图 (Why)**：把库侧异构失败合流为“稳定错误码 + 人读消息 +
///   可选根因”的统一形态，便于上层包装与观测系统分类；
/// - **契约 (What)**：
///   - `code`：来自 [`codes`] 模块的 `'static` 字符串，承载稳定语义；
///   - `message`：面向排障人员的描述，不应包含敏感信息；
///   - `cause`：可选底层根因，经 `source()` 暴露完整链路；
/// - **风险 (Trade-offs)**：消息用 `Cow` 保存，静态文案零分配，动态
///   文案付出一次堆分配换取灵活性。
#[derive(Debug)]
pub struct DriverError {
    code: &'static str,
    message: Cow<'static, str>,
    cause: Option<Box<dyn std::error::Error + Send + Sync>>,
}

impl DriverError {
    /// 构造驱动错误。
    pub fn new(code: &'static str, message: impl Into<Cow<'static, str>>) -> Self {
        Self {
            code,
            message: message.into(),
            cause: None,
        }
    }

    /// 附带底层根因并返回新错误。
    pub fn with_cause(mut self, cause: impl std::error::Error + Send + Sync + 'static) -> Self {
        self.cause = Some(Box::new(cause));
        self
    }

    /// 稳定错误码。
    pub fn code(&self) -> &'static str {
        self.code
    }

    /// 人读消息。
    pub fn message(&self) -> &str {
        &self.message
    }
}

impl fmt::Display for DriverError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}", self.code, self.message)
    }
}

impl std::error::Error for DriverError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        self.cause
            .as_deref()
            .map(|cause| cause as &(dyn std::error::Error + 'static))
    }
}

/// 协议栈装配期的单条校验违例。
///
/// # 教案式注释
/// - **意图 (Why)**：违例必须指明“哪个协议、违反哪条约束”，供管理员
///   按条修正，因此每个变体都携带定位上下文；
/// - **契约 (What)**：违例自身实现 `Display`，文本可直接进入管理层的
///   失败描述；装配器汇总为 [`StackError::Validation`] 后一次性上抛；
/// - **风险 (Trade-offs)**：违例集合是封闭枚举，新增校验规则需要同步
///   增加变体与装配器逻辑。
#[derive(Clone, Debug, Eq, PartialEq, Error)]
pub enum StackViolation {
    /// 协议栈缺少传输层。
    #[error("no transport defined")]
    TransportNotDefined,

    /// 协议序列中混入了第二个传输层角色。
    #[error("protocol `{protocol}` is a second transport; exactly one transport is allowed")]
    DuplicateTransport { protocol: String },

    /// 协议序列为空。
    #[error("protocol list is empty")]
    NoProtocols,

    /// 协议名在栈内重复。
    #[error("protocol `{protocol}` is declared more than once")]
    DuplicateProtocol { protocol: String },

    /// 中继的本地站点名为空。
    #[error("relay site name must not be empty")]
    RelaySiteEmpty,

    /// 中继的远端站点名重复。
    #[error("remote site `{site}` is declared more than once")]
    DuplicateRemoteSite { site: String },

    /// 远端站点引用的通道无法解析。
    #[error("remote site `{site}` references unresolvable channel `{channel}`")]
    UnresolvableRemoteChannel { site: String, channel: String },
}

fn render_violations(violations: &[StackViolation]) -> String {
    violations
        .iter()
        .map(StackViolation::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}

/// 解析与装配期错误域。
///
/// # 教案式注释
/// - **意图 (Why)**：解析期错误同步中止请求，绝不返回部分构造的规格或
///   配置，调用方可放心地把 `Err` 当作“什么都没发生”；
/// - **契约 (What)**：
///   - [`ProtocolNotFound`](StackError::ProtocolNotFound)：注册表中找不到
///     指定模块下的协议模型；
///   - [`Validation`](StackError::Validation)：装配校验失败，`violations`
///     完整列出全部违例（先收集后汇报）；
/// - **风险 (Trade-offs)**：违例渲染拼接为单行文本，条目极多时日志行
///   偏长，换取管理端一次展示全部问题。
#[derive(Debug, Error)]
pub enum StackError {
    /// 指定模块下不存在该协议类型。
    #[error("protocol `{protocol}` not found in module `{module}`")]
    ProtocolNotFound { module: String, protocol: String },

    /// 装配校验失败，携带全部违例。
    #[error("stack `{stack}` failed validation: {}", render_violations(.violations))]
    Validation {
        stack: String,
        violations: Vec<StackViolation>,
    },
}

impl StackError {
    /// 校验违例列表；非 `Validation` 变体返回空切片。
    pub fn violations(&self) -> &[StackViolation] {
        match self {
            StackError::Validation { violations, .. } => violations,
            _ => &[],
        }
    }
}

/// 通道创建所需、却未被宿主层解析的套接字绑定。
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct MissingBinding {
    /// 要求该绑定的协议名。
    pub protocol: String,
    /// 未解析的绑定名。
    pub binding: String,
}

impl fmt::Display for MissingBinding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} -> {}", self.protocol, self.binding)
    }
}

fn render_missing(missing: &[MissingBinding]) -> String {
    missing
        .iter()
        .map(MissingBinding::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}

/// 通道运行时错误域。
///
/// # 教案式注释
/// - **意图 (Why)**：聚合建造、连接与分叉路径上的全部失败形态，并让
///   每个变体携带通道名等定位上下文；
/// - **契约 (What)**：
///   - 所有变体满足 `Send + Sync + 'static`，可安全跨线程传播；
///   - [`Connect`](ChannelError::Connect) 保证在上抛前通道已被关闭，
///     不存在“半启动泄漏”；
///   - 拆卸路径（disconnect/close）不产生错误值：库侧失败一律降级为
///     `warn!` 日志，保证关停流程总能走完；
/// - **风险 (Trade-offs)**：上下文采用 `String`，以少量堆分配换取
///   诊断文本的完整性。
#[derive(Debug, Error)]
pub enum ChannelError {
    /// 创建通道时存在未解析的套接字绑定（全部列出）。
    #[error("channel `{channel}` requires unresolved socket bindings: {}", render_missing(.missing))]
    MissingBinding {
        channel: String,
        missing: Vec<MissingBinding>,
    },

    /// 加入集群失败；通道已被自动关闭以避免资源泄漏。
    #[error("channel `{channel}` failed to connect to cluster `{cluster}`")]
    Connect {
        channel: String,
        cluster: String,
        #[source]
        source: DriverError,
    },

    /// 对已关闭（终态）通道执行生命周期操作。
    #[error("channel `{channel}` is closed")]
    Closed { channel: String },

    /// 要求已连接父通道的操作（如派生分叉）遇到未连接通道。
    #[error("channel `{channel}` is not connected")]
    NotConnected { channel: String },

    /// 同名通道已在生命周期管理器中登记。
    #[error("channel `{channel}` is already registered")]
    AlreadyRegistered { channel: String },

    /// 生命周期管理器中不存在该通道。
    #[error("channel `{channel}` is not registered")]
    NotRegistered { channel: String },

    /// 父通道流水线缺少分叉复用层，无法派生子通道。
    #[error("channel `{channel}` has no fork multiplexing layer")]
    ForkUnsupported { channel: String },

    /// 分叉名已在父通道的复用层登记。
    #[error("fork `{fork}` is already registered on channel `{channel}`")]
    ForkAlreadyRegistered { channel: String, fork: String },

    /// 其余驱动侧失败的直接透传。
    #[error("group communication driver failure")]
    Driver(#[from] DriverError),
}
