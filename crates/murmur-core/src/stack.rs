//! # 协议栈配置模型
//!
//! ## 核心意图（Why）
//! - 把“传输层 + 有序协议序列 + 可选站点中继”的装配结果定格为一份
//!   不可变配置值，作为所有通道实例共享的唯一事实来源；
//! - 顺序即语义：`protocols` 的次序就是线缆级流水线次序，本模块的任何
//!   接口都不得重排、去重或排序。
//!
//! ## 生命周期（What）
//! - 每次管理层“添加协议栈”操作装配一份；此后只读；
//! - 任何结构性变更都重建新值并携带递增的 generation，依赖旧代的
//!   通道需要重启才能吸收变更。

use std::collections::BTreeMap;
use std::sync::Arc;

use crate::spec::ProtocolSpec;

/// 传输层拓扑元数据（站点 / 机架 / 机器）。
///
/// - **意图 (Why)**：组通信库可据此做机架感知的副本摆放；
/// - **契约 (What)**：三个字段均可选，缺省表示宿主未声明拓扑；
/// - **落地方式 (How)**：由属性变换流水线折算成传输层协议属性
///   （`site_id` / `rack_id` / `machine_id`）。
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct Topology {
    pub site: Option<String>,
    pub rack: Option<String>,
    pub machine: Option<String>,
}

impl Topology {
    /// 是否未携带任何拓扑信息。
    pub fn is_empty(&self) -> bool {
        self.site.is_none() && self.rack.is_none() && self.machine.is_none()
    }
}

/// 站点中继引用的远端站点。
///
/// # 教案式注释
/// - **意图 (Why)**：中继层需要知道每个远端站点经由哪条本地通道桥接；
/// - **契约 (What)**：`channel` 为通道工厂引用名，装配时必须能在
///   [`ChannelCatalog`] 中命中，否则列入校验违例；
/// - **风险 (Trade-offs)**：这里只保存名字引用，不持有通道本体，
///   依赖注入顺序由宿主层的服务依赖声明保证。
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct RemoteSite {
    name: Arc<str>,
    cluster_name: String,
    channel: String,
}

impl RemoteSite {
    /// 构造远端站点引用。
    pub fn new(
        name: impl Into<Arc<str>>,
        cluster_name: impl Into<String>,
        channel: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            cluster_name: cluster_name.into(),
            channel: channel.into(),
        }
    }

    /// 远端站点名。
    pub fn name(&self) -> &str {
        &self.name
    }

    /// 远端站点加入的集群名。
    pub fn cluster_name(&self) -> &str {
        &self.cluster_name
    }

    /// 桥接该站点所用的本地通道工厂引用名。
    pub fn channel(&self) -> &str {
        &self.channel
    }
}

/// 站点中继配置。
///
/// - **契约 (What)**：`site` 不得为空串；`remote_sites` 中站点名必须互不
///   重复，二者均由装配器以“先收集后汇报”的方式校验；
/// - **风险 (Trade-offs)**：中继属性与普通协议属性同样宽松，未知键只
///   告警不拒绝。
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct RelaySpec {
    site: String,
    properties: BTreeMap<String, String>,
    remote_sites: Vec<RemoteSite>,
}

impl RelaySpec {
    /// 构造中继配置。
    pub fn new(
        site: impl Into<String>,
        properties: BTreeMap<String, String>,
        remote_sites: Vec<RemoteSite>,
    ) -> Self {
        Self {
            site: site.into(),
            properties,
            remote_sites,
        }
    }

    /// 本地站点名。
    pub fn site(&self) -> &str {
        &self.site
    }

    /// 中继层协议属性。
    pub fn properties(&self) -> &BTreeMap<String, String> {
        &self.properties
    }

    /// 远端站点列表（声明顺序）。
    pub fn remote_sites(&self) -> &[RemoteSite] {
        &self.remote_sites
    }
}

/// 通道目录：装配器校验远端站点通道引用可解析性所用的查询契约。
///
/// # 教案式注释
/// - **意图 (Why)**：取代隐式全局注册状态，目录由宿主层在进程初始化时
///   填充后注入装配器（显式依赖，可测试）；
/// - **契约 (What)**：`contains` 返回指定通道工厂名当前是否已登记；
///   实现必须可跨线程共享；
/// - **风险 (Trade-offs)**：目录反映装配时刻的快照，装配之后新增或移除
///   通道不会回溯已生成的配置。
pub trait ChannelCatalog: Send + Sync + std::fmt::Debug {
    /// 查询通道工厂引用名是否可解析。
    fn contains(&self, channel: &str) -> bool;
}

impl ChannelCatalog for std::collections::BTreeSet<String> {
    fn contains(&self, channel: &str) -> bool {
        std::collections::BTreeSet::contains(self, channel)
    }
}

/// 一份装配完成、只读共享的协议栈配置。
///
/// # 教案式注释
/// - **意图 (Why)**：通道工厂据此按序构建运行时流水线；多个通道共享同
///   一份配置时除本结构外不共享任何可变状态；
/// - **契约 (What)**：
///   - 不变量：恰好一个传输层；`protocols` 中协议名互不重复；中继
///     （若存在）站点名非空、远端站点互不重复且通道引用可解析——以上
///     全部由装配器在构造前保证，本结构不再复核；
///   - `generation` 单调递增，用于区分结构性重建前后的配置代际；
/// - **风险 (Trade-offs)**：字段全部私有、仅暴露只读访问器，防止任何
///   绕过装配校验的就地修改。
#[derive(Clone, Debug)]
pub struct StackConfiguration {
    name: Arc<str>,
    generation: u64,
    transport: ProtocolSpec,
    protocols: Vec<ProtocolSpec>,
    relay: Option<RelaySpec>,
    statistics_enabled: bool,
    topology: Option<Topology>,
}

impl StackConfiguration {
    /// 由装配器在全部校验通过后构造（唯一入口）。
    pub fn assembled(
        name: impl Into<Arc<str>>,
        generation: u64,
        transport: ProtocolSpec,
        protocols: Vec<ProtocolSpec>,
        relay: Option<RelaySpec>,
        statistics_enabled: bool,
        topology: Option<Topology>,
    ) -> Self {
        Self {
            name: name.into(),
            generation,
            transport,
            protocols,
            relay,
            statistics_enabled,
            topology,
        }
    }

    /// 协议栈名。
    pub fn name(&self) -> &str {
        &self.name
    }

    /// 配置代际（结构性重建时递增）。
    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// 传输层规格（流水线最底层）。
    pub fn transport(&self) -> &ProtocolSpec {
        &self.transport
    }

    /// 有序协议序列；次序与声明次序逐位相同。
    pub fn protocols(&self) -> &[ProtocolSpec] {
        &self.protocols
    }

    /// 可选的站点中继配置。
    pub fn relay(&self) -> Option<&RelaySpec> {
        self.relay.as_ref()
    }

    /// 协议栈级统计默认开关。
    pub fn statistics_enabled(&self) -> bool {
        self.statistics_enabled
    }

    /// 传输层拓扑元数据。
    pub fn topology(&self) -> Option<&Topology> {
        self.topology.as_ref()
    }

    /// 按流水线次序迭代全部规格：传输层在前，随后为声明顺序的协议。
    pub fn pipeline_order(&self) -> impl Iterator<Item = &ProtocolSpec> {
        std::iter::once(&self.transport).chain(self.protocols.iter())
    }
}
