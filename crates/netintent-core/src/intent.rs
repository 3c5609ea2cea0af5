//! The immutable intent model.
//!
//! An [`Intent`] is a declarative statement of desired connectivity. User
//! intents (point-to-point, multi-point-to-single-point, host-to-host) are
//! refined by compilation into installable intents (paths, link collections,
//! flow rules) that name the concrete network resources they need.
//!
//! Intents are values: every field participates in equality, hashing and
//! display, so two equal intents always hash and print identically.

use std::collections::BTreeSet;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::ids::{ApplicationId, IntentId, Key};

/// Default priority assigned to intents that do not set one.
pub const DEFAULT_PRIORITY: u32 = 100;

/// Identifier of a network device, e.g. `of:0000000000000001`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct DeviceId(String);

impl DeviceId {
    /// Create a device identifier.
    #[must_use]
    pub fn new(uri: impl Into<String>) -> Self {
        Self(uri.into())
    }

    /// The device URI.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for DeviceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Identifier of an end host, usually `MAC/VLAN`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct HostId(String);

impl HostId {
    /// Create a host identifier.
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }
}

impl fmt::Display for HostId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A port on a device.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ConnectPoint {
    /// Device owning the port.
    pub device: DeviceId,
    /// Port number on that device.
    pub port: u64,
}

impl ConnectPoint {
    /// Create a connect point.
    #[must_use]
    pub fn new(device: impl Into<String>, port: u64) -> Self {
        Self {
            device: DeviceId::new(device),
            port,
        }
    }
}

impl fmt::Display for ConnectPoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.device, self.port)
    }
}

/// A unidirectional infrastructure link between two connect points.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Link {
    /// Source end.
    pub src: ConnectPoint,
    /// Destination end.
    pub dst: ConnectPoint,
}

impl Link {
    /// Create a link.
    #[must_use]
    pub const fn new(src: ConnectPoint, dst: ConnectPoint) -> Self {
        Self { src, dst }
    }
}

impl fmt::Display for Link {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}->{}", self.src, self.dst)
    }
}

/// A single packet-header match criterion.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Criterion {
    /// Ingress port.
    InPort(u64),
    /// Ethernet type.
    EthType(u16),
    /// Source MAC address.
    EthSrc(String),
    /// Destination MAC address.
    EthDst(String),
    /// VLAN id.
    VlanId(u16),
    /// IP protocol number.
    IpProto(u8),
    /// Source IPv4 prefix.
    Ipv4Src(String),
    /// Destination IPv4 prefix.
    Ipv4Dst(String),
    /// TCP source port.
    TcpSrc(u16),
    /// TCP destination port.
    TcpDst(u16),
}

/// The match criteria of an intent. Criteria are kept ordered so that equal
/// selectors compare, hash and print the same regardless of insertion order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TrafficSelector {
    criteria: BTreeSet<Criterion>,
}

impl TrafficSelector {
    /// A selector matching all traffic.
    #[must_use]
    pub fn any() -> Self {
        Self::default()
    }

    /// Add a criterion.
    #[must_use]
    pub fn matching(mut self, criterion: Criterion) -> Self {
        self.criteria.insert(criterion);
        self
    }

    /// Iterate the criteria in canonical order.
    pub fn criteria(&self) -> impl Iterator<Item = &Criterion> {
        self.criteria.iter()
    }

    /// True if the selector matches all traffic.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.criteria.is_empty()
    }
}

/// A single forwarding action.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Instruction {
    /// Emit on a port.
    Output(u64),
    /// Push or rewrite a VLAN tag.
    SetVlan(u16),
    /// Pop the outer VLAN tag.
    PopVlan,
    /// Rewrite the destination MAC.
    SetEthDst(String),
    /// Drop the packet.
    Drop,
}

/// The ordered action set of an intent.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TrafficTreatment {
    instructions: Vec<Instruction>,
}

impl TrafficTreatment {
    /// An empty treatment (forward unmodified).
    #[must_use]
    pub fn empty() -> Self {
        Self::default()
    }

    /// Append an instruction.
    #[must_use]
    pub fn then(mut self, instruction: Instruction) -> Self {
        self.instructions.push(instruction);
        self
    }

    /// The instructions in execution order.
    #[must_use]
    pub fn instructions(&self) -> &[Instruction] {
        &self.instructions
    }
}

/// A device-level rule carried by a [`IntentKind::FlowRules`] installable.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct FlowRule {
    /// Device the rule is programmed on.
    pub device: DeviceId,
    /// Rule priority.
    pub priority: u32,
    /// Packet match.
    pub selector: TrafficSelector,
    /// Actions.
    pub treatment: TrafficTreatment,
}

/// A network resource an installable intent depends on.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NetworkResource {
    /// An infrastructure link.
    Link(Link),
    /// A device whose tables are programmed.
    Device(DeviceId),
}

/// The shape of an intent.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum IntentKind {
    /// Connectivity from one ingress to one egress point.
    PointToPoint {
        /// Ingress point.
        ingress: ConnectPoint,
        /// Egress point.
        egress: ConnectPoint,
    },
    /// Connectivity from several ingress points to one egress point.
    MultiPointToSinglePoint {
        /// Ingress points.
        ingress: BTreeSet<ConnectPoint>,
        /// Egress point.
        egress: ConnectPoint,
    },
    /// Bidirectional connectivity between two hosts.
    HostToHost {
        /// First host.
        one: HostId,
        /// Second host.
        two: HostId,
    },
    /// Installable: traffic follows an explicit path.
    Path {
        /// Links in path order.
        links: Vec<Link>,
    },
    /// Installable: traffic is forwarded over a set of links.
    LinkCollection {
        /// Links in the collection.
        links: BTreeSet<Link>,
        /// Ingress points.
        ingress: BTreeSet<ConnectPoint>,
        /// Egress points.
        egress: BTreeSet<ConnectPoint>,
    },
    /// Installable: explicit per-device rules.
    FlowRules {
        /// Rules to program.
        rules: Vec<FlowRule>,
    },
}

impl IntentKind {
    /// Short name of the shape, used as the compiler registry key.
    #[must_use]
    pub const fn name(&self) -> &'static str {
        match self {
            Self::PointToPoint { .. } => "point_to_point",
            Self::MultiPointToSinglePoint { .. } => "multi_point_to_single_point",
            Self::HostToHost { .. } => "host_to_host",
            Self::Path { .. } => "path",
            Self::LinkCollection { .. } => "link_collection",
            Self::FlowRules { .. } => "flow_rules",
        }
    }

    /// True for shapes that can be programmed on devices without further
    /// compilation.
    #[must_use]
    pub const fn is_installable(&self) -> bool {
        matches!(
            self,
            Self::Path { .. } | Self::LinkCollection { .. } | Self::FlowRules { .. }
        )
    }
}

/// A declarative, immutable connectivity policy.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Intent {
    id: IntentId,
    key: Key,
    app_id: ApplicationId,
    priority: u32,
    selector: TrafficSelector,
    treatment: TrafficTreatment,
    kind: IntentKind,
}

impl Intent {
    /// Create an intent with a fresh id, default priority, a match-all
    /// selector and an empty treatment.
    #[must_use]
    pub fn new(app_id: ApplicationId, key: Key, kind: IntentKind) -> Self {
        Self {
            id: IntentId::generate(),
            key,
            app_id,
            priority: DEFAULT_PRIORITY,
            selector: TrafficSelector::any(),
            treatment: TrafficTreatment::empty(),
            kind,
        }
    }

    /// Set the priority.
    #[must_use]
    pub const fn with_priority(mut self, priority: u32) -> Self {
        self.priority = priority;
        self
    }

    /// Set the match criteria.
    #[must_use]
    pub fn with_selector(mut self, selector: TrafficSelector) -> Self {
        self.selector = selector;
        self
    }

    /// Set the action set.
    #[must_use]
    pub fn with_treatment(mut self, treatment: TrafficTreatment) -> Self {
        self.treatment = treatment;
        self
    }

    /// Build a derived intent of another shape for the same owner and key,
    /// as compilers do when refining a parent intent.
    #[must_use]
    pub fn derive(&self, kind: IntentKind) -> Self {
        Self {
            id: IntentId::generate(),
            key: self.key,
            app_id: self.app_id.clone(),
            priority: self.priority,
            selector: self.selector.clone(),
            treatment: self.treatment.clone(),
            kind,
        }
    }

    /// Globally unique id.
    #[must_use]
    pub const fn id(&self) -> IntentId {
        self.id
    }

    /// Application-scoped key.
    #[must_use]
    pub const fn key(&self) -> Key {
        self.key
    }

    /// Owning application.
    #[must_use]
    pub const fn app_id(&self) -> &ApplicationId {
        &self.app_id
    }

    /// Priority.
    #[must_use]
    pub const fn priority(&self) -> u32 {
        self.priority
    }

    /// Match criteria.
    #[must_use]
    pub const fn selector(&self) -> &TrafficSelector {
        &self.selector
    }

    /// Action set.
    #[must_use]
    pub const fn treatment(&self) -> &TrafficTreatment {
        &self.treatment
    }

    /// Shape.
    #[must_use]
    pub const fn kind(&self) -> &IntentKind {
        &self.kind
    }

    /// True if this intent is a compiled, device-programmable refinement.
    #[must_use]
    pub const fn is_installable(&self) -> bool {
        self.kind.is_installable()
    }

    /// Network resources this intent requires. Only installable intents
    /// name resources; user intents return an empty set.
    #[must_use]
    pub fn resources(&self) -> BTreeSet<NetworkResource> {
        match &self.kind {
            IntentKind::Path { links } => {
                links.iter().cloned().map(NetworkResource::Link).collect()
            }
            IntentKind::LinkCollection { links, .. } => {
                links.iter().cloned().map(NetworkResource::Link).collect()
            }
            IntentKind::FlowRules { rules } => rules
                .iter()
                .map(|rule| NetworkResource::Device(rule.device.clone()))
                .collect(),
            IntentKind::PointToPoint { .. }
            | IntentKind::MultiPointToSinglePoint { .. }
            | IntentKind::HostToHost { .. } => BTreeSet::new(),
        }
    }
}

impl fmt::Display for Intent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}{{id={}, key={}, app={}, priority={}}}",
            self.kind.name(),
            self.id,
            self.key,
            self.app_id,
            self.priority
        )
    }
}
