use std::fmt::{self, Display, Formatter};

use serde::Serialize;

/// Kind of a configured resource or endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum ResourceKind {
    NetworkInterface,
    ReservedIp,
    ExternalCidr,
    Vsi,
    Subnet,
    Vpc,
    SecurityGroup,
    NetworkAcl,
    PublicGateway,
    FloatingIp,
    TransitGateway,
    LoadBalancer,
}

impl ResourceKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::NetworkInterface => "network-interface",
            Self::ReservedIp => "reserved-ip",
            Self::ExternalCidr => "external-cidr",
            Self::Vsi => "vsi",
            Self::Subnet => "subnet",
            Self::Vpc => "vpc",
            Self::SecurityGroup => "security-group",
            Self::NetworkAcl => "network-acl",
            Self::PublicGateway => "public-gateway",
            Self::FloatingIp => "floating-ip",
            Self::TransitGateway => "transit-gateway",
            Self::LoadBalancer => "load-balancer",
        }
    }
}

impl Display for ResourceKind {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Identity carried by every configured resource.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub struct ResourceInfo {
    pub uid: String,
    pub name: String,
    pub kind: ResourceKind,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub vpc: Option<String>,
}

impl ResourceInfo {
    pub fn new(uid: impl Into<String>, name: impl Into<String>, kind: ResourceKind) -> Self {
        Self {
            uid: uid.into(),
            name: name.into(),
            kind,
            vpc: None,
        }
    }

    /// Set the owning VPC UID.
    pub fn in_vpc(mut self, vpc: impl Into<String>) -> Self {
        self.vpc = Some(vpc.into());
        self
    }
}

/// Name/UID capability shared by all resources.
pub trait NamedResource {
    fn info(&self) -> &ResourceInfo;

    fn uid(&self) -> &str {
        &self.info().uid
    }

    fn name(&self) -> &str {
        &self.info().name
    }

    fn kind(&self) -> ResourceKind {
        self.info().kind
    }

    fn vpc(&self) -> Option<&str> {
        self.info().vpc.as_deref()
    }
}

impl NamedResource for ResourceInfo {
    fn info(&self) -> &ResourceInfo {
        self
    }
}
