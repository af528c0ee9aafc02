//! Configuration documents.
//!
//! A document (JSON, or TOML by extension) lists VPCs, subnets, instances with
//! their interfaces, reserved IPs, filters and routers. Loading resolves every
//! cross-reference and produces one configuration per VPC plus one composite
//! configuration per transit gateway.
//!
//! ## Resolution
//!
//! - Security-group remotes naming a group resolve to the addresses of the
//!   interfaces the group is attached to.
//! - External endpoints are the disjoint partition of the public internet by
//!   the public parts of every block the VPC's rules reference.
//! - Floating IPs are registered before public gateways, so an interface with
//!   both reaches the internet through its floating IP.

use std::collections::{BTreeMap, BTreeSet};
use std::fs;
use std::net::Ipv4Addr;
use std::path::Path;

use log::{debug, info};
use netset_core::transport::{MAX_ICMP, MAX_PORT, MIN_ICMP, MIN_PORT};
use netset_core::{parse_range, IpBlock, Protocol, TransportSet};
use serde::Deserialize;
use thiserror::Error;

use crate::error::AnalysisError;
use crate::filters::{Action, Direction, Filter, NetworkAclLayer, Rule, SecurityGroupLayer};
use crate::model::{ConfigBuilder, MultiVpcConfig, NodeSetId, ResourceInfo, ResourceKind, VpcConfig};
use crate::routers::{FloatingIp, PublicGateway, TgwConnection, TransitGateway};

/// Errors returned when loading a configuration document.
#[derive(Debug, Error)]
pub enum LoadError {
    #[error("failed to read {path}: {source}")]
    Io {
        path: String,
        source: std::io::Error,
    },
    #[error("failed to parse {path}: {message}")]
    Parse { path: String, message: String },
    #[error("{0}")]
    Invalid(#[from] AnalysisError),
    #[error("unknown {kind} '{uid}' referenced by {by}")]
    Reference {
        kind: &'static str,
        uid: String,
        by: String,
    },
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ConfigDocument {
    #[serde(default)]
    pub vpcs: Vec<VpcDoc>,
    #[serde(default)]
    pub subnets: Vec<SubnetDoc>,
    #[serde(default)]
    pub instances: Vec<InstanceDoc>,
    #[serde(default)]
    pub reserved_ips: Vec<ReservedIpDoc>,
    #[serde(default)]
    pub security_groups: Vec<SecurityGroupDoc>,
    #[serde(default)]
    pub network_acls: Vec<NetworkAclDoc>,
    #[serde(default)]
    pub public_gateways: Vec<PublicGatewayDoc>,
    #[serde(default)]
    pub floating_ips: Vec<FloatingIpDoc>,
    #[serde(default)]
    pub transit_gateways: Vec<TransitGatewayDoc>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct VpcDoc {
    pub uid: String,
    pub name: String,
    #[serde(default)]
    pub address_prefixes: Vec<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SubnetDoc {
    pub uid: String,
    pub name: String,
    pub vpc: String,
    pub cidr: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct InstanceDoc {
    pub uid: String,
    pub name: String,
    #[serde(default)]
    pub interfaces: Vec<InterfaceDoc>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct InterfaceDoc {
    pub uid: String,
    pub name: String,
    pub subnet: String,
    pub address: Ipv4Addr,
    #[serde(default)]
    pub security_groups: Vec<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ReservedIpDoc {
    pub uid: String,
    pub name: String,
    pub subnet: String,
    pub address: Ipv4Addr,
    #[serde(default)]
    pub security_groups: Vec<String>,
}

/// Transport fields shared by every rule kind.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct TransportDoc {
    #[serde(default = "default_protocol")]
    pub protocol: String,
    pub src_ports: Option<String>,
    pub dst_ports: Option<String>,
    pub icmp_type: Option<String>,
    pub icmp_code: Option<String>,
}

fn default_protocol() -> String {
    "all".to_string()
}

#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum RemoteDoc {
    Cidr(String),
    SecurityGroup { security_group: String },
}

#[derive(Debug, Clone, Deserialize)]
pub struct SecurityGroupRuleDoc {
    pub direction: Direction,
    pub remote: RemoteDoc,
    #[serde(flatten)]
    pub transport: TransportDoc,
    #[serde(default)]
    pub description: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SecurityGroupDoc {
    pub uid: String,
    pub name: String,
    pub vpc: String,
    #[serde(default)]
    pub rules: Vec<SecurityGroupRuleDoc>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AclRuleDoc {
    pub action: Action,
    pub direction: Direction,
    pub source: String,
    pub destination: String,
    #[serde(flatten)]
    pub transport: TransportDoc,
    #[serde(default)]
    pub description: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct NetworkAclDoc {
    pub uid: String,
    pub name: String,
    pub vpc: String,
    #[serde(default)]
    pub subnets: Vec<String>,
    #[serde(default)]
    pub rules: Vec<AclRuleDoc>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PublicGatewayDoc {
    pub uid: String,
    pub name: String,
    pub vpc: String,
    #[serde(default)]
    pub subnets: Vec<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct FloatingIpDoc {
    pub uid: String,
    pub name: String,
    pub address: Ipv4Addr,
    /// UID of the interface the address is bound to.
    pub target: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TgwConnectionDoc {
    pub vpc: String,
    /// Advertised prefixes; the VPC's address prefixes when absent.
    #[serde(default)]
    pub prefixes: Vec<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TransitGatewayDoc {
    pub uid: String,
    pub name: String,
    #[serde(default)]
    pub connections: Vec<TgwConnectionDoc>,
}

/// Build a transport set from a protocol name and optional ranges.
///
/// `protocol` is `all`, `tcp`, `udp` or `icmp`; absent ranges mean the full
/// range.
pub fn parse_transport(
    protocol: &str,
    src_ports: Option<&str>,
    dst_ports: Option<&str>,
    icmp_type: Option<&str>,
    icmp_code: Option<&str>,
) -> Result<TransportSet, AnalysisError> {
    if protocol.trim().eq_ignore_ascii_case("all") {
        return Ok(TransportSet::all());
    }
    let range = |value: Option<&str>, lo: u32, hi: u32| match value {
        Some(value) => parse_range(value),
        None => Ok(lo..=hi),
    };
    let protocol: Protocol = protocol.parse()?;
    let transport = match protocol {
        Protocol::Icmp => TransportSet::icmp(
            range(icmp_type, MIN_ICMP, MAX_ICMP)?,
            range(icmp_code, MIN_ICMP, MAX_ICMP)?,
        )?,
        Protocol::Tcp | Protocol::Udp => TransportSet::tcp_udp(
            protocol,
            range(src_ports, MIN_PORT, MAX_PORT)?,
            range(dst_ports, MIN_PORT, MAX_PORT)?,
        )?,
    };
    Ok(transport)
}

impl TransportDoc {
    fn to_transport(&self) -> Result<TransportSet, AnalysisError> {
        parse_transport(
            &self.protocol,
            self.src_ports.as_deref(),
            self.dst_ports.as_deref(),
            self.icmp_type.as_deref(),
            self.icmp_code.as_deref(),
        )
    }
}

/// Read a document from disk; `.toml` files are TOML, anything else JSON.
pub fn read_document(path: &Path) -> Result<ConfigDocument, LoadError> {
    let raw = fs::read_to_string(path).map_err(|source| LoadError::Io {
        path: path.display().to_string(),
        source,
    })?;
    let is_toml = path
        .extension()
        .is_some_and(|ext| ext.eq_ignore_ascii_case("toml"));
    let parsed = if is_toml {
        toml::from_str(&raw).map_err(|e| e.to_string())
    } else {
        serde_json::from_str(&raw).map_err(|e| e.to_string())
    };
    parsed.map_err(|message| LoadError::Parse {
        path: path.display().to_string(),
        message,
    })
}

/// Load and build every configuration of the document at `path`.
pub fn load_config(path: &Path, public_internet: &IpBlock) -> Result<MultiVpcConfig, LoadError> {
    let doc = read_document(path)?;
    let configs = build_configs(&doc, public_internet)?;
    info!(
        "loaded {} configurations from {}",
        configs.configs.len(),
        path.display()
    );
    Ok(configs)
}

/// Build one configuration per VPC and one composite per transit gateway.
pub fn build_configs(
    doc: &ConfigDocument,
    public_internet: &IpBlock,
) -> Result<MultiVpcConfig, LoadError> {
    let index = DocIndex::new(doc)?;
    let mut multi = MultiVpcConfig::new();
    for vpc in &doc.vpcs {
        multi.insert(build_vpc(doc, &index, vpc, public_internet)?);
    }
    for tgw in &doc.transit_gateways {
        multi.insert(build_transit(doc, &index, tgw, public_internet)?);
    }
    Ok(multi)
}

/// Lookups shared by every configuration built from one document.
struct DocIndex<'a> {
    vpcs: BTreeMap<&'a str, &'a VpcDoc>,
    subnet_vpc: BTreeMap<&'a str, &'a str>,
    /// Security-group UID → addresses of the interfaces it is attached to.
    group_members: BTreeMap<&'a str, IpBlock>,
    /// Security-group UID → UIDs of the interfaces it is attached to.
    group_attached: BTreeMap<&'a str, Vec<String>>,
    interface_vpc: BTreeMap<&'a str, &'a str>,
}

impl<'a> DocIndex<'a> {
    fn new(doc: &'a ConfigDocument) -> Result<Self, LoadError> {
        let vpcs: BTreeMap<&str, &VpcDoc> = doc.vpcs.iter().map(|v| (v.uid.as_str(), v)).collect();
        let mut subnet_vpc = BTreeMap::new();
        for subnet in &doc.subnets {
            if !vpcs.contains_key(subnet.vpc.as_str()) {
                return Err(reference("vpc", &subnet.vpc, &subnet.uid));
            }
            subnet_vpc.insert(subnet.uid.as_str(), subnet.vpc.as_str());
        }

        let mut group_members: BTreeMap<&str, IpBlock> = BTreeMap::new();
        let mut group_attached: BTreeMap<&str, Vec<String>> = BTreeMap::new();
        let mut interface_vpc = BTreeMap::new();
        let attachments = doc
            .instances
            .iter()
            .flat_map(|i| i.interfaces.iter())
            .map(|n| (&n.uid, &n.subnet, n.address, &n.security_groups))
            .chain(
                doc.reserved_ips
                    .iter()
                    .map(|r| (&r.uid, &r.subnet, r.address, &r.security_groups)),
            );
        for (uid, subnet, address, groups) in attachments {
            let Some(vpc) = subnet_vpc.get(subnet.as_str()) else {
                return Err(reference("subnet", subnet, uid));
            };
            interface_vpc.insert(uid.as_str(), *vpc);
            for group in groups {
                let members = group_members.entry(group.as_str()).or_insert_with(IpBlock::empty);
                *members = members.union(&IpBlock::from_address(address));
                group_attached
                    .entry(group.as_str())
                    .or_default()
                    .push(uid.clone());
            }
        }
        Ok(Self {
            vpcs,
            subnet_vpc,
            group_members,
            group_attached,
            interface_vpc,
        })
    }

    fn vpc(&self, uid: &str, by: &str) -> Result<&'a VpcDoc, LoadError> {
        self.vpcs
            .get(uid)
            .copied()
            .ok_or_else(|| reference("vpc", uid, by))
    }
}

fn reference(kind: &'static str, uid: &str, by: &str) -> LoadError {
    LoadError::Reference {
        kind,
        uid: uid.to_string(),
        by: by.to_string(),
    }
}

fn address_prefixes(vpc: &VpcDoc) -> Result<IpBlock, AnalysisError> {
    Ok(IpBlock::from_cidr_list(&vpc.address_prefixes)?)
}

fn build_vpc(
    doc: &ConfigDocument,
    index: &DocIndex<'_>,
    vpc: &VpcDoc,
    public_internet: &IpBlock,
) -> Result<VpcConfig, LoadError> {
    let mut builder = ConfigBuilder::new(vpc.uid.clone(), vpc.name.clone(), public_internet.clone());
    let members = [vpc.uid.as_str()];
    let populated = populate(&mut builder, doc, index, &members)?;

    let mut referenced = vec![public_internet.clone()];
    referenced.extend(
        populated
            .referenced
            .iter()
            .map(|b| b.intersect(public_internet))
            .filter(|b| !b.is_empty()),
    );
    for piece in IpBlock::disjoint_partition(&referenced) {
        builder.add_external(piece);
    }

    for fip in &doc.floating_ips {
        if index.interface_vpc.get(fip.target.as_str()) == Some(&vpc.uid.as_str()) {
            builder.add_router(Box::new(FloatingIp::new(
                ResourceInfo::new(fip.uid.clone(), fip.name.clone(), ResourceKind::FloatingIp)
                    .in_vpc(vpc.uid.clone()),
                IpBlock::from_address(fip.address),
                fip.target.clone(),
            )));
        }
    }
    for pgw in doc.public_gateways.iter().filter(|p| p.vpc == vpc.uid) {
        builder.add_router(Box::new(PublicGateway::new(
            ResourceInfo::new(pgw.uid.clone(), pgw.name.clone(), ResourceKind::PublicGateway)
                .in_vpc(vpc.uid.clone()),
            pgw.subnets.clone(),
        )));
    }
    let config = builder.build();
    debug!(
        "{}: {} nodes, {} node sets, {} routers",
        vpc.name,
        config.nodes().len(),
        config.node_sets().len(),
        config.routers().len()
    );
    Ok(config)
}

fn build_transit(
    doc: &ConfigDocument,
    index: &DocIndex<'_>,
    tgw: &TransitGatewayDoc,
    public_internet: &IpBlock,
) -> Result<VpcConfig, LoadError> {
    let mut builder =
        ConfigBuilder::new(tgw.uid.clone(), tgw.name.clone(), public_internet.clone()).multi_vpc();
    let members: Vec<&str> = tgw.connections.iter().map(|c| c.vpc.as_str()).collect();
    populate(&mut builder, doc, index, &members)?;

    let mut connections = Vec::new();
    for connection in &tgw.connections {
        let vpc = index.vpc(&connection.vpc, &tgw.uid)?;
        let permitted = if connection.prefixes.is_empty() {
            address_prefixes(vpc)?
        } else {
            IpBlock::from_cidr_list(&connection.prefixes).map_err(AnalysisError::from)?
        };
        connections.push(TgwConnection {
            vpc: vpc.uid.clone(),
            permitted,
        });
    }
    builder.add_router(Box::new(TransitGateway::new(
        ResourceInfo::new(tgw.uid.clone(), tgw.name.clone(), ResourceKind::TransitGateway),
        connections,
    )));
    Ok(builder.build())
}

/// What populating a builder found along the way.
struct Populated {
    referenced: Vec<IpBlock>,
}

/// Add the VPCs in `vpcs` with their subnets, interfaces and filters.
fn populate(
    builder: &mut ConfigBuilder,
    doc: &ConfigDocument,
    index: &DocIndex<'_>,
    vpcs: &[&str],
) -> Result<Populated, LoadError> {
    let wanted: BTreeSet<&str> = vpcs.iter().copied().collect();
    for uid in vpcs {
        let vpc = index.vpc(uid, "configuration")?;
        builder.add_vpc(
            ResourceInfo::new(vpc.uid.clone(), vpc.name.clone(), ResourceKind::Vpc).in_vpc(vpc.uid.clone()),
            address_prefixes(vpc)?,
        );
    }

    let mut subnets: BTreeMap<&str, NodeSetId> = BTreeMap::new();
    for subnet in doc.subnets.iter().filter(|s| wanted.contains(s.vpc.as_str())) {
        let cidr = IpBlock::from_cidr(&subnet.cidr).map_err(AnalysisError::from)?;
        let id = builder.add_subnet(
            ResourceInfo::new(subnet.uid.clone(), subnet.name.clone(), ResourceKind::Subnet)
                .in_vpc(subnet.vpc.clone()),
            cidr,
        );
        subnets.insert(subnet.uid.as_str(), id);
    }

    for instance in &doc.instances {
        let interfaces: Vec<(&InterfaceDoc, NodeSetId)> = instance
            .interfaces
            .iter()
            .filter_map(|n| subnets.get(n.subnet.as_str()).map(|s| (n, *s)))
            .collect();
        let Some((first, _)) = interfaces.first() else {
            continue;
        };
        let vpc = index.subnet_vpc.get(first.subnet.as_str()).copied().unwrap_or_default();
        let vsi = builder.add_vsi(
            ResourceInfo::new(instance.uid.clone(), instance.name.clone(), ResourceKind::Vsi).in_vpc(vpc),
        );
        for (interface, subnet) in interfaces {
            builder.add_interface(
                ResourceInfo::new(
                    interface.uid.clone(),
                    interface.name.clone(),
                    ResourceKind::NetworkInterface,
                ),
                interface.address,
                subnet,
                Some(vsi),
            );
        }
    }
    for reserved in &doc.reserved_ips {
        if let Some(subnet) = subnets.get(reserved.subnet.as_str()) {
            builder.add_interface(
                ResourceInfo::new(reserved.uid.clone(), reserved.name.clone(), ResourceKind::ReservedIp),
                reserved.address,
                *subnet,
                None,
            );
        }
    }

    let mut referenced = Vec::new();
    let groups = security_groups(doc, index, &wanted)?;
    let acls = network_acls(doc, &wanted)?;
    for rule in groups.iter().chain(acls.iter()).flat_map(|f| f.rules.iter()) {
        referenced.push(rule.src.clone());
        referenced.push(rule.dst.clone());
    }
    builder.add_layer(Box::new(SecurityGroupLayer::new(groups)));
    builder.add_layer(Box::new(NetworkAclLayer::new(acls)));
    Ok(Populated { referenced })
}

fn security_groups(
    doc: &ConfigDocument,
    index: &DocIndex<'_>,
    wanted: &BTreeSet<&str>,
) -> Result<Vec<Filter>, LoadError> {
    let mut filters = Vec::new();
    for group in doc.security_groups.iter().filter(|g| wanted.contains(g.vpc.as_str())) {
        let filter_index = filters.len();
        let mut rules = Vec::with_capacity(group.rules.len());
        for (idx, rule) in group.rules.iter().enumerate() {
            let remote = match &rule.remote {
                RemoteDoc::Cidr(cidr) => IpBlock::from_ip_or_cidr(cidr).map_err(AnalysisError::from)?,
                RemoteDoc::SecurityGroup { security_group } => {
                    if !doc.security_groups.iter().any(|g| &g.uid == security_group) {
                        return Err(reference("security group", security_group, &group.uid));
                    }
                    index
                        .group_members
                        .get(security_group.as_str())
                        .cloned()
                        .unwrap_or_else(IpBlock::empty)
                }
            };
            let (src, dst) = match rule.direction {
                Direction::Ingress => (remote, IpBlock::all_ipv4()),
                Direction::Egress => (IpBlock::all_ipv4(), remote),
            };
            rules.push(Rule {
                filter_index,
                index: idx,
                direction: rule.direction,
                action: Action::Allow,
                src,
                dst,
                transport: rule.transport.to_transport()?,
                description: rule.description.clone(),
            });
        }
        filters.push(Filter {
            info: ResourceInfo::new(group.uid.clone(), group.name.clone(), ResourceKind::SecurityGroup)
                .in_vpc(group.vpc.clone()),
            index: filter_index,
            rules,
            attached: index
                .group_attached
                .get(group.uid.as_str())
                .cloned()
                .unwrap_or_default(),
        });
    }
    Ok(filters)
}

fn network_acls(doc: &ConfigDocument, wanted: &BTreeSet<&str>) -> Result<Vec<Filter>, LoadError> {
    let mut filters = Vec::new();
    for acl in doc.network_acls.iter().filter(|a| wanted.contains(a.vpc.as_str())) {
        let filter_index = filters.len();
        let mut rules = Vec::with_capacity(acl.rules.len());
        for (idx, rule) in acl.rules.iter().enumerate() {
            rules.push(Rule {
                filter_index,
                index: idx,
                direction: rule.direction,
                action: rule.action,
                src: IpBlock::from_ip_or_cidr(&rule.source).map_err(AnalysisError::from)?,
                dst: IpBlock::from_ip_or_cidr(&rule.destination).map_err(AnalysisError::from)?,
                transport: rule.transport.to_transport()?,
                description: rule.description.clone(),
            });
        }
        filters.push(Filter {
            info: ResourceInfo::new(acl.uid.clone(), acl.name.clone(), ResourceKind::NetworkAcl)
                .in_vpc(acl.vpc.clone()),
            index: filter_index,
            rules,
            attached: acl.subnets.clone(),
        });
    }
    Ok(filters)
}
