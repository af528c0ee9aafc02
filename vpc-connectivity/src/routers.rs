//! Routing resources: public gateways, floating IPs and transit gateways.
//!
//! A router decides whether traffic between two endpoints can traverse it at
//! all and which filter layers apply on the way. Pairs with both endpoints in
//! the same VPC never need a router.

use std::fmt::Debug;

use netset_core::{IpBlock, TransportSet};

use crate::filters::FilterLayerKind;
use crate::model::{NamedResource, Node, ResourceInfo, VpcConfig};

const ALL_LAYERS: &[FilterLayerKind] = &[FilterLayerKind::SecurityGroup, FilterLayerKind::NetworkAcl];
const SECURITY_GROUPS_ONLY: &[FilterLayerKind] = &[FilterLayerKind::SecurityGroup];

pub trait RoutingResource: Debug + NamedResource {
    /// Traffic the router carries from `src` to `dst`; empty when it does not
    /// route between them.
    fn allowed(&self, config: &VpcConfig, src: &Node, dst: &Node) -> TransportSet;

    /// Filter layers traffic through this router is subject to.
    fn applied_filter_kinds(&self) -> &'static [FilterLayerKind];
}

/// Outbound internet access for the subnets it is attached to.
#[derive(Debug, Clone)]
pub struct PublicGateway {
    info: ResourceInfo,
    subnets: Vec<String>,
}

impl PublicGateway {
    pub fn new(info: ResourceInfo, subnets: Vec<String>) -> Self {
        Self { info, subnets }
    }

    pub fn subnets(&self) -> &[String] {
        &self.subnets
    }
}

impl NamedResource for PublicGateway {
    fn info(&self) -> &ResourceInfo {
        &self.info
    }
}

impl RoutingResource for PublicGateway {
    fn allowed(&self, config: &VpcConfig, src: &Node, dst: &Node) -> TransportSet {
        let attached = config
            .subnet_of(src)
            .is_some_and(|subnet| self.subnets.iter().any(|uid| uid == subnet.uid()));
        if attached && dst.is_public_internet() {
            TransportSet::all()
        } else {
            TransportSet::none()
        }
    }

    fn applied_filter_kinds(&self) -> &'static [FilterLayerKind] {
        ALL_LAYERS
    }
}

/// A public address bound to one interface, in both directions.
///
/// Traffic through a floating IP bypasses network ACLs.
#[derive(Debug, Clone)]
pub struct FloatingIp {
    info: ResourceInfo,
    address: IpBlock,
    target: String,
}

impl FloatingIp {
    pub fn new(info: ResourceInfo, address: IpBlock, target: String) -> Self {
        Self {
            info,
            address,
            target,
        }
    }

    pub fn address(&self) -> &IpBlock {
        &self.address
    }

    /// UID of the interface the address is bound to.
    pub fn target(&self) -> &str {
        &self.target
    }
}

impl NamedResource for FloatingIp {
    fn info(&self) -> &ResourceInfo {
        &self.info
    }
}

impl RoutingResource for FloatingIp {
    fn allowed(&self, _config: &VpcConfig, src: &Node, dst: &Node) -> TransportSet {
        let outbound = src.uid() == self.target && dst.is_public_internet();
        let inbound = dst.uid() == self.target && src.is_public_internet();
        if outbound || inbound {
            TransportSet::all()
        } else {
            TransportSet::none()
        }
    }

    fn applied_filter_kinds(&self) -> &'static [FilterLayerKind] {
        SECURITY_GROUPS_ONLY
    }
}

/// One VPC attachment of a transit gateway.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TgwConnection {
    pub vpc: String,
    /// Prefixes the attachment advertises; its address prefixes when unfiltered.
    pub permitted: IpBlock,
}

/// Routes between the VPCs it connects, limited by each attachment's prefixes.
#[derive(Debug, Clone)]
pub struct TransitGateway {
    info: ResourceInfo,
    connections: Vec<TgwConnection>,
}

impl TransitGateway {
    pub fn new(info: ResourceInfo, connections: Vec<TgwConnection>) -> Self {
        Self { info, connections }
    }

    pub fn connections(&self) -> &[TgwConnection] {
        &self.connections
    }

    fn permits(&self, node: &Node) -> bool {
        let Some(vpc) = node.vpc() else {
            return false;
        };
        self.connections
            .iter()
            .any(|c| c.vpc == vpc && node.cidr().contained_in(&c.permitted))
    }
}

impl NamedResource for TransitGateway {
    fn info(&self) -> &ResourceInfo {
        &self.info
    }
}

impl RoutingResource for TransitGateway {
    fn allowed(&self, _config: &VpcConfig, src: &Node, dst: &Node) -> TransportSet {
        let crosses = src.is_internal() && dst.is_internal() && src.vpc() != dst.vpc();
        if crosses && self.permits(src) && self.permits(dst) {
            TransportSet::all()
        } else {
            TransportSet::none()
        }
    }

    fn applied_filter_kinds(&self) -> &'static [FilterLayerKind] {
        ALL_LAYERS
    }
}
