use std::collections::BTreeMap;
use std::net::Ipv4Addr;

use netset_core::IpBlock;

use super::endpoint::{Endpoint, EndpointRef};
use super::node::{Node, NodeId, NodeSet, NodeSetId};
use super::resource::{NamedResource, ResourceInfo, ResourceKind};
use crate::error::AnalysisError;
use crate::filters::{FilterLayerKind, FilterTrafficResource};
use crate::routers::RoutingResource;

/// A resource found through the name or UID index.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum ResourceRef {
    Node(NodeId),
    NodeSet(NodeSetId),
    Filter {
        layer: FilterLayerKind,
        index: usize,
    },
    Router(usize),
}

/// One VPC (or a composite of VPCs joined by a transit gateway).
///
/// Owns its nodes and node-sets in arenas; everything else refers to them by
/// [`NodeId`] / [`NodeSetId`] or by UID. Immutable once built.
#[derive(Debug)]
pub struct VpcConfig {
    info: ResourceInfo,
    nodes: Vec<Node>,
    node_sets: Vec<NodeSet>,
    layers: Vec<Box<dyn FilterTrafficResource>>,
    routers: Vec<Box<dyn RoutingResource>>,
    names: BTreeMap<String, Vec<ResourceRef>>,
    uids: BTreeMap<String, ResourceRef>,
    multi_vpc: bool,
    public_internet: IpBlock,
    internal_space: IpBlock,
}

impl NamedResource for VpcConfig {
    fn info(&self) -> &ResourceInfo {
        &self.info
    }
}

impl VpcConfig {
    /// `true` for a composite configuration spanning several VPCs.
    pub fn is_multi_vpc(&self) -> bool {
        self.multi_vpc
    }

    pub fn nodes(&self) -> &[Node] {
        &self.nodes
    }

    pub fn node(&self, id: NodeId) -> &Node {
        &self.nodes[id.0]
    }

    /// Node ids in declaration order.
    pub fn node_ids(&self) -> impl Iterator<Item = NodeId> + '_ {
        (0..self.nodes.len()).map(NodeId)
    }

    pub fn node_sets(&self) -> &[NodeSet] {
        &self.node_sets
    }

    pub fn node_set(&self, id: NodeSetId) -> &NodeSet {
        &self.node_sets[id.0]
    }

    /// Ids of node-sets of one kind, in declaration order.
    pub fn node_sets_of_kind(&self, kind: ResourceKind) -> Vec<NodeSetId> {
        self.node_sets
            .iter()
            .enumerate()
            .filter(|(_, ns)| ns.kind() == kind)
            .map(|(idx, _)| NodeSetId(idx))
            .collect()
    }

    pub fn layers(&self) -> &[Box<dyn FilterTrafficResource>] {
        &self.layers
    }

    pub fn filter_of_kind(
        &self,
        kind: FilterLayerKind,
    ) -> Result<&dyn FilterTrafficResource, AnalysisError> {
        self.layers
            .iter()
            .find(|layer| layer.layer() == kind)
            .map(|layer| layer.as_ref())
            .ok_or(AnalysisError::UnknownLayer(kind))
    }

    pub fn routers(&self) -> &[Box<dyn RoutingResource>] {
        &self.routers
    }

    pub fn router(&self, index: usize) -> &dyn RoutingResource {
        self.routers[index].as_ref()
    }

    /// The first router that carries traffic from `src` to `dst`.
    pub fn routing_resource_for(&self, src: &Node, dst: &Node) -> Option<usize> {
        self.routers
            .iter()
            .position(|router| !router.allowed(self, src, dst).is_empty())
    }

    pub fn subnet_of(&self, node: &Node) -> Option<&NodeSet> {
        node.subnet().map(|id| self.node_set(id))
    }

    /// The external node containing `addr`.
    pub fn containing_node(&self, addr: Ipv4Addr) -> Option<NodeId> {
        self.node_ids().find(|id| {
            let node = self.node(*id);
            !node.is_internal() && node.cidr().contains(addr)
        })
    }

    /// External nodes whose block intersects `block`, in declaration order.
    pub fn external_nodes_intersecting(&self, block: &IpBlock) -> Vec<NodeId> {
        self.node_ids()
            .filter(|id| {
                let node = self.node(*id);
                !node.is_internal() && node.cidr().intersects(block)
            })
            .collect()
    }

    pub fn lookup_name(&self, name: &str) -> &[ResourceRef] {
        self.names.get(name).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn lookup_uid(&self, uid: &str) -> Option<ResourceRef> {
        self.uids.get(uid).copied()
    }

    /// Addresses outside every reserved range.
    pub fn public_internet(&self) -> &IpBlock {
        &self.public_internet
    }

    /// Union of the VPC address prefixes and subnet CIDRs.
    pub fn internal_space(&self) -> &IpBlock {
        &self.internal_space
    }

    pub fn endpoint_name(&self, endpoint: EndpointRef) -> &str {
        match endpoint {
            EndpointRef::Node(id) => self.node(id).display_name(),
            EndpointRef::NodeSet(id) => self.node_set(id).name(),
        }
    }

    pub fn endpoint_block(&self, endpoint: EndpointRef) -> &IpBlock {
        match endpoint {
            EndpointRef::Node(id) => self.node(id).cidr(),
            EndpointRef::NodeSet(id) => self.node_set(id).cidr(),
        }
    }

    pub fn is_external(&self, endpoint: EndpointRef) -> bool {
        match endpoint {
            EndpointRef::Node(id) => !self.node(id).is_internal(),
            EndpointRef::NodeSet(_) => false,
        }
    }

    /// Report name of any endpoint, compound ones included.
    pub fn endpoint_display(&self, endpoint: &Endpoint) -> String {
        match endpoint {
            Endpoint::Node(id) => self.node(*id).display_name().to_string(),
            Endpoint::NodeSet(id) => self.node_set(*id).name().to_string(),
            Endpoint::CompoundExternal(block) => {
                if block.contained_in(&self.public_internet) {
                    format!("Public Internet {block}")
                } else {
                    block.to_string()
                }
            }
            Endpoint::CompoundInternal(members) => members
                .iter()
                .map(|m| self.endpoint_name(*m))
                .collect::<Vec<_>>()
                .join(", "),
        }
    }
}

/// Assembles a [`VpcConfig`]. The caller is responsible for consistency.
#[derive(Debug)]
pub struct ConfigBuilder {
    config: VpcConfig,
}

impl ConfigBuilder {
    pub fn new(uid: impl Into<String>, name: impl Into<String>, public_internet: IpBlock) -> Self {
        let uid = uid.into();
        Self {
            config: VpcConfig {
                info: ResourceInfo::new(uid.clone(), name, ResourceKind::Vpc).in_vpc(uid),
                nodes: Vec::new(),
                node_sets: Vec::new(),
                layers: Vec::new(),
                routers: Vec::new(),
                names: BTreeMap::new(),
                uids: BTreeMap::new(),
                multi_vpc: false,
                public_internet,
                internal_space: IpBlock::empty(),
            },
        }
    }

    /// Mark the configuration as a cross-VPC composite.
    pub fn multi_vpc(mut self) -> Self {
        self.config.multi_vpc = true;
        self
    }

    /// Declare a VPC node-set; internal nodes of that VPC join it on build.
    pub fn add_vpc(&mut self, info: ResourceInfo, address_prefixes: IpBlock) -> NodeSetId {
        self.config.internal_space = self.config.internal_space.union(&address_prefixes);
        self.push_set(NodeSet::new(info, address_prefixes))
    }

    pub fn add_subnet(&mut self, info: ResourceInfo, cidr: IpBlock) -> NodeSetId {
        self.config.internal_space = self.config.internal_space.union(&cidr);
        self.push_set(NodeSet::new(info, cidr))
    }

    pub fn add_vsi(&mut self, info: ResourceInfo) -> NodeSetId {
        self.push_set(NodeSet::new(info, IpBlock::empty()))
    }

    /// Add an interface (or reserved IP) with a single address.
    pub fn add_interface(
        &mut self,
        mut info: ResourceInfo,
        address: Ipv4Addr,
        subnet: NodeSetId,
        vsi: Option<NodeSetId>,
    ) -> NodeId {
        if info.vpc.is_none() {
            info.vpc = self.config.node_set(subnet).info().vpc.clone();
        }
        let display = match vsi {
            Some(vsi) => format!("{}[{address}]", self.config.node_set(vsi).name()),
            None => info.name.clone(),
        };
        let block = IpBlock::from_address(address);
        let id = NodeId(self.config.nodes.len());
        self.config
            .nodes
            .push(Node::internal(info, block.clone(), display, subnet, vsi));
        self.config.node_sets[subnet.0].push_member(id, &block);
        if let Some(vsi) = vsi {
            self.config.node_sets[vsi.0].push_member(id, &block);
        }
        id
    }

    /// Add an external endpoint; public when inside the public internet.
    pub fn add_external(&mut self, block: IpBlock) -> NodeId {
        let public = block.contained_in(&self.config.public_internet);
        let id = NodeId(self.config.nodes.len());
        self.config.nodes.push(Node::external(block, public));
        id
    }

    pub fn add_layer(&mut self, layer: Box<dyn FilterTrafficResource>) {
        self.config.layers.push(layer);
    }

    pub fn add_router(&mut self, router: Box<dyn RoutingResource>) {
        self.config.routers.push(router);
    }

    pub fn public_internet(&self) -> &IpBlock {
        &self.config.public_internet
    }

    pub fn build(mut self) -> VpcConfig {
        let vpc_sets = self.config.node_sets_of_kind(ResourceKind::Vpc);
        for set_id in vpc_sets {
            let vpc_uid = self.config.node_set(set_id).uid().to_string();
            let members: Vec<(NodeId, IpBlock)> = self
                .config
                .node_ids()
                .filter(|id| {
                    let node = self.config.node(*id);
                    node.is_internal() && node.vpc() == Some(vpc_uid.as_str())
                })
                .map(|id| (id, self.config.node(id).cidr().clone()))
                .collect();
            for (id, block) in members {
                self.config.node_sets[set_id.0].push_member(id, &block);
            }
        }
        self.index();
        self.config
    }

    fn push_set(&mut self, set: NodeSet) -> NodeSetId {
        let id = NodeSetId(self.config.node_sets.len());
        self.config.node_sets.push(set);
        id
    }

    fn index(&mut self) {
        let config = &mut self.config;
        let mut entries: Vec<(String, String, ResourceRef)> = Vec::new();
        for (idx, node) in config.nodes.iter().enumerate() {
            entries.push((node.uid().into(), node.name().into(), ResourceRef::Node(NodeId(idx))));
        }
        for (idx, set) in config.node_sets.iter().enumerate() {
            entries.push((set.uid().into(), set.name().into(), ResourceRef::NodeSet(NodeSetId(idx))));
        }
        for layer in &config.layers {
            for filter in layer.filters() {
                entries.push((
                    filter.uid().into(),
                    filter.name().into(),
                    ResourceRef::Filter {
                        layer: layer.layer(),
                        index: filter.index,
                    },
                ));
            }
        }
        for (idx, router) in config.routers.iter().enumerate() {
            entries.push((router.uid().into(), router.name().into(), ResourceRef::Router(idx)));
        }
        for (uid, name, resource) in entries {
            config.uids.insert(uid, resource);
            config.names.entry(name).or_default().push(resource);
        }
    }
}

/// All configurations loaded from one input, keyed by VPC UID.
#[derive(Debug, Default)]
pub struct MultiVpcConfig {
    pub configs: BTreeMap<String, VpcConfig>,
    pub to_compare: Option<BTreeMap<String, VpcConfig>>,
}

impl MultiVpcConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, config: VpcConfig) {
        self.configs.insert(config.uid().to_string(), config);
    }

    /// Single-VPC configurations, composites excluded.
    pub fn single_vpc_configs(&self) -> impl Iterator<Item = &VpcConfig> {
        self.configs.values().filter(|c| !c.is_multi_vpc())
    }

    /// Pairs of configurations to diff: same UID first, otherwise the only
    /// single-VPC configuration on each side.
    pub fn diff_pairs(&self) -> Vec<(&VpcConfig, &VpcConfig)> {
        let Some(other) = &self.to_compare else {
            return Vec::new();
        };
        let mut pairs: Vec<(&VpcConfig, &VpcConfig)> = self
            .configs
            .iter()
            .filter_map(|(uid, config)| other.get(uid).map(|o| (config, o)))
            .collect();
        if pairs.is_empty() {
            let left: Vec<&VpcConfig> = self.single_vpc_configs().collect();
            let right: Vec<&VpcConfig> = other.values().filter(|c| !c.is_multi_vpc()).collect();
            if let ([l], [r]) = (left.as_slice(), right.as_slice()) {
                pairs.push((*l, *r));
            }
        }
        pairs
    }
}
