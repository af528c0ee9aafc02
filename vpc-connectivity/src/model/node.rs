use netset_core::IpBlock;

use super::resource::{NamedResource, ResourceInfo, ResourceKind};

/// Index of a node in its configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct NodeId(pub usize);

/// Index of a node-set in its configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct NodeSetId(pub usize);

/// An addressable endpoint: an interface, reserved IP or external CIDR.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Node {
    info: ResourceInfo,
    block: IpBlock,
    display: String,
    subnet: Option<NodeSetId>,
    vsi: Option<NodeSetId>,
    public_internet: bool,
}

impl Node {
    pub(crate) fn internal(
        info: ResourceInfo,
        block: IpBlock,
        display: String,
        subnet: NodeSetId,
        vsi: Option<NodeSetId>,
    ) -> Self {
        Self {
            info,
            block,
            display,
            subnet: Some(subnet),
            vsi,
            public_internet: false,
        }
    }

    /// An external endpoint covering `block`.
    pub fn external(block: IpBlock, public_internet: bool) -> Self {
        let display = if public_internet {
            format!("Public Internet {block}")
        } else {
            block.to_string()
        };
        Self {
            info: ResourceInfo::new(
                format!("external:{block}"),
                display.clone(),
                ResourceKind::ExternalCidr,
            ),
            block,
            display,
            subnet: None,
            vsi: None,
            public_internet,
        }
    }

    pub fn is_internal(&self) -> bool {
        self.info.kind != ResourceKind::ExternalCidr
    }

    pub fn is_public_internet(&self) -> bool {
        self.public_internet
    }

    /// Address block of the endpoint; a single address for interfaces.
    pub fn cidr(&self) -> &IpBlock {
        &self.block
    }

    pub fn subnet(&self) -> Option<NodeSetId> {
        self.subnet
    }

    pub fn vsi(&self) -> Option<NodeSetId> {
        self.vsi
    }

    /// Name used in reports, e.g. `vsi1[10.240.1.4]` for a VSI interface.
    pub fn display_name(&self) -> &str {
        &self.display
    }
}

impl NamedResource for Node {
    fn info(&self) -> &ResourceInfo {
        &self.info
    }
}

/// A set-like endpoint: subnet, VSI or VPC.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NodeSet {
    info: ResourceInfo,
    block: IpBlock,
    members: Vec<NodeId>,
}

impl NodeSet {
    pub(crate) fn new(info: ResourceInfo, block: IpBlock) -> Self {
        Self {
            info,
            block,
            members: Vec::new(),
        }
    }

    pub(crate) fn push_member(&mut self, node: NodeId, block: &IpBlock) {
        self.members.push(node);
        if self.info.kind == ResourceKind::Vsi {
            self.block = self.block.union(block);
        }
    }

    /// Member nodes in declaration order.
    pub fn nodes(&self) -> &[NodeId] {
        &self.members
    }

    pub fn cidr(&self) -> &IpBlock {
        &self.block
    }
}

impl NamedResource for NodeSet {
    fn info(&self) -> &ResourceInfo {
        &self.info
    }
}
