use netset_core::IpBlock;

use super::node::{NodeId, NodeSetId};

/// A configured endpoint: a node or a node-set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum EndpointRef {
    Node(NodeId),
    NodeSet(NodeSetId),
}

/// Any endpoint a report line can carry, including compound ones built by
/// grouping.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Endpoint {
    Node(NodeId),
    NodeSet(NodeSetId),
    /// Union of external address blocks.
    CompoundExternal(IpBlock),
    /// Several internal endpoints sharing the same connectivity.
    CompoundInternal(Vec<EndpointRef>),
}

impl From<EndpointRef> for Endpoint {
    fn from(value: EndpointRef) -> Self {
        match value {
            EndpointRef::Node(id) => Self::Node(id),
            EndpointRef::NodeSet(id) => Self::NodeSet(id),
        }
    }
}

impl Endpoint {
    /// Node and node-set references; empty for compound externals.
    pub fn members(&self) -> Vec<EndpointRef> {
        match self {
            Self::Node(id) => vec![EndpointRef::Node(*id)],
            Self::NodeSet(id) => vec![EndpointRef::NodeSet(*id)],
            Self::CompoundInternal(members) => members.clone(),
            Self::CompoundExternal(_) => Vec::new(),
        }
    }
}
