//! Subnet-level connectivity.
//!
//! A subnet connects to a peer with the union of what its interfaces connect
//! with. Router attachment is already reflected in the node-level input: a
//! subnet without a public gateway has no internet entries to lift.

use log::debug;
use netset_core::DetailedConn;

use crate::compose::ConnectivityMap;
use crate::model::{EndpointRef, VpcConfig};

/// Lift node-to-node connectivity to subnets. External nodes stay as they
/// are; pairs inside one subnet are dropped.
pub fn lift_to_subnets(config: &VpcConfig, connectivity: &ConnectivityMap) -> ConnectivityMap {
    let mut lifted = ConnectivityMap::new();
    for ((src, dst), conn) in connectivity {
        let (src, dst) = (subnet_or_self(config, *src), subnet_or_self(config, *dst));
        if src == dst {
            continue;
        }
        let entry = lifted.entry((src, dst)).or_insert_with(DetailedConn::empty);
        *entry = entry.union(conn);
    }
    debug!(
        "lifted {} node pairs to {} subnet pairs",
        connectivity.len(),
        lifted.len()
    );
    lifted
}

fn subnet_or_self(config: &VpcConfig, endpoint: EndpointRef) -> EndpointRef {
    match endpoint {
        EndpointRef::Node(id) => config
            .node(id)
            .subnet()
            .map_or(endpoint, EndpointRef::NodeSet),
        EndpointRef::NodeSet(_) => endpoint,
    }
}
