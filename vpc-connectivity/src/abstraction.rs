//! Node-set abstraction.
//!
//! Replaces the members of a node-set by the set itself. Its connection to or
//! from a peer is the union over the members, and inside the set it becomes a
//! single self-loop. The abstraction assumes every member connects as the set
//! does; the missing-connection maps record where that does not hold.

use std::collections::BTreeMap;

use netset_core::DetailedConn;

use crate::compose::ConnectivityMap;
use crate::model::{EndpointRef, NodeSetId, VpcConfig};

/// Connectivity with one node-set abstracted, and what the abstraction hides.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NodeSetAbstraction {
    pub connectivity: ConnectivityMap,
    /// `(member, peer)` → flows the set has towards `peer` that `member` lacks.
    pub missing_egress: ConnectivityMap,
    /// `(peer, member)` → flows the set accepts from `peer` that `member` lacks.
    pub missing_ingress: ConnectivityMap,
    /// `(member, member)` → self-loop flows the member pair lacks.
    pub missing_within: ConnectivityMap,
}

impl NodeSetAbstraction {
    pub fn is_exact(&self) -> bool {
        self.missing_egress.is_empty()
            && self.missing_ingress.is_empty()
            && self.missing_within.is_empty()
    }
}

/// Abstract `set` in `connectivity`.
pub fn abstract_node_set(
    config: &VpcConfig,
    connectivity: &ConnectivityMap,
    set: NodeSetId,
) -> NodeSetAbstraction {
    let members: Vec<EndpointRef> = config
        .node_set(set)
        .nodes()
        .iter()
        .map(|id| EndpointRef::Node(*id))
        .collect();
    let is_member = |e: &EndpointRef| members.contains(e);
    let abstracted = EndpointRef::NodeSet(set);

    let mut result = NodeSetAbstraction::default();
    let mut to_other: BTreeMap<EndpointRef, DetailedConn> = BTreeMap::new();
    let mut from_other: BTreeMap<EndpointRef, DetailedConn> = BTreeMap::new();
    let mut self_loop = DetailedConn::empty();

    for ((src, dst), conn) in connectivity {
        match (is_member(src), is_member(dst)) {
            (false, false) => {
                result.connectivity.insert((*src, *dst), conn.clone());
            }
            (true, true) => self_loop = self_loop.union(conn),
            (true, false) => union_into(&mut to_other, *dst, conn),
            (false, true) => union_into(&mut from_other, *src, conn),
        }
    }

    let actual = |src: EndpointRef, dst: EndpointRef| {
        connectivity
            .get(&(src, dst))
            .cloned()
            .unwrap_or_else(DetailedConn::empty)
    };
    for (peer, union) in to_other {
        for member in &members {
            record_missing(&mut result.missing_egress, (*member, peer), &union, &actual(*member, peer));
        }
        result.connectivity.insert((abstracted, peer), union);
    }
    for (peer, union) in from_other {
        for member in &members {
            record_missing(&mut result.missing_ingress, (peer, *member), &union, &actual(peer, *member));
        }
        result.connectivity.insert((peer, abstracted), union);
    }
    if !self_loop.is_empty() {
        for src in &members {
            for dst in members.iter().filter(|d| *d != src) {
                record_missing(&mut result.missing_within, (*src, *dst), &self_loop, &actual(*src, *dst));
            }
        }
        result.connectivity.insert((abstracted, abstracted), self_loop);
    }
    result
}

fn union_into(map: &mut BTreeMap<EndpointRef, DetailedConn>, key: EndpointRef, conn: &DetailedConn) {
    let entry = map.entry(key).or_insert_with(DetailedConn::empty);
    *entry = entry.union(conn);
}

fn record_missing(
    missing: &mut ConnectivityMap,
    key: (EndpointRef, EndpointRef),
    union: &DetailedConn,
    actual: &DetailedConn,
) {
    let diff = union.subtract(actual);
    if !diff.is_empty() {
        missing.insert(key, diff);
    }
}
