//! Pair composition: filter layers and routers combined into one detailed
//! connection per ordered pair of nodes.
//!
//! For each pair the router (if one is needed) selects the filter layers that
//! apply. The forward set is the intersection of the router's allowed set with
//! every relevant layer's egress and ingress verdicts. The reverse set only
//! consults stateless layers, evaluated with the endpoints swapped: stateful
//! layers and routers admit the replies of connections they carried. TCP
//! responsiveness is derived from the two sets.

use std::collections::BTreeMap;

use log::{debug, info};
use netset_core::{DetailedConn, TransportSet};

use crate::error::AnalysisError;
use crate::filters::{Direction, FilterLayerKind, LayerVerdict};
use crate::model::{EndpointRef, NamedResource, NodeId, VpcConfig};

/// Connectivity keyed by ordered `(src, dst)`; only non-empty entries.
pub type ConnectivityMap = BTreeMap<(EndpointRef, EndpointRef), DetailedConn>;

/// Everything computed for one ordered pair.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PairRecord {
    pub src: NodeId,
    pub dst: NodeId,
    pub conn: DetailedConn,
    /// `true` when the pair can only communicate through a router.
    pub needs_router: bool,
    /// Index of the router carrying the traffic, if any.
    pub router: Option<usize>,
    /// Layers that apply to the pair.
    pub relevant_layers: Vec<FilterLayerKind>,
    /// Forward verdicts of every layer: egress then ingress, per layer.
    pub forward: Vec<LayerVerdict>,
    /// Reverse verdicts of the stateless relevant layers.
    pub reverse: Vec<LayerVerdict>,
}

impl PairRecord {
    pub fn verdict(&self, layer: FilterLayerKind, direction: Direction) -> Option<&LayerVerdict> {
        self.forward
            .iter()
            .find(|v| v.layer == layer && v.direction == direction)
    }

    pub fn is_relevant(&self, layer: FilterLayerKind) -> bool {
        self.relevant_layers.contains(&layer)
    }

    /// `true` when every relevant layer lets some traffic out of `src`
    /// (egress) or into `dst` (ingress).
    pub fn direction_enabled(&self, direction: Direction) -> bool {
        self.forward
            .iter()
            .filter(|v| v.direction == direction && self.is_relevant(v.layer))
            .all(|v| !v.is_blocking())
    }
}

/// `true` when the configuration composes this pair at all.
pub fn is_composed_pair(config: &VpcConfig, src: NodeId, dst: NodeId) -> bool {
    if src == dst {
        return false;
    }
    let (s, d) = (config.node(src), config.node(dst));
    if !s.is_internal() && !d.is_internal() {
        return false;
    }
    if config.is_multi_vpc() {
        return s.is_internal() && d.is_internal() && s.vpc() != d.vpc();
    }
    true
}

/// Compose one ordered pair, restricted to `query` if given.
///
/// Fails with [`AnalysisError::UnknownLayer`] when a layer the pair is subject
/// to is missing from the configuration.
pub fn pair_record(
    config: &VpcConfig,
    src: NodeId,
    dst: NodeId,
    query: Option<&TransportSet>,
) -> Result<PairRecord, AnalysisError> {
    let (s, d) = (config.node(src), config.node(dst));
    let needs_router = !(s.is_internal() && d.is_internal()) || s.vpc() != d.vpc();
    let router = if needs_router {
        config.routing_resource_for(s, d)
    } else {
        None
    };
    let relevant_layers: Vec<FilterLayerKind> = match router {
        Some(index) => config.router(index).applied_filter_kinds().to_vec(),
        None => config.layers().iter().map(|l| l.layer()).collect(),
    };
    for kind in &relevant_layers {
        config.filter_of_kind(*kind)?;
    }

    let mut forward_set = query.cloned().unwrap_or_else(TransportSet::all);
    if needs_router {
        forward_set = match router {
            Some(index) => forward_set.intersect(&config.router(index).allowed(config, s, d)),
            None => TransportSet::none(),
        };
    }

    let mut forward = Vec::new();
    let mut reverse = Vec::new();
    let mut reverse_set = TransportSet::all();
    for layer in config.layers() {
        let relevant = relevant_layers.contains(&layer.layer());
        for direction in [Direction::Egress, Direction::Ingress] {
            let verdict = layer.evaluate(config, s, d, direction, query);
            if relevant {
                forward_set = forward_set.intersect(&verdict.allowed);
            }
            forward.push(verdict);
        }
        if relevant && !layer.is_stateful() {
            for direction in [Direction::Egress, Direction::Ingress] {
                let verdict = layer.evaluate(config, d, s, direction, None);
                reverse_set = reverse_set.intersect(&verdict.allowed);
                reverse.push(verdict);
            }
        }
    }

    let conn = DetailedConn::compute(&forward_set, &reverse_set)?;
    Ok(PairRecord {
        src,
        dst,
        conn,
        needs_router,
        router,
        relevant_layers,
        forward,
        reverse,
    })
}

/// Compose every pair of the configuration, in declaration order.
pub fn analyze_pairs(config: &VpcConfig) -> Result<Vec<PairRecord>, AnalysisError> {
    let mut records = Vec::new();
    for src in config.node_ids() {
        for dst in config.node_ids() {
            if is_composed_pair(config, src, dst) {
                records.push(pair_record(config, src, dst, None)?);
            }
        }
    }
    debug!("{}: evaluated {} pairs", config.name(), records.len());
    Ok(records)
}

/// Node-to-node connectivity of the configuration.
pub fn analyze_endpoints(config: &VpcConfig) -> Result<ConnectivityMap, AnalysisError> {
    let map: ConnectivityMap = analyze_pairs(config)?
        .into_iter()
        .filter(|record| !record.conn.is_empty())
        .map(|record| {
            (
                (EndpointRef::Node(record.src), EndpointRef::Node(record.dst)),
                record.conn,
            )
        })
        .collect();
    info!("{}: {} connected endpoint pairs", config.name(), map.len());
    Ok(map)
}
