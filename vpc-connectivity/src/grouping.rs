//! Grouping of connectivity lines for reports.
//!
//! ## Phases
//!
//! 1. **External partitioning**: external peers of an internal endpoint are
//!    split on the disjoint partition of every external block in the result;
//!    pieces reached with the same connection are united into one compound
//!    external endpoint.
//! 2. **Subnet grouping** (optional): internal endpoints that share a peer and
//!    a connection are united when they belong to the same subnet (nodes) or
//!    the same VPC (subnets).
//!
//! Lines between internal endpoints are then merged through their self-loops
//! until no merge applies, and, for graphical outputs, edges of an external
//! endpoint are copied onto the external endpoints it contains.

use std::collections::{BTreeMap, BTreeSet};

use log::debug;
use netset_core::{DetailedConn, IpBlock};

use crate::compose::ConnectivityMap;
use crate::model::{Endpoint, EndpointRef, NamedResource, VpcConfig};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct GroupingOptions {
    /// Unite internal endpoints per subnet (or per VPC for subnets).
    pub group_internal: bool,
    /// Copy edges of containing external endpoints onto contained ones.
    pub graphical: bool,
}

/// One report line after grouping.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct GroupedLine {
    pub src: Endpoint,
    pub dst: Endpoint,
    pub conn: DetailedConn,
}

/// Group `connectivity` into report lines, sorted by display name.
pub fn group_connectivity(
    config: &VpcConfig,
    connectivity: &ConnectivityMap,
    options: GroupingOptions,
) -> Vec<GroupedLine> {
    let mut lines = partition_externals(config, connectivity);
    if options.group_internal {
        lines = group_internal(config, lines, Side::Src);
        lines = group_internal(config, lines, Side::Dst);
    }
    lines = merge_self_loops(config, lines);
    if options.graphical {
        lines = add_contained_externals(lines);
    }
    lines.sort_by_cached_key(|line| {
        (
            config.endpoint_display(&line.src),
            config.endpoint_display(&line.dst),
            line.conn.to_string(),
        )
    });
    debug!(
        "grouped {} pairs into {} lines",
        connectivity.len(),
        lines.len()
    );
    lines
}

fn partition_externals(config: &VpcConfig, connectivity: &ConnectivityMap) -> Vec<GroupedLine> {
    let external_blocks: Vec<IpBlock> = connectivity
        .keys()
        .flat_map(|(s, d)| [*s, *d])
        .filter(|e| config.is_external(*e))
        .map(|e| config.endpoint_block(e).clone())
        .collect();
    let pieces = IpBlock::disjoint_partition(&external_blocks);

    let mut lines = Vec::new();
    // (internal endpoint, internal is source) -> piece index -> connection
    let mut per_piece: BTreeMap<(EndpointRef, bool), BTreeMap<usize, DetailedConn>> =
        BTreeMap::new();
    for ((src, dst), conn) in connectivity {
        let (internal, external, outbound) = match (config.is_external(*src), config.is_external(*dst)) {
            (false, false) => {
                lines.push(GroupedLine {
                    src: (*src).into(),
                    dst: (*dst).into(),
                    conn: conn.clone(),
                });
                continue;
            }
            (false, true) => (*src, *dst, true),
            (true, false) => (*dst, *src, false),
            (true, true) => continue,
        };
        let block = config.endpoint_block(external);
        let slot = per_piece.entry((internal, outbound)).or_default();
        for (idx, piece) in pieces.iter().enumerate() {
            if piece.contained_in(block) {
                let entry = slot.entry(idx).or_insert_with(DetailedConn::empty);
                *entry = entry.union(conn);
            }
        }
    }

    for ((internal, outbound), by_piece) in per_piece {
        let mut by_conn: BTreeMap<DetailedConn, IpBlock> = BTreeMap::new();
        for (idx, conn) in by_piece {
            let block = by_conn.entry(conn).or_insert_with(IpBlock::empty);
            *block = block.union(&pieces[idx]);
        }
        for (conn, block) in by_conn {
            let (src, dst) = if outbound {
                (Endpoint::from(internal), Endpoint::CompoundExternal(block))
            } else {
                (Endpoint::CompoundExternal(block), Endpoint::from(internal))
            };
            lines.push(GroupedLine { src, dst, conn });
        }
    }
    lines
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Side {
    Src,
    Dst,
}

/// Unite single internal endpoints on `side` that share the other endpoint,
/// the connection and their enclosing subnet or VPC.
fn group_internal(config: &VpcConfig, lines: Vec<GroupedLine>, side: Side) -> Vec<GroupedLine> {
    let mut out = Vec::new();
    let mut groups: BTreeMap<(Endpoint, DetailedConn, String), BTreeSet<EndpointRef>> =
        BTreeMap::new();
    for line in lines {
        let (grouped, other) = match side {
            Side::Src => (&line.src, &line.dst),
            Side::Dst => (&line.dst, &line.src),
        };
        let single = match grouped {
            Endpoint::Node(id) => Some(EndpointRef::Node(*id)),
            Endpoint::NodeSet(id) => Some(EndpointRef::NodeSet(*id)),
            _ => None,
        };
        match single.and_then(|e| enclosing_key(config, e).map(|k| (e, k))) {
            Some((endpoint, key)) => {
                groups
                    .entry((other.clone(), line.conn.clone(), key))
                    .or_default()
                    .insert(endpoint);
            }
            None => out.push(line),
        }
    }
    for ((other, conn, _), members) in groups {
        let grouped = compound(members);
        let (src, dst) = match side {
            Side::Src => (grouped, other),
            Side::Dst => (other, grouped),
        };
        out.push(GroupedLine { src, dst, conn });
    }
    out
}

fn enclosing_key(config: &VpcConfig, endpoint: EndpointRef) -> Option<String> {
    match endpoint {
        EndpointRef::Node(id) => {
            let node = config.node(id);
            let subnet = config.subnet_of(node)?;
            Some(format!("subnet:{}", subnet.uid()))
        }
        EndpointRef::NodeSet(id) => config.node_set(id).vpc().map(|vpc| format!("vpc:{vpc}")),
    }
}

fn compound(members: BTreeSet<EndpointRef>) -> Endpoint {
    if members.len() == 1 {
        if let Some(only) = members.iter().next() {
            return (*only).into();
        }
    }
    Endpoint::CompoundInternal(members.into_iter().collect())
}

fn internal_members(config: &VpcConfig, endpoint: &Endpoint) -> Option<BTreeSet<EndpointRef>> {
    if matches!(endpoint, Endpoint::CompoundExternal(_)) {
        return None;
    }
    let members: BTreeSet<EndpointRef> = endpoint.members().into_iter().collect();
    if members.iter().any(|m| config.is_external(*m)) {
        return None;
    }
    Some(members)
}

/// Merge lines whose union differs from their combined product only by
/// self-pairs, until no merge applies.
fn merge_self_loops(config: &VpcConfig, mut lines: Vec<GroupedLine>) -> Vec<GroupedLine> {
    loop {
        let mut merged = None;
        'search: for i in 0..lines.len() {
            for j in (i + 1)..lines.len() {
                if let Some(line) = try_merge(config, &lines[i], &lines[j]) {
                    merged = Some((i, j, line));
                    break 'search;
                }
            }
        }
        let Some((i, j, line)) = merged else {
            return lines;
        };
        lines.remove(j);
        lines[i] = line;
    }
}

fn try_merge(config: &VpcConfig, a: &GroupedLine, b: &GroupedLine) -> Option<GroupedLine> {
    if a.conn != b.conn {
        return None;
    }
    let (a_src, a_dst) = (internal_members(config, &a.src)?, internal_members(config, &a.dst)?);
    let (b_src, b_dst) = (internal_members(config, &b.src)?, internal_members(config, &b.dst)?);
    let srcs: BTreeSet<EndpointRef> = a_src.union(&b_src).copied().collect();
    let dsts: BTreeSet<EndpointRef> = a_dst.union(&b_dst).copied().collect();
    let covered = |s: &EndpointRef, d: &EndpointRef| {
        (a_src.contains(s) && a_dst.contains(d)) || (b_src.contains(s) && b_dst.contains(d))
    };

    let mut gains_diagonal = false;
    for s in &srcs {
        for d in &dsts {
            if covered(s, d) {
                continue;
            }
            if s != d {
                return None;
            }
            gains_diagonal = true;
        }
    }
    gains_diagonal.then(|| GroupedLine {
        src: compound(srcs),
        dst: compound(dsts),
        conn: a.conn.clone(),
    })
}

/// Copy every edge of an external endpoint onto the external endpoints it
/// strictly contains.
fn add_contained_externals(lines: Vec<GroupedLine>) -> Vec<GroupedLine> {
    let externals: BTreeSet<IpBlock> = lines
        .iter()
        .flat_map(|l| [&l.src, &l.dst])
        .filter_map(|e| match e {
            Endpoint::CompoundExternal(block) => Some(block.clone()),
            _ => None,
        })
        .collect();
    let contained = |outer: &IpBlock| -> Vec<IpBlock> {
        externals
            .iter()
            .filter(|inner| *inner != outer && inner.contained_in(outer))
            .cloned()
            .collect()
    };

    let mut out: BTreeSet<GroupedLine> = lines.iter().cloned().collect();
    for line in &lines {
        if let Endpoint::CompoundExternal(block) = &line.src {
            for inner in contained(block) {
                out.insert(GroupedLine {
                    src: Endpoint::CompoundExternal(inner),
                    ..line.clone()
                });
            }
        }
        if let Endpoint::CompoundExternal(block) = &line.dst {
            for inner in contained(block) {
                out.insert(GroupedLine {
                    dst: Endpoint::CompoundExternal(inner),
                    ..line.clone()
                });
            }
        }
    }
    out.into_iter().collect()
}
