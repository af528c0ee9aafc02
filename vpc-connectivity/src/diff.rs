//! Connectivity diff between two configurations.
//!
//! Internal endpoints are matched by name and external ones by address. The
//! external blocks of both sides are first aligned on their common disjoint
//! partition so that any two external endpoints are either equal or disjoint.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt::{self, Display, Formatter};

use log::debug;
use netset_core::{DetailedConn, IpBlock, TransportSet};
use serde::Serialize;

use crate::compose::ConnectivityMap;
use crate::model::{EndpointRef, NamedResource, ResourceKind, VpcConfig};
use crate::settings::AnalysisLevel;

/// Identity of an endpoint across configurations.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum EndpointKey {
    Internal(String),
    External(IpBlock),
}

/// One side of a diff after alignment.
#[derive(Debug, Clone)]
pub struct AlignedConnectivity<'a> {
    pub config: &'a VpcConfig,
    pub entries: BTreeMap<(EndpointKey, EndpointKey), DetailedConn>,
    /// Names of the internal endpoints of the compared level.
    pub internal: BTreeSet<String>,
}

impl AlignedConnectivity<'_> {
    pub fn key_name(&self, key: &EndpointKey) -> String {
        match key {
            EndpointKey::Internal(name) => name.clone(),
            EndpointKey::External(block) if block.contained_in(self.config.public_internet()) => {
                format!("Public Internet {block}")
            }
            EndpointKey::External(block) => block.to_string(),
        }
    }

    fn exists(&self, key: &EndpointKey) -> bool {
        match key {
            EndpointKey::Internal(name) => self.internal.contains(name),
            EndpointKey::External(_) => true,
        }
    }
}

/// Rewrite both maps onto the common partition of their external blocks.
pub fn align<'a>(
    first: (&'a VpcConfig, &ConnectivityMap),
    second: (&'a VpcConfig, &ConnectivityMap),
    level: AnalysisLevel,
) -> (AlignedConnectivity<'a>, AlignedConnectivity<'a>) {
    let blocks: Vec<IpBlock> = [first, second]
        .iter()
        .flat_map(|(config, map)| {
            map.keys()
                .flat_map(|(s, d)| [*s, *d])
                .filter(|e| config.is_external(*e))
                .map(|e| config.endpoint_block(e).clone())
                .collect::<Vec<_>>()
        })
        .collect();
    let pieces = IpBlock::disjoint_partition(&blocks);
    debug!("aligned external endpoints on {} blocks", pieces.len());
    (
        align_one(first.0, first.1, &pieces, level),
        align_one(second.0, second.1, &pieces, level),
    )
}

fn align_one<'a>(
    config: &'a VpcConfig,
    map: &ConnectivityMap,
    pieces: &[IpBlock],
    level: AnalysisLevel,
) -> AlignedConnectivity<'a> {
    let keys = |endpoint: EndpointRef| -> Vec<EndpointKey> {
        if config.is_external(endpoint) {
            let block = config.endpoint_block(endpoint);
            pieces
                .iter()
                .filter(|p| p.contained_in(block))
                .map(|p| EndpointKey::External(p.clone()))
                .collect()
        } else {
            vec![EndpointKey::Internal(config.endpoint_name(endpoint).to_string())]
        }
    };
    let mut entries = BTreeMap::new();
    for ((src, dst), conn) in map {
        for s in keys(*src) {
            for d in keys(*dst) {
                entries.insert((s.clone(), d), conn.clone());
            }
        }
    }
    let internal = match level {
        AnalysisLevel::Endpoints => config
            .nodes()
            .iter()
            .filter(|n| n.is_internal())
            .map(|n| n.display_name().to_string())
            .collect(),
        AnalysisLevel::Subnets => config
            .node_sets()
            .iter()
            .filter(|ns| ns.kind() == ResourceKind::Subnet)
            .map(|ns| ns.name().to_string())
            .collect(),
    };
    AlignedConnectivity {
        config,
        entries,
        internal,
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DiffKind {
    MissingSrc,
    MissingDst,
    MissingSrcDst,
    MissingConnection,
    ChangedConnection,
}

/// A connection of one side the other side lacks or has differently.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiffEntry {
    pub kind: DiffKind,
    pub src: EndpointKey,
    pub dst: EndpointKey,
    pub conn: DetailedConn,
    /// The other side's connection for a changed entry.
    pub other: Option<DetailedConn>,
}

/// Entries of `left` that `right` lacks or has differently.
pub fn subtract(left: &AlignedConnectivity<'_>, right: &AlignedConnectivity<'_>) -> Vec<DiffEntry> {
    let mut out = Vec::new();
    for ((src, dst), conn) in &left.entries {
        let src_missing = !right.exists(src);
        let dst_missing = !right.exists(dst);
        let (kind, other) = match (src_missing, dst_missing) {
            (true, true) => (DiffKind::MissingSrcDst, None),
            (true, false) => (DiffKind::MissingSrc, None),
            (false, true) => (DiffKind::MissingDst, None),
            (false, false) => match right.entries.get(&(src.clone(), dst.clone())) {
                None => (DiffKind::MissingConnection, None),
                Some(theirs) if theirs == conn => continue,
                Some(theirs) => (DiffKind::ChangedConnection, Some(theirs.clone())),
            },
        };
        out.push(DiffEntry {
            kind,
            src: src.clone(),
            dst: dst.clone(),
            conn: conn.clone(),
            other,
        });
    }
    out
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum DiffType {
    Added,
    Removed,
    Changed,
}

impl Display for DiffType {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            Self::Added => write!(f, "added"),
            Self::Removed => write!(f, "removed"),
            Self::Changed => write!(f, "changed"),
        }
    }
}

/// One rendered diff line.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Serialize)]
pub struct DiffLine {
    pub diff_type: DiffType,
    pub text: String,
}

/// Both directions of a diff, ready to render.
#[derive(Debug, Clone)]
pub struct ConfigDiff<'a> {
    pub first: AlignedConnectivity<'a>,
    pub second: AlignedConnectivity<'a>,
    /// `first` minus `second`: removed and changed entries.
    pub removed: Vec<DiffEntry>,
    /// `second` minus `first`; changed entries are reported once, on `removed`.
    pub added: Vec<DiffEntry>,
    pub level: AnalysisLevel,
}

/// Diff two configurations' connectivity at `level`.
pub fn diff_configs<'a>(
    first: (&'a VpcConfig, &ConnectivityMap),
    second: (&'a VpcConfig, &ConnectivityMap),
    level: AnalysisLevel,
) -> ConfigDiff<'a> {
    let (first, second) = align(first, second, level);
    let removed = subtract(&first, &second);
    let added = subtract(&second, &first)
        .into_iter()
        .filter(|e| e.kind != DiffKind::ChangedConnection)
        .collect();
    ConfigDiff {
        first,
        second,
        removed,
        added,
        level,
    }
}

impl ConfigDiff<'_> {
    pub fn is_empty(&self) -> bool {
        self.removed.is_empty() && self.added.is_empty()
    }

    /// Rendered lines, sorted.
    pub fn lines(&self) -> Vec<DiffLine> {
        let mut lines: Vec<DiffLine> = self
            .removed
            .iter()
            .map(|e| self.line(e, false))
            .chain(self.added.iter().map(|e| self.line(e, true)))
            .collect();
        lines.sort_by(|a, b| a.text.cmp(&b.text));
        lines
    }

    fn line(&self, entry: &DiffEntry, added: bool) -> DiffLine {
        let own = if added { &self.second } else { &self.first };
        let src = own.key_name(&entry.src);
        let dst = own.key_name(&entry.dst);
        let none = TransportSet::none().to_string();
        let (diff_type, config1, config2) = match (&entry.other, added) {
            (Some(other), _) => (DiffType::Changed, entry.conn.to_string(), other.to_string()),
            (None, false) => (DiffType::Removed, entry.conn.to_string(), none),
            (None, true) => (DiffType::Added, none, entry.conn.to_string()),
        };
        let verb = if added { "added" } else { "removed" };
        let info = match entry.kind {
            DiffKind::MissingSrc => Some(format!("{src} {verb}")),
            DiffKind::MissingDst => Some(format!("{dst} {verb}")),
            DiffKind::MissingSrcDst => Some(format!("{src} and {dst} {verb}")),
            DiffKind::MissingConnection | DiffKind::ChangedConnection => None,
        };
        let label = match self.level {
            AnalysisLevel::Endpoints => "vsis",
            AnalysisLevel::Subnets => "subnets",
        };
        let mut text = format!(
            "diff-type: {diff_type}, source: {src}, destination: {dst}, config1: {config1}, config2: {config2}"
        );
        if let Some(info) = info {
            text.push_str(&format!(", {label}-diff-info: {info}"));
        }
        DiffLine { diff_type, text }
    }

    pub fn render_text(&self) -> String {
        self.lines()
            .into_iter()
            .map(|l| l.text)
            .collect::<Vec<_>>()
            .join("\n")
    }
}
