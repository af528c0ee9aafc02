//! Report renderers.
//!
//! Every renderer works on [`ReportLine`]s, built either straight from a
//! connectivity map or from grouped lines, so grouping and rendering stay
//! independent.

use netset_core::DetailedConn;
use serde::Serialize;

use crate::compose::ConnectivityMap;
use crate::grouping::GroupedLine;
use crate::model::{Endpoint, EndpointRef, NamedResource, ResourceKind, VpcConfig};

mod debug;
mod json;
mod markdown;
mod text;

pub use debug::render_debug;
pub use json::{
    json_report, required_connections, ArchitectureEntry, ConnectivityEntry, JsonReport,
    RequiredConnection,
};
pub use markdown::render_markdown;
pub use text::{render_text, STATEFUL_FOOTNOTE};

/// Report name and resource type of one endpoint.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Serialize)]
pub struct EndpointLabel {
    pub name: String,
    #[serde(rename = "type")]
    pub kind: String,
}

/// One rendered edge.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReportLine {
    pub src: EndpointLabel,
    pub dst: EndpointLabel,
    pub conn: DetailedConn,
}

/// One line per non-empty pair, sorted by endpoint names.
pub fn plain_lines(config: &VpcConfig, connectivity: &ConnectivityMap) -> Vec<ReportLine> {
    let mut lines: Vec<ReportLine> = connectivity
        .iter()
        .filter(|(_, conn)| !conn.is_empty())
        .map(|((src, dst), conn)| ReportLine {
            src: label(config, &Endpoint::from(*src)),
            dst: label(config, &Endpoint::from(*dst)),
            conn: conn.clone(),
        })
        .collect();
    lines.sort_by(|a, b| (&a.src.name, &a.dst.name).cmp(&(&b.src.name, &b.dst.name)));
    lines
}

/// Grouped lines in their given order.
pub fn grouped_lines(config: &VpcConfig, grouped: &[GroupedLine]) -> Vec<ReportLine> {
    grouped
        .iter()
        .map(|line| ReportLine {
            src: label(config, &line.src),
            dst: label(config, &line.dst),
            conn: line.conn.clone(),
        })
        .collect()
}

fn label(config: &VpcConfig, endpoint: &Endpoint) -> EndpointLabel {
    let kind = match endpoint {
        Endpoint::Node(id) => config.node(*id).kind(),
        Endpoint::NodeSet(id) => config.node_set(*id).kind(),
        Endpoint::CompoundExternal(_) => ResourceKind::ExternalCidr,
        Endpoint::CompoundInternal(members) => match members.first() {
            Some(EndpointRef::Node(id)) => config.node(*id).kind(),
            Some(EndpointRef::NodeSet(id)) => config.node_set(*id).kind(),
            None => ResourceKind::NetworkInterface,
        },
    };
    EndpointLabel {
        name: config.endpoint_display(endpoint),
        kind: kind.to_string(),
    }
}
