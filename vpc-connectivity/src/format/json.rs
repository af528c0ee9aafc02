use netset_core::{ConnItem, DetailedConn};
use serde::Serialize;

use super::{EndpointLabel, ReportLine};
use crate::model::{NamedResource, ResourceKind, VpcConfig};

/// One resource of the analyzed configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ArchitectureEntry {
    pub kind: ResourceKind,
    pub name: String,
    pub uid: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cidr: Option<String>,
    /// Member names for node-sets, attachment UIDs for filters.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub members: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Architecture {
    pub nodes: Vec<ArchitectureEntry>,
    pub node_sets: Vec<ArchitectureEntry>,
    pub filters: Vec<ArchitectureEntry>,
    pub routers: Vec<ArchitectureEntry>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ConnectivityEntry {
    pub src: String,
    pub dst: String,
    pub conn: DetailedConn,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct JsonReport {
    pub architecture: Architecture,
    pub connectivity: Vec<ConnectivityEntry>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RequiredConnection {
    pub src: EndpointLabel,
    pub dst: EndpointLabel,
    pub allowed_protocols: Vec<ConnItem>,
}

fn entry(resource: &dyn NamedResource, cidr: Option<String>, members: Vec<String>) -> ArchitectureEntry {
    ArchitectureEntry {
        kind: resource.kind(),
        name: resource.name().to_string(),
        uid: resource.uid().to_string(),
        cidr,
        members,
    }
}

pub fn json_report(config: &VpcConfig, lines: &[ReportLine]) -> JsonReport {
    let nodes = config
        .nodes()
        .iter()
        .map(|node| entry(node, Some(node.cidr().to_cidr_string()), Vec::new()))
        .collect();
    let node_sets = config
        .node_sets()
        .iter()
        .map(|set| {
            let cidr = (!set.cidr().is_empty()).then(|| set.cidr().to_cidr_string());
            let members = set
                .nodes()
                .iter()
                .map(|id| config.node(*id).display_name().to_string())
                .collect();
            entry(set, cidr, members)
        })
        .collect();
    let filters = config
        .layers()
        .iter()
        .flat_map(|layer| layer.filters())
        .map(|filter| entry(filter, None, filter.attached.clone()))
        .collect();
    let routers = config
        .routers()
        .iter()
        .map(|router| entry(router.info(), None, Vec::new()))
        .collect();
    JsonReport {
        architecture: Architecture {
            nodes,
            node_sets,
            filters,
            routers,
        },
        connectivity: lines
            .iter()
            .map(|line| ConnectivityEntry {
                src: line.src.name.clone(),
                dst: line.dst.name.clone(),
                conn: line.conn.clone(),
            })
            .collect(),
    }
}

/// Connections a deployment has to permit, sorted by endpoint names.
pub fn required_connections(lines: &[ReportLine]) -> Vec<RequiredConnection> {
    let mut out: Vec<RequiredConnection> = lines
        .iter()
        .filter(|line| !line.conn.is_empty())
        .map(|line| RequiredConnection {
            src: line.src.clone(),
            dst: line.dst.clone(),
            allowed_protocols: line.conn.all().items(),
        })
        .collect();
    out.sort_by(|a, b| (&a.src.name, &a.dst.name).cmp(&(&b.src.name, &b.dst.name)));
    out
}
