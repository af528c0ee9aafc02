use std::collections::BTreeMap;

use netset_core::TransportSet;

use crate::compose::PairRecord;
use crate::filters::{Direction, FilterLayerKind, LayerVerdict};
use crate::model::{NamedResource, NodeId, VpcConfig};

/// Per-pair dump of every layer verdict, followed by the connectivity the
/// network ACLs alone induce between subnets.
pub fn render_debug(config: &VpcConfig, records: &[PairRecord]) -> String {
    let mut out = Vec::new();
    for record in records {
        out.push(format!(
            "{} => {}",
            config.node(record.src).display_name(),
            config.node(record.dst).display_name()
        ));
        let router = match (record.needs_router, record.router) {
            (false, _) => "not required".to_string(),
            (true, None) => "none".to_string(),
            (true, Some(index)) => {
                let router = config.router(index);
                format!("{} ({})", router.name(), router.kind())
            }
        };
        out.push(format!("  router: {router}"));
        for verdict in &record.forward {
            out.push(format!("  {}", verdict_line(record, verdict)));
        }
        for verdict in &record.reverse {
            out.push(format!("  reverse {}", verdict_line(record, verdict)));
        }
        out.push(format!("  result: {}", record.conn));
    }

    let by_subnet = acl_by_subnet(config, records);
    if !by_subnet.is_empty() {
        out.push(String::new());
        out.push("network ACL connectivity by subnet".to_string());
        for ((src, dst), allowed) in by_subnet {
            out.push(format!("{src} => {dst} : {allowed}"));
        }
    }
    out.join("\n")
}

fn verdict_line(record: &PairRecord, verdict: &LayerVerdict) -> String {
    let mut line = format!("{} {}: {}", verdict.layer, verdict.direction, verdict.allowed);
    if !verdict.applicable {
        line.push_str(" [not applicable]");
    } else if !record.is_relevant(verdict.layer) {
        line.push_str(" [not on path]");
    }
    line
}

fn acl_by_subnet(config: &VpcConfig, records: &[PairRecord]) -> BTreeMap<(String, String), TransportSet> {
    let mut out: BTreeMap<(String, String), TransportSet> = BTreeMap::new();
    for record in records {
        let egress = record.verdict(FilterLayerKind::NetworkAcl, Direction::Egress);
        let ingress = record.verdict(FilterLayerKind::NetworkAcl, Direction::Ingress);
        let (Some(egress), Some(ingress)) = (egress, ingress) else {
            continue;
        };
        let (src, dst) = (subnet_name(config, record.src), subnet_name(config, record.dst));
        if src == dst {
            continue;
        }
        let allowed = egress.allowed.intersect(&ingress.allowed);
        let entry = out.entry((src, dst)).or_insert_with(TransportSet::none);
        *entry = entry.union(&allowed);
    }
    out.retain(|_, allowed| !allowed.is_empty());
    out
}

fn subnet_name(config: &VpcConfig, id: NodeId) -> String {
    let node = config.node(id);
    match config.subnet_of(node) {
        Some(subnet) => subnet.name().to_string(),
        None => node.display_name().to_string(),
    }
}
