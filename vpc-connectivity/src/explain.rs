//! Explanation of the connectivity between two endpoints.
//!
//! An endpoint argument is a resource name or UID (interface, VSI, subnet), an
//! address, or a CIDR. Internal arguments resolve to the interfaces they cover;
//! external ones to the configuration's external endpoints they intersect.
//! At most one side may be external.
//!
//! Filters are listed in the order traffic meets them: security groups before
//! network ACLs on egress, network ACLs before security groups on ingress.

use log::{debug, warn};
use netset_core::{DetailedConn, IpBlock, TransportSet};

use crate::compose::{pair_record, PairRecord};
use crate::error::AnalysisError;
use crate::filters::{Direction, FilterContribution, FilterLayerKind, LayerVerdict};
use crate::model::{MultiVpcConfig, NamedResource, NodeId, ResourceKind, ResourceRef, VpcConfig};

/// What an endpoint argument resolved to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Resolved {
    /// Interfaces covered by the argument.
    Internal(Vec<NodeId>),
    /// External endpoints, each with the part of the argument it holds.
    External(Vec<(NodeId, IpBlock)>),
}

impl Resolved {
    fn is_external(&self) -> bool {
        matches!(self, Self::External(_))
    }

    fn nodes(&self) -> Vec<(NodeId, Option<IpBlock>)> {
        match self {
            Self::Internal(ids) => ids.iter().map(|id| (*id, None)).collect(),
            Self::External(parts) => parts.iter().map(|(id, b)| (*id, Some(b.clone()))).collect(),
        }
    }
}

/// Resolve an endpoint argument against one configuration.
pub fn resolve_endpoint(config: &VpcConfig, arg: &str) -> Result<Resolved, AnalysisError> {
    let by_name = config.lookup_name(arg);
    if by_name.len() > 1 {
        return Err(AnalysisError::AmbiguousName(arg.to_string()));
    }
    if let Some(resource) = by_name.first().copied().or_else(|| config.lookup_uid(arg)) {
        return resolve_resource(config, arg, resource);
    }

    let Ok(block) = IpBlock::from_ip_or_cidr(arg) else {
        return Err(AnalysisError::UnresolvedEndpoint(arg.to_string()));
    };
    if block.intersects(config.internal_space()) {
        let nodes: Vec<NodeId> = config
            .node_ids()
            .filter(|id| {
                let node = config.node(*id);
                node.is_internal() && node.cidr().contained_in(&block)
            })
            .collect();
        if nodes.is_empty() {
            return Err(AnalysisError::UnresolvedEndpoint(arg.to_string()));
        }
        return Ok(Resolved::Internal(nodes));
    }

    let parts: Vec<(NodeId, IpBlock)> = config
        .external_nodes_intersecting(&block)
        .into_iter()
        .map(|id| (id, config.node(id).cidr().intersect(&block)))
        .collect();
    if parts.is_empty() {
        return Err(AnalysisError::UnresolvedEndpoint(arg.to_string()));
    }
    Ok(Resolved::External(parts))
}

fn resolve_resource(
    config: &VpcConfig,
    arg: &str,
    resource: ResourceRef,
) -> Result<Resolved, AnalysisError> {
    match resource {
        ResourceRef::Node(id) => {
            let node = config.node(id);
            if node.is_internal() {
                Ok(Resolved::Internal(vec![id]))
            } else {
                Ok(Resolved::External(vec![(id, node.cidr().clone())]))
            }
        }
        ResourceRef::NodeSet(id) => {
            let set = config.node_set(id);
            let nodes = set.nodes().to_vec();
            match set.kind() {
                ResourceKind::Vsi | ResourceKind::Subnet | ResourceKind::Vpc if !nodes.is_empty() => {
                    Ok(Resolved::Internal(nodes))
                }
                _ => Err(AnalysisError::UnresolvedEndpoint(arg.to_string())),
            }
        }
        ResourceRef::Filter { .. } | ResourceRef::Router(_) => {
            Err(AnalysisError::UnresolvedEndpoint(arg.to_string()))
        }
    }
}

/// The explanation of one resolved pair.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PairExplanation {
    pub record: PairRecord,
    /// The part of an external endpoint the argument covers.
    pub src_block: Option<IpBlock>,
    pub dst_block: Option<IpBlock>,
    pub egress_enabled: bool,
    pub ingress_enabled: bool,
}

impl PairExplanation {
    /// Allowed connection, restricted to the query when one was given.
    pub fn allowed(&self) -> &DetailedConn {
        &self.record.conn
    }

    /// Verdicts of the relevant layers for `direction`, in evaluation order.
    pub fn verdicts(&self, direction: Direction) -> Vec<&LayerVerdict> {
        let order = match direction {
            Direction::Egress => [FilterLayerKind::SecurityGroup, FilterLayerKind::NetworkAcl],
            Direction::Ingress => [FilterLayerKind::NetworkAcl, FilterLayerKind::SecurityGroup],
        };
        order
            .iter()
            .filter(|layer| self.record.is_relevant(**layer))
            .filter_map(|layer| self.record.verdict(*layer, direction))
            .collect()
    }
}

/// Explanation of every resolved pair of a query.
#[derive(Debug, Clone)]
pub struct Explanation<'a> {
    pub config: &'a VpcConfig,
    pub src: String,
    pub dst: String,
    pub query: Option<TransportSet>,
    pub pairs: Vec<PairExplanation>,
}

/// Explain the connectivity from `src` to `dst` in one configuration.
pub fn explain<'a>(
    config: &'a VpcConfig,
    src: &str,
    dst: &str,
    query: Option<TransportSet>,
) -> Result<Explanation<'a>, AnalysisError> {
    if config.is_multi_vpc() {
        return Err(AnalysisError::CrossVpcUnsupported(config.name().to_string()));
    }
    let src_resolved = resolve_endpoint(config, src)?;
    let dst_resolved = resolve_endpoint(config, dst)?;
    if src_resolved.is_external() && dst_resolved.is_external() {
        return Err(AnalysisError::ExternalBoth {
            src: src.to_string(),
            dst: dst.to_string(),
        });
    }

    let mut pairs = Vec::new();
    for (s, src_block) in src_resolved.nodes() {
        for (d, dst_block) in dst_resolved.nodes() {
            if s == d {
                continue;
            }
            let record = pair_record(config, s, d, query.as_ref())?;
            pairs.push(PairExplanation {
                egress_enabled: record.direction_enabled(Direction::Egress),
                ingress_enabled: record.direction_enabled(Direction::Ingress),
                record,
                src_block: src_block.clone(),
                dst_block,
            });
        }
    }
    debug!("explained {} pairs from {src} to {dst}", pairs.len());
    Ok(Explanation {
        config,
        src: src.to_string(),
        dst: dst.to_string(),
        query,
        pairs,
    })
}

impl MultiVpcConfig {
    /// Explain in the single VPC configuration that resolves both endpoints.
    pub fn explain(
        &self,
        src: &str,
        dst: &str,
        query: Option<TransportSet>,
    ) -> Result<Explanation<'_>, AnalysisError> {
        let mut found = Vec::new();
        let mut first_error = None;
        for config in self.single_vpc_configs() {
            match explain(config, src, dst, query.clone()) {
                Ok(explanation) => found.push(explanation),
                Err(err @ AnalysisError::ExternalBoth { .. }) => return Err(err),
                Err(err @ AnalysisError::AmbiguousName(_)) => return Err(err),
                Err(err) => {
                    first_error.get_or_insert(err);
                }
            }
        }
        if found.len() > 1 {
            warn!(
                "{src} and {dst} resolve in {} VPCs; explaining in the first",
                found.len()
            );
        }
        if let Some(explanation) = found.into_iter().next() {
            return Ok(explanation);
        }
        let spans_vpcs = self.configs.values().any(|c| {
            c.is_multi_vpc() && resolve_endpoint(c, src).is_ok() && resolve_endpoint(c, dst).is_ok()
        });
        if spans_vpcs {
            return Err(AnalysisError::CrossVpcUnsupported(format!("{src} -> {dst}")));
        }
        Err(first_error.unwrap_or_else(|| AnalysisError::UnresolvedEndpoint(src.to_string())))
    }
}

impl Explanation<'_> {
    /// Render as text; `detail` adds the matching rules of every filter.
    pub fn render(&self, detail: bool) -> Result<String, AnalysisError> {
        let mut out = Vec::new();
        match &self.query {
            Some(query) => out.push(format!(
                "Explaining connectivity from {} to {} for {query}",
                self.src, self.dst
            )),
            None => out.push(format!(
                "Explaining connectivity from {} to {}",
                self.src, self.dst
            )),
        }
        if self.pairs.is_empty() {
            out.push("No pairs to explain".to_string());
        }
        for pair in &self.pairs {
            out.push(String::new());
            if self.pairs.len() > 1 {
                out.push(format!(
                    "{} => {}:",
                    self.endpoint_label(pair.record.src, pair.src_block.as_ref()),
                    self.endpoint_label(pair.record.dst, pair.dst_block.as_ref())
                ));
            }
            out.extend(self.render_pair(pair, detail)?);
        }
        Ok(out.join("\n"))
    }

    fn endpoint_label(&self, id: NodeId, part: Option<&IpBlock>) -> String {
        match part {
            Some(block) if block.contained_in(self.config.public_internet()) => {
                format!("Public Internet {block}")
            }
            Some(block) => block.to_string(),
            None => self.config.node(id).display_name().to_string(),
        }
    }

    fn render_pair(&self, pair: &PairExplanation, detail: bool) -> Result<Vec<String>, AnalysisError> {
        let record = &pair.record;
        let mut out = Vec::new();
        let no_router = record.needs_router && record.router.is_none();
        if no_router {
            out.push("No connection; no router enables traffic between them".to_string());
        } else if !pair.egress_enabled || !pair.ingress_enabled {
            let blocked = match (pair.egress_enabled, pair.ingress_enabled) {
                (false, false) => "both ingress and egress",
                (false, true) => "egress",
                _ => "ingress",
            };
            out.push(format!("No connection; connection blocked by {blocked}"));
        } else if pair.allowed().is_empty() {
            out.push("No connection; egress and ingress allow disjoint traffic".to_string());
        } else {
            out.push(format!("Allowed connections: {}", pair.allowed()));
        }
        if let Some(query) = &self.query {
            let allowed = pair.allowed().all();
            let verdict = if allowed.is_empty() {
                "disallowed"
            } else if allowed == query {
                "fully allowed"
            } else {
                "partially allowed"
            };
            out.push(format!("query is {verdict}"));
        }

        match record.router {
            Some(index) => {
                let router = self.config.router(index);
                out.push(format!("Routed through {} {}", router.kind(), router.name()));
            }
            None if !record.needs_router => {
                out.push("Both endpoints are in the same VPC; no router is required".to_string());
            }
            None => {}
        }
        if no_router {
            return Ok(out);
        }

        for direction in [Direction::Egress, Direction::Ingress] {
            let label = match direction {
                Direction::Egress => "Egress",
                Direction::Ingress => "Ingress",
            };
            out.push(format!("{label}:"));
            for verdict in pair.verdicts(direction) {
                out.extend(self.render_verdict(verdict, detail)?);
            }
        }
        Ok(out)
    }

    fn render_verdict(
        &self,
        verdict: &LayerVerdict,
        detail: bool,
    ) -> Result<Vec<String>, AnalysisError> {
        if !verdict.applicable {
            return Ok(vec![format!("  {}: not applicable", verdict.layer)]);
        }
        if verdict.filters.is_empty() {
            return Ok(vec![format!("  {}: no rule allows this traffic", verdict.layer)]);
        }
        let mut out = Vec::new();
        for contribution in &verdict.filters {
            let allows = verdict
                .allow_rules()
                .iter()
                .any(|(f, _)| f.filter_index == contribution.filter_index);
            let status = if allows { "allows" } else { "denies" };
            out.push(format!(
                "  {} {} {status}",
                verdict.layer, contribution.filter_name
            ));
            if detail {
                out.extend(self.render_rules(verdict.layer, contribution)?);
            }
        }
        Ok(out)
    }

    fn render_rules(
        &self,
        layer: FilterLayerKind,
        contribution: &FilterContribution,
    ) -> Result<Vec<String>, AnalysisError> {
        let filter = self
            .config
            .filter_of_kind(layer)?
            .filter(contribution.filter_index);
        let lines: Vec<String> = contribution
            .rules
            .iter()
            .map(|rule| {
                let description = filter
                    .and_then(|f| f.rules.iter().find(|r| r.index == rule.rule_index))
                    .map(|r| r.description.as_str())
                    .unwrap_or_default();
                let mut line = format!("    rule {} ({}, {})", rule.rule_index, rule.action, rule.role);
                if !description.is_empty() {
                    line.push_str(&format!(": {description}"));
                }
                line
            })
            .collect();
        Ok(lines)
    }
}
