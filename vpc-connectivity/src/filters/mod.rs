//! Filter layers: security groups and network ACLs.
//!
//! A layer answers two questions for an `(src, dst, direction)` triple: which
//! transport set it lets through, and which rules contributed to that answer.
//!
//! ## Applicability
//!
//! The local side of a direction is the source for egress and the destination
//! for ingress. A layer does not apply when its local side is external; the
//! network-ACL layer also does not apply between two nodes of the same subnet.
//! A layer that does not apply lets everything through and reports no rules.
//!
//! ## Rule matching
//!
//! A rule matches when its direction matches and both endpoint blocks are
//! contained in the rule's source and destination blocks.

use std::fmt::{self, Debug, Display, Formatter};

use netset_core::{IpBlock, TransportSet};
use serde::{Deserialize, Serialize};

use crate::model::{NamedResource, Node, ResourceInfo, VpcConfig};

pub mod atomic;
pub mod nacl;
pub mod security_group;

pub use atomic::{atomic_cubes, redundant_rules, AtomicCube};
pub use nacl::NetworkAclLayer;
pub use security_group::SecurityGroupLayer;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum FilterLayerKind {
    SecurityGroup,
    NetworkAcl,
}

impl Display for FilterLayerKind {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            Self::SecurityGroup => write!(f, "security group"),
            Self::NetworkAcl => write!(f, "network ACL"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    Ingress,
    Egress,
}

impl Display for Direction {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            Self::Ingress => write!(f, "inbound"),
            Self::Egress => write!(f, "outbound"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Action {
    Allow,
    Deny,
}

impl Display for Action {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            Self::Allow => write!(f, "allow"),
            Self::Deny => write!(f, "deny"),
        }
    }
}

/// One filter rule with its blocks already resolved.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Rule {
    pub filter_index: usize,
    pub index: usize,
    pub direction: Direction,
    pub action: Action,
    pub src: IpBlock,
    pub dst: IpBlock,
    pub transport: TransportSet,
    pub description: String,
}

impl Rule {
    pub fn matches(&self, src: &IpBlock, dst: &IpBlock, direction: Direction) -> bool {
        self.direction == direction && src.contained_in(&self.src) && dst.contained_in(&self.dst)
    }
}

/// A named rule table (one security group or one ACL).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Filter {
    pub info: ResourceInfo,
    /// Position within its layer.
    pub index: usize,
    pub rules: Vec<Rule>,
    /// UIDs of the interfaces (security groups) or subnets (ACLs) it covers.
    pub attached: Vec<String>,
}

impl Filter {
    pub fn is_attached_to(&self, uid: &str) -> bool {
        self.attached.iter().any(|a| a == uid)
    }
}

impl NamedResource for Filter {
    fn info(&self) -> &ResourceInfo {
        &self.info
    }
}

/// How a rule took part in a decision.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum RuleRole {
    Effective,
    Shadowing,
    Redundant,
}

impl Display for RuleRole {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            Self::Effective => write!(f, "effective"),
            Self::Shadowing => write!(f, "shadowing"),
            Self::Redundant => write!(f, "redundant"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub struct RuleRef {
    pub rule_index: usize,
    pub action: Action,
    pub role: RuleRole,
}

/// The rules of one filter that matched a triple, in evaluation order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FilterContribution {
    pub filter_index: usize,
    pub filter_name: String,
    pub rules: Vec<RuleRef>,
}

/// Result of evaluating one layer for one direction of a pair.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LayerVerdict {
    pub layer: FilterLayerKind,
    pub direction: Direction,
    pub applicable: bool,
    pub allowed: TransportSet,
    pub filters: Vec<FilterContribution>,
}

impl LayerVerdict {
    pub(crate) fn not_applicable(
        layer: FilterLayerKind,
        direction: Direction,
        query: Option<&TransportSet>,
    ) -> Self {
        Self {
            layer,
            direction,
            applicable: false,
            allowed: query.cloned().unwrap_or_else(TransportSet::all),
            filters: Vec::new(),
        }
    }

    /// Allow rules that let some traffic through, per filter.
    pub fn allow_rules(&self) -> Vec<(&FilterContribution, RuleRef)> {
        self.rules_where(|r| r.action == Action::Allow && r.role != RuleRole::Redundant)
    }

    /// Deny rules that decided some traffic, per filter.
    pub fn deny_rules(&self) -> Vec<(&FilterContribution, RuleRef)> {
        self.rules_where(|r| r.action == Action::Deny && r.role != RuleRole::Redundant)
    }

    /// An applicable layer with no allowing rule blocks the direction.
    pub fn is_blocking(&self) -> bool {
        self.applicable && self.allow_rules().is_empty()
    }

    fn rules_where(&self, keep: impl Fn(&RuleRef) -> bool) -> Vec<(&FilterContribution, RuleRef)> {
        self.filters
            .iter()
            .flat_map(|f| f.rules.iter().filter(|r| keep(r)).map(move |r| (f, *r)))
            .collect()
    }
}

/// A filter layer of a configuration.
pub trait FilterTrafficResource: Debug {
    fn layer(&self) -> FilterLayerKind;

    fn filters(&self) -> &[Filter];

    /// Stateful layers admit replies of connections they allowed.
    fn is_stateful(&self) -> bool;

    /// Evaluate one direction of `src → dst`, restricted to `query` if given.
    fn evaluate(
        &self,
        config: &VpcConfig,
        src: &Node,
        dst: &Node,
        direction: Direction,
        query: Option<&TransportSet>,
    ) -> LayerVerdict;

    fn allowed(&self, config: &VpcConfig, src: &Node, dst: &Node, direction: Direction) -> TransportSet {
        self.evaluate(config, src, dst, direction, None).allowed
    }

    fn rules(
        &self,
        config: &VpcConfig,
        src: &Node,
        dst: &Node,
        direction: Direction,
    ) -> Vec<FilterContribution> {
        self.evaluate(config, src, dst, direction, None).filters
    }

    /// Distinct source and destination blocks named by any rule.
    fn referenced_ip_blocks(&self) -> Vec<IpBlock> {
        let mut blocks: Vec<IpBlock> = self
            .filters()
            .iter()
            .flat_map(|f| f.rules.iter())
            .flat_map(|r| [r.src.clone(), r.dst.clone()])
            .collect();
        blocks.sort();
        blocks.dedup();
        blocks
    }

    fn filters_and_attached_resources(&self) -> Vec<(&Filter, &[String])> {
        self.filters()
            .iter()
            .map(|f| (f, f.attached.as_slice()))
            .collect()
    }

    fn filter(&self, index: usize) -> Option<&Filter> {
        self.filters().get(index)
    }
}

/// The node whose filters apply in `direction`.
pub(crate) fn local_side<'a>(src: &'a Node, dst: &'a Node, direction: Direction) -> &'a Node {
    match direction {
        Direction::Egress => src,
        Direction::Ingress => dst,
    }
}

/// Restrict `transport` to `query` if given.
pub(crate) fn restrict(transport: &TransportSet, query: Option<&TransportSet>) -> TransportSet {
    match query {
        Some(query) => transport.intersect(query),
        None => transport.clone(),
    }
}
