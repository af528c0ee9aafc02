use netset_core::TransportSet;

use super::{
    local_side, restrict, Action, Direction, Filter, FilterContribution, FilterLayerKind,
    FilterTrafficResource, LayerVerdict, Rule, RuleRef, RuleRole,
};
use crate::model::{NamedResource, Node, VpcConfig};

/// Network ACLs attached to subnets. Stateless, first matching rule wins.
#[derive(Debug, Clone, Default)]
pub struct NetworkAclLayer {
    acls: Vec<Filter>,
}

impl NetworkAclLayer {
    pub fn new(acls: Vec<Filter>) -> Self {
        Self { acls }
    }

    fn acl_for(&self, config: &VpcConfig, node: &Node) -> Option<&Filter> {
        let subnet = config.subnet_of(node)?;
        self.acls.iter().find(|acl| acl.is_attached_to(subnet.uid()))
    }
}

impl FilterTrafficResource for NetworkAclLayer {
    fn layer(&self) -> FilterLayerKind {
        FilterLayerKind::NetworkAcl
    }

    fn filters(&self) -> &[Filter] {
        &self.acls
    }

    fn is_stateful(&self) -> bool {
        false
    }

    fn evaluate(
        &self,
        config: &VpcConfig,
        src: &Node,
        dst: &Node,
        direction: Direction,
        query: Option<&TransportSet>,
    ) -> LayerVerdict {
        let local = local_side(src, dst, direction);
        let same_subnet = src.subnet().is_some() && src.subnet() == dst.subnet();
        if !local.is_internal() || same_subnet {
            return LayerVerdict::not_applicable(self.layer(), direction, query);
        }

        let Some(acl) = self.acl_for(config, local) else {
            return LayerVerdict {
                layer: self.layer(),
                direction,
                applicable: true,
                allowed: TransportSet::none(),
                filters: Vec::new(),
            };
        };

        let matching: Vec<(&Rule, TransportSet)> = acl
            .rules
            .iter()
            .filter(|r| r.matches(src.cidr(), dst.cidr(), direction))
            .map(|r| (r, restrict(&r.transport, query)))
            .filter(|(_, part)| !part.is_empty())
            .collect();

        let (allowed, rules) = priority_scan(&matching);
        let filters = if rules.is_empty() {
            Vec::new()
        } else {
            vec![FilterContribution {
                filter_index: acl.index,
                filter_name: acl.name().to_string(),
                rules,
            }]
        };
        LayerVerdict {
            layer: self.layer(),
            direction,
            applicable: true,
            allowed,
            filters,
        }
    }
}

/// Scan matching rules in priority order; returns the allowed set and the
/// role of each rule.
fn priority_scan(matching: &[(&Rule, TransportSet)]) -> (TransportSet, Vec<RuleRef>) {
    let mut decided = TransportSet::none();
    let mut allowed = TransportSet::none();
    let mut refs = Vec::with_capacity(matching.len());
    for (pos, (rule, part)) in matching.iter().enumerate() {
        let effective = part.subtract(&decided);
        decided = decided.union(part);
        let role = if effective.is_empty() {
            RuleRole::Redundant
        } else if matching[pos + 1..]
            .iter()
            .any(|(later, later_part)| later.action != rule.action && !later_part.intersect(&effective).is_empty())
        {
            RuleRole::Shadowing
        } else {
            RuleRole::Effective
        };
        if rule.action == Action::Allow {
            allowed = allowed.union(&effective);
        }
        refs.push(RuleRef {
            rule_index: rule.index,
            action: rule.action,
            role,
        });
    }
    (allowed, refs)
}

#[cfg(test)]
mod tests {
    use netset_core::{IpBlock, Protocol, TransportSet};

    use super::NetworkAclLayer;
    use crate::filters::{Action, Direction, Filter, FilterTrafficResource, Rule, RuleRole};
    use crate::model::{ConfigBuilder, NodeId, ResourceInfo, ResourceKind, VpcConfig};

    fn rule(index: usize, action: Action, direction: Direction, transport: TransportSet) -> Rule {
        Rule {
            filter_index: 0,
            index,
            direction,
            action,
            src: IpBlock::all_ipv4(),
            dst: IpBlock::all_ipv4(),
            transport,
            description: format!("rule-{index}"),
        }
    }

    fn two_subnets(rules: Vec<Rule>) -> (VpcConfig, NodeId, NodeId, NodeId) {
        let mut builder = ConfigBuilder::new("vpc", "vpc", IpBlock::empty());
        let s1 = builder.add_subnet(
            ResourceInfo::new("s1", "s1", ResourceKind::Subnet),
            IpBlock::from_cidr("10.0.1.0/24").unwrap(),
        );
        let s2 = builder.add_subnet(
            ResourceInfo::new("s2", "s2", ResourceKind::Subnet),
            IpBlock::from_cidr("10.0.2.0/24").unwrap(),
        );
        let a = builder.add_interface(
            ResourceInfo::new("a", "a", ResourceKind::NetworkInterface),
            "10.0.1.4".parse().unwrap(),
            s1,
            None,
        );
        let a2 = builder.add_interface(
            ResourceInfo::new("a2", "a2", ResourceKind::NetworkInterface),
            "10.0.1.5".parse().unwrap(),
            s1,
            None,
        );
        let b = builder.add_interface(
            ResourceInfo::new("b", "b", ResourceKind::NetworkInterface),
            "10.0.2.4".parse().unwrap(),
            s2,
            None,
        );
        builder.add_layer(Box::new(NetworkAclLayer::new(vec![Filter {
            info: ResourceInfo::new("acl", "acl", ResourceKind::NetworkAcl),
            index: 0,
            rules,
            attached: vec!["s1".to_string()],
        }])));
        (builder.build(), a, a2, b)
    }

    #[test]
    fn first_matching_rule_wins() {
        let ssh = TransportSet::tcp_udp(Protocol::Tcp, 1..=65535, 22..=22).unwrap();
        let (config, a, _, b) = two_subnets(vec![
            rule(0, Action::Deny, Direction::Egress, ssh.clone()),
            rule(1, Action::Allow, Direction::Egress, TransportSet::all()),
            rule(2, Action::Allow, Direction::Egress, ssh.clone()),
        ]);
        let layer = &config.layers()[0];
        let verdict = layer.evaluate(&config, config.node(a), config.node(b), Direction::Egress, None);
        assert_eq!(verdict.allowed, TransportSet::all().subtract(&ssh));
        let roles: Vec<RuleRole> = verdict.filters[0].rules.iter().map(|r| r.role).collect();
        assert_eq!(
            roles,
            vec![RuleRole::Shadowing, RuleRole::Effective, RuleRole::Redundant]
        );
        assert_eq!(verdict.deny_rules().len(), 1);
    }

    #[test]
    fn same_subnet_is_not_filtered() {
        let (config, a, a2, _) = two_subnets(vec![rule(
            0,
            Action::Deny,
            Direction::Egress,
            TransportSet::all(),
        )]);
        let layer = &config.layers()[0];
        let verdict = layer.evaluate(&config, config.node(a), config.node(a2), Direction::Egress, None);
        assert!(!verdict.applicable);
        assert!(verdict.allowed.is_all());
        assert!(!verdict.is_blocking());
    }

    #[test]
    fn subnet_without_acl_allows_nothing() {
        let (config, a, _, b) = two_subnets(Vec::new());
        let layer = &config.layers()[0];
        let verdict = layer.evaluate(&config, config.node(a), config.node(b), Direction::Ingress, None);
        assert!(verdict.applicable);
        assert!(verdict.allowed.is_empty());
        assert!(verdict.filters.is_empty());
    }
}
