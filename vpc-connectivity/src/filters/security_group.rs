use netset_core::TransportSet;

use super::{
    local_side, restrict, Direction, Filter, FilterContribution, FilterLayerKind,
    FilterTrafficResource, LayerVerdict, RuleRef, RuleRole,
};
use crate::model::{NamedResource, Node, VpcConfig};

/// Security groups attached to interfaces. Stateful, allow-only.
#[derive(Debug, Clone, Default)]
pub struct SecurityGroupLayer {
    groups: Vec<Filter>,
}

impl SecurityGroupLayer {
    pub fn new(groups: Vec<Filter>) -> Self {
        Self { groups }
    }
}

impl FilterTrafficResource for SecurityGroupLayer {
    fn layer(&self) -> FilterLayerKind {
        FilterLayerKind::SecurityGroup
    }

    fn filters(&self) -> &[Filter] {
        &self.groups
    }

    fn is_stateful(&self) -> bool {
        true
    }

    fn evaluate(
        &self,
        _config: &VpcConfig,
        src: &Node,
        dst: &Node,
        direction: Direction,
        query: Option<&TransportSet>,
    ) -> LayerVerdict {
        let local = local_side(src, dst, direction);
        if !local.is_internal() {
            return LayerVerdict::not_applicable(self.layer(), direction, query);
        }

        let mut allowed = TransportSet::none();
        let mut filters = Vec::new();
        for group in self.groups.iter().filter(|g| g.is_attached_to(local.uid())) {
            let mut rules = Vec::new();
            for rule in &group.rules {
                if !rule.matches(src.cidr(), dst.cidr(), direction) {
                    continue;
                }
                let part = restrict(&rule.transport, query);
                if part.is_empty() {
                    continue;
                }
                allowed = allowed.union(&part);
                rules.push(RuleRef {
                    rule_index: rule.index,
                    action: rule.action,
                    role: RuleRole::Effective,
                });
            }
            if !rules.is_empty() {
                filters.push(FilterContribution {
                    filter_index: group.index,
                    filter_name: group.name().to_string(),
                    rules,
                });
            }
        }

        LayerVerdict {
            layer: self.layer(),
            direction,
            applicable: true,
            allowed,
            filters,
        }
    }
}

#[cfg(test)]
mod tests {
    use netset_core::{IpBlock, Protocol, TransportSet};

    use super::SecurityGroupLayer;
    use crate::filters::{Action, Direction, Filter, FilterTrafficResource, Rule};
    use crate::model::{ConfigBuilder, ResourceInfo, ResourceKind};

    fn rule(index: usize, direction: Direction, remote: &str, transport: TransportSet) -> Rule {
        let remote = IpBlock::from_cidr(remote).unwrap();
        let (src, dst) = match direction {
            Direction::Ingress => (remote, IpBlock::all_ipv4()),
            Direction::Egress => (IpBlock::all_ipv4(), remote),
        };
        Rule {
            filter_index: 0,
            index,
            direction,
            action: Action::Allow,
            src,
            dst,
            transport,
            description: String::new(),
        }
    }

    #[test]
    fn union_of_matching_rules() {
        let mut builder = ConfigBuilder::new("vpc", "vpc", IpBlock::empty());
        let subnet = builder.add_subnet(
            ResourceInfo::new("sub", "sub", ResourceKind::Subnet),
            IpBlock::from_cidr("10.0.0.0/24").unwrap(),
        );
        let a = builder.add_interface(
            ResourceInfo::new("a", "a", ResourceKind::NetworkInterface),
            "10.0.0.4".parse().unwrap(),
            subnet,
            None,
        );
        let b = builder.add_interface(
            ResourceInfo::new("b", "b", ResourceKind::NetworkInterface),
            "10.0.0.5".parse().unwrap(),
            subnet,
            None,
        );
        let ssh = TransportSet::tcp_udp(Protocol::Tcp, 1..=65535, 22..=22).unwrap();
        let dns = TransportSet::tcp_udp(Protocol::Udp, 1..=65535, 53..=53).unwrap();
        let layer = SecurityGroupLayer::new(vec![Filter {
            info: ResourceInfo::new("sg", "sg", ResourceKind::SecurityGroup),
            index: 0,
            rules: vec![
                rule(0, Direction::Egress, "10.0.0.0/24", ssh.clone()),
                rule(1, Direction::Egress, "10.0.0.5/32", dns.clone()),
                rule(2, Direction::Egress, "192.168.0.0/16", TransportSet::all()),
            ],
            attached: vec!["a".to_string()],
        }]);
        let config = builder.build();
        let (a, b) = (config.node(a), config.node(b));

        let verdict = layer.evaluate(&config, a, b, Direction::Egress, None);
        assert_eq!(verdict.allowed, ssh.union(&dns));
        assert_eq!(verdict.allow_rules().len(), 2);

        let unattached = layer.evaluate(&config, b, a, Direction::Egress, None);
        assert!(unattached.applicable);
        assert!(unattached.allowed.is_empty());
        assert!(unattached.is_blocking());

        let queried = layer.evaluate(&config, a, b, Direction::Egress, Some(&dns));
        assert_eq!(queried.allowed, dns);
        assert_eq!(queried.filters[0].rules.len(), 1);
    }
}
