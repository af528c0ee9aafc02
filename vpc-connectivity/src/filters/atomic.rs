//! Atomic cubes and redundant-rule detection.
//!
//! The source and destination blocks named by a rule table are split into
//! their disjoint partitions. Every `(src, dst)` pair of atoms is a cube on
//! which each rule either fully applies or does not apply at all, so rule
//! interactions can be checked cube by cube on transport sets.

use std::collections::BTreeMap;

use netset_core::{IpBlock, TransportSet};

use super::{Direction, Rule};

/// One pair of atoms and the transport each covering rule contributes there.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AtomicCube {
    pub src: IpBlock,
    pub dst: IpBlock,
    /// `(rule position, transport)` in rule order.
    pub contributions: Vec<(usize, TransportSet)>,
}

/// Build the atomic cubes of the rules of one direction.
///
/// Rule positions refer to `rules`.
pub fn atomic_cubes(rules: &[Rule], direction: Direction) -> Vec<AtomicCube> {
    let selected: Vec<(usize, &Rule)> = rules
        .iter()
        .enumerate()
        .filter(|(_, r)| r.direction == direction)
        .collect();
    let srcs = IpBlock::disjoint_partition(
        &selected.iter().map(|(_, r)| r.src.clone()).collect::<Vec<_>>(),
    );
    let dsts = IpBlock::disjoint_partition(
        &selected.iter().map(|(_, r)| r.dst.clone()).collect::<Vec<_>>(),
    );

    let mut cubes: BTreeMap<(usize, usize), Vec<(usize, TransportSet)>> = BTreeMap::new();
    for (pos, rule) in &selected {
        for (si, _) in srcs.iter().enumerate().filter(|(_, s)| s.contained_in(&rule.src)) {
            for (di, _) in dsts.iter().enumerate().filter(|(_, d)| d.contained_in(&rule.dst)) {
                cubes
                    .entry((si, di))
                    .or_default()
                    .push((*pos, rule.transport.clone()));
            }
        }
    }
    cubes
        .into_iter()
        .map(|((si, di), contributions)| AtomicCube {
            src: srcs[si].clone(),
            dst: dsts[di].clone(),
            contributions,
        })
        .collect()
}

/// Positions in `rules` of rules that never change a decision.
///
/// With `ordered` (ACLs) a rule is redundant when, on every cube it covers,
/// higher-priority rules already decide its whole transport set. Without it
/// (security groups) the other rules of the table are considered instead,
/// checked from last to first; a rule already found redundant no longer
/// counts as cover, so of two equal rules only the later one is reported.
pub fn redundant_rules(rules: &[Rule], ordered: bool) -> Vec<usize> {
    let mut redundant = Vec::new();
    for direction in [Direction::Ingress, Direction::Egress] {
        let cubes = atomic_cubes(rules, direction);
        let mut positions: Vec<usize> = rules
            .iter()
            .enumerate()
            .filter(|(_, r)| r.direction == direction)
            .map(|(pos, _)| pos)
            .collect();
        if !ordered {
            positions.reverse();
        }
        let mut found: Vec<usize> = Vec::new();
        for pos in positions {
            let covered_everywhere = cubes
                .iter()
                .filter_map(|cube| {
                    let own = cube.contributions.iter().find(|(p, _)| *p == pos)?;
                    Some((cube, &own.1))
                })
                .all(|(cube, own)| {
                    let cover = cube
                        .contributions
                        .iter()
                        .filter(|(other, _)| {
                            *other != pos
                                && !found.contains(other)
                                && (!ordered || *other < pos)
                        })
                        .fold(TransportSet::none(), |acc, (_, t)| acc.union(t));
                    cover.contains(own)
                });
            if covered_everywhere {
                found.push(pos);
            }
        }
        redundant.extend(found);
    }
    redundant.sort_unstable();
    redundant
}

#[cfg(test)]
mod tests {
    use netset_core::{IpBlock, Protocol, TransportSet};

    use super::{atomic_cubes, redundant_rules};
    use crate::filters::{Action, Direction, Rule};

    fn rule(index: usize, action: Action, src: &str, dst: &str, transport: TransportSet) -> Rule {
        Rule {
            filter_index: 0,
            index,
            direction: Direction::Egress,
            action,
            src: IpBlock::from_cidr(src).unwrap(),
            dst: IpBlock::from_cidr(dst).unwrap(),
            transport,
            description: String::new(),
        }
    }

    #[test]
    fn cubes_split_overlapping_blocks() {
        let rules = vec![
            rule(0, Action::Allow, "10.0.0.0/16", "0.0.0.0/0", TransportSet::all()),
            rule(1, Action::Allow, "10.0.1.0/24", "0.0.0.0/0", TransportSet::all()),
        ];
        let cubes = atomic_cubes(&rules, Direction::Egress);
        assert_eq!(cubes.len(), 2);
        let inner = cubes
            .iter()
            .find(|c| c.src == IpBlock::from_cidr("10.0.1.0/24").unwrap())
            .expect("inner cube");
        assert_eq!(inner.contributions.len(), 2);
    }

    #[test]
    fn narrower_rule_after_wider_is_redundant() {
        let ssh = TransportSet::tcp_udp(Protocol::Tcp, 1..=65535, 22..=22).unwrap();
        let rules = vec![
            rule(0, Action::Allow, "10.0.0.0/16", "0.0.0.0/0", TransportSet::all()),
            rule(1, Action::Deny, "10.0.1.0/24", "0.0.0.0/0", ssh.clone()),
            rule(2, Action::Allow, "10.0.0.0/8", "0.0.0.0/0", ssh),
        ];
        assert_eq!(redundant_rules(&rules, true), vec![1]);
    }

    #[test]
    fn duplicate_unordered_rules_report_one() {
        let rules = vec![
            rule(0, Action::Allow, "10.0.0.0/16", "0.0.0.0/0", TransportSet::all()),
            rule(1, Action::Allow, "10.0.0.0/16", "0.0.0.0/0", TransportSet::all()),
        ];
        assert_eq!(redundant_rules(&rules, false), vec![1]);
    }
}
