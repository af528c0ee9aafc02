use netset_core::{DetailedConn, IpBlock, Protocol, TransportSet};
use pretty_assertions::assert_eq;
use serde_json::{json, Value};
use vpc_connectivity::abstraction::abstract_node_set;
use vpc_connectivity::compose::{analyze_endpoints, pair_record, ConnectivityMap};
use vpc_connectivity::diff::{diff_configs, DiffKind, DiffType, EndpointKey};
use vpc_connectivity::explain::explain;
use vpc_connectivity::filters::{
    Action, Direction, Filter, FilterLayerKind, NetworkAclLayer, Rule, SecurityGroupLayer,
};
use vpc_connectivity::format::{grouped_lines, render_text, STATEFUL_FOOTNOTE};
use vpc_connectivity::grouping::{group_connectivity, GroupingOptions};
use vpc_connectivity::loader::{build_configs, ConfigDocument};
use vpc_connectivity::model::{
    ConfigBuilder, EndpointRef, NodeId, NodeSetId, ResourceInfo, ResourceKind, VpcConfig,
};
use vpc_connectivity::routers::PublicGateway;
use vpc_connectivity::settings::{default_settings, AnalysisLevel};
use vpc_connectivity::AnalysisError;

fn public() -> IpBlock {
    default_settings().public_internet().expect("public internet")
}

fn cidr(value: &str) -> IpBlock {
    IpBlock::from_cidr(value).unwrap()
}

fn tcp(src: std::ops::RangeInclusive<u32>, dst: std::ops::RangeInclusive<u32>) -> TransportSet {
    TransportSet::tcp_udp(Protocol::Tcp, src, dst).unwrap()
}

/// One subnet with the given VSIs and one public destination.
struct Externals {
    config: VpcConfig,
    vsis: Vec<NodeId>,
    wide: NodeId,
}

fn with_externals(vsis: &[&str], wide: &str) -> Externals {
    let mut builder = ConfigBuilder::new("vpc", "vpc", public());
    let subnet = builder.add_subnet(
        ResourceInfo::new("subnet", "subnet", ResourceKind::Subnet),
        cidr("10.240.1.0/24"),
    );
    let ids = vsis
        .iter()
        .enumerate()
        .map(|(idx, name)| {
            builder.add_interface(
                ResourceInfo::new(*name, *name, ResourceKind::NetworkInterface),
                format!("10.240.1.{}", idx + 4).parse().unwrap(),
                subnet,
                None,
            )
        })
        .collect();
    let wide = builder.add_external(cidr(wide));
    Externals {
        config: builder.build(),
        vsis: ids,
        wide,
    }
}

fn edge(src: NodeId, dst: NodeId) -> (EndpointRef, EndpointRef) {
    (EndpointRef::Node(src), EndpointRef::Node(dst))
}

fn grouped_text(config: &VpcConfig, map: &ConnectivityMap) -> String {
    let options = GroupingOptions {
        group_internal: true,
        graphical: false,
    };
    render_text(&grouped_lines(config, &group_connectivity(config, map, options)))
}

/// One VPC with one subnet behind a public gateway. Every VSI gets the same
/// security group, whose egress rules reach `egress` remotes; `acl_rules`
/// are the rules of the subnet's ACL.
fn gateway_document(vsis: &[&str], egress: &[&str], acl_rules: Value) -> ConfigDocument {
    let instances: Vec<Value> = vsis
        .iter()
        .enumerate()
        .map(|(idx, name)| {
            json!({
                "uid": format!("{name}-id"),
                "name": name,
                "interfaces": [{
                    "uid": format!("{name}-eth0"),
                    "name": "eth0",
                    "subnet": "subnet-1",
                    "address": format!("10.240.1.{}", idx + 4),
                    "security_groups": ["sg-1"]
                }]
            })
        })
        .collect();
    let sg_rules: Vec<Value> = egress
        .iter()
        .map(|remote| json!({"direction": "egress", "remote": remote}))
        .collect();
    serde_json::from_value(json!({
        "vpcs": [{"uid": "vpc-1", "name": "vpc", "address_prefixes": ["10.240.0.0/16"]}],
        "subnets": [{"uid": "subnet-1", "name": "subnet1", "vpc": "vpc-1", "cidr": "10.240.1.0/24"}],
        "instances": instances,
        "security_groups": [{"uid": "sg-1", "name": "sg1", "vpc": "vpc-1", "rules": sg_rules}],
        "network_acls": [{
            "uid": "acl-1",
            "name": "acl1",
            "vpc": "vpc-1",
            "subnets": ["subnet-1"],
            "rules": acl_rules
        }],
        "public_gateways": [{"uid": "pgw-1", "name": "pgw1", "vpc": "vpc-1", "subnets": ["subnet-1"]}]
    }))
    .expect("document")
}

fn allow_all_acl() -> Value {
    json!([
        {"action": "allow", "direction": "egress", "source": "0.0.0.0/0", "destination": "0.0.0.0/0"},
        {"action": "allow", "direction": "ingress", "source": "0.0.0.0/0", "destination": "0.0.0.0/0"}
    ])
}

fn load_vpc(doc: &ConfigDocument) -> VpcConfig {
    let mut multi = build_configs(doc, &public()).expect("build");
    multi.configs.remove("vpc-1").expect("vpc-1")
}

fn node_named(config: &VpcConfig, name: &str) -> NodeId {
    config
        .node_ids()
        .find(|id| config.node(*id).display_name() == name)
        .unwrap_or_else(|| panic!("no node named {name}"))
}

#[test]
fn two_external_destinations_group_into_one_line() {
    let doc = gateway_document(&["vsi1"], &["1.2.0.0/22", "8.8.8.8/32"], allow_all_acl());
    let config = load_vpc(&doc);
    let map = analyze_endpoints(&config).unwrap();

    let vsi1 = node_named(&config, "vsi1[10.240.1.4]");
    let wide = node_named(&config, "Public Internet 1.2.0.0/22");
    let dns = node_named(&config, "Public Internet 8.8.8.8/32");
    let expected: ConnectivityMap = [
        (edge(vsi1, wide), DetailedConn::all_responsive()),
        (edge(vsi1, dns), DetailedConn::all_responsive()),
    ]
    .into_iter()
    .collect();
    assert_eq!(map, expected);
    assert_eq!(
        grouped_text(&config, &map),
        "vsi1[10.240.1.4] => Public Internet 1.2.0.0/22, 8.8.8.8/32 : All Connections"
    );
}

#[test]
fn vsis_of_one_subnet_group_together() {
    let doc = gateway_document(
        &["vsi1", "vsi2"],
        &["1.2.0.0/22", "8.8.8.8/32"],
        allow_all_acl(),
    );
    let config = load_vpc(&doc);
    let map = analyze_endpoints(&config).unwrap();

    // the security group allows no traffic between the two VSIs
    assert_eq!(map.len(), 4);
    assert!(map.keys().all(|(_, dst)| config.is_external(*dst)));
    assert_eq!(
        grouped_text(&config, &map),
        "vsi1[10.240.1.4], vsi2[10.240.1.5] => Public Internet 1.2.0.0/22, 8.8.8.8/32 : All Connections"
    );
}

#[test]
fn non_responsive_connection_is_marked() {
    let acl = json!([
        {"action": "allow", "direction": "egress", "source": "0.0.0.0/0", "destination": "0.0.0.0/0"},
        {"action": "deny", "direction": "ingress", "source": "8.8.8.8/32",
         "destination": "10.240.1.5/32", "protocol": "tcp"},
        {"action": "allow", "direction": "ingress", "source": "0.0.0.0/0", "destination": "0.0.0.0/0"}
    ]);
    let doc = gateway_document(&["vsi1", "vsi2"], &["1.2.0.0/22", "8.8.8.8/32"], acl);
    let config = load_vpc(&doc);
    let map = analyze_endpoints(&config).unwrap();

    let vsi2 = node_named(&config, "vsi2[10.240.1.5]");
    let dns = node_named(&config, "Public Internet 8.8.8.8/32");
    let to_dns = &map[&edge(vsi2, dns)];
    assert!(to_dns.all().is_all());
    assert!(to_dns.tcp_responsive().is_empty());

    let text = grouped_text(&config, &map);
    let lines: Vec<&str> = text.lines().filter(|l| l.contains("=>")).collect();
    assert_eq!(
        lines,
        vec![
            "vsi1[10.240.1.4] => Public Internet 1.2.0.0/22, 8.8.8.8/32 : All Connections",
            "vsi2[10.240.1.5] => Public Internet 1.2.0.0/22 : All Connections",
            "vsi2[10.240.1.5] => Public Internet 8.8.8.8/32 : protocol: UDP; protocol: ICMP; protocol: TCP *",
        ]
    );
    assert!(text.ends_with(STATEFUL_FOOTNOTE));
}

#[test]
fn overlapping_externals_are_partitioned() {
    let doc = gateway_document(&["vsi1"], &["1.2.3.0/30", "1.2.3.0/24"], allow_all_acl());
    let config = load_vpc(&doc);
    let map = analyze_endpoints(&config).unwrap();

    let vsi1 = node_named(&config, "vsi1[10.240.1.4]");
    let narrow = node_named(&config, "Public Internet 1.2.3.0/30");
    assert_eq!(map.len(), 2);
    assert_eq!(map.get(&edge(vsi1, narrow)), Some(&DetailedConn::all_responsive()));
    assert_eq!(
        grouped_text(&config, &map),
        "vsi1[10.240.1.4] => Public Internet 1.2.3.0/24 : All Connections"
    );
}

#[test]
fn gateway_without_network_acl_layer_is_rejected() {
    let mut builder = ConfigBuilder::new("vpc", "vpc", public());
    let subnet = builder.add_subnet(
        ResourceInfo::new("subnet", "subnet", ResourceKind::Subnet),
        cidr("10.240.1.0/24"),
    );
    let vsi = builder.add_interface(
        ResourceInfo::new("vsi1", "vsi1", ResourceKind::NetworkInterface),
        "10.240.1.4".parse().unwrap(),
        subnet,
        None,
    );
    let ext = builder.add_external(cidr("1.2.3.0/24"));
    builder.add_layer(Box::new(SecurityGroupLayer::new(Vec::new())));
    builder.add_router(Box::new(PublicGateway::new(
        ResourceInfo::new("pgw", "pgw", ResourceKind::PublicGateway),
        vec!["subnet".to_string()],
    )));
    let config = builder.build();

    assert_eq!(
        pair_record(&config, vsi, ext, None).unwrap_err(),
        AnalysisError::UnknownLayer(FilterLayerKind::NetworkAcl)
    );
    assert!(analyze_endpoints(&config).is_err());
    assert!(explain(&config, "vsi1", "1.2.3.4", None).is_err());
}

fn subnets(names: &[&str]) -> (VpcConfig, Vec<NodeSetId>) {
    let mut builder = ConfigBuilder::new("vpc", "vpc", public());
    let ids = names
        .iter()
        .map(|name| {
            let idx: u8 = name.trim_start_matches("subnet").parse().unwrap();
            builder.add_subnet(
                ResourceInfo::new(*name, *name, ResourceKind::Subnet),
                cidr(&format!("10.240.{idx}.0/24")),
            )
        })
        .collect();
    (builder.build(), ids)
}

fn subnet_map(edges: &[(NodeSetId, NodeSetId, DetailedConn)]) -> ConnectivityMap {
    edges
        .iter()
        .map(|(s, d, c)| ((EndpointRef::NodeSet(*s), EndpointRef::NodeSet(*d)), c.clone()))
        .collect()
}

#[test]
fn diff_of_two_subnet_topologies() {
    let (c1, s1) = subnets(&["subnet0", "subnet1", "subnet2", "subnet3", "subnet4"]);
    let all = DetailedConn::all_responsive();
    let https = DetailedConn::compute(&tcp(10..=100, 443..=443), &TransportSet::all()).unwrap();
    let m1 = subnet_map(&[
        (s1[0], s1[1], all.clone()),
        (s1[1], s1[2], all.clone()),
        (s1[3], s1[1], all.clone()),
        (s1[2], s1[3], all.clone()),
        (s1[3], s1[2], all.clone()),
        (s1[3], s1[4], https),
    ]);
    let (c2, s2) = subnets(&["subnet2", "subnet3", "subnet4", "subnet5"]);
    let m2 = subnet_map(&[
        (s2[1], s2[0], all.clone()),
        (s2[1], s2[2], all.clone()),
        (s2[2], s2[3], all.clone()),
    ]);

    let diff = diff_configs((&c1, &m1), (&c2, &m2), AnalysisLevel::Subnets);
    let key = |name: &str| EndpointKey::Internal(name.to_string());
    let removed: Vec<(EndpointKey, EndpointKey, DiffKind)> = diff
        .removed
        .iter()
        .map(|e| (e.src.clone(), e.dst.clone(), e.kind))
        .collect();
    assert_eq!(
        removed,
        vec![
            (key("subnet0"), key("subnet1"), DiffKind::MissingSrcDst),
            (key("subnet1"), key("subnet2"), DiffKind::MissingSrc),
            (key("subnet2"), key("subnet3"), DiffKind::MissingConnection),
            (key("subnet3"), key("subnet1"), DiffKind::MissingDst),
            (key("subnet3"), key("subnet4"), DiffKind::ChangedConnection),
        ]
    );
    let added: Vec<(EndpointKey, EndpointKey, DiffKind)> = diff
        .added
        .iter()
        .map(|e| (e.src.clone(), e.dst.clone(), e.kind))
        .collect();
    assert_eq!(
        added,
        vec![(key("subnet4"), key("subnet5"), DiffKind::MissingDst)]
    );

    let lines = diff.lines();
    assert_eq!(lines.iter().filter(|l| l.diff_type == DiffType::Removed).count(), 4);
    assert_eq!(lines.iter().filter(|l| l.diff_type == DiffType::Changed).count(), 1);
    assert!(lines.iter().any(|l| l.text
        == "diff-type: added, source: subnet4, destination: subnet5, config1: No Connections, \
            config2: All Connections, subnets-diff-info: subnet5 added"));
    assert!(lines.iter().any(|l| l.text
        == "diff-type: removed, source: subnet0, destination: subnet1, config1: All Connections, \
            config2: No Connections, subnets-diff-info: subnet0 and subnet1 removed"));
}

fn allow_rule(index: usize, direction: Direction, action: Action) -> Rule {
    Rule {
        filter_index: 0,
        index,
        direction,
        action,
        src: IpBlock::all_ipv4(),
        dst: IpBlock::all_ipv4(),
        transport: TransportSet::all(),
        description: format!("{action} all {direction}"),
    }
}

/// `vsi-a` in `subnet-a`, `vsi-b` in `subnet-b`; one security group allows
/// everything for both; `acl-a` holds `egress_a` as its egress rules.
fn two_subnet_config(egress_a: Vec<Rule>) -> (VpcConfig, NodeId, NodeId) {
    let mut builder = ConfigBuilder::new("vpc", "vpc", public());
    let sa = builder.add_subnet(
        ResourceInfo::new("subnet-a", "subnet-a", ResourceKind::Subnet),
        cidr("10.0.1.0/24"),
    );
    let sb = builder.add_subnet(
        ResourceInfo::new("subnet-b", "subnet-b", ResourceKind::Subnet),
        cidr("10.0.2.0/24"),
    );
    let a = builder.add_interface(
        ResourceInfo::new("vsi-a", "vsi-a", ResourceKind::NetworkInterface),
        "10.0.1.4".parse().unwrap(),
        sa,
        None,
    );
    let b = builder.add_interface(
        ResourceInfo::new("vsi-b", "vsi-b", ResourceKind::NetworkInterface),
        "10.0.2.4".parse().unwrap(),
        sb,
        None,
    );
    builder.add_layer(Box::new(SecurityGroupLayer::new(vec![Filter {
        info: ResourceInfo::new("sg", "sg", ResourceKind::SecurityGroup),
        index: 0,
        rules: vec![
            allow_rule(0, Direction::Egress, Action::Allow),
            allow_rule(1, Direction::Ingress, Action::Allow),
        ],
        attached: vec!["vsi-a".to_string(), "vsi-b".to_string()],
    }])));
    let mut rules_a = egress_a;
    rules_a.push(allow_rule(rules_a.len(), Direction::Ingress, Action::Allow));
    builder.add_layer(Box::new(NetworkAclLayer::new(vec![
        Filter {
            info: ResourceInfo::new("acl-a", "acl-a", ResourceKind::NetworkAcl),
            index: 0,
            rules: rules_a,
            attached: vec!["subnet-a".to_string()],
        },
        Filter {
            info: ResourceInfo::new("acl-b", "acl-b", ResourceKind::NetworkAcl),
            index: 1,
            rules: vec![
                allow_rule(0, Direction::Egress, Action::Allow),
                allow_rule(1, Direction::Ingress, Action::Allow),
            ],
            attached: vec!["subnet-b".to_string()],
        },
    ])));
    (builder.build(), a, b)
}

#[test]
fn explanation_names_the_blocking_acl() {
    let (config, _, _) = two_subnet_config(vec![allow_rule(0, Direction::Egress, Action::Deny)]);
    let explanation = explain(&config, "vsi-a", "vsi-b", None).expect("explain");
    assert_eq!(explanation.pairs.len(), 1);
    assert!(!explanation.pairs[0].egress_enabled);
    assert!(explanation.pairs[0].ingress_enabled);

    let text = explanation.render(true).expect("render");
    let lines: Vec<&str> = text.lines().collect();
    assert_eq!(lines[0], "Explaining connectivity from vsi-a to vsi-b");
    assert!(lines.contains(&"No connection; connection blocked by egress"));
    let egress = lines.iter().position(|l| *l == "Egress:").unwrap();
    let ingress = lines.iter().position(|l| *l == "Ingress:").unwrap();
    let egress_section = &lines[egress..ingress];
    assert!(egress_section.contains(&"  security group sg allows"));
    assert!(egress_section.contains(&"  network ACL acl-a denies"));
    assert!(egress_section.contains(&"    rule 0 (deny, effective): deny all outbound"));
}

#[test]
fn widening_a_rule_never_removes_connectivity() {
    let ssh = tcp(1..=65535, 22..=22);
    let narrow = Rule {
        transport: ssh,
        ..allow_rule(0, Direction::Egress, Action::Allow)
    };
    let (before, _, _) = two_subnet_config(vec![narrow]);
    let (after, _, _) = two_subnet_config(vec![allow_rule(0, Direction::Egress, Action::Allow)]);
    let before = analyze_endpoints(&before).unwrap();
    let after = analyze_endpoints(&after).unwrap();

    assert!(!before.is_empty());
    for (pair, conn) in &before {
        let widened = after.get(pair).expect("pair still connected");
        assert!(widened.all().contains(conn.all()));
    }
}

#[test]
fn composition_is_the_intersection_of_layers() {
    let udp = TransportSet::protocol(Protocol::Udp).union(&tcp(1..=65535, 80..=80));
    let rule = Rule {
        transport: udp,
        ..allow_rule(0, Direction::Egress, Action::Allow)
    };
    let (config, a, b) = two_subnet_config(vec![rule]);
    let record = pair_record(&config, a, b, None).unwrap();

    let expected = [FilterLayerKind::SecurityGroup, FilterLayerKind::NetworkAcl]
        .iter()
        .flat_map(|layer| [Direction::Egress, Direction::Ingress].map(|d| (*layer, d)))
        .fold(TransportSet::all(), |acc, (layer, direction)| {
            acc.intersect(&record.verdict(layer, direction).unwrap().allowed)
        });
    assert_eq!(record.conn.all(), &expected);
    assert!(record.conn.is_fully_responsive());
}

#[test]
fn abstraction_reports_what_members_lack() {
    let net = with_externals(&["vsi1", "vsi2"], "1.2.0.0/22");
    let (vsi1, vsi2) = (net.vsis[0], net.vsis[1]);
    let web = DetailedConn::compute(&tcp(1..=65535, 443..=443), &TransportSet::all()).unwrap();
    let mut map = ConnectivityMap::new();
    map.insert(edge(vsi1, net.wide), DetailedConn::all_responsive());
    map.insert(edge(vsi2, net.wide), web.clone());
    map.insert(edge(vsi1, vsi2), DetailedConn::all_responsive());

    let subnet = net.config.node_sets_of_kind(ResourceKind::Subnet)[0];
    let abstraction = abstract_node_set(&net.config, &map, subnet);
    assert!(!abstraction.is_exact());
    let set = EndpointRef::NodeSet(subnet);
    let wide = EndpointRef::Node(net.wide);
    assert_eq!(
        abstraction.connectivity.get(&(set, wide)),
        Some(&DetailedConn::all_responsive())
    );
    assert_eq!(
        abstraction.missing_egress.get(&(EndpointRef::Node(vsi2), wide)),
        Some(&DetailedConn::all_responsive().subtract(&web))
    );
    assert!(!abstraction
        .missing_egress
        .contains_key(&(EndpointRef::Node(vsi1), wide)));
    assert_eq!(
        abstraction.missing_within.get(&(EndpointRef::Node(vsi2), EndpointRef::Node(vsi1))),
        Some(&DetailedConn::all_responsive())
    );
}
