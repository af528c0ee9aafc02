use netset_core::{Protocol, TransportSet};
use pretty_assertions::assert_eq;

fn samples() -> Vec<TransportSet> {
    let tcp_web = TransportSet::tcp_udp(Protocol::Tcp, 1..=65535, 80..=443).unwrap();
    let tcp_odd = TransportSet::tcp_udp(Protocol::Tcp, 10..=100, 443..=443).unwrap();
    let udp_dns = TransportSet::tcp_udp(Protocol::Udp, 1024..=65535, 53..=53).unwrap();
    let ping = TransportSet::icmp(8..=8, 0..=0).unwrap();
    vec![
        TransportSet::none(),
        TransportSet::all(),
        tcp_web.clone(),
        tcp_web.union(&tcp_odd),
        udp_dns.union(&ping),
        TransportSet::all().subtract(&tcp_odd),
    ]
}

#[test]
fn double_complement_is_identity() {
    for t in samples() {
        assert_eq!(t.complement().complement(), t);
    }
}

#[test]
fn de_morgan_holds() {
    let s = samples();
    for a in &s {
        for b in &s {
            assert_eq!(
                a.union(b).complement(),
                a.complement().intersect(&b.complement())
            );
        }
    }
}

#[test]
fn swap_is_an_involution_and_keeps_icmp() {
    for t in samples() {
        assert_eq!(t.swap_ports().swap_ports(), t);
    }
    let ping = TransportSet::icmp(0..=255, 3..=4).unwrap();
    assert_eq!(ping.swap_ports(), ping);
    let tcp = TransportSet::tcp_udp(Protocol::Tcp, 10..=100, 443..=443).unwrap();
    let swapped = TransportSet::tcp_udp(Protocol::Tcp, 443..=443, 10..=100).unwrap();
    assert_eq!(tcp.swap_ports(), swapped);
}

#[test]
fn subtraction_and_containment_agree() {
    let all = TransportSet::all();
    for t in samples() {
        let rest = all.subtract(&t);
        assert!(all.contains(&t));
        assert!(rest.intersect(&t).is_empty());
        assert_eq!(rest.union(&t), all);
    }
}

#[test]
fn protocol_slabs_partition_the_universe() {
    let slabs = TransportSet::protocol(Protocol::Tcp)
        .union(&TransportSet::protocol(Protocol::Udp))
        .union(&TransportSet::protocol(Protocol::Icmp));
    assert!(slabs.is_all());
    assert_eq!(TransportSet::protocol(Protocol::Tcp), TransportSet::all_tcp());
}
