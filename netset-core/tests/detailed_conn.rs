use netset_core::{DetailedConn, Protocol, TransportSet};
use pretty_assertions::assert_eq;

fn tcp(src: std::ops::RangeInclusive<u32>, dst: std::ops::RangeInclusive<u32>) -> TransportSet {
    TransportSet::tcp_udp(Protocol::Tcp, src, dst).unwrap()
}

#[test]
fn responsive_flows_have_swapped_reply() {
    let forward = tcp(1..=65535, 80..=80)
        .union(&tcp(1..=65535, 22..=22))
        .union(&TransportSet::protocol(Protocol::Udp));
    let reverse = tcp(80..=80, 1000..=2000);

    let conn = DetailedConn::compute(&forward, &reverse).unwrap();
    assert!(conn.check_invariants().is_ok());
    assert_eq!(conn.tcp_responsive(), &tcp(1000..=2000, 80..=80));
    // every responsive (sp, dp) has (dp, sp) in the reverse TCP set
    assert!(reverse
        .tcp_part()
        .contains(&conn.tcp_responsive().swap_ports()));
    assert_eq!(conn.non_tcp(), &TransportSet::protocol(Protocol::Udp));
    assert!(conn.has_tcp_component());
    assert!(!conn.is_fully_responsive());
}

#[test]
fn without_tcp_everything_is_non_tcp() {
    let forward = TransportSet::icmp(8..=8, 0..=0).unwrap();
    let conn = DetailedConn::compute(&forward, &TransportSet::none()).unwrap();
    assert!(conn.is_fully_responsive());
    assert!(!conn.has_tcp_component());
    assert_eq!(conn.to_string(), "protocol: ICMP icmp-type: 8 icmp-code: 0");
}

#[test]
fn union_and_subtract_keep_invariants() {
    let a = DetailedConn::compute(&TransportSet::all(), &tcp(1..=65535, 1..=65535)).unwrap();
    let b = DetailedConn::compute(&tcp(1..=65535, 443..=443), &TransportSet::none()).unwrap();
    for conn in [a.union(&b), a.subtract(&b), b.subtract(&a), b.union(&a)] {
        assert!(conn.check_invariants().is_ok());
    }
    assert_eq!(a.union(&b), b.union(&a));
    assert!(b.subtract(&b).is_empty());
    assert_eq!(DetailedConn::empty().union(&a), a);
}

#[test]
fn responsive_only_is_fully_responsive() {
    let conn = DetailedConn::from_responsive_only(tcp(1..=65535, 22..=22)).unwrap();
    assert!(conn.is_fully_responsive());
    assert_eq!(conn.to_string(), "protocol: TCP dst-ports: 22");
    assert!(DetailedConn::from_responsive_only(TransportSet::protocol(Protocol::Udp)).is_err());
}
