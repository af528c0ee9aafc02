//! Exact set algebra over IPv4 address ranges.
//!
//! An [`IpBlock`] is a finite union of disjoint, maximally merged address
//! ranges. Every constructor and operation returns the canonical form, so two
//! blocks covering the same addresses compare equal.

use std::collections::BTreeMap;
use std::fmt::{self, Display, Formatter};
use std::net::Ipv4Addr;
use std::str::FromStr;

use ipnet::Ipv4Net;
use serde::{Serialize, Serializer};

use crate::error::NetsetError;
use crate::interval::{Interval, IntervalSet};

/// A canonical set of IPv4 addresses.
#[derive(Debug, Clone, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct IpBlock {
    ranges: IntervalSet,
}

impl IpBlock {
    pub fn empty() -> Self {
        Self::default()
    }

    /// The whole IPv4 space, `0.0.0.0/0`.
    pub fn all_ipv4() -> Self {
        Self {
            ranges: IntervalSet::from_range(0, u32::MAX),
        }
    }

    /// Parse a CIDR such as `10.240.0.0/16`. Host bits are ignored.
    pub fn from_cidr(cidr: &str) -> Result<Self, NetsetError> {
        let net = Ipv4Net::from_str(cidr.trim())
            .map_err(|_| NetsetError::InvalidInput(format!("malformed CIDR '{cidr}'")))?;
        Ok(Self::from_net(&net))
    }

    /// Parse either a CIDR or a single address.
    pub fn from_ip_or_cidr(value: &str) -> Result<Self, NetsetError> {
        if value.contains('/') {
            return Self::from_cidr(value);
        }
        let addr = Ipv4Addr::from_str(value.trim())
            .map_err(|_| NetsetError::InvalidInput(format!("malformed address '{value}'")))?;
        Ok(Self::from_address(addr))
    }

    pub fn from_net(net: &Ipv4Net) -> Self {
        let net = net.trunc();
        Self::from_range(net.network(), net.broadcast())
    }

    /// The inclusive range `lo..=hi`; empty when `lo > hi`.
    pub fn from_range(lo: Ipv4Addr, hi: Ipv4Addr) -> Self {
        Self {
            ranges: IntervalSet::from_range(u32::from(lo), u32::from(hi)),
        }
    }

    pub fn from_address(addr: Ipv4Addr) -> Self {
        Self::from_range(addr, addr)
    }

    /// Union of a list of CIDR strings.
    pub fn from_cidr_list<S: AsRef<str>>(cidrs: &[S]) -> Result<Self, NetsetError> {
        let mut out = Self::empty();
        for cidr in cidrs {
            out = out.union(&Self::from_cidr(cidr.as_ref())?);
        }
        Ok(out)
    }

    pub fn from_nets(nets: &[Ipv4Net]) -> Self {
        Self {
            ranges: IntervalSet::from_intervals(nets.iter().map(|net| {
                let net = net.trunc();
                Interval {
                    start: u32::from(net.network()),
                    end: u32::from(net.broadcast()),
                }
            })),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.ranges.is_empty()
    }

    /// The canonical address ranges, as inclusive `(lo, hi)` pairs.
    pub fn ranges(&self) -> Vec<(Ipv4Addr, Ipv4Addr)> {
        self.ranges
            .intervals()
            .iter()
            .map(|i| (Ipv4Addr::from(i.start), Ipv4Addr::from(i.end)))
            .collect()
    }

    /// Number of addresses in the block.
    pub fn size(&self) -> u64 {
        self.ranges.size()
    }

    pub fn contains(&self, addr: Ipv4Addr) -> bool {
        self.ranges.contains(u32::from(addr))
    }

    /// `true` when every address of `self` is in `other`.
    pub fn contained_in(&self, other: &IpBlock) -> bool {
        self.ranges.is_subset(&other.ranges)
    }

    pub fn intersects(&self, other: &IpBlock) -> bool {
        self.ranges.overlaps(&other.ranges)
    }

    pub fn union(&self, other: &IpBlock) -> IpBlock {
        Self {
            ranges: self.ranges.union(&other.ranges),
        }
    }

    pub fn intersect(&self, other: &IpBlock) -> IpBlock {
        Self {
            ranges: self.ranges.intersect(&other.ranges),
        }
    }

    pub fn subtract(&self, other: &IpBlock) -> IpBlock {
        Self {
            ranges: self.ranges.subtract(&other.ranges),
        }
    }

    /// Complement within the whole IPv4 space.
    pub fn complement(&self) -> IpBlock {
        Self::all_ipv4().subtract(self)
    }

    pub fn first_address(&self) -> Option<Ipv4Addr> {
        self.ranges.first().map(Ipv4Addr::from)
    }

    /// Prefix length, defined only when the block is exactly one CIDR.
    pub fn prefix_length(&self) -> Option<u8> {
        match self.to_cidr_list().as_slice() {
            [single] => Some(single.prefix_len()),
            _ => None,
        }
    }

    /// Smallest list of CIDRs whose union is the block, in address order.
    pub fn to_cidr_list(&self) -> Vec<Ipv4Net> {
        let mut out = Vec::new();
        for interval in self.ranges.intervals() {
            out.extend(interval_cidrs(*interval));
        }
        out
    }

    /// Comma-separated CIDR list, e.g. `10.0.0.0/24, 10.0.1.0/25`.
    pub fn to_cidr_string(&self) -> String {
        self.to_cidr_list()
            .iter()
            .map(ToString::to_string)
            .collect::<Vec<_>>()
            .join(", ")
    }

    /// Split a set of blocks into pairwise disjoint pieces.
    ///
    /// The result covers exactly the union of `blocks`, and every piece is
    /// contained in each input block it intersects. Pieces are sorted by their
    /// first address.
    pub fn disjoint_partition(blocks: &[IpBlock]) -> Vec<IpBlock> {
        let mut points: Vec<u64> = blocks
            .iter()
            .flat_map(|b| b.ranges.intervals().iter())
            .flat_map(|i| [u64::from(i.start), u64::from(i.end) + 1])
            .collect();
        points.sort_unstable();
        points.dedup();

        let mut by_signature: BTreeMap<Vec<usize>, Vec<Interval>> = BTreeMap::new();
        for window in points.windows(2) {
            let start = window[0] as u32;
            let signature: Vec<usize> = blocks
                .iter()
                .enumerate()
                .filter(|(_, b)| b.ranges.contains(start))
                .map(|(idx, _)| idx)
                .collect();
            if signature.is_empty() {
                continue;
            }
            by_signature.entry(signature).or_default().push(Interval {
                start,
                end: (window[1] - 1) as u32,
            });
        }

        let mut out: Vec<IpBlock> = by_signature
            .into_values()
            .map(|intervals| IpBlock {
                ranges: IntervalSet::from_intervals(intervals),
            })
            .collect();
        out.sort();
        out
    }
}

fn interval_cidrs(interval: Interval) -> Vec<Ipv4Net> {
    let mut out = Vec::new();
    let mut start = u64::from(interval.start);
    let end = u64::from(interval.end);
    while start <= end {
        let align = if start == 0 {
            32
        } else {
            start.trailing_zeros().min(32)
        };
        let span = end - start + 1;
        let span_bits = 63 - span.leading_zeros();
        let bits = align.min(span_bits);
        if let Ok(net) = Ipv4Net::new(Ipv4Addr::from(start as u32), (32 - bits) as u8) {
            out.push(net);
        }
        start += 1u64 << bits;
    }
    out
}

impl FromStr for IpBlock {
    type Err = NetsetError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_ip_or_cidr(s)
    }
}

impl Display for IpBlock {
    /// Each range prints as a CIDR when it is exactly one, otherwise `lo-hi`.
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        let parts: Vec<String> = self
            .ranges
            .intervals()
            .iter()
            .map(|interval| match interval_cidrs(*interval).as_slice() {
                [single] => single.to_string(),
                _ => format!(
                    "{}-{}",
                    Ipv4Addr::from(interval.start),
                    Ipv4Addr::from(interval.end)
                ),
            })
            .collect();
        write!(f, "{}", parts.join(", "))
    }
}

impl Serialize for IpBlock {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_string())
    }
}
