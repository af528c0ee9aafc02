//! Transport sets: subsets of `{TCP, UDP} × src-ports × dst-ports` plus
//! `ICMP × types × codes`.

use std::fmt::{self, Display, Formatter};
use std::ops::RangeInclusive;
use std::str::FromStr;

use serde::Serialize;

use crate::error::NetsetError;
use crate::interval::IntervalSet;
use crate::rect::RectSet;

pub const MIN_PORT: u32 = 1;
pub const MAX_PORT: u32 = 65535;
pub const MIN_ICMP: u32 = 0;
pub const MAX_ICMP: u32 = 255;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Protocol {
    Tcp,
    Udp,
    Icmp,
}

impl FromStr for Protocol {
    type Err = NetsetError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "tcp" => Ok(Self::Tcp),
            "udp" => Ok(Self::Udp),
            "icmp" => Ok(Self::Icmp),
            other => Err(NetsetError::InvalidInput(format!(
                "unknown protocol '{other}'"
            ))),
        }
    }
}

impl Display for Protocol {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Tcp => "TCP",
            Self::Udp => "UDP",
            Self::Icmp => "ICMP",
        };
        write!(f, "{name}")
    }
}

/// Parse `"80"` or `"1000-2000"` into an inclusive range.
pub fn parse_range(value: &str) -> Result<RangeInclusive<u32>, NetsetError> {
    let bad = || NetsetError::InvalidInput(format!("malformed range '{value}'"));
    let value = value.trim();
    let (lo, hi) = match value.split_once('-') {
        Some((lo, hi)) => (lo.trim(), hi.trim()),
        None => (value, value),
    };
    let lo: u32 = lo.parse().map_err(|_| bad())?;
    let hi: u32 = hi.parse().map_err(|_| bad())?;
    Ok(lo..=hi)
}

fn ports() -> IntervalSet {
    IntervalSet::from_range(MIN_PORT, MAX_PORT)
}

fn icmp_values() -> IntervalSet {
    IntervalSet::from_range(MIN_ICMP, MAX_ICMP)
}

fn checked(
    range: &RangeInclusive<u32>,
    min: u32,
    max: u32,
    what: &str,
) -> Result<IntervalSet, NetsetError> {
    let (lo, hi) = (*range.start(), *range.end());
    if lo > hi || lo < min || hi > max {
        return Err(NetsetError::InvalidInput(format!(
            "{what} range {lo}-{hi} outside {min}-{max}"
        )));
    }
    Ok(IntervalSet::from_range(lo, hi))
}

/// A canonical set of transport-layer flows.
#[derive(Debug, Clone, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct TransportSet {
    tcp: RectSet,
    udp: RectSet,
    icmp: RectSet,
}

impl TransportSet {
    /// The empty set.
    pub fn none() -> Self {
        Self::default()
    }

    /// The whole universe.
    pub fn all() -> Self {
        Self {
            tcp: RectSet::product(ports(), ports()),
            udp: RectSet::product(ports(), ports()),
            icmp: RectSet::product(icmp_values(), icmp_values()),
        }
    }

    /// Every TCP flow, both port ranges full.
    pub fn all_tcp() -> Self {
        Self {
            tcp: RectSet::product(ports(), ports()),
            ..Self::none()
        }
    }

    /// The full slab of one protocol.
    pub fn protocol(protocol: Protocol) -> Self {
        match protocol {
            Protocol::Icmp => Self {
                icmp: RectSet::product(icmp_values(), icmp_values()),
                ..Self::none()
            },
            Protocol::Tcp | Protocol::Udp => Self::slab(protocol, ports(), ports()),
        }
    }

    /// TCP or UDP flows with the given source and destination ports.
    pub fn tcp_udp(
        protocol: Protocol,
        src_ports: RangeInclusive<u32>,
        dst_ports: RangeInclusive<u32>,
    ) -> Result<Self, NetsetError> {
        if protocol == Protocol::Icmp {
            return Err(NetsetError::InvalidInput(
                "ICMP has no ports; use an ICMP type/code range".to_string(),
            ));
        }
        let src = checked(&src_ports, MIN_PORT, MAX_PORT, "port")?;
        let dst = checked(&dst_ports, MIN_PORT, MAX_PORT, "port")?;
        Ok(Self::slab(protocol, src, dst))
    }

    /// ICMP flows with the given type and code ranges.
    pub fn icmp(
        types: RangeInclusive<u32>,
        codes: RangeInclusive<u32>,
    ) -> Result<Self, NetsetError> {
        let types = checked(&types, MIN_ICMP, MAX_ICMP, "ICMP type")?;
        let codes = checked(&codes, MIN_ICMP, MAX_ICMP, "ICMP code")?;
        Ok(Self {
            icmp: RectSet::product(types, codes),
            ..Self::none()
        })
    }

    fn slab(protocol: Protocol, src: IntervalSet, dst: IntervalSet) -> Self {
        let rect = RectSet::product(src, dst);
        match protocol {
            Protocol::Tcp => Self {
                tcp: rect,
                ..Self::none()
            },
            Protocol::Udp => Self {
                udp: rect,
                ..Self::none()
            },
            Protocol::Icmp => Self {
                icmp: rect,
                ..Self::none()
            },
        }
    }

    pub fn is_empty(&self) -> bool {
        self.tcp.is_empty() && self.udp.is_empty() && self.icmp.is_empty()
    }

    pub fn is_all(&self) -> bool {
        *self == Self::all()
    }

    pub fn union(&self, other: &Self) -> Self {
        Self {
            tcp: self.tcp.union(&other.tcp),
            udp: self.udp.union(&other.udp),
            icmp: self.icmp.union(&other.icmp),
        }
    }

    pub fn intersect(&self, other: &Self) -> Self {
        Self {
            tcp: self.tcp.intersect(&other.tcp),
            udp: self.udp.intersect(&other.udp),
            icmp: self.icmp.intersect(&other.icmp),
        }
    }

    pub fn subtract(&self, other: &Self) -> Self {
        Self {
            tcp: self.tcp.subtract(&other.tcp),
            udp: self.udp.subtract(&other.udp),
            icmp: self.icmp.subtract(&other.icmp),
        }
    }

    /// Complement within the universe.
    pub fn complement(&self) -> Self {
        Self::all().subtract(self)
    }

    /// `true` when `other` is a subset of `self`.
    pub fn contains(&self, other: &Self) -> bool {
        other.subtract(self).is_empty()
    }

    /// Exchange source and destination ports of the TCP and UDP slabs.
    pub fn swap_ports(&self) -> Self {
        Self {
            tcp: self.tcp.transpose(),
            udp: self.udp.transpose(),
            icmp: self.icmp.clone(),
        }
    }

    /// The TCP portion.
    pub fn tcp_part(&self) -> Self {
        Self {
            tcp: self.tcp.clone(),
            ..Self::none()
        }
    }

    /// Everything except TCP.
    pub fn non_tcp_part(&self) -> Self {
        Self {
            tcp: RectSet::new(),
            ..self.clone()
        }
    }

    /// Structured description, one item per canonical rectangle.
    ///
    /// TCP and UDP items with identical port sets are merged.
    pub fn items(&self) -> Vec<ConnItem> {
        let full_ports = ports();
        let full_icmp = icmp_values();
        let describe = |set: &IntervalSet, full: &IntervalSet| {
            (set != full).then(|| set.to_string())
        };

        let mut items: Vec<ConnItem> = Vec::new();
        for (protocol, slab) in [(Protocol::Tcp, &self.tcp), (Protocol::Udp, &self.udp)] {
            for (src, dst) in slab.entries() {
                let src_ports = describe(src, &full_ports);
                let dst_ports = describe(dst, &full_ports);
                if let Some(existing) = items.iter_mut().find(|i| {
                    i.src_ports == src_ports
                        && i.dst_ports == dst_ports
                        && !i.protocols.contains(&protocol)
                }) {
                    existing.protocols.push(protocol);
                    continue;
                }
                items.push(ConnItem {
                    protocols: vec![protocol],
                    src_ports,
                    dst_ports,
                    icmp_type: None,
                    icmp_code: None,
                });
            }
        }
        for (types, codes) in self.icmp.entries() {
            items.push(ConnItem {
                protocols: vec![Protocol::Icmp],
                src_ports: None,
                dst_ports: None,
                icmp_type: describe(types, &full_icmp),
                icmp_code: describe(codes, &full_icmp),
            });
        }
        items
    }
}

impl Display for TransportSet {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        if self.is_empty() {
            return write!(f, "No Connections");
        }
        if self.is_all() {
            return write!(f, "All Connections");
        }
        let parts: Vec<String> = self.items().iter().map(ToString::to_string).collect();
        write!(f, "{}", parts.join("; "))
    }
}

/// One human-readable component of a [`TransportSet`].
///
/// Absent fields mean the full range.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ConnItem {
    pub protocols: Vec<Protocol>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub src_ports: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub dst_ports: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub icmp_type: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub icmp_code: Option<String>,
}

impl Display for ConnItem {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        let protocols: Vec<String> = self.protocols.iter().map(ToString::to_string).collect();
        write!(f, "protocol: {}", protocols.join(","))?;
        if let Some(src) = &self.src_ports {
            write!(f, " src-ports: {src}")?;
        }
        if let Some(dst) = &self.dst_ports {
            write!(f, " dst-ports: {dst}")?;
        }
        if let Some(icmp_type) = &self.icmp_type {
            write!(f, " icmp-type: {icmp_type}")?;
        }
        if let Some(icmp_code) = &self.icmp_code {
            write!(f, " icmp-code: {icmp_code}")?;
        }
        Ok(())
    }
}
