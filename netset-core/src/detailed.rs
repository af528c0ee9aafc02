//! Connections split by TCP responsiveness.

use std::fmt::{self, Display, Formatter};

use serde::{Serialize, Serializer};

use crate::error::NetsetError;
use crate::transport::TransportSet;

/// An allowed transport set together with its TCP-responsive subset.
///
/// Invariants: `tcp_responsive ⊆ all ∩ allTCP`, `non_tcp ⊆ all`,
/// `non_tcp ∩ allTCP = ∅`. The non-responsive TCP part is always derived.
#[derive(Debug, Clone, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct DetailedConn {
    tcp_responsive: TransportSet,
    non_tcp: TransportSet,
    all: TransportSet,
}

impl DetailedConn {
    pub fn empty() -> Self {
        Self::default()
    }

    /// The universe, with every TCP flow responsive.
    pub fn all_responsive() -> Self {
        let all = TransportSet::all();
        Self {
            tcp_responsive: TransportSet::all_tcp(),
            non_tcp: all.non_tcp_part(),
            all,
        }
    }

    /// Build from the responsive TCP subset and the full allowed set.
    pub fn from_tcp_response(
        tcp_responsive: TransportSet,
        all: TransportSet,
    ) -> Result<Self, NetsetError> {
        let conn = Self {
            non_tcp: all.non_tcp_part(),
            tcp_responsive,
            all,
        };
        conn.check_invariants()?;
        Ok(conn)
    }

    /// A pure TCP set, fully responsive.
    pub fn from_responsive_only(tcp: TransportSet) -> Result<Self, NetsetError> {
        Self::from_tcp_response(tcp.clone(), tcp)
    }

    /// Derive responsiveness from the two directions of a pair.
    ///
    /// TCP flows of `src_to_dst` are responsive when the port-swapped reply is
    /// allowed by `dst_to_src`.
    pub fn compute(
        src_to_dst: &TransportSet,
        dst_to_src: &TransportSet,
    ) -> Result<Self, NetsetError> {
        let tcp_fwd = src_to_dst.tcp_part();
        if tcp_fwd.is_empty() {
            return Self::from_tcp_response(TransportSet::none(), src_to_dst.clone());
        }
        let tcp_rev_swapped = dst_to_src.tcp_part().swap_ports();
        Self::from_tcp_response(tcp_fwd.intersect(&tcp_rev_swapped), src_to_dst.clone())
    }

    pub fn check_invariants(&self) -> Result<(), NetsetError> {
        let all_tcp = TransportSet::all_tcp();
        if !self.all.intersect(&all_tcp).contains(&self.tcp_responsive) {
            return Err(NetsetError::InternalInconsistency(
                "responsive TCP set is not within the allowed TCP set".to_string(),
            ));
        }
        if !self.all.contains(&self.non_tcp) || !self.non_tcp.intersect(&all_tcp).is_empty() {
            return Err(NetsetError::InternalInconsistency(
                "non-TCP set is not within the allowed non-TCP set".to_string(),
            ));
        }
        Ok(())
    }

    pub fn all(&self) -> &TransportSet {
        &self.all
    }

    pub fn tcp_responsive(&self) -> &TransportSet {
        &self.tcp_responsive
    }

    pub fn non_tcp(&self) -> &TransportSet {
        &self.non_tcp
    }

    pub fn tcp_non_responsive(&self) -> TransportSet {
        self.all
            .subtract(&self.tcp_responsive.union(&self.non_tcp))
    }

    /// Non-TCP flows plus responsive TCP flows.
    pub fn nontcp_and_responsive_tcp(&self) -> TransportSet {
        self.non_tcp.union(&self.tcp_responsive)
    }

    pub fn is_empty(&self) -> bool {
        self.all.is_empty()
    }

    pub fn is_all(&self) -> bool {
        self.all.is_all() && self.is_fully_responsive()
    }

    pub fn is_fully_responsive(&self) -> bool {
        self.tcp_non_responsive().is_empty()
    }

    pub fn has_tcp_component(&self) -> bool {
        !self.all.tcp_part().is_empty()
    }

    pub fn union(&self, other: &Self) -> Self {
        Self {
            tcp_responsive: self.tcp_responsive.union(&other.tcp_responsive),
            non_tcp: self.non_tcp.union(&other.non_tcp),
            all: self.all.union(&other.all),
        }
    }

    /// Flows of `self` that `other` lacks, responsiveness included.
    ///
    /// A responsive TCP flow of `self` that is only non-responsive in `other`
    /// stays in the result as responsive.
    pub fn subtract(&self, other: &Self) -> Self {
        let tcp_responsive = self.tcp_responsive.subtract(&other.tcp_responsive);
        let non_responsive = self.tcp_non_responsive().subtract(&other.all);
        let non_tcp = self.non_tcp.subtract(&other.non_tcp);
        let all = tcp_responsive.union(&non_responsive).union(&non_tcp);
        Self {
            tcp_responsive,
            non_tcp,
            all,
        }
    }

    /// Restrict every component to `query`.
    pub fn intersect_transport(&self, query: &TransportSet) -> Self {
        Self {
            tcp_responsive: self.tcp_responsive.intersect(query),
            non_tcp: self.non_tcp.intersect(query),
            all: self.all.intersect(query),
        }
    }
}

impl Display for DetailedConn {
    /// Non-responsive TCP flows are suffixed with `*`.
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        let non_responsive = self.tcp_non_responsive();
        if non_responsive.is_empty() {
            return write!(f, "{}", self.all);
        }
        let rest = self.nontcp_and_responsive_tcp();
        if rest.is_empty() {
            write!(f, "{non_responsive} *")
        } else {
            write!(f, "{rest}; {non_responsive} *")
        }
    }
}

impl Serialize for DetailedConn {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_string())
    }
}
