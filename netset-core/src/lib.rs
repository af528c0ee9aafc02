//! Exact set algebra for static network-connectivity analysis.
//!
//! - [`ipblock`] — unions of IPv4 ranges with CIDR conversion and disjoint
//!   partitioning
//! - [`transport`] — TCP/UDP port rectangles and ICMP type/code rectangles
//! - [`detailed`] — allowed sets split by TCP responsiveness
//!
//! All values are canonical after every operation, so `==` is set equality.

pub mod detailed;
pub mod error;
pub mod interval;
pub mod ipblock;
pub mod rect;
pub mod transport;

pub use detailed::DetailedConn;
pub use error::NetsetError;
pub use interval::{Interval, IntervalSet};
pub use ipblock::IpBlock;
pub use transport::{parse_range, ConnItem, Protocol, TransportSet};
