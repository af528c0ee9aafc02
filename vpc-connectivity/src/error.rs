use netset_core::NetsetError;
use thiserror::Error;

use crate::filters::FilterLayerKind;

/// Errors raised by the analysis engine.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AnalysisError {
    /// Malformed CIDR, port or ICMP range, or unknown protocol.
    #[error("invalid input: {0}")]
    InvalidInput(String),
    /// The configuration has no filter layer of the requested kind.
    #[error("configuration has no {0} layer")]
    UnknownLayer(FilterLayerKind),
    /// Explanation requested on a composite cross-VPC configuration.
    #[error("explanation is not supported across VPCs: {0}")]
    CrossVpcUnsupported(String),
    /// Both explained endpoints resolved to external addresses.
    #[error("source '{src}' and destination '{dst}' are both external")]
    ExternalBoth { src: String, dst: String },
    /// No resource matches the given name, UID or address.
    #[error("no endpoint matches '{0}'")]
    UnresolvedEndpoint(String),
    /// A name matches several resources; use the UID instead.
    #[error("name '{0}' matches more than one resource; use its UID")]
    AmbiguousName(String),
    /// A post-condition failed while composing a connection.
    #[error("internal inconsistency: {0}")]
    InternalInconsistency(String),
}

impl From<NetsetError> for AnalysisError {
    fn from(err: NetsetError) -> Self {
        match err {
            NetsetError::InvalidInput(msg) => Self::InvalidInput(msg),
            NetsetError::InternalInconsistency(msg) => Self::InternalInconsistency(msg),
        }
    }
}
