use thiserror::Error;

/// Errors raised by the set algebra.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum NetsetError {
    /// A CIDR, address, port range, ICMP range or protocol name could not be used.
    #[error("invalid input: {0}")]
    InvalidInput(String),
    /// A value invariant was violated after an operation.
    #[error("internal inconsistency: {0}")]
    InternalInconsistency(String),
}
