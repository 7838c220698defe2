use std::fmt;

use paydayd_storage::StoreError;

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum ErrorKind {
    MalformedPayload,
    UnknownAsset,
    UnknownAllocation,
    AuthorizationFailure,
    FieldInvariantViolation,
    SupplyOverflow,
    /// Sender balance would go negative. Recoverable in mempool and miner
    /// modes by leaving the transaction out.
    InsufficientBalance,
    /// External root missing, too old, unconfirmed or mismatching.
    ProofUnavailable,
    ProofMismatch,
    /// Rollback arithmetic went negative.
    InternalConsistency,
    Store,
}

impl ErrorKind {
    pub fn as_str(self) -> &'static str {
        match self {
            ErrorKind::MalformedPayload => "malformed-payload",
            ErrorKind::UnknownAsset => "unknown-asset",
            ErrorKind::UnknownAllocation => "unknown-allocation",
            ErrorKind::AuthorizationFailure => "authorization-failure",
            ErrorKind::FieldInvariantViolation => "field-invariant-violation",
            ErrorKind::SupplyOverflow => "supply-overflow",
            ErrorKind::InsufficientBalance => "insufficient-balance",
            ErrorKind::ProofUnavailable => "proof-unavailable",
            ErrorKind::ProofMismatch => "proof-mismatch",
            ErrorKind::InternalConsistency => "internal-consistency",
            ErrorKind::Store => "store",
        }
    }

    pub fn is_transient(self) -> bool {
        matches!(self, ErrorKind::ProofUnavailable)
    }

    pub fn is_fatal(self) -> bool {
        matches!(self, ErrorKind::InternalConsistency | ErrorKind::Store)
    }

    pub fn is_overflow(self) -> bool {
        matches!(self, ErrorKind::InsufficientBalance)
    }
}

/// Numbered consensus rejection. Codes follow the historical numbering:
/// 1xxx for allocation and mint checks, 2xxx for asset checks.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct ConsensusError {
    pub kind: ErrorKind,
    pub code: u16,
    pub message: String,
}

impl ConsensusError {
    pub fn new(kind: ErrorKind, code: u16, message: impl Into<String>) -> Self {
        Self {
            kind,
            code,
            message: message.into(),
        }
    }

    pub fn malformed(code: u16, message: impl Into<String>) -> Self {
        Self::new(ErrorKind::MalformedPayload, code, message)
    }

    pub fn invariant(code: u16, message: impl Into<String>) -> Self {
        Self::new(ErrorKind::FieldInvariantViolation, code, message)
    }

    pub fn unauthorized(code: u16, message: impl Into<String>) -> Self {
        Self::new(ErrorKind::AuthorizationFailure, code, message)
    }

    pub fn supply(code: u16, message: impl Into<String>) -> Self {
        Self::new(ErrorKind::SupplyOverflow, code, message)
    }

    pub fn inconsistent(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::InternalConsistency, 0, message)
    }
}

impl fmt::Display for ConsensusError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ERRCODE: {} - {}", self.code, self.message)
    }
}

impl std::error::Error for ConsensusError {}

impl From<StoreError> for ConsensusError {
    fn from(err: StoreError) -> Self {
        ConsensusError::new(ErrorKind::Store, 0, err.to_string())
    }
}

/// How the block or mempool driver reports a failed transaction or block.
#[derive(Debug)]
pub enum DriverError {
    /// Consensus-invalid. `conflict` marks a balance overflow, which callers
    /// treat as a transaction conflict instead of a malformed transaction.
    Invalid { error: ConsensusError, conflict: bool },
    /// Retry later; the peer is not at fault.
    Transient(ConsensusError),
    /// Ledger state is no longer trustworthy; stop processing.
    Fatal(ConsensusError),
    Store(StoreError),
}

impl DriverError {
    pub fn from_consensus(error: ConsensusError) -> Self {
        if error.kind.is_transient() {
            DriverError::Transient(error)
        } else if error.kind.is_fatal() {
            DriverError::Fatal(error)
        } else {
            let conflict = error.kind.is_overflow();
            DriverError::Invalid { error, conflict }
        }
    }

    pub fn consensus_error(&self) -> Option<&ConsensusError> {
        match self {
            DriverError::Invalid { error, .. }
            | DriverError::Transient(error)
            | DriverError::Fatal(error) => Some(error),
            DriverError::Store(_) => None,
        }
    }
}

impl fmt::Display for DriverError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DriverError::Invalid { error, conflict } => {
                if *conflict {
                    write!(f, "conflicting transaction: {error}")
                } else {
                    write!(f, "invalid: {error}")
                }
            }
            DriverError::Transient(error) => write!(f, "temporarily unverifiable: {error}"),
            DriverError::Fatal(error) => write!(f, "fatal ledger error: {error}"),
            DriverError::Store(error) => write!(f, "{error}"),
        }
    }
}

impl std::error::Error for DriverError {}

impl From<StoreError> for DriverError {
    fn from(err: StoreError) -> Self {
        DriverError::Store(err)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_carries_code() {
        let error = ConsensusError::invariant(1022, "Cannot send an asset allocation to yourself");
        assert_eq!(
            error.to_string(),
            "ERRCODE: 1022 - Cannot send an asset allocation to yourself"
        );
    }

    #[test]
    fn driver_classification() {
        let transient = ConsensusError::new(ErrorKind::ProofUnavailable, 1001, "missing root");
        assert!(matches!(
            DriverError::from_consensus(transient),
            DriverError::Transient(_)
        ));
        let overflow = ConsensusError::new(ErrorKind::InsufficientBalance, 1021, "low");
        assert!(matches!(
            DriverError::from_consensus(overflow),
            DriverError::Invalid { conflict: true, .. }
        ));
        let broken = ConsensusError::inconsistent("negative balance");
        assert!(matches!(DriverError::from_consensus(broken), DriverError::Fatal(_)));
    }
}
