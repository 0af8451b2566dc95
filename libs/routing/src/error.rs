//! Routing error types

use thiserror::Error;

/// Errors raised by address parsing and the binding registry
///
/// A binding that is not found is not an error: removal and lookup report
/// it as `None`.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum RoutingError {
    #[error("Invalid address pattern: address must not be empty")]
    InvalidAddressPattern,

    #[error("Duplicate binding '{name}'{}", pending_suffix(.pending_delete))]
    DuplicateBinding { name: String, pending_delete: bool },

    #[error("Transaction error: {0}")]
    Transaction(#[from] TransactionError),
}

impl RoutingError {
    pub fn duplicate_binding(name: impl Into<String>, pending_delete: bool) -> Self {
        Self::DuplicateBinding {
            name: name.into(),
            pending_delete,
        }
    }
}

/// Outcome recorded once a transaction has been resolved
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TransactionOutcome {
    Committed,
    RolledBack,
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum TransactionError {
    #[error("Transaction {id} was already {outcome:?}")]
    AlreadyResolved { id: u64, outcome: TransactionOutcome },
}

fn pending_suffix(pending_delete: &bool) -> &'static str {
    if *pending_delete {
        " (removal pending in an open transaction)"
    } else {
        ""
    }
}

pub type RoutingResult<T> = Result<T, RoutingError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_duplicate_message_mentions_pending_state() {
        let plain = RoutingError::duplicate_binding("Q1", false).to_string();
        let pending = RoutingError::duplicate_binding("Q1", true).to_string();
        assert_eq!(plain, "Duplicate binding 'Q1'");
        assert!(pending.contains("pending"));
    }

    #[test]
    fn test_transaction_error_converts() {
        let err: RoutingError = TransactionError::AlreadyResolved {
            id: 7,
            outcome: TransactionOutcome::Committed,
        }
        .into();
        assert!(matches!(err, RoutingError::Transaction(_)));
        assert!(err.to_string().contains("Committed"));
    }
}
