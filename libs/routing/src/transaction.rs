//! Transaction-scoped compensation list
//!
//! A [`Transaction`] collects [`TransactionOperation`]s registered by the
//! mutations performed under it. Resolving the transaction drains the list
//! exactly once: `commit` confirms each operation in registration order,
//! `rollback` undoes them in reverse order.

use crate::error::{TransactionError, TransactionOutcome};
use parking_lot::Mutex;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use tracing::debug;

pub type TransactionId = u64;

static NEXT_TRANSACTION_ID: AtomicU64 = AtomicU64::new(1);

/// Confirm/undo pair registered by one mutation
pub trait TransactionOperation: Send {
    fn after_commit(self: Box<Self>) {}

    fn after_rollback(self: Box<Self>) {}
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransactionState {
    Active,
    Committed,
    RolledBack,
}

struct TransactionInner {
    state: TransactionState,
    operations: Vec<Box<dyn TransactionOperation>>,
}

pub struct Transaction {
    id: TransactionId,
    inner: Mutex<TransactionInner>,
}

impl Transaction {
    pub fn new() -> Self {
        Self {
            id: NEXT_TRANSACTION_ID.fetch_add(1, Ordering::Relaxed),
            inner: Mutex::new(TransactionInner {
                state: TransactionState::Active,
                operations: Vec::new(),
            }),
        }
    }

    pub fn id(&self) -> TransactionId {
        self.id
    }

    pub fn state(&self) -> TransactionState {
        self.inner.lock().state
    }

    pub fn is_active(&self) -> bool {
        self.state() == TransactionState::Active
    }

    /// `Err` once the transaction has been committed or rolled back
    pub fn check_active(&self) -> Result<(), TransactionError> {
        let state = self.inner.lock().state;
        self.ensure_active(state)
    }

    pub fn operation_count(&self) -> usize {
        self.inner.lock().operations.len()
    }

    /// Register an operation to run when the transaction resolves
    pub fn add_operation(
        &self,
        operation: Box<dyn TransactionOperation>,
    ) -> Result<(), TransactionError> {
        let mut inner = self.inner.lock();
        self.ensure_active(inner.state)?;
        inner.operations.push(operation);
        Ok(())
    }

    pub fn commit(&self) -> Result<(), TransactionError> {
        let operations = self.resolve(TransactionState::Committed)?;
        debug!(tx = self.id, operations = operations.len(), "Transaction committed");
        for operation in operations {
            operation.after_commit();
        }
        Ok(())
    }

    pub fn rollback(&self) -> Result<(), TransactionError> {
        let operations = self.resolve(TransactionState::RolledBack)?;
        debug!(tx = self.id, operations = operations.len(), "Transaction rolled back");
        for operation in operations.into_iter().rev() {
            operation.after_rollback();
        }
        Ok(())
    }

    /// Move to a terminal state and take the operation list; callbacks run
    /// after the lock is released so they may touch other transactions
    fn resolve(
        &self,
        target: TransactionState,
    ) -> Result<Vec<Box<dyn TransactionOperation>>, TransactionError> {
        let mut inner = self.inner.lock();
        self.ensure_active(inner.state)?;
        inner.state = target;
        Ok(std::mem::take(&mut inner.operations))
    }

    fn ensure_active(&self, state: TransactionState) -> Result<(), TransactionError> {
        let outcome = match state {
            TransactionState::Active => return Ok(()),
            TransactionState::Committed => TransactionOutcome::Committed,
            TransactionState::RolledBack => TransactionOutcome::RolledBack,
        };
        Err(TransactionError::AlreadyResolved {
            id: self.id,
            outcome,
        })
    }
}

impl Default for Transaction {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for Transaction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let inner = self.inner.lock();
        f.debug_struct("Transaction")
            .field("id", &self.id)
            .field("state", &inner.state)
            .field("operations", &inner.operations.len())
            .finish()
    }
}
