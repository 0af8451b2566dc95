//! # Binding Registry
//!
//! Concurrent index of every binding on the broker.
//!
//! ## Indexes
//!
//! ```text
//! names:          DashMap<String, Arc<Binding>>            binding name → binding
//! addresses:      DashMap<String, Arc<BindingAggregate>>   exact address → aggregate
//! pending_delete: DashMap<String, TransactionId>           removed, not yet confirmed
//! ```
//!
//! Reads only take shard read locks, so routing lookups never wait on writes
//! to other keys. Aggregate creation goes through the `addresses` entry API:
//! the first writer for an address inserts the aggregate and every concurrent
//! writer joins that same instance. Locks are always taken names before
//! addresses.
//!
//! ## Transactional Removal
//!
//! Removing a binding under a [`Transaction`] takes effect at once in both
//! indexes and marks the name pending-delete, which blocks re-adding it.
//! The transaction then resolves the marker:
//!
//! - commit clears the marker; the removal is final
//! - rollback restores the name index entry and the aggregate membership,
//!   then clears the marker

use crate::address::{AddressPattern, WildcardSyntax};
use crate::binding::{Binding, BindingAggregate};
use crate::error::{RoutingError, RoutingResult};
use crate::transaction::{Transaction, TransactionId, TransactionOperation};
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use std::fmt;
use std::sync::Arc;
use tracing::{debug, info, warn};

struct RegistryState {
    syntax: WildcardSyntax,
    names: DashMap<String, Arc<Binding>>,
    addresses: DashMap<String, Arc<BindingAggregate>>,
    pending_delete: DashMap<String, TransactionId>,
}

impl RegistryState {
    /// Join (or lazily create) the aggregate for the binding's address;
    /// returns whether it already existed
    fn join_aggregate(&self, binding: &Arc<Binding>) -> bool {
        match self.addresses.entry(binding.address().to_string()) {
            Entry::Occupied(entry) => {
                entry.get().insert(Arc::clone(binding));
                true
            }
            Entry::Vacant(entry) => {
                let aggregate = BindingAggregate::new(binding.address());
                aggregate.insert(Arc::clone(binding));
                entry.insert(Arc::new(aggregate));
                false
            }
        }
    }

    /// Drop the binding from its aggregate and the aggregate once empty
    fn leave_aggregate(&self, binding: &Binding) {
        if let Entry::Occupied(entry) = self.addresses.entry(binding.address().to_string()) {
            entry.get().remove(binding.name());
            if entry.get().is_empty() {
                entry.remove();
                debug!("Removed empty aggregate for address {}", binding.address());
            }
        }
    }

    /// Undo a transactional removal if the marker still belongs to `tx`
    fn restore(&self, binding: &Arc<Binding>, tx: TransactionId) {
        let owned = self
            .pending_delete
            .get(binding.name())
            .is_some_and(|marker| *marker == tx);
        if !owned {
            debug!(
                "Skipping restore of binding {}: no pending delete for tx {}",
                binding.name(),
                tx
            );
            return;
        }

        match self.names.entry(binding.name().to_string()) {
            Entry::Vacant(entry) => {
                let _slot = entry.insert(Arc::clone(binding));
                self.join_aggregate(binding);
            }
            Entry::Occupied(_) => {
                warn!(
                    "Binding {} reappeared while its removal was pending",
                    binding.name()
                );
                self.join_aggregate(binding);
            }
        }
        self.pending_delete.remove(binding.name());
        debug!("Restored binding {} after rollback of tx {}", binding.name(), tx);
    }

    fn confirm(&self, name: &str, tx: TransactionId) {
        if self
            .pending_delete
            .remove_if(name, |_, marker| *marker == tx)
            .is_some()
        {
            debug!("Removal of binding {} confirmed by tx {}", name, tx);
        }
    }
}

/// Compensation registered for one transactional removal
#[derive(Clone)]
struct PendingRemoval {
    state: Arc<RegistryState>,
    binding: Arc<Binding>,
    tx: TransactionId,
}

impl TransactionOperation for PendingRemoval {
    fn after_commit(self: Box<Self>) {
        self.state.confirm(self.binding.name(), self.tx);
    }

    fn after_rollback(self: Box<Self>) {
        self.state.restore(&self.binding, self.tx);
    }
}

/// Registry of named bindings, cheap to clone and share across threads
#[derive(Clone)]
pub struct BindingRegistry {
    state: Arc<RegistryState>,
}

impl BindingRegistry {
    pub fn new() -> Self {
        Self::with_syntax(WildcardSyntax::default())
    }

    pub fn with_syntax(syntax: WildcardSyntax) -> Self {
        Self {
            state: Arc::new(RegistryState {
                syntax,
                names: DashMap::new(),
                addresses: DashMap::new(),
                pending_delete: DashMap::new(),
            }),
        }
    }

    pub fn syntax(&self) -> &WildcardSyntax {
        &self.state.syntax
    }

    /// Add a binding; returns whether an aggregate already existed for its
    /// address
    ///
    /// Fails with [`RoutingError::DuplicateBinding`] when the name is bound
    /// or its removal is still pending in an open transaction.
    pub fn add_binding(&self, binding: Binding) -> RoutingResult<bool> {
        let state = &self.state;
        let binding = Arc::new(binding);

        let existed = match state.names.entry(binding.name().to_string()) {
            Entry::Occupied(_) => {
                return Err(RoutingError::duplicate_binding(binding.name(), false));
            }
            Entry::Vacant(entry) => {
                if state.pending_delete.contains_key(binding.name()) {
                    return Err(RoutingError::duplicate_binding(binding.name(), true));
                }
                // The name slot stays locked until the aggregate holds the
                // binding, so a concurrent remove sees both indexes or neither
                let _slot = entry.insert(Arc::clone(&binding));
                state.join_aggregate(&binding)
            }
        };
        info!(
            "Added binding {} on address {} ({})",
            binding.name(),
            binding.address(),
            binding.endpoint()
        );
        Ok(existed)
    }

    /// Remove a binding by name
    ///
    /// `Ok(None)` when no such binding exists. With a transaction the removal
    /// is visible immediately and the transaction decides whether it sticks.
    pub fn remove_binding(
        &self,
        name: &str,
        tx: Option<&Transaction>,
    ) -> RoutingResult<Option<Arc<Binding>>> {
        let state = &self.state;

        let Some(tx) = tx else {
            let removed = state.names.remove(name).map(|(_, binding)| binding);
            if let Some(binding) = &removed {
                state.leave_aggregate(binding);
                info!("Removed binding {}", name);
            }
            return Ok(removed);
        };

        tx.check_active()?;

        // Mark first so a concurrent add cannot slip in between the two indexes
        match state.pending_delete.entry(name.to_string()) {
            Entry::Occupied(entry) => {
                debug!("Binding {} already pending delete in tx {}", name, entry.get());
                return Ok(None);
            }
            Entry::Vacant(entry) => {
                entry.insert(tx.id());
            }
        }
        let Some((_, binding)) = state.names.remove(name) else {
            state.pending_delete.remove_if(name, |_, marker| *marker == tx.id());
            return Ok(None);
        };
        state.leave_aggregate(&binding);

        let removal = PendingRemoval {
            state: Arc::clone(state),
            binding: Arc::clone(&binding),
            tx: tx.id(),
        };
        if let Err(e) = tx.add_operation(Box::new(removal.clone())) {
            state.restore(&removal.binding, removal.tx);
            return Err(e.into());
        }

        info!("Removed binding {} pending tx {}", name, tx.id());
        Ok(Some(binding))
    }

    pub fn get_binding(&self, name: &str) -> Option<Arc<Binding>> {
        self.state.names.get(name).map(|b| Arc::clone(b.value()))
    }

    /// Exact-address lookup
    pub fn get_bindings_for_address(&self, address: &str) -> Option<Arc<BindingAggregate>> {
        self.state
            .addresses
            .get(address)
            .map(|a| Arc::clone(a.value()))
    }

    /// Every binding whose address (as a pattern) matches `address`
    ///
    /// Linear in the number of bindings. The result is a fresh aggregate
    /// owned by the caller.
    pub fn get_matching_bindings(&self, address: &str) -> RoutingResult<BindingAggregate> {
        let query = AddressPattern::with_syntax(address, &self.state.syntax)?;
        let result = BindingAggregate::new(address);

        for entry in self.state.names.iter() {
            if entry.value().pattern().matches(&query) {
                result.insert(Arc::clone(entry.value()));
            }
        }

        debug!("Address {} matched {} bindings", address, result.len());
        Ok(result)
    }

    pub fn is_pending_delete(&self, name: &str) -> bool {
        self.state.pending_delete.contains_key(name)
    }

    pub fn binding_count(&self) -> usize {
        self.state.names.len()
    }

    /// Addresses that currently have at least one binding, sorted
    pub fn addresses(&self) -> Vec<String> {
        let mut addresses: Vec<String> = self
            .state
            .addresses
            .iter()
            .map(|a| a.key().clone())
            .collect();
        addresses.sort();
        addresses
    }

    /// Drop every binding, aggregate and pending marker
    ///
    /// Open transactions that later roll back find no marker and leave the
    /// registry empty.
    pub fn clear(&self) {
        let count = self.state.names.len();
        self.state.names.clear();
        self.state.addresses.clear();
        self.state.pending_delete.clear();
        info!("Cleared binding registry ({} bindings)", count);
    }
}

impl fmt::Debug for BindingRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BindingRegistry")
            .field("bindings", &self.state.names.len())
            .field("addresses", &self.state.addresses.len())
            .field("pending_delete", &self.state.pending_delete.len())
            .finish()
    }
}

impl Default for BindingRegistry {
    fn default() -> Self {
        Self::new()
    }
}
