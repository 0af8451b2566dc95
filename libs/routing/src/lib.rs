//! # Broker Routing
//!
//! ## Purpose
//!
//! Decides which endpoints receive a message. Bindings associate a named
//! endpoint with an address or address pattern; the registry answers
//! exact-address and pattern-matching lookups concurrently with bind/unbind.
//!
//! ## Architecture Role
//!
//! ```text
//! SessionSend(address) → BindingRegistry::get_matching_bindings
//!                              ↓ AddressPattern::matches per binding
//!                        BindingAggregate → endpoints → queues
//! ```
//!
//! ## What This Crate Contains
//! - [`AddressPattern`] and [`WildcardSyntax`]: `*` / `#` wildcard matching
//! - [`Binding`], [`BindingAggregate`], [`BindingRegistry`]
//! - [`Transaction`]: compensation list used for deferred binding removal
//!
//! ## Examples
//!
//! ```rust
//! use routing::{Binding, BindingRegistry, EndpointId};
//!
//! let registry = BindingRegistry::new();
//! registry.add_binding(Binding::new("Q1", "orders.*", EndpointId(1))?)?;
//! registry.add_binding(Binding::new("Q2", "orders.new", EndpointId(2))?)?;
//!
//! let matched = registry.get_matching_bindings("orders.new")?;
//! assert_eq!(matched.names(), vec!["Q1", "Q2"]);
//! # Ok::<(), routing::RoutingError>(())
//! ```

pub mod address;
pub mod binding;
pub mod error;
pub mod registry;
pub mod transaction;

pub use address::{matches, AddressPattern, Token, WildcardSyntax};
pub use binding::{Binding, BindingAggregate, BindingKind, EndpointId};
pub use error::{RoutingError, RoutingResult, TransactionError, TransactionOutcome};
pub use registry::BindingRegistry;
pub use transaction::{Transaction, TransactionId, TransactionOperation, TransactionState};
