//! Bindings and per-address aggregates

use crate::address::{AddressPattern, WildcardSyntax};
use crate::error::RoutingResult;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

/// Opaque reference to the routable endpoint (queue, divert target, remote
/// link) that receives messages for a binding
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct EndpointId(pub u64);

impl fmt::Display for EndpointId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "endpoint-{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BindingKind {
    #[default]
    Queue,
    Divert,
    Remote,
}

/// Named association of an endpoint with an address
///
/// The address is parsed once at construction; a wildcard address makes the
/// binding a pattern subscription.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Binding {
    name: String,
    pattern: AddressPattern,
    endpoint: EndpointId,
    filter: Option<String>,
    durable: bool,
    kind: BindingKind,
}

impl Binding {
    pub fn new(
        name: impl Into<String>,
        address: &str,
        endpoint: EndpointId,
    ) -> RoutingResult<Self> {
        Self::with_syntax(name, address, endpoint, &WildcardSyntax::default())
    }

    pub fn with_syntax(
        name: impl Into<String>,
        address: &str,
        endpoint: EndpointId,
        syntax: &WildcardSyntax,
    ) -> RoutingResult<Self> {
        Ok(Self {
            name: name.into(),
            pattern: AddressPattern::with_syntax(address, syntax)?,
            endpoint,
            filter: None,
            durable: false,
            kind: BindingKind::Queue,
        })
    }

    pub fn with_filter(mut self, filter: Option<String>) -> Self {
        self.filter = filter;
        self
    }

    pub fn with_durable(mut self, durable: bool) -> Self {
        self.durable = durable;
        self
    }

    pub fn with_kind(mut self, kind: BindingKind) -> Self {
        self.kind = kind;
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn address(&self) -> &str {
        self.pattern.as_str()
    }

    pub fn pattern(&self) -> &AddressPattern {
        &self.pattern
    }

    pub fn endpoint(&self) -> EndpointId {
        self.endpoint
    }

    pub fn filter(&self) -> Option<&str> {
        self.filter.as_deref()
    }

    pub fn is_durable(&self) -> bool {
        self.durable
    }

    pub fn kind(&self) -> BindingKind {
        self.kind
    }
}

/// Bindings that share one exact address string
///
/// Iteration order is by binding name.
#[derive(Debug)]
pub struct BindingAggregate {
    address: String,
    bindings: RwLock<BTreeMap<String, Arc<Binding>>>,
}

impl BindingAggregate {
    pub fn new(address: impl Into<String>) -> Self {
        Self {
            address: address.into(),
            bindings: RwLock::new(BTreeMap::new()),
        }
    }

    pub fn address(&self) -> &str {
        &self.address
    }

    pub fn len(&self) -> usize {
        self.bindings.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.bindings.read().is_empty()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.bindings.read().contains_key(name)
    }

    /// Snapshot of the member bindings
    pub fn bindings(&self) -> Vec<Arc<Binding>> {
        self.bindings.read().values().cloned().collect()
    }

    pub fn names(&self) -> Vec<String> {
        self.bindings.read().keys().cloned().collect()
    }

    /// Distinct endpoints, each once even when several bindings share it
    pub fn endpoints(&self) -> Vec<EndpointId> {
        let mut endpoints: Vec<EndpointId> =
            self.bindings.read().values().map(|b| b.endpoint()).collect();
        endpoints.sort_unstable();
        endpoints.dedup();
        endpoints
    }

    pub(crate) fn insert(&self, binding: Arc<Binding>) {
        self.bindings
            .write()
            .insert(binding.name().to_string(), binding);
    }

    pub(crate) fn remove(&self, name: &str) -> Option<Arc<Binding>> {
        self.bindings.write().remove(name)
    }
}
