//! Policy resolution and evaluation.
//!
//! The store turns the four policy CRDs into request-local, scope-tagged
//! policy values; the mutation and validation engines consume them in
//! cluster-before-namespace order.

pub mod cel;
pub mod mutation;
pub mod store;
pub mod validation;

pub use cel::{CelError, CelEvaluator};
pub use store::PolicyStore;

use crate::crd::{MutationPolicySpec, ValidationPolicySpec};

/// Scope of a policy object.
///
/// Namespace scope carries the policy's own namespace so the engines can
/// re-check it against the request namespace, even though the store already
/// lists namespaced policies per namespace.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum PolicyScope {
    Cluster,
    Namespace(String),
}

impl PolicyScope {
    /// Scope name as exposed to CEL contexts (`policyScope`).
    pub fn as_str(&self) -> &'static str {
        match self {
            PolicyScope::Cluster => "cluster",
            PolicyScope::Namespace(_) => "namespace",
        }
    }

    /// Whether a policy of this scope applies to a request in `namespace`.
    ///
    /// Cluster policies apply everywhere; namespace policies only to their
    /// exact namespace.
    pub fn applies_to(&self, namespace: Option<&str>) -> bool {
        match self {
            PolicyScope::Cluster => true,
            PolicyScope::Namespace(own) => namespace == Some(own.as_str()),
        }
    }

    /// The policy's own namespace, when namespace-scoped.
    pub fn namespace(&self) -> Option<&str> {
        match self {
            PolicyScope::Cluster => None,
            PolicyScope::Namespace(ns) => Some(ns),
        }
    }
}

/// A mutation policy as seen by the mutating engine.
#[derive(Clone, Debug)]
pub struct MutationPolicy {
    pub name: String,
    pub scope: PolicyScope,
    pub spec: MutationPolicySpec,
}

/// A validation policy as seen by the validating engine.
#[derive(Clone, Debug)]
pub struct ValidationPolicy {
    pub name: String,
    pub scope: PolicyScope,
    pub spec: ValidationPolicySpec,
}
