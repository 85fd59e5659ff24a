//! Custom Resource Definitions for the policy engine.
//!
//! Four policy resources in group `policy.example.com/v1`:
//! - `ClusterCelMutationPolicy` / `NamespaceCelMutationPolicy`: label mutation
//! - `ClusterCelValidationPolicy` / `NamespaceCelValidationPolicy`: CEL validation
//!
//! The cluster/namespace pairs share their spec shape; scope is carried by
//! the resource kind itself.

mod common;
mod mutation_policy;
mod validation_policy;

pub use common::*;
pub use mutation_policy::*;
pub use validation_policy::*;

/// API group of the policy CRDs
pub const POLICY_GROUP: &str = "policy.example.com";
/// API version of the policy CRDs
pub const POLICY_VERSION: &str = "v1";
