//! Validation policy CRDs.
//!
//! A validation policy carries an ordered list of CEL rules. Rule order is
//! significant: the first failing enforce-level rule denies the request and
//! stops all further evaluation.

use kube::CustomResource;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use super::MatchCriteria;

/// Spec shared by cluster- and namespace-scoped validation policies.
///
/// Example:
/// ```yaml
/// apiVersion: policy.example.com/v1
/// kind: ClusterCelValidationPolicy
/// metadata:
///   name: require-limits
/// spec:
///   match:
///     resources: ["Pod"]
///     operations: ["CREATE", "UPDATE"]
///   validations:
///     - expression: "has(object.spec.containers[0].resources.limits)"
///       messageExpression: "'containers must declare resource limits'"
///       enforcement: enforce
/// ```
#[derive(Clone, Debug, Default, Deserialize, Serialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct ValidationPolicySpec {
    /// Which requests this policy applies to
    #[serde(rename = "match", default)]
    pub match_criteria: MatchCriteria,

    /// Ordered list of CEL rules evaluated against matching requests
    #[serde(default)]
    pub validations: Vec<ValidationRule>,
}

/// A single CEL validation rule.
#[derive(Clone, Debug, Deserialize, Serialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct ValidationRule {
    /// CEL expression; a non-truthy or failing evaluation violates the rule
    pub expression: String,

    /// CEL expression producing the denial/warning message. Defaults to the
    /// literal expression `"validation failed"`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message_expression: Option<String>,

    /// Whether a violation blocks the request or only annotates it
    #[serde(default)]
    pub enforcement: Enforcement,
}

/// Enforcement level of a validation rule.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Deserialize, Serialize, JsonSchema)]
#[serde(rename_all = "lowercase")]
pub enum Enforcement {
    /// A violation denies the request
    #[default]
    Enforce,
    /// A violation is reported as a warning, the request proceeds
    Warn,
}

/// Cluster-scoped validation policy, applied to requests in every namespace.
#[derive(CustomResource, Clone, Debug, Deserialize, Serialize, JsonSchema)]
#[kube(
    group = "policy.example.com",
    version = "v1",
    kind = "ClusterCelValidationPolicy",
    plural = "clustercelvalidationpolicies"
)]
#[serde(transparent)]
pub struct ClusterCelValidationPolicySpec {
    pub policy: ValidationPolicySpec,
}

/// Namespace-scoped validation policy, applied only to requests in its own
/// namespace.
#[derive(CustomResource, Clone, Debug, Deserialize, Serialize, JsonSchema)]
#[kube(
    group = "policy.example.com",
    version = "v1",
    kind = "NamespaceCelValidationPolicy",
    plural = "namespacecelvalidationpolicies",
    namespaced
)]
#[serde(transparent)]
pub struct NamespaceCelValidationPolicySpec {
    pub policy: ValidationPolicySpec,
}
