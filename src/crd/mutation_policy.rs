//! Mutation policy CRDs.
//!
//! A mutation policy stamps a fixed set of labels onto matching objects.
//! Mutation policies cannot reject a request.

use std::collections::BTreeMap;

use kube::CustomResource;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use super::MatchCriteria;

/// Spec shared by cluster- and namespace-scoped mutation policies.
///
/// Example:
/// ```yaml
/// apiVersion: policy.example.com/v1
/// kind: NamespaceCelMutationPolicy
/// metadata:
///   name: env-labels
///   namespace: team-a
/// spec:
///   match:
///     resources: ["Pod"]
///     operations: ["CREATE", "UPDATE"]
///   labels:
///     env: prod
/// ```
#[derive(Clone, Debug, Default, Deserialize, Serialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct MutationPolicySpec {
    /// Which requests this policy applies to
    #[serde(rename = "match", default)]
    pub match_criteria: MatchCriteria,

    /// Label keys and values applied verbatim to `metadata.labels`
    #[serde(default)]
    pub labels: BTreeMap<String, String>,
}

/// Cluster-scoped mutation policy, applied to requests in every namespace.
#[derive(CustomResource, Clone, Debug, Deserialize, Serialize, JsonSchema)]
#[kube(
    group = "policy.example.com",
    version = "v1",
    kind = "ClusterCelMutationPolicy",
    plural = "clustercelmutationpolicies"
)]
#[serde(transparent)]
pub struct ClusterCelMutationPolicySpec {
    pub policy: MutationPolicySpec,
}

/// Namespace-scoped mutation policy, applied only to requests in its own
/// namespace.
#[derive(CustomResource, Clone, Debug, Deserialize, Serialize, JsonSchema)]
#[kube(
    group = "policy.example.com",
    version = "v1",
    kind = "NamespaceCelMutationPolicy",
    plural = "namespacecelmutationpolicies",
    namespaced
)]
#[serde(transparent)]
pub struct NamespaceCelMutationPolicySpec {
    pub policy: MutationPolicySpec,
}
