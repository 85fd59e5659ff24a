//! Match criteria shared by all policy kinds.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::admission::Operation;

/// Selects which admission requests a policy applies to.
///
/// Criteria are conjunctive: a policy applies only if the request's resource
/// kind is in `resources` AND its operation is in `operations`. A policy
/// with empty criteria therefore matches nothing.
#[derive(Clone, Debug, Default, Deserialize, Serialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct MatchCriteria {
    /// Resource kinds this policy applies to (e.g. `Pod`, `Deployment`)
    #[serde(default)]
    pub resources: Vec<String>,

    /// Admission operations this policy applies to
    #[serde(default)]
    pub operations: Vec<Operation>,
}

impl MatchCriteria {
    /// Check whether the criteria select the given kind and operation.
    pub fn matches(&self, kind: &str, operation: Operation) -> bool {
        self.resources.iter().any(|r| r == kind) && self.operations.contains(&operation)
    }
}
