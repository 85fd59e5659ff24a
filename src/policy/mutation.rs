//! Mutating engine.
//!
//! Applies the label maps of matching mutation policies to the admitted
//! object and synthesizes a minimal JSON patch against `metadata.labels`.
//! Application order is cluster policies before namespace policies, store
//! order within a scope; a later write to the same key wins. Mutation never
//! denies a request.

use std::collections::BTreeMap;

use json_patch::{AddOperation, Patch, PatchOperation, ReplaceOperation};
use jsonptr::PointerBuf;
use tracing::{debug, info};

use crate::admission::AdmissionRequest;
use crate::policy::MutationPolicy;

/// Apply all applicable mutation policies and return the patch that turns
/// the original object into the mutated one. Empty when nothing changed.
pub fn mutate_object(
    request: &AdmissionRequest,
    object: &serde_json::Value,
    policies: &[MutationPolicy],
) -> Patch {
    let namespace = request.effective_namespace();
    let original = label_map(object);
    let mut desired = original.clone();

    for policy in policies {
        if !policy.scope.applies_to(namespace) {
            debug!(
                policy = %policy.name,
                scope = policy.scope.as_str(),
                "skipping policy outside the request namespace"
            );
            continue;
        }
        if !policy
            .spec
            .match_criteria
            .matches(&request.kind.kind, request.operation)
        {
            continue;
        }

        for (key, value) in &policy.spec.labels {
            desired.insert(key.clone(), value.clone());
            info!(
                uid = %request.uid,
                policy = %policy.name,
                scope = policy.scope.as_str(),
                key = %key,
                value = %value,
                "applied label"
            );
        }
    }

    diff_labels(&original, &desired)
}

/// Project `metadata.labels` out of an arbitrary object. Non-string values
/// are ignored; Kubernetes labels are always strings.
fn label_map(object: &serde_json::Value) -> BTreeMap<String, String> {
    object
        .pointer("/metadata/labels")
        .and_then(serde_json::Value::as_object)
        .map(|labels| {
            labels
                .iter()
                .filter_map(|(k, v)| v.as_str().map(|v| (k.clone(), v.to_string())))
                .collect()
        })
        .unwrap_or_default()
}

/// Per-key diff of the label maps: `add` for keys absent originally,
/// `replace` for changed values, nothing for unchanged keys.
fn diff_labels(original: &BTreeMap<String, String>, desired: &BTreeMap<String, String>) -> Patch {
    let mut ops = Vec::new();

    for (key, value) in desired {
        let path = PointerBuf::from_tokens(["metadata", "labels", key.as_str()]);
        let json_value = serde_json::Value::String(value.clone());

        match original.get(key) {
            None => ops.push(PatchOperation::Add(AddOperation {
                path,
                value: json_value,
            })),
            Some(existing) if existing != value => {
                ops.push(PatchOperation::Replace(ReplaceOperation {
                    path,
                    value: json_value,
                }));
            }
            Some(_) => {}
        }
    }

    Patch(ops)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::admission::AdmissionReview;
    use crate::crd::MutationPolicySpec;
    use crate::policy::PolicyScope;
    use serde_json::json;

    fn request(namespace: &str, object: serde_json::Value) -> AdmissionRequest {
        let review: AdmissionReview = serde_json::from_value(json!({
            "request": {
                "uid": "u-1",
                "operation": "CREATE",
                "kind": {"kind": "Pod"},
                "namespace": namespace,
                "object": object
            }
        }))
        .unwrap();
        review.request
    }

    fn policy(name: &str, scope: PolicyScope, labels: &[(&str, &str)]) -> MutationPolicy {
        MutationPolicy {
            name: name.to_string(),
            scope,
            spec: MutationPolicySpec {
                match_criteria: serde_json::from_value(json!({
                    "resources": ["Pod"],
                    "operations": ["CREATE"]
                }))
                .unwrap(),
                labels: labels
                    .iter()
                    .map(|(k, v)| (k.to_string(), v.to_string()))
                    .collect(),
            },
        }
    }

    fn patch_json(patch: &Patch) -> serde_json::Value {
        serde_json::to_value(patch).unwrap()
    }

    #[test]
    fn test_absent_label_emits_add() {
        let req = request("team-a", json!({"metadata": {"name": "web"}}));
        let policies = vec![policy("set-env", PolicyScope::Cluster, &[("env", "prod")])];

        let patch = mutate_object(&req, req.object.as_ref().unwrap(), &policies);
        assert_eq!(
            patch_json(&patch),
            json!([{"op": "add", "path": "/metadata/labels/env", "value": "prod"}])
        );
    }

    #[test]
    fn test_differing_label_emits_replace() {
        let req = request(
            "team-a",
            json!({"metadata": {"labels": {"env": "staging"}}}),
        );
        let policies = vec![policy("set-env", PolicyScope::Cluster, &[("env", "prod")])];

        let patch = mutate_object(&req, req.object.as_ref().unwrap(), &policies);
        assert_eq!(
            patch_json(&patch),
            json!([{"op": "replace", "path": "/metadata/labels/env", "value": "prod"}])
        );
    }

    #[test]
    fn test_equal_label_emits_nothing() {
        let req = request("team-a", json!({"metadata": {"labels": {"env": "prod"}}}));
        let policies = vec![policy("set-env", PolicyScope::Cluster, &[("env", "prod")])];

        let patch = mutate_object(&req, req.object.as_ref().unwrap(), &policies);
        assert!(patch.0.is_empty());
    }

    #[test]
    fn test_namespace_policy_overrides_cluster_policy() {
        let req = request("team-a", json!({"metadata": {}}));
        let policies = vec![
            policy("cluster-env", PolicyScope::Cluster, &[("env", "dev")]),
            policy(
                "team-env",
                PolicyScope::Namespace("team-a".to_string()),
                &[("env", "prod")],
            ),
        ];

        let patch = mutate_object(&req, req.object.as_ref().unwrap(), &policies);
        assert_eq!(
            patch_json(&patch),
            json!([{"op": "add", "path": "/metadata/labels/env", "value": "prod"}])
        );
    }

    #[test]
    fn test_non_matching_policy_has_no_effect() {
        let req = request("team-a", json!({"metadata": {}}));
        let mut other_kind = policy("deployments-only", PolicyScope::Cluster, &[("env", "dev")]);
        other_kind.spec.match_criteria = serde_json::from_value(json!({
            "resources": ["Deployment"],
            "operations": ["CREATE"]
        }))
        .unwrap();
        let mut other_op = policy("updates-only", PolicyScope::Cluster, &[("env", "dev")]);
        other_op.spec.match_criteria = serde_json::from_value(json!({
            "resources": ["Pod"],
            "operations": ["UPDATE"]
        }))
        .unwrap();

        let patch = mutate_object(
            &req,
            req.object.as_ref().unwrap(),
            &[other_kind, other_op],
        );
        assert!(patch.0.is_empty());
    }

    #[test]
    fn test_foreign_namespace_policy_is_skipped() {
        let req = request("team-a", json!({"metadata": {}}));
        let policies = vec![policy(
            "team-b-env",
            PolicyScope::Namespace("team-b".to_string()),
            &[("env", "prod")],
        )];

        let patch = mutate_object(&req, req.object.as_ref().unwrap(), &policies);
        assert!(patch.0.is_empty());
    }

    #[test]
    fn test_mutation_is_idempotent() {
        let req = request(
            "team-a",
            json!({"metadata": {"labels": {"app": "web"}}}),
        );
        let policies = vec![policy("set-env", PolicyScope::Cluster, &[("env", "prod")])];

        let first = mutate_object(&req, req.object.as_ref().unwrap(), &policies);
        assert_eq!(first.0.len(), 1);

        // apply the patch, run the engine again: nothing left to do
        let mut mutated = req.object.clone().unwrap();
        json_patch::patch(&mut mutated, &first.0).unwrap();
        let second = mutate_object(&req, &mutated, &policies);
        assert!(second.0.is_empty());
    }

    #[test]
    fn test_label_keys_are_pointer_escaped() {
        let req = request("team-a", json!({"metadata": {}}));
        let policies = vec![policy(
            "well-known",
            PolicyScope::Cluster,
            &[("app.kubernetes.io/name", "web")],
        )];

        let patch = mutate_object(&req, req.object.as_ref().unwrap(), &policies);
        assert_eq!(
            patch_json(&patch),
            json!([{
                "op": "add",
                "path": "/metadata/labels/app.kubernetes.io~1name",
                "value": "web"
            }])
        );
    }

    #[test]
    fn test_later_policy_wins_within_scope() {
        let req = request("team-a", json!({"metadata": {}}));
        let policies = vec![
            policy("first", PolicyScope::Cluster, &[("tier", "bronze")]),
            policy("second", PolicyScope::Cluster, &[("tier", "gold")]),
        ];

        let patch = mutate_object(&req, req.object.as_ref().unwrap(), &policies);
        assert_eq!(
            patch_json(&patch),
            json!([{"op": "add", "path": "/metadata/labels/tier", "value": "gold"}])
        );
    }
}
