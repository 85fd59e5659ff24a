//! Validating engine.
//!
//! Walks the candidate policies in order (cluster before namespace), and
//! within each applicable policy its rules in declared order. The first
//! failing enforce-level rule denies the request immediately; nothing after
//! it is evaluated, including warn-level rules of later policies. Warn-level
//! failures accumulate and ride along on an allowed response.

use tracing::{debug, info};

use crate::admission::AdmissionRequest;
use crate::crd::Enforcement;
use crate::policy::cel::{CelEvaluator, RuleContext};
use crate::policy::ValidationPolicy;

/// Outcome of validating one admission request.
#[derive(Debug)]
pub struct Verdict {
    pub allowed: bool,
    /// Denial message, set only when not allowed
    pub message: Option<String>,
    /// Warn-level violations, in evaluation order
    pub warnings: Vec<String>,
}

impl Verdict {
    fn allowed(warnings: Vec<String>) -> Self {
        Self {
            allowed: true,
            message: None,
            warnings,
        }
    }

    fn denied(message: String) -> Self {
        Self {
            allowed: false,
            message: Some(message),
            warnings: Vec::new(),
        }
    }
}

/// Evaluate all applicable validation policies against the request.
pub fn validate_object(
    request: &AdmissionRequest,
    object: Option<&serde_json::Value>,
    cel: &CelEvaluator,
    policies: &[ValidationPolicy],
) -> Verdict {
    let namespace = request.effective_namespace();
    let mut warnings = Vec::new();

    for policy in policies {
        if !policy
            .spec
            .match_criteria
            .matches(&request.kind.kind, request.operation)
        {
            continue;
        }
        if !policy.scope.applies_to(namespace) {
            debug!(
                policy = %policy.name,
                scope = policy.scope.as_str(),
                "skipping policy outside the request namespace"
            );
            continue;
        }

        let ctx = RuleContext {
            object,
            request,
            namespace: policy.scope.namespace(),
            policy_scope: policy.scope.as_str(),
        };

        for rule in &policy.spec.validations {
            debug!(
                uid = %request.uid,
                policy = %policy.name,
                scope = policy.scope.as_str(),
                expression = %rule.expression,
                "evaluating rule"
            );

            if cel.evaluate_bool(&rule.expression, &ctx) {
                continue;
            }

            let message = cel.evaluate_message(rule.message_expression.as_deref(), &ctx);
            info!(
                uid = %request.uid,
                policy = %policy.name,
                scope = policy.scope.as_str(),
                enforcement = ?rule.enforcement,
                message = %message,
                "rule failed"
            );

            match rule.enforcement {
                Enforcement::Enforce => return Verdict::denied(message),
                Enforcement::Warn => warnings.push(message),
            }
        }
    }

    Verdict::allowed(warnings)
}
