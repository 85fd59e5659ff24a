//! CEL expression evaluation.
//!
//! Thin adapter over the `cel-interpreter` crate. Compiled programs are
//! cached by expression text so repeated admissions of the same policy do
//! not pay compilation cost; the cache is shared across requests and never
//! held across an evaluation.
//!
//! Compile and runtime failures are both coerced to a failing rule result
//! by the callers here (`evaluate_bool` / `evaluate_message`); they are
//! logged and never surface as protocol errors.

use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock};

use cel_interpreter::{Context, Program, Value};
use prometheus_client::metrics::counter::Counter;
use thiserror::Error;
use tracing::error;

use crate::admission::AdmissionRequest;

/// Message expression used when a rule does not declare one. This is a CEL
/// string literal, evaluated like any other message expression.
pub const DEFAULT_MESSAGE_EXPRESSION: &str = r#""validation failed""#;

/// Fallback message when a message expression itself fails to evaluate.
const FALLBACK_MESSAGE: &str = "validation failed";

/// CEL adapter failures.
#[derive(Error, Debug)]
pub enum CelError {
    /// Expression failed to compile (syntax or type error)
    #[error("CEL compile error: {0}")]
    Compile(String),

    /// Expression failed at runtime (missing field, type mismatch, ...)
    #[error("CEL evaluation error: {0}")]
    Evaluation(String),

    /// Evaluation context could not be constructed
    #[error("CEL context error: {0}")]
    Context(String),
}

/// Variables bound into a rule's evaluation context.
///
/// Mirrors the documented contract: `object`, `request`, `params` (always
/// null), `namespace` (the policy's namespace for namespace-scoped policies,
/// null otherwise) and `policyScope`.
pub struct RuleContext<'a> {
    pub object: Option<&'a serde_json::Value>,
    pub request: &'a AdmissionRequest,
    pub namespace: Option<&'a str>,
    pub policy_scope: &'a str,
}

/// Compiles and evaluates CEL expressions with a process-wide program cache.
pub struct CelEvaluator {
    programs: RwLock<HashMap<String, Arc<Program>>>,
    evaluations: Counter,
}

impl Default for CelEvaluator {
    fn default() -> Self {
        Self::new(Counter::default())
    }
}

impl CelEvaluator {
    /// Create an evaluator reporting evaluations to the given counter.
    pub fn new(evaluations: Counter) -> Self {
        Self {
            programs: RwLock::new(HashMap::new()),
            evaluations,
        }
    }

    /// Number of expression evaluations performed so far.
    ///
    /// Short-circuit semantics are observable here: rules skipped by an
    /// earlier enforced failure never increment this.
    pub fn evaluation_count(&self) -> u64 {
        self.evaluations.get()
    }

    fn program(&self, expression: &str) -> Result<Arc<Program>, CelError> {
        {
            let cache = self.programs.read().unwrap_or_else(PoisonError::into_inner);
            if let Some(program) = cache.get(expression) {
                return Ok(program.clone());
            }
        }

        let program = Program::compile(expression)
            .map(Arc::new)
            .map_err(|e| CelError::Compile(e.to_string()))?;

        self.programs
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(expression.to_string(), program.clone());
        Ok(program)
    }

    /// Evaluate an expression in the given rule context.
    pub fn evaluate(&self, expression: &str, ctx: &RuleContext<'_>) -> Result<Value, CelError> {
        let program = self.program(expression)?;

        let mut context = Context::default();
        context
            .add_variable("object", ctx.object)
            .map_err(|e| CelError::Context(e.to_string()))?;
        context
            .add_variable("request", ctx.request)
            .map_err(|e| CelError::Context(e.to_string()))?;
        context
            .add_variable("params", serde_json::Value::Null)
            .map_err(|e| CelError::Context(e.to_string()))?;
        context
            .add_variable("namespace", ctx.namespace)
            .map_err(|e| CelError::Context(e.to_string()))?;
        context
            .add_variable("policyScope", ctx.policy_scope)
            .map_err(|e| CelError::Context(e.to_string()))?;

        self.evaluations.inc();
        program
            .execute(&context)
            .map_err(|e| CelError::Evaluation(e.to_string()))
    }

    /// Evaluate a rule expression to pass/fail. Any adapter failure is
    /// logged and coerced to a failing result.
    pub fn evaluate_bool(&self, expression: &str, ctx: &RuleContext<'_>) -> bool {
        match self.evaluate(expression, ctx) {
            Ok(value) => is_truthy(&value),
            Err(e) => {
                error!(expression, error = %e, "CEL evaluation error");
                false
            }
        }
    }

    /// Evaluate a rule's message expression (or the default literal) to a
    /// human-readable string.
    pub fn evaluate_message(&self, expression: Option<&str>, ctx: &RuleContext<'_>) -> String {
        let expression = expression.unwrap_or(DEFAULT_MESSAGE_EXPRESSION);
        match self.evaluate(expression, ctx) {
            Ok(value) => render(&value),
            Err(e) => {
                error!(expression, error = %e, "CEL message evaluation error");
                FALLBACK_MESSAGE.to_string()
            }
        }
    }
}

/// CEL value truthiness: false, null, zero, and empty collections fail a
/// rule; everything else passes.
fn is_truthy(value: &Value) -> bool {
    match value {
        Value::Bool(b) => *b,
        Value::Null => false,
        Value::Int(i) => *i != 0,
        Value::UInt(u) => *u != 0,
        Value::Float(f) => *f != 0.0,
        Value::String(s) => !s.is_empty(),
        Value::Bytes(b) => !b.is_empty(),
        Value::List(items) => !items.is_empty(),
        Value::Map(map) => !map.map.is_empty(),
        _ => true,
    }
}

/// Render a message value. Non-string values are rendered to their literal
/// form rather than discarded.
fn render(value: &Value) -> String {
    match value {
        Value::String(s) => s.as_ref().clone(),
        Value::Int(i) => i.to_string(),
        Value::UInt(u) => u.to_string(),
        Value::Float(f) => f.to_string(),
        Value::Bool(b) => b.to_string(),
        Value::Null => "null".to_string(),
        other => format!("{other:?}"),
    }
}
