//! Health payload and Prometheus metrics.
//!
//! The webhook serves `/health` for the dispatcher's probes and `/metrics`
//! for scraping; both live on the webhook server itself.

use prometheus_client::encoding::{EncodeLabel, EncodeLabelSet, LabelSetEncoder};
use prometheus_client::metrics::counter::Counter;
use prometheus_client::metrics::family::Family;
use prometheus_client::registry::Registry;

/// Labels for admission review metrics
#[derive(Clone, Debug, Hash, PartialEq, Eq)]
pub struct ReviewLabels {
    /// `mutate` or `validate`
    pub webhook: String,
    /// `allowed`, `denied` or `patched`
    pub outcome: String,
}

impl EncodeLabelSet for ReviewLabels {
    fn encode(&self, mut encoder: LabelSetEncoder<'_>) -> Result<(), std::fmt::Error> {
        ("webhook", self.webhook.as_str()).encode(encoder.encode_label())?;
        ("outcome", self.outcome.as_str()).encode(encoder.encode_label())?;
        Ok(())
    }
}

/// Labels for rule violation metrics
#[derive(Clone, Debug, Hash, PartialEq, Eq)]
pub struct ViolationLabels {
    /// `enforce` or `warn`
    pub enforcement: String,
}

impl EncodeLabelSet for ViolationLabels {
    fn encode(&self, mut encoder: LabelSetEncoder<'_>) -> Result<(), std::fmt::Error> {
        ("enforcement", self.enforcement.as_str()).encode(encoder.encode_label())?;
        Ok(())
    }
}

/// Shared metrics for the webhook
pub struct Metrics {
    /// Processed admission reviews by webhook and outcome
    pub reviews_total: Family<ReviewLabels, Counter>,
    /// Rule violations by enforcement level
    pub violations_total: Family<ViolationLabels, Counter>,
    /// CEL expression evaluations (shared with the evaluator)
    pub cel_evaluations_total: Counter,
    /// Prometheus registry
    registry: Registry,
}

impl Default for Metrics {
    fn default() -> Self {
        Self::new()
    }
}

impl Metrics {
    /// Create a new metrics instance with registered metrics
    pub fn new() -> Self {
        let mut registry = Registry::default();

        let reviews_total = Family::<ReviewLabels, Counter>::default();
        registry.register(
            "celwebhook_admission_reviews",
            "Total number of processed admission reviews",
            reviews_total.clone(),
        );

        let violations_total = Family::<ViolationLabels, Counter>::default();
        registry.register(
            "celwebhook_rule_violations",
            "Total number of failed validation rules",
            violations_total.clone(),
        );

        let cel_evaluations_total = Counter::default();
        registry.register(
            "celwebhook_cel_evaluations",
            "Total number of CEL expression evaluations",
            cel_evaluations_total.clone(),
        );

        Self {
            reviews_total,
            violations_total,
            cel_evaluations_total,
            registry,
        }
    }

    /// Record a processed review
    pub fn record_review(&self, webhook: &str, outcome: &str) {
        self.reviews_total
            .get_or_create(&ReviewLabels {
                webhook: webhook.to_string(),
                outcome: outcome.to_string(),
            })
            .inc();
    }

    /// Record failed rules by enforcement level
    pub fn record_violations(&self, enforcement: &str, count: u64) {
        if count > 0 {
            self.violations_total
                .get_or_create(&ViolationLabels {
                    enforcement: enforcement.to_string(),
                })
                .inc_by(count);
        }
    }

    /// Encode metrics to Prometheus text format
    pub fn encode(&self) -> String {
        let mut buffer = String::new();
        if prometheus_client::encoding::text::encode(&mut buffer, &self.registry).is_err() {
            tracing::error!("Failed to encode metrics");
            return "# Error encoding metrics".to_string();
        }
        buffer
    }
}
