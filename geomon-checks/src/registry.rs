//! Check registry and the `QualityCheck` trait.
//!
//! Checks are registered under stable names and run as a battery over one
//! snapshot. They are pure and independent: running a subset never changes
//! another check's verdict, and no check mutates anything. A check reports
//! its finding through [`CheckOutcome`]; it never returns a Rust error —
//! a payload that cannot be evaluated at all is reported as an
//! [`CheckResult::Error`] outcome by the caller, per check, so a parsing
//! defect is never recorded as a quality failure.

use crate::context::DatasetContext;
use geo_types::Geometry;
use geomon_core::fingerprint::{AttributeMap, Fingerprint};
use geomon_core::geometry::GeometryMetadata;
use geomon_core::model::CheckResult;
use tracing::debug;

/// Everything one check invocation may look at.
pub struct CheckContext<'a> {
    /// Parsed geometry payload.
    pub geometry: &'a Geometry<f64>,
    /// Attribute map of the snapshot.
    pub attributes: &'a AttributeMap,
    /// Precomputed measures for the snapshot.
    pub metadata: &'a GeometryMetadata,
    /// The snapshot's fingerprint (duplicate detection keys off the
    /// geometry sub-digest).
    pub fingerprint: &'a Fingerprint,
    /// Dataset-wide baseline built once per run.
    pub dataset: &'a DatasetContext,
}

/// Verdict of one check invocation.
#[derive(Debug, Clone, PartialEq)]
pub struct CheckOutcome {
    pub result: CheckResult,
    pub message: Option<String>,
    pub details: Option<serde_json::Value>,
}

impl CheckOutcome {
    pub fn pass() -> Self {
        Self {
            result: CheckResult::Pass,
            message: None,
            details: None,
        }
    }

    pub fn fail(message: impl Into<String>) -> Self {
        Self {
            result: CheckResult::Fail,
            message: Some(message.into()),
            details: None,
        }
    }

    pub fn warning(message: impl Into<String>) -> Self {
        Self {
            result: CheckResult::Warning,
            message: Some(message.into()),
            details: None,
        }
    }

    /// Internal-error outcome: the check could not evaluate the payload.
    pub fn error(message: impl Into<String>) -> Self {
        Self {
            result: CheckResult::Error,
            message: Some(message.into()),
            details: None,
        }
    }

    /// Attach structured details.
    pub fn with_details(mut self, details: serde_json::Value) -> Self {
        self.details = Some(details);
        self
    }
}

/// One spatial quality check.
///
/// Implementations must be pure functions of the context: idempotent,
/// order-insensitive, and free of side effects.
pub trait QualityCheck: Send + Sync {
    /// Stable registry name; persisted as the check type of every outcome.
    fn name(&self) -> &'static str;

    /// Evaluate one snapshot.
    fn run(&self, ctx: &CheckContext<'_>) -> CheckOutcome;
}

/// Named set of checks run as a battery.
pub struct CheckRegistry {
    checks: Vec<Box<dyn QualityCheck>>,
}

impl CheckRegistry {
    /// Empty registry.
    pub fn new() -> Self {
        Self { checks: Vec::new() }
    }

    /// Registry with the four built-in checks under default configuration.
    pub fn with_defaults() -> Self {
        let mut registry = Self::new();
        registry.register(Box::new(crate::validity::ValidityCheck));
        registry.register(Box::new(crate::duplicate::DuplicateCheck));
        registry.register(Box::new(crate::size::SizeAnomalyCheck::default()));
        registry.register(Box::new(crate::orientation::RingOrientationCheck));
        registry
    }

    /// Add a check. Later registrations run after earlier ones, but order
    /// never affects verdicts.
    pub fn register(&mut self, check: Box<dyn QualityCheck>) {
        self.checks.push(check);
    }

    /// Registered check names, in registration order.
    pub fn names(&self) -> Vec<&'static str> {
        self.checks.iter().map(|c| c.name()).collect()
    }

    /// Number of registered checks.
    pub fn len(&self) -> usize {
        self.checks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.checks.is_empty()
    }

    /// Run every registered check against one snapshot.
    pub fn run_all(&self, ctx: &CheckContext<'_>) -> Vec<(&'static str, CheckOutcome)> {
        self.checks
            .iter()
            .map(|check| {
                let outcome = check.run(ctx);
                debug!(
                    check = check.name(),
                    result = ?outcome.result,
                    "check evaluated"
                );
                (check.name(), outcome)
            })
            .collect()
    }

    /// Outcomes for a payload no check can evaluate (malformed WKT): one
    /// internal-error outcome per registered check.
    pub fn error_outcomes(&self, message: &str) -> Vec<(&'static str, CheckOutcome)> {
        self.checks
            .iter()
            .map(|check| (check.name(), CheckOutcome::error(message)))
            .collect()
    }
}

impl Default for CheckRegistry {
    fn default() -> Self {
        Self::with_defaults()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_registry_names() {
        let registry = CheckRegistry::with_defaults();
        assert_eq!(
            registry.names(),
            vec!["validity", "duplicate", "size_anomaly", "ring_orientation"]
        );
    }

    #[test]
    fn test_error_outcomes_cover_every_check() {
        let registry = CheckRegistry::with_defaults();
        let outcomes = registry.error_outcomes("unparseable WKT");
        assert_eq!(outcomes.len(), registry.len());
        assert!(outcomes
            .iter()
            .all(|(_, o)| o.result == CheckResult::Error));
    }
}
