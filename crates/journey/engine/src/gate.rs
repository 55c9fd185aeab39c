//! Gate validator: Definition-of-Done enforcement
//!
//! Decides whether a record may advance past its current stage. All
//! requirements must hold (logical AND, no partial credit), and every
//! failure is collected and reported together so the caller sees the
//! complete checklist in one round trip. Pure function of its inputs.

use journey_types::{RecordSnapshot, Requirement, RequirementCheck, ValidationReport};
use std::collections::HashMap;
use std::sync::Arc;

/// A custom check evaluated against the record snapshot
pub type Predicate = Arc<dyn Fn(&RecordSnapshot) -> bool + Send + Sync>;

/// Evaluates stage requirements against record snapshots
#[derive(Clone, Default)]
pub struct GateValidator {
    predicates: HashMap<String, Predicate>,
}

impl GateValidator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a custom predicate referenced by
    /// [`RequirementCheck::Predicate`] in stage definitions.
    pub fn register_predicate(
        &mut self,
        id: impl Into<String>,
        predicate: impl Fn(&RecordSnapshot) -> bool + Send + Sync + 'static,
    ) {
        self.predicates.insert(id.into(), Arc::new(predicate));
    }

    /// Evaluate every requirement in definition order, collecting all
    /// failures. Never short-circuits.
    pub fn validate(
        &self,
        snapshot: &RecordSnapshot,
        requirements: &[Requirement],
    ) -> ValidationReport {
        let mut failed = Vec::new();
        for requirement in requirements {
            if !self.check(snapshot, &requirement.check) {
                failed.push(requirement.name.clone());
            }
        }
        ValidationReport::from_failures(failed)
    }

    fn check(&self, snapshot: &RecordSnapshot, check: &RequirementCheck) -> bool {
        match check {
            RequirementCheck::FieldPresent(field) => snapshot.contains(field),
            RequirementCheck::FieldTruthy(field) => snapshot.is_truthy(field),
            RequirementCheck::FieldEquals { field, expected } => {
                snapshot.get(field) == Some(expected)
            }
            RequirementCheck::Predicate(id) => match self.predicates.get(id) {
                Some(predicate) => predicate(snapshot),
                None => {
                    // Unknown predicates fail closed
                    tracing::warn!(predicate = %id, "unregistered gate predicate");
                    false
                }
            },
        }
    }
}

impl std::fmt::Debug for GateValidator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GateValidator")
            .field("predicates", &self.predicates.keys().collect::<Vec<_>>())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn make_requirements() -> Vec<Requirement> {
        vec![
            Requirement::truthy("Customer contact verified", "contact_verified"),
            Requirement::present("Copier needs documented", "needs_profile"),
            Requirement::equals("Credit approved", "credit_status", json!("approved")),
        ]
    }

    #[test]
    fn test_all_satisfied() {
        let validator = GateValidator::new();
        let snapshot = RecordSnapshot::new()
            .with_fact("contact_verified", true)
            .with_fact("needs_profile", "A3 color fleet")
            .with_fact("credit_status", "approved");

        let report = validator.validate(&snapshot, &make_requirements());
        assert!(report.valid);
        assert!(report.failed.is_empty());
    }

    #[test]
    fn test_collects_every_failure_in_definition_order() {
        let validator = GateValidator::new();
        let snapshot = RecordSnapshot::new().with_fact("credit_status", "pending");

        let report = validator.validate(&snapshot, &make_requirements());
        assert!(!report.valid);
        assert_eq!(
            report.failed,
            vec![
                "Customer contact verified",
                "Copier needs documented",
                "Credit approved",
            ]
        );
    }

    #[test]
    fn test_partial_failure_reports_only_unmet() {
        let validator = GateValidator::new();
        let snapshot = RecordSnapshot::new()
            .with_fact("contact_verified", true)
            .with_fact("credit_status", "approved");

        let report = validator.validate(&snapshot, &make_requirements());
        assert_eq!(report.failed, vec!["Copier needs documented"]);
    }

    #[test]
    fn test_equals_requires_exact_value() {
        let validator = GateValidator::new();
        let requirements = vec![Requirement::equals("Tier is gold", "tier", json!("gold"))];

        let gold = RecordSnapshot::new().with_fact("tier", "gold");
        assert!(validator.validate(&gold, &requirements).valid);

        let silver = RecordSnapshot::new().with_fact("tier", "silver");
        assert!(!validator.validate(&silver, &requirements).valid);
    }

    #[test]
    fn test_registered_predicate() {
        let mut validator = GateValidator::new();
        validator.register_predicate("margin-floor", |snapshot: &RecordSnapshot| {
            snapshot
                .get("margin_pct")
                .and_then(|v| v.as_f64())
                .map(|pct| pct >= 12.0)
                .unwrap_or(false)
        });
        let requirements = vec![Requirement::predicate("Margin above floor", "margin-floor")];

        let healthy = RecordSnapshot::new().with_fact("margin_pct", 18.5);
        assert!(validator.validate(&healthy, &requirements).valid);

        let thin = RecordSnapshot::new().with_fact("margin_pct", 4.0);
        let report = validator.validate(&thin, &requirements);
        assert_eq!(report.failed, vec!["Margin above floor"]);
    }

    #[test]
    fn test_unknown_predicate_fails_closed() {
        let validator = GateValidator::new();
        let requirements = vec![Requirement::predicate("Mystery check", "not-registered")];

        let report = validator.validate(&RecordSnapshot::new(), &requirements);
        assert!(!report.valid);
        assert_eq!(report.failed, vec!["Mystery check"]);
    }

    #[test]
    fn test_empty_requirements_always_pass() {
        let validator = GateValidator::new();
        let report = validator.validate(&RecordSnapshot::new(), &[]);
        assert!(report.valid);
    }
}
