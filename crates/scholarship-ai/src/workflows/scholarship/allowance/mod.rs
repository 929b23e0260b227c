mod config;
mod rules;

pub use config::AllowancePolicy;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::domain::{AcademicRecord, ValidationError};
use rules::{check_criteria, validate_record, CheckOutcome};

/// Stateless calculator that applies the allowance policy to an academic record.
#[derive(Debug, Clone, Default)]
pub struct AllowanceCalculator {
    policy: AllowancePolicy,
}

impl AllowanceCalculator {
    pub fn new(policy: AllowancePolicy) -> Self {
        Self { policy }
    }

    /// Compute the allowance breakdown. Missing facts never count as passing or failing;
    /// they yield [`MeritEligibility::Incomplete`] and no merit incentive.
    pub fn compute(&self, record: &AcademicRecord) -> Result<AllowanceResult, ValidationError> {
        let grade = validate_record(record)?;
        let checks = check_criteria(record, grade, &self.policy);

        let mut missing = Vec::new();
        let mut failed = Vec::new();
        let mut reasons = Vec::with_capacity(checks.len());

        for check in checks {
            match check.outcome {
                CheckOutcome::Passed => reasons.push(format!("passed: {}", check.note)),
                CheckOutcome::Failed => {
                    failed.push(check.criterion);
                    reasons.push(format!("failed: {}", check.note));
                }
                CheckOutcome::Missing(fact) => {
                    missing.push(fact);
                    reasons.push(format!("missing: {}", check.note));
                }
            }
        }

        let eligibility = if !missing.is_empty() {
            MeritEligibility::Incomplete { missing }
        } else if !failed.is_empty() {
            MeritEligibility::NotEligible { failed }
        } else {
            MeritEligibility::Eligible
        };

        let base_allowance = self.policy.base_allowance;
        let merit_incentive = if eligibility.is_eligible() {
            self.policy.merit_incentive
        } else {
            Decimal::ZERO
        };

        Ok(AllowanceResult {
            base_allowance,
            merit_incentive,
            total_allowance: base_allowance + merit_incentive,
            eligibility,
            reasons,
        })
    }
}

/// Facts the calculator needs before it can decide merit eligibility.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AcademicFact {
    UnitsEnrolled,
    Grade,
    FirstTimeApplicant,
    IncompleteOrWithdrawn,
    FailedOrDropped,
}

/// The four merit conditions, with the grade condition covering whichever scale applies.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MeritCriterion {
    UnitLoad,
    GradeStanding,
    ReturningApplicant,
    NoIncompleteOrWithdrawn,
    NoFailedOrDropped,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum MeritEligibility {
    Eligible,
    NotEligible { failed: Vec<MeritCriterion> },
    Incomplete { missing: Vec<AcademicFact> },
}

impl MeritEligibility {
    pub fn is_eligible(&self) -> bool {
        matches!(self, MeritEligibility::Eligible)
    }

    pub fn is_incomplete(&self) -> bool {
        matches!(self, MeritEligibility::Incomplete { .. })
    }
}

/// Calculator output: the breakdown plus the audit trail behind it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AllowanceResult {
    pub base_allowance: Decimal,
    pub merit_incentive: Decimal,
    pub total_allowance: Decimal,
    pub eligibility: MeritEligibility,
    pub reasons: Vec<String>,
}

impl AllowanceResult {
    pub fn eligible_for_merit(&self) -> bool {
        self.eligibility.is_eligible()
    }

    pub fn summary(&self) -> String {
        let verdict = match &self.eligibility {
            MeritEligibility::Eligible => "merit incentive granted".to_string(),
            MeritEligibility::NotEligible { failed } => {
                format!("base allowance only ({} criteria unmet)", failed.len())
            }
            MeritEligibility::Incomplete { missing } => {
                format!("base allowance only, {} facts missing", missing.len())
            }
        };
        format!(
            "base {} + merit {} = {}; {}",
            self.base_allowance, self.merit_incentive, self.total_allowance, verdict
        )
    }
}
