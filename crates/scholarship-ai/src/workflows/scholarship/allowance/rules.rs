use rust_decimal::Decimal;

use super::super::domain::{AcademicRecord, ValidationError};
use super::config::AllowancePolicy;
use super::{AcademicFact, MeritCriterion};

/// The single grading scale in effect for a record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum GradeReading {
    Swa(Decimal),
    Gpa(Decimal),
}

pub(crate) enum CheckOutcome {
    Passed,
    Failed,
    Missing(AcademicFact),
}

pub(crate) struct CriterionCheck {
    pub criterion: MeritCriterion,
    pub outcome: CheckOutcome,
    pub note: String,
}

pub(crate) fn validate_record(
    record: &AcademicRecord,
) -> Result<Option<GradeReading>, ValidationError> {
    if let Some(units) = record.units_enrolled {
        if units < 0 {
            return Err(ValidationError::NegativeUnits(units));
        }
    }

    match (record.swa_grade, record.gpa) {
        (Some(_), Some(_)) => Err(ValidationError::AmbiguousGradeScale),
        (Some(swa), None) => {
            if swa < Decimal::ZERO || swa > Decimal::ONE_HUNDRED {
                return Err(ValidationError::SwaOutOfRange(swa));
            }
            Ok(Some(GradeReading::Swa(swa)))
        }
        (None, Some(gpa)) => {
            if gpa < Decimal::ONE || gpa > Decimal::new(5, 0) {
                return Err(ValidationError::GpaOutOfRange(gpa));
            }
            Ok(Some(GradeReading::Gpa(gpa)))
        }
        (None, None) => Ok(None),
    }
}

pub(crate) fn check_criteria(
    record: &AcademicRecord,
    grade: Option<GradeReading>,
    policy: &AllowancePolicy,
) -> Vec<CriterionCheck> {
    let mut checks = Vec::with_capacity(5);

    checks.push(match record.units_enrolled {
        Some(units) if units >= policy.minimum_units => CriterionCheck {
            criterion: MeritCriterion::UnitLoad,
            outcome: CheckOutcome::Passed,
            note: format!("units {units} meet the {} unit minimum", policy.minimum_units),
        },
        Some(units) => CriterionCheck {
            criterion: MeritCriterion::UnitLoad,
            outcome: CheckOutcome::Failed,
            note: format!("units {units} below the {} unit minimum", policy.minimum_units),
        },
        None => CriterionCheck {
            criterion: MeritCriterion::UnitLoad,
            outcome: CheckOutcome::Missing(AcademicFact::UnitsEnrolled),
            note: "units enrolled not yet extracted".to_string(),
        },
    });

    checks.push(match grade {
        Some(GradeReading::Swa(swa)) if swa >= policy.minimum_swa => CriterionCheck {
            criterion: MeritCriterion::GradeStanding,
            outcome: CheckOutcome::Passed,
            note: format!("SWA {swa} meets the {} floor", policy.minimum_swa),
        },
        Some(GradeReading::Swa(swa)) => CriterionCheck {
            criterion: MeritCriterion::GradeStanding,
            outcome: CheckOutcome::Failed,
            note: format!("SWA {swa} below the {} floor", policy.minimum_swa),
        },
        Some(GradeReading::Gpa(gpa)) if gpa <= policy.maximum_gpa => CriterionCheck {
            criterion: MeritCriterion::GradeStanding,
            outcome: CheckOutcome::Passed,
            note: format!("GPA {gpa} within the {} ceiling", policy.maximum_gpa),
        },
        Some(GradeReading::Gpa(gpa)) => CriterionCheck {
            criterion: MeritCriterion::GradeStanding,
            outcome: CheckOutcome::Failed,
            note: format!("GPA {gpa} above the {} ceiling", policy.maximum_gpa),
        },
        None => CriterionCheck {
            criterion: MeritCriterion::GradeStanding,
            outcome: CheckOutcome::Missing(AcademicFact::Grade),
            note: "no SWA or GPA extracted".to_string(),
        },
    });

    checks.push(flag_check(
        record.is_first_time_applicant,
        MeritCriterion::ReturningApplicant,
        AcademicFact::FirstTimeApplicant,
        "returning applicant",
        "first-time applicants receive the base allowance only",
        "first-time applicant status unknown",
    ));

    checks.push(flag_check(
        record.has_incomplete_or_withdrawn,
        MeritCriterion::NoIncompleteOrWithdrawn,
        AcademicFact::IncompleteOrWithdrawn,
        "no incomplete or withdrawn subjects",
        "has incomplete or withdrawn subjects",
        "incomplete/withdrawn subjects not yet checked",
    ));

    checks.push(flag_check(
        record.has_failed_or_dropped,
        MeritCriterion::NoFailedOrDropped,
        AcademicFact::FailedOrDropped,
        "no failed or dropped subjects",
        "has failed or dropped subjects",
        "failed/dropped subjects not yet checked",
    ));

    checks
}

/// Flags disqualify when `true`: the criterion passes only on an explicit `false`.
fn flag_check(
    flag: Option<bool>,
    criterion: MeritCriterion,
    fact: AcademicFact,
    passed: &str,
    failed: &str,
    missing: &str,
) -> CriterionCheck {
    let (outcome, note) = match flag {
        Some(false) => (CheckOutcome::Passed, passed),
        Some(true) => (CheckOutcome::Failed, failed),
        None => (CheckOutcome::Missing(fact), missing),
    };

    CriterionCheck {
        criterion,
        outcome,
        note: note.to_string(),
    }
}
