use super::common::*;
use rust_decimal::Decimal;

use crate::workflows::scholarship::allowance::{
    AcademicFact, AllowanceCalculator, MeritCriterion, MeritEligibility,
};
use crate::workflows::scholarship::domain::{AcademicRecord, ValidationError};

fn calculator() -> AllowanceCalculator {
    AllowanceCalculator::default()
}

#[test]
fn full_load_with_high_swa_earns_merit() {
    let result = calculator()
        .compute(&record(15, Decimal::new(90, 0)))
        .expect("valid record");

    assert_eq!(result.eligibility, MeritEligibility::Eligible);
    assert_eq!(result.base_allowance, Decimal::new(5000, 0));
    assert_eq!(result.merit_incentive, Decimal::new(5000, 0));
    assert_eq!(result.total_allowance, Decimal::new(10_000, 0));
}

#[test]
fn light_load_gets_base_allowance_only() {
    let result = calculator()
        .compute(&record(12, Decimal::new(95, 0)))
        .expect("valid record");

    assert_eq!(
        result.eligibility,
        MeritEligibility::NotEligible {
            failed: vec![MeritCriterion::UnitLoad]
        }
    );
    assert_eq!(result.merit_incentive, Decimal::ZERO);
    assert_eq!(result.total_allowance, Decimal::new(5000, 0));
}

#[test]
fn thresholds_are_inclusive() {
    let at_floor = calculator()
        .compute(&record(15, Decimal::new(8875, 2)))
        .expect("valid record");
    assert!(at_floor.eligible_for_merit());

    let below_floor = calculator()
        .compute(&record(15, Decimal::new(8874, 2)))
        .expect("valid record");
    assert!(!below_floor.eligible_for_merit());

    let gpa_ceiling = AcademicRecord {
        swa_grade: None,
        gpa: Some(Decimal::new(175, 2)),
        ..record(15, Decimal::ZERO)
    };
    assert!(calculator()
        .compute(&gpa_ceiling)
        .expect("valid record")
        .eligible_for_merit());
}

#[test]
fn gpa_above_ceiling_fails_grade_standing() {
    let record = AcademicRecord {
        swa_grade: None,
        gpa: Some(Decimal::new(200, 2)),
        ..record(18, Decimal::ZERO)
    };
    let result = calculator().compute(&record).expect("valid record");

    assert_eq!(
        result.eligibility,
        MeritEligibility::NotEligible {
            failed: vec![MeritCriterion::GradeStanding]
        }
    );
    assert_eq!(result.total_allowance, Decimal::new(5000, 0));
}

#[test]
fn disqualifying_flags_remove_merit() {
    let cases = [
        (
            AcademicRecord {
                has_incomplete_or_withdrawn: Some(true),
                ..record(18, Decimal::new(95, 0))
            },
            MeritCriterion::NoIncompleteOrWithdrawn,
        ),
        (
            AcademicRecord {
                has_failed_or_dropped: Some(true),
                ..record(18, Decimal::new(95, 0))
            },
            MeritCriterion::NoFailedOrDropped,
        ),
        (
            AcademicRecord {
                is_first_time_applicant: Some(true),
                ..record(18, Decimal::new(95, 0))
            },
            MeritCriterion::ReturningApplicant,
        ),
    ];

    for (record, criterion) in cases {
        let result = calculator().compute(&record).expect("valid record");
        assert_eq!(
            result.eligibility,
            MeritEligibility::NotEligible {
                failed: vec![criterion]
            }
        );
        assert_eq!(result.merit_incentive, Decimal::ZERO);
    }
}

#[test]
fn missing_facts_are_incomplete_not_failed() {
    let record = AcademicRecord {
        units_enrolled: Some(12),
        ..AcademicRecord::default()
    };
    let result = calculator().compute(&record).expect("valid record");

    match &result.eligibility {
        MeritEligibility::Incomplete { missing } => {
            assert!(missing.contains(&AcademicFact::Grade));
            assert!(missing.contains(&AcademicFact::FirstTimeApplicant));
            assert!(!missing.contains(&AcademicFact::UnitsEnrolled));
        }
        other => panic!("expected incomplete eligibility, got {other:?}"),
    }
    assert_eq!(result.merit_incentive, Decimal::ZERO);
    assert_eq!(result.total_allowance, result.base_allowance);
    assert!(result
        .reasons
        .iter()
        .any(|reason| reason.starts_with("failed: units 12")));
}

#[test]
fn invalid_records_are_rejected() {
    let negative = AcademicRecord {
        units_enrolled: Some(-1),
        ..AcademicRecord::default()
    };
    assert_eq!(
        calculator().compute(&negative),
        Err(ValidationError::NegativeUnits(-1))
    );

    let both_scales = AcademicRecord {
        gpa: Some(Decimal::new(150, 2)),
        ..record(15, Decimal::new(90, 0))
    };
    assert_eq!(
        calculator().compute(&both_scales),
        Err(ValidationError::AmbiguousGradeScale)
    );

    let over_hundred = record(15, Decimal::new(101, 0));
    assert_eq!(
        calculator().compute(&over_hundred),
        Err(ValidationError::SwaOutOfRange(Decimal::new(101, 0)))
    );
}

fn gpa_record(gpa: Decimal) -> AcademicRecord {
    AcademicRecord {
        swa_grade: None,
        gpa: Some(gpa),
        ..record(15, Decimal::ZERO)
    }
}

#[test]
fn grades_outside_either_scale_are_rejected() {
    for gpa in [Decimal::new(99, 2), Decimal::new(501, 2)] {
        assert_eq!(
            calculator().compute(&gpa_record(gpa)),
            Err(ValidationError::GpaOutOfRange(gpa))
        );
    }

    let negative_swa = record(15, Decimal::new(-1, 0));
    assert_eq!(
        calculator().compute(&negative_swa),
        Err(ValidationError::SwaOutOfRange(Decimal::new(-1, 0)))
    );
}

#[test]
fn scale_bounds_are_inclusive() {
    for gpa in [Decimal::new(100, 2), Decimal::new(500, 2)] {
        assert!(
            calculator().compute(&gpa_record(gpa)).is_ok(),
            "GPA {gpa} should be accepted"
        );
    }
    for swa in [Decimal::ZERO, Decimal::ONE_HUNDRED] {
        assert!(
            calculator().compute(&record(15, swa)).is_ok(),
            "SWA {swa} should be accepted"
        );
    }

    let best_gpa = calculator()
        .compute(&gpa_record(Decimal::new(100, 2)))
        .expect("valid record");
    assert!(best_gpa.eligible_for_merit());
    let failing_gpa = calculator()
        .compute(&gpa_record(Decimal::new(500, 2)))
        .expect("valid record");
    assert!(!failing_gpa.eligible_for_merit());
}

#[test]
fn totals_always_equal_base_plus_merit() {
    let records = [
        record(15, Decimal::new(90, 0)),
        record(0, Decimal::ZERO),
        record(24, Decimal::new(100, 0)),
        AcademicRecord::default(),
    ];

    for record in records {
        let result = calculator().compute(&record).expect("valid record");
        assert_eq!(
            result.total_allowance,
            result.base_allowance + result.merit_incentive
        );
        assert!(result.merit_incentive >= Decimal::ZERO);
        assert_eq!(
            result.merit_incentive > Decimal::ZERO,
            result.eligible_for_merit()
        );
    }
}
