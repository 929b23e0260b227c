use rust_decimal::Decimal;

use super::super::allowance::AllowanceResult;
use super::super::collaborators::VerificationReport;
use super::super::domain::VerificationStatus;

/// Decides where an application lands after automated verification.
///
/// `allowance` is `None` when extraction failed and nothing was recomputed. Any
/// `Fn(&VerificationReport, Option<&AllowanceResult>) -> VerificationStatus` closure is a
/// policy as well.
pub trait RoutingPolicy: Send + Sync {
    fn route(
        &self,
        report: &VerificationReport,
        allowance: Option<&AllowanceResult>,
    ) -> VerificationStatus;
}

impl<F> RoutingPolicy for F
where
    F: Fn(&VerificationReport, Option<&AllowanceResult>) -> VerificationStatus + Send + Sync,
{
    fn route(
        &self,
        report: &VerificationReport,
        allowance: Option<&AllowanceResult>,
    ) -> VerificationStatus {
        self(report, allowance)
    }
}

/// Every successful extraction waits for a reviewer; failed extractions are rejected.
#[derive(Debug, Clone, Copy, Default)]
pub struct ManualReviewRouting;

impl RoutingPolicy for ManualReviewRouting {
    fn route(
        &self,
        report: &VerificationReport,
        _allowance: Option<&AllowanceResult>,
    ) -> VerificationStatus {
        match report {
            VerificationReport::Extracted(_) => VerificationStatus::UnderReview,
            VerificationReport::ExtractionFailed { .. } => VerificationStatus::Rejected,
        }
    }
}

/// Approves complete, high-confidence extractions without a reviewer.
#[derive(Debug, Clone, Copy)]
pub struct ConfidenceRouting {
    pub auto_approve_at: Decimal,
}

impl RoutingPolicy for ConfidenceRouting {
    fn route(
        &self,
        report: &VerificationReport,
        allowance: Option<&AllowanceResult>,
    ) -> VerificationStatus {
        match (report, allowance) {
            (VerificationReport::ExtractionFailed { .. }, _) => VerificationStatus::Rejected,
            (VerificationReport::Extracted(facts), Some(result))
                if !result.eligibility.is_incomplete()
                    && facts
                        .confidence
                        .map_or(false, |confidence| confidence >= self.auto_approve_at) =>
            {
                VerificationStatus::Approved
            }
            _ => VerificationStatus::UnderReview,
        }
    }
}
