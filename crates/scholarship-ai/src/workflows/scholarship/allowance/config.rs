use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Fixed allowance policy. The defaults are the program's published reference values.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AllowancePolicy {
    pub base_allowance: Decimal,
    pub merit_incentive: Decimal,
    pub minimum_units: i32,
    /// Inclusive floor on the percentage scale.
    pub minimum_swa: Decimal,
    /// Inclusive ceiling on the inverted scale.
    pub maximum_gpa: Decimal,
}

impl Default for AllowancePolicy {
    fn default() -> Self {
        Self {
            base_allowance: Decimal::new(500_000, 2),
            merit_incentive: Decimal::new(500_000, 2),
            minimum_units: 15,
            minimum_swa: Decimal::new(8875, 2),
            maximum_gpa: Decimal::new(175, 2),
        }
    }
}
