use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::domain::payment::{CostBreakdown, PaymentStatus};

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct FraudThresholds {
    /// Currency units per mile above which a request is flagged.
    pub max_fuel_cost_per_mile: Decimal,
}

impl Default for FraudThresholds {
    fn default() -> Self {
        Self { max_fuel_cost_per_mile: Decimal::new(5, 1) }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct FraudAssessment {
    pub flagged: bool,
    pub fuel_cost_per_mile: Option<Decimal>,
    pub reason: Option<String>,
}

impl FraudAssessment {
    pub fn status(&self) -> PaymentStatus {
        if self.flagged {
            PaymentStatus::Flagged
        } else {
            PaymentStatus::Pending
        }
    }
}

/// Single static rule: fuel cost per mile against a fixed ceiling.
#[derive(Clone, Debug, Default)]
pub struct FraudDetector {
    thresholds: FraudThresholds,
}

impl FraudDetector {
    pub fn new(thresholds: FraudThresholds) -> Self {
        Self { thresholds }
    }

    pub fn thresholds(&self) -> &FraudThresholds {
        &self.thresholds
    }

    pub fn assess(&self, costs: &CostBreakdown) -> FraudAssessment {
        if costs.mileage <= Decimal::ZERO || costs.fuel_cost <= Decimal::ZERO {
            return FraudAssessment { flagged: false, fuel_cost_per_mile: None, reason: None };
        }

        let ceiling = self.thresholds.max_fuel_cost_per_mile.normalize();

        // A quotient too large for `Decimal` is above any configured ceiling.
        let Some(ratio) = costs.fuel_cost.checked_div(costs.mileage) else {
            return FraudAssessment {
                flagged: true,
                fuel_cost_per_mile: None,
                reason: Some(format!("fuel cost per mile exceeds {ceiling}")),
            };
        };

        let flagged = ratio > self.thresholds.max_fuel_cost_per_mile;
        let reason = flagged.then(|| {
            format!("fuel cost per mile {} exceeds {ceiling}", ratio.round_dp(4).normalize())
        });

        FraudAssessment { flagged, fuel_cost_per_mile: Some(ratio), reason }
    }
}
