//! Analytic performance model of a multi-tier application.
//!
//! Every tier is treated as an M/M/1 station of an open tandem network (Jackson network), so
//! tier measures follow the product-form formulas.

use serde::Serialize;

use crate::queueing_network::RequestClass;

#[derive(Clone, Debug, Serialize)]
pub struct TandemPerformanceModel {
    arrival_rates: Vec<f64>,
    /// `service_demands[class][tier]` on the reference machine.
    service_demands: Vec<Vec<f64>>,
    num_tiers: usize,
}

impl TandemPerformanceModel {
    pub fn new(classes: &[RequestClass], num_tiers: usize) -> Self {
        Self {
            arrival_rates: classes.iter().map(|c| c.arrival_rate).collect(),
            service_demands: classes
                .iter()
                .map(|c| (0..num_tiers).map(|t| c.service_demands.get(t).copied().unwrap_or(0.0)).collect())
                .collect(),
            num_tiers,
        }
    }

    pub fn num_tiers(&self) -> usize {
        self.num_tiers
    }

    pub fn arrival_rate(&self) -> f64 {
        self.arrival_rates.iter().sum()
    }

    /// Utilization of a tier running at the given capacity multiplier (1 = reference share).
    pub fn tier_utilization(&self, tier: usize, multiplier: f64) -> f64 {
        if multiplier <= 0.0 {
            return f64::INFINITY;
        }
        self.arrival_rates
            .iter()
            .zip(&self.service_demands)
            .map(|(rate, demands)| rate * demands[tier] / multiplier)
            .sum()
    }

    /// Mean residence time of a request at a tier, infinite when the tier is saturated.
    pub fn tier_residence_time(&self, tier: usize, multiplier: f64) -> f64 {
        let rho = self.tier_utilization(tier, multiplier);
        if rho >= 1.0 {
            return f64::INFINITY;
        }
        let total_rate = self.arrival_rate();
        if total_rate <= 0.0 {
            return 0.0;
        }
        // Mean service time of the class mix.
        let mean_service = rho / total_rate;
        mean_service / (1.0 - rho)
    }

    /// Mean end-to-end response time for the per-tier capacity multipliers.
    pub fn response_time(&self, multipliers: &[f64]) -> f64 {
        (0..self.num_tiers)
            .map(|tier| self.tier_residence_time(tier, multipliers.get(tier).copied().unwrap_or(1.0)))
            .sum()
    }
}
