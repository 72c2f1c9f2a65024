//! Service level agreements of applications.

use std::fmt::{Display, Formatter};

use serde::{Deserialize, Serialize};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PerformanceMeasureCategory {
    ResponseTime,
    Throughput,
}

impl PerformanceMeasureCategory {
    /// Whether `value` meets the `target` for this kind of measure.
    pub fn meets(&self, value: f64, target: f64) -> bool {
        match self {
            PerformanceMeasureCategory::ResponseTime => value <= target,
            PerformanceMeasureCategory::Throughput => value >= target,
        }
    }
}

impl Display for PerformanceMeasureCategory {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        match self {
            PerformanceMeasureCategory::ResponseTime => write!(f, "response_time"),
            PerformanceMeasureCategory::Throughput => write!(f, "throughput"),
        }
    }
}

/// Maps observed performance measures to a satisfied/violated verdict and a penalty.
pub trait SlaCostModel {
    /// Monitored performance measure categories.
    fn categories(&self) -> Vec<PerformanceMeasureCategory>;

    fn target(&self, category: PerformanceMeasureCategory) -> Option<f64>;

    /// Measures of unmonitored categories are ignored.
    fn satisfied(&self, measures: &[(PerformanceMeasureCategory, f64)]) -> bool;

    fn score(&self, measures: &[(PerformanceMeasureCategory, f64)]) -> f64;
}

/// Charges a fixed penalty whenever any monitored target is missed.
#[derive(Clone, Debug, Serialize)]
pub struct StepSlaCostModel {
    targets: Vec<(PerformanceMeasureCategory, f64)>,
    penalty: f64,
}

impl StepSlaCostModel {
    pub fn new(targets: Vec<(PerformanceMeasureCategory, f64)>, penalty: f64) -> Self {
        Self { targets, penalty }
    }
}

impl SlaCostModel for StepSlaCostModel {
    fn categories(&self) -> Vec<PerformanceMeasureCategory> {
        self.targets.iter().map(|(c, _)| *c).collect()
    }

    fn target(&self, category: PerformanceMeasureCategory) -> Option<f64> {
        self.targets.iter().find(|(c, _)| *c == category).map(|(_, t)| *t)
    }

    fn satisfied(&self, measures: &[(PerformanceMeasureCategory, f64)]) -> bool {
        measures.iter().all(|(category, value)| match self.target(*category) {
            Some(target) => category.meets(*value, target),
            None => true,
        })
    }

    fn score(&self, measures: &[(PerformanceMeasureCategory, f64)]) -> f64 {
        if self.satisfied(measures) {
            0.0
        } else {
            self.penalty
        }
    }
}
