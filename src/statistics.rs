//! Output statistics: estimators accumulating observations within a replication.

use serde::Serialize;

/// Basic estimator contract: accumulate observations, report an estimate, reset.
pub trait Statistic {
    fn collect(&mut self, value: f64);

    /// Returns `NaN` when no observation has been collected.
    fn estimate(&self) -> f64;

    fn num_observations(&self) -> u64;

    fn reset(&mut self);
}

#[derive(Clone, Debug, Default, Serialize)]
pub struct MeanEstimator {
    sum: f64,
    count: u64,
}

impl MeanEstimator {
    pub fn new() -> Self {
        Default::default()
    }
}

impl Statistic for MeanEstimator {
    fn collect(&mut self, value: f64) {
        self.sum += value;
        self.count += 1;
    }

    fn estimate(&self) -> f64 {
        if self.count == 0 {
            return f64::NAN;
        }
        self.sum / self.count as f64
    }

    fn num_observations(&self) -> u64 {
        self.count
    }

    fn reset(&mut self) {
        self.sum = 0.0;
        self.count = 0;
    }
}

#[derive(Clone, Debug, Default, Serialize)]
pub struct MinEstimator {
    min: Option<f64>,
    count: u64,
}

impl MinEstimator {
    pub fn new() -> Self {
        Default::default()
    }
}

impl Statistic for MinEstimator {
    fn collect(&mut self, value: f64) {
        self.min = Some(self.min.map_or(value, |m| m.min(value)));
        self.count += 1;
    }

    fn estimate(&self) -> f64 {
        self.min.unwrap_or(f64::NAN)
    }

    fn num_observations(&self) -> u64 {
        self.count
    }

    fn reset(&mut self) {
        self.min = None;
        self.count = 0;
    }
}

#[derive(Clone, Debug, Default, Serialize)]
pub struct MaxEstimator {
    max: Option<f64>,
    count: u64,
}

impl MaxEstimator {
    pub fn new() -> Self {
        Default::default()
    }
}

impl Statistic for MaxEstimator {
    fn collect(&mut self, value: f64) {
        self.max = Some(self.max.map_or(value, |m| m.max(value)));
        self.count += 1;
    }

    fn estimate(&self) -> f64 {
        self.max.unwrap_or(f64::NAN)
    }

    fn num_observations(&self) -> u64 {
        self.count
    }

    fn reset(&mut self) {
        self.max = None;
        self.count = 0;
    }
}

/// Empirical quantile of the collected observations.
#[derive(Clone, Debug, Serialize)]
pub struct QuantileEstimator {
    probability: f64,
    samples: Vec<f64>,
}

impl QuantileEstimator {
    pub fn new(probability: f64) -> Self {
        assert!((0.0..=1.0).contains(&probability), "quantile probability must be in [0, 1]");
        Self {
            probability,
            samples: Vec::new(),
        }
    }

    pub fn probability(&self) -> f64 {
        self.probability
    }
}

impl Statistic for QuantileEstimator {
    fn collect(&mut self, value: f64) {
        self.samples.push(value);
    }

    fn estimate(&self) -> f64 {
        if self.samples.is_empty() {
            return f64::NAN;
        }
        let k = ((self.samples.len() - 1) as f64 * self.probability).round() as usize;
        let mut samples = self.samples.clone();
        *order_stat::kth_by(&mut samples, k, |a, b| a.total_cmp(b))
    }

    fn num_observations(&self) -> u64 {
        self.samples.len() as u64
    }

    fn reset(&mut self) {
        self.samples.clear();
    }
}

/// Collects one estimate per replication of an inner statistic and averages them.
#[derive(Clone, Debug, Serialize)]
pub struct ReplicatedStatistic<S: Statistic + Clone> {
    current: S,
    replication_estimates: Vec<f64>,
}

impl<S: Statistic + Clone> ReplicatedStatistic<S> {
    pub fn new(statistic: S) -> Self {
        Self {
            current: statistic,
            replication_estimates: Vec::new(),
        }
    }

    pub fn begin_replication(&mut self) {
        self.current.reset();
    }

    pub fn collect(&mut self, value: f64) {
        self.current.collect(value);
    }

    /// Records the estimate of the current replication.
    pub fn end_replication(&mut self) {
        self.replication_estimates.push(self.current.estimate());
    }

    pub fn current(&self) -> &S {
        &self.current
    }

    pub fn replication_estimates(&self) -> &[f64] {
        &self.replication_estimates
    }

    /// Mean of the replication estimates, ignoring replications without observations.
    pub fn overall_estimate(&self) -> f64 {
        let mut mean = MeanEstimator::new();
        for estimate in self.replication_estimates.iter().filter(|e| !e.is_nan()) {
            mean.collect(*estimate);
        }
        mean.estimate()
    }

    pub fn clear(&mut self) {
        self.current.reset();
        self.replication_estimates.clear();
    }
}

/// Exponentially weighted moving average: `alpha*sample + (1-alpha)*old`.
///
/// The first sample seeds the filter unchanged.
#[derive(Clone, Copy, Debug, Serialize)]
pub struct EwmaFilter {
    alpha: f64,
    value: Option<f64>,
}

impl EwmaFilter {
    pub fn new(alpha: f64) -> Self {
        assert!((0.0..=1.0).contains(&alpha), "EWMA smoothing factor must be in [0, 1]");
        Self { alpha, value: None }
    }

    pub fn filter(&mut self, sample: f64) -> f64 {
        let value = match self.value {
            None => sample,
            Some(old) => self.alpha * sample + (1.0 - self.alpha) * old,
        };
        self.value = Some(value);
        value
    }

    pub fn value(&self) -> Option<f64> {
        self.value
    }
}
