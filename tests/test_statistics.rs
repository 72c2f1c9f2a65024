use vdc_simulator::energy_meter::EnergyMeter;
use vdc_simulator::energy_model::{ConstantEnergyModel, EnergyModel, Fan2007EnergyModel};
use vdc_simulator::statistics::{
    EwmaFilter, MaxEstimator, MeanEstimator, MinEstimator, QuantileEstimator, ReplicatedStatistic, Statistic,
};

#[test]
fn test_ewma_first_sample_seeds_filter() {
    let mut filter = EwmaFilter::new(0.7);
    assert_eq!(filter.value(), None);
    assert_eq!(filter.filter(0.4), 0.4);
    assert_eq!(filter.value(), Some(0.4));
}

#[test]
fn test_ewma_blends_samples() {
    let mut filter = EwmaFilter::new(0.7);
    filter.filter(0.4);
    let value = filter.filter(0.8);
    assert!((value - (0.7 * 0.8 + 0.3 * 0.4)).abs() < 1e-12);
    let value = filter.filter(0.0);
    assert!((value - 0.3 * 0.68).abs() < 1e-12);

    // alpha = 1 only keeps the last sample, alpha = 0 only the first one.
    let mut last = EwmaFilter::new(1.0);
    let mut first = EwmaFilter::new(0.0);
    for sample in [0.2, 0.9, 0.5] {
        last.filter(sample);
        first.filter(sample);
    }
    assert_eq!(last.value(), Some(0.5));
    assert_eq!(first.value(), Some(0.2));
}

#[test]
fn test_estimators() {
    let mut mean = MeanEstimator::new();
    let mut min = MinEstimator::new();
    let mut max = MaxEstimator::new();
    let mut median = QuantileEstimator::new(0.5);
    assert!(mean.estimate().is_nan());
    assert!(median.estimate().is_nan());
    for value in [3.0, 1.0, 4.0, 1.0, 5.0] {
        mean.collect(value);
        min.collect(value);
        max.collect(value);
        median.collect(value);
    }
    assert!((mean.estimate() - 2.8).abs() < 1e-12);
    assert_eq!(min.estimate(), 1.0);
    assert_eq!(max.estimate(), 5.0);
    assert_eq!(median.estimate(), 3.0);
    assert_eq!(median.num_observations(), 5);

    mean.reset();
    assert_eq!(mean.num_observations(), 0);
    assert!(mean.estimate().is_nan());
}

#[test]
fn test_replicated_statistic() {
    let mut statistic = ReplicatedStatistic::new(MeanEstimator::new());
    statistic.begin_replication();
    statistic.collect(1.0);
    statistic.collect(3.0);
    statistic.end_replication();
    statistic.begin_replication();
    statistic.end_replication();
    statistic.begin_replication();
    statistic.collect(4.0);
    statistic.end_replication();

    assert_eq!(statistic.replication_estimates().len(), 3);
    assert_eq!(statistic.replication_estimates()[0], 2.0);
    assert!(statistic.replication_estimates()[1].is_nan());
    // Replications without observations are skipped.
    assert_eq!(statistic.overall_estimate(), 3.0);

    statistic.clear();
    assert!(statistic.replication_estimates().is_empty());
    assert!(statistic.overall_estimate().is_nan());
}

#[test]
fn test_energy_models() {
    let constant = ConstantEnergyModel::new(80.0);
    assert_eq!(constant.consumed_energy(0.0), 80.0);
    assert_eq!(constant.consumed_energy(1.0), 80.0);
    assert_eq!(constant.marginal_energy(0.5), 0.0);

    let fan = Fan2007EnergyModel::new(100.0, 50.0, 30.0, 1.2);
    assert_eq!(fan.consumed_energy(0.0), 100.0);
    assert!((fan.consumed_energy(1.0) - 180.0).abs() < 1e-12);
    assert!((fan.marginal_energy(1.0) - (50.0 + 30.0 * 1.2)).abs() < 1e-12);
    assert_eq!(fan.marginal_energy(0.0), 50.0);
    let coefficients = fan.coefficients();
    assert_eq!(coefficients.r, 1.2);
}

#[test]
fn test_energy_meter() {
    let mut meter = EnergyMeter::new();
    meter.update(0.0, 100.0);
    meter.update(10.0, 150.0);
    assert_eq!(meter.energy_consumed(), 1000.0);
    assert_eq!(meter.energy_consumed_until(12.0), 1300.0);
    meter.update(12.0, 0.0);
    assert_eq!(meter.energy_consumed_until(100.0), 1300.0);

    meter.reset(100.0, 50.0);
    assert_eq!(meter.energy_consumed(), 0.0);
    assert_eq!(meter.energy_consumed_until(102.0), 100.0);
}
