use std::cell::RefCell;
use std::rc::Rc;

use dslab_core::Simulation;
use sugars::{rc, refcell};
use vdc_simulator::application_simulation_model::ApplicationSimulationModel;
use vdc_simulator::queueing_network::{RequestClass, ServiceDistribution};
use vdc_simulator::sla::{PerformanceMeasureCategory, SlaCostModel, StepSlaCostModel};

fn run_model(targets: Vec<(PerformanceMeasureCategory, f64)>, penalty: f64) -> Rc<RefCell<ApplicationSimulationModel>> {
    let mut sim = Simulation::new(42);
    let classes = vec![RequestClass::new("default".to_string(), 5.0, vec![0.01], ServiceDistribution::Exponential).unwrap()];
    let sla: Rc<dyn SlaCostModel> = rc!(StepSlaCostModel::new(targets, penalty));
    let model = rc!(refcell!(ApplicationSimulationModel::new(
        classes,
        vec![1.0],
        sla,
        sim.create_context("app"),
    )));
    sim.add_handler("app", model.clone());
    model.borrow_mut().start();
    sim.step_for_duration(200.0);
    model
}

#[test]
fn test_unreachable_throughput_target_is_violated() {
    let model = run_model(
        vec![
            (PerformanceMeasureCategory::ResponseTime, 1e9),
            (PerformanceMeasureCategory::Throughput, 1e9),
        ],
        2.0,
    );
    let model = model.borrow();
    assert!(model.num_departures() > 0);
    assert_eq!(model.num_sla_violations(), model.num_departures());
    assert!((model.sla_cost() - 2.0 * model.num_departures() as f64).abs() < 1e-9);
}

#[test]
fn test_met_targets_cost_nothing() {
    let model = run_model(
        vec![
            (PerformanceMeasureCategory::ResponseTime, 1e9),
            (PerformanceMeasureCategory::Throughput, 0.0),
        ],
        2.0,
    );
    let model = model.borrow();
    assert!(model.num_departures() > 0);
    assert_eq!(model.num_sla_violations(), 0);
    assert_eq!(model.sla_cost(), 0.0);
}

#[test]
fn test_throughput_follows_arrival_rate() {
    let model = run_model(vec![(PerformanceMeasureCategory::Throughput, 4.0)], 1.0);
    let model = model.borrow();
    let throughput = model.throughput().unwrap();
    assert!(throughput > 4.0 && throughput < 6.0);
    assert!((model.summary().throughput - throughput).abs() < 1e-12);
    // Only early departures, measured over a short elapsed time, can miss the target.
    assert!(model.num_sla_violations() < model.num_departures());
}
