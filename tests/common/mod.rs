#![allow(dead_code)]

use std::cell::RefCell;
use std::rc::Rc;

use dslab_core::Simulation;
use sugars::{rc, refcell};
use vdc_simulator::application::{ApplicationTier, MultiTierApplication};
use vdc_simulator::application_simulation_model::ApplicationSimulationModel;
use vdc_simulator::common::{ApplicationId, PhysicalMachineId};
use vdc_simulator::data_center::DataCenter;
use vdc_simulator::default_application_controllers::dummy_controller::DummyApplicationController;
use vdc_simulator::energy_model::Fan2007EnergyModel;
use vdc_simulator::physical_machine_controller::{
    DummyPhysicalMachineController, PhysicalMachineController, ProportionalPhysicalMachineController,
};
use vdc_simulator::queueing_network::{RequestClass, ServiceDistribution};
use vdc_simulator::resource::{Resource, ResourceCategory};
use vdc_simulator::sla::{PerformanceMeasureCategory, SlaCostModel, StepSlaCostModel};

pub fn name_wrapper(file_name: &str) -> String {
    format!("test-configs/{}", file_name)
}

pub fn fan_cpu(capacity: f64, threshold: f64) -> Resource {
    Resource::new(ResourceCategory::Cpu, capacity, threshold)
        .with_energy_model(Box::new(Fan2007EnergyModel::new(100.0, 50.0, 30.0, 1.2)))
}

pub fn make_data_center(sim: &mut Simulation, num_pms: usize, proportional: bool) -> (Rc<RefCell<DataCenter>>, Vec<PhysicalMachineId>) {
    let data_center = rc!(refcell!(DataCenter::new(sim.create_context("data_center"))));
    let mut pms = Vec::new();
    for i in 0..num_pms {
        let controller: Box<dyn PhysicalMachineController> = if proportional {
            Box::new(ProportionalPhysicalMachineController::new())
        } else {
            Box::new(DummyPhysicalMachineController::new())
        };
        pms.push(
            data_center
                .borrow_mut()
                .add_physical_machine(&format!("pm_{}", i), vec![fan_cpu(1.0, 1.0)], controller),
        );
    }
    (data_center, pms)
}

/// Registers an application whose tiers get `shares` of a reference machine with capacity 1.
pub fn add_application(
    sim: &mut Simulation,
    data_center: &Rc<RefCell<DataCenter>>,
    name: &str,
    shares: &[f64],
) -> ApplicationId {
    let classes = vec![RequestClass::new(
        "default".to_string(),
        1.0,
        vec![0.1; shares.len()],
        ServiceDistribution::Exponential,
    )
    .unwrap()];
    let sla: Rc<dyn SlaCostModel> = rc!(StepSlaCostModel::new(
        vec![(PerformanceMeasureCategory::ResponseTime, 1.0)],
        1.0
    ));
    let model = rc!(refcell!(ApplicationSimulationModel::new(
        classes,
        shares.to_vec(),
        sla.clone(),
        sim.create_context(name),
    )));
    sim.add_handler(name, model.clone());
    let tiers = shares
        .iter()
        .enumerate()
        .map(|(i, share)| ApplicationTier::new(format!("tier_{}", i), vec![(ResourceCategory::Cpu, *share)]))
        .collect();
    let application = MultiTierApplication::new(
        name.to_string(),
        tiers,
        vec![Resource::new(ResourceCategory::Cpu, 1.0, 1.0)],
        model,
        sla,
    )
    .unwrap();
    data_center
        .borrow_mut()
        .add_application(application, Box::new(DummyApplicationController::new()))
}
