mod common;

use std::cell::{Cell, RefCell};
use std::collections::BTreeMap;
use std::rc::Rc;

use dslab_core::Simulation;
use vdc_simulator::common::{ApplicationId, PhysicalMachineId, VirtualMachineId};
use vdc_simulator::data_center::DataCenter;
use vdc_simulator::migration_controller::{ControllerState, MigrationController, WantedShareSource};
use vdc_simulator::placement_solver::{CostWeights, DataCenterSnapshot, PlacementSolution, PlacementSolver};
use vdc_simulator::resource::ResourceCategory;
use vdc_simulator::statistics::Statistic;

use common::{add_application, make_data_center};

/// Returns a fixed solution and counts its invocations.
struct StubSolver {
    solution: PlacementSolution,
    calls: Rc<Cell<u32>>,
}

impl PlacementSolver for StubSolver {
    fn solve(
        &mut self,
        _snapshot: &DataCenterSnapshot,
        _weights: &CostWeights,
        _vm_utilization: &BTreeMap<VirtualMachineId, f64>,
        _vm_wanted_share: &BTreeMap<VirtualMachineId, BTreeMap<ResourceCategory, f64>>,
    ) -> PlacementSolution {
        self.calls.set(self.calls.get() + 1);
        self.solution.clone()
    }
}

fn make_controller(
    sim: &mut Simulation,
    dc: &Rc<RefCell<DataCenter>>,
    solution: PlacementSolution,
    weights: CostWeights,
) -> (MigrationController, Rc<Cell<u32>>) {
    let calls = Rc::new(Cell::new(0));
    let solver = StubSolver {
        solution,
        calls: calls.clone(),
    };
    let controller = MigrationController::new(
        dc.clone(),
        Box::new(solver),
        weights,
        60.0,
        0.7,
        WantedShareSource::TierReference,
        sim.create_context("migration_controller"),
    );
    (controller, calls)
}

/// Two machines with one tier of a two-tier application on each, running.
fn spread_application(sim: &mut Simulation) -> (Rc<RefCell<DataCenter>>, ApplicationId, Vec<PhysicalMachineId>, Vec<VirtualMachineId>) {
    let (dc, pms) = make_data_center(sim, 2, false);
    let app = add_application(sim, &dc, "app", &[0.5, 0.5]);
    let vms = {
        let mut dc = dc.borrow_mut();
        dc.deploy_application(app).unwrap();
        let vms = dc.application_virtual_machines(app).unwrap().to_vec();
        dc.place_virtual_machine(vms[0], pms[0], vec![(ResourceCategory::Cpu, 0.5)], false, true)
            .unwrap();
        dc.place_virtual_machine(vms[1], pms[1], vec![(ResourceCategory::Cpu, 0.5)], false, true)
            .unwrap();
        assert!(dc.start_application(app).unwrap());
        vms
    };
    (dc, app, pms, vms)
}

#[test]
fn test_failed_solve_keeps_placement() {
    let mut sim = Simulation::new(42);
    let (dc, _, _, _) = spread_application(&mut sim);
    let (mut controller, calls) = make_controller(&mut sim, &dc, PlacementSolution::unsolved(), CostWeights::new(1.0, 1.0, 1.0));
    let before = dc.borrow().current_placement().clone();

    for _ in 0..3 {
        controller.process_control().unwrap();
    }
    assert_eq!(calls.get(), 3);
    assert_eq!(controller.count(), 3);
    assert_eq!(controller.fail_count(), 3);
    assert_eq!(controller.migr_count(), 0);
    assert_eq!(controller.cost_statistic().current().num_observations(), 0);
    assert!(controller.current_migration_rate().is_nan());
    assert_eq!(dc.borrow().current_placement(), &before);
}

#[test]
fn test_no_active_vm_powers_off_machines() {
    let mut sim = Simulation::new(42);
    let (dc, pms) = make_data_center(&mut sim, 2, false);
    for pm in pms.iter() {
        dc.borrow_mut().power_on_physical_machine(*pm).unwrap();
    }
    let (mut controller, calls) = make_controller(&mut sim, &dc, PlacementSolution::unsolved(), CostWeights::new(1.0, 1.0, 1.0));

    controller.process_control().unwrap();
    assert_eq!(calls.get(), 0);
    assert_eq!(controller.count(), 1);
    assert_eq!(controller.fail_count(), 0);
    assert!(dc.borrow().powered_on_physical_machines().is_empty());
}

#[test]
fn test_solution_is_applied() {
    let mut sim = Simulation::new(42);
    let (dc, _, pms, vms) = spread_application(&mut sim);
    let mut placement = BTreeMap::new();
    placement.insert((pms[0], vms[0]), vec![(ResourceCategory::Cpu, 0.5)]);
    placement.insert((pms[0], vms[1]), vec![(ResourceCategory::Cpu, 0.5)]);
    let solution = PlacementSolution {
        solved: true,
        cost: 1.25,
        placement,
    };
    // Power and SLA deviation terms only, no migration cost.
    let (mut controller, calls) = make_controller(&mut sim, &dc, solution, CostWeights::new(1.0, 0.0, 1.0));

    assert_eq!(controller.weights(), CostWeights::new(1.0, 0.0, 1.0));

    controller.process_control().unwrap();
    assert_eq!(calls.get(), 1);
    assert_eq!(controller.fail_count(), 0);
    assert_eq!(controller.migr_count(), 1);
    assert_eq!(controller.current_migration_rate(), 0.5);
    assert_eq!(controller.cost_statistic().current().num_observations(), 1);
    assert_eq!(controller.cost_statistic().current().estimate(), 1.25);
    // The first observation seeds the filter.
    assert!(controller.filtered_utilization(vms[0]).is_some());

    let dc = dc.borrow();
    for vm in vms.iter() {
        let entry = dc.current_placement().find(*vm).unwrap();
        assert_eq!(entry.physical_machine, pms[0]);
        assert_eq!(entry.shares, vec![(ResourceCategory::Cpu, 0.5)]);
    }
    assert_eq!(dc.powered_on_physical_machines(), vec![pms[0]]);

    // Applying the same solution again relocates nothing.
    drop(dc);
    controller.process_control().unwrap();
    assert_eq!(controller.migr_count(), 1);
    assert_eq!(controller.current_migration_rate(), 0.25);
}

#[test]
fn test_inconsistent_solution_is_a_failure() {
    let mut sim = Simulation::new(42);
    let (dc, _, pms, vms) = spread_application(&mut sim);
    let mut placement = BTreeMap::new();
    placement.insert((pms[0], vms[0]), vec![(ResourceCategory::Cpu, 0.5)]);
    placement.insert((pms[1], vms[0]), vec![(ResourceCategory::Cpu, 0.5)]);
    let solution = PlacementSolution {
        solved: true,
        cost: 1.0,
        placement,
    };
    let (mut controller, _) = make_controller(&mut sim, &dc, solution, CostWeights::new(1.0, 1.0, 1.0));
    let before = dc.borrow().current_placement().clone();

    controller.process_control().unwrap();
    assert_eq!(controller.fail_count(), 1);
    assert_eq!(dc.borrow().current_placement(), &before);
}

#[test]
fn test_replication_lifecycle() {
    let mut sim = Simulation::new(42);
    let (dc, _, _, _) = spread_application(&mut sim);
    let (mut controller, _) = make_controller(&mut sim, &dc, PlacementSolution::unsolved(), CostWeights::new(1.0, 1.0, 1.0));
    assert_eq!(controller.state(), ControllerState::Idle);

    controller.on_begin_of_simulation();
    controller.on_system_initialization();
    assert_eq!(controller.state(), ControllerState::Armed);
    controller.process_control().unwrap();
    controller.on_system_finalization();
    assert_eq!(controller.state(), ControllerState::Idle);
    assert_eq!(controller.num_migrations_statistic().replication_estimates(), &[0.0]);
    // No placement applied, no migration rate sample.
    assert!(controller.migration_rate_statistic().replication_estimates()[0].is_nan());

    controller.on_system_initialization();
    assert_eq!(controller.count(), 0);
    assert_eq!(controller.fail_count(), 0);
}
