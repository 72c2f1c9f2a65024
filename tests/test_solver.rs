use std::collections::BTreeMap;

use vdc_simulator::default_placement_solvers::branch_and_bound_solver::BranchAndBoundPlacementSolver;
use vdc_simulator::energy_model::Fan2007EnergyModel;
use vdc_simulator::placement_problem::PlacementProblem;
use vdc_simulator::placement_solver::{
    CostWeights, DataCenterSnapshot, PhysicalMachineSnapshot, PlacementProblemKind, PlacementSolver,
    VirtualMachineSnapshot,
};
use vdc_simulator::resource::ResourceCategory;

fn pm(id: u64) -> PhysicalMachineSnapshot {
    PhysicalMachineSnapshot {
        id,
        cpu_capacity: 1.0,
        cpu_threshold: 1.0,
        powered_on: true,
        energy_model: Box::new(Fan2007EnergyModel::new(100.0, 50.0, 30.0, 1.2)),
    }
}

fn vm(id: u64, host: Option<u64>, reference_share: f64) -> VirtualMachineSnapshot {
    VirtualMachineSnapshot {
        id,
        application: 1,
        tier: (id - 1) as usize,
        host,
        reference_cpu_capacity: 1.0,
        reference_cpu_threshold: 1.0,
        reference_share,
    }
}

fn uniform_inputs(
    snapshot: &DataCenterSnapshot,
    utilization: f64,
) -> (BTreeMap<u64, f64>, BTreeMap<u64, BTreeMap<ResourceCategory, f64>>) {
    let utilization = snapshot.virtual_machines.iter().map(|vm| (vm.id, utilization)).collect();
    let wanted = snapshot
        .virtual_machines
        .iter()
        .map(|vm| (vm.id, BTreeMap::from([(ResourceCategory::Cpu, vm.reference_share)])))
        .collect();
    (utilization, wanted)
}

#[test]
fn test_consolidates_lightly_loaded_vms() {
    let snapshot = DataCenterSnapshot {
        physical_machines: vec![pm(1), pm(2)],
        virtual_machines: vec![vm(1, Some(1), 0.5), vm(2, Some(2), 0.5)],
    };
    let (utilization, wanted) = uniform_inputs(&snapshot, 0.5);
    let weights = CostWeights::new(1.0, 0.0, 0.0);
    let mut solver = BranchAndBoundPlacementSolver::new(PlacementProblemKind::Migration, 10_000, true);
    let solution = solver.solve(&snapshot, &weights, &utilization, &wanted);

    assert!(solution.solved);
    let placement = solution.to_placement().unwrap();
    let host = placement.find(1).unwrap().physical_machine;
    assert!(placement.placed_on(2, host));
    // Without the SLA term every share sits at its lower bound, 0.2 of the wanted share.
    for (_, entry) in placement.iter() {
        assert_eq!(entry.shares.len(), 1);
        assert_eq!(entry.shares[0].0, ResourceCategory::Cpu);
        assert!((entry.shares[0].1 - 0.1).abs() < 1e-9);
    }
    // wp' = 1 / (2 * P(1)) with P(1) = 180.
    let power_at_lower_bounds = 100.0 + 50.0 * 0.2 + 30.0 * 0.2f64.powf(1.2);
    assert!((solution.cost - power_at_lower_bounds / 360.0).abs() < 1e-9);
}

#[test]
fn test_migration_cost_keeps_current_placement() {
    let snapshot = DataCenterSnapshot {
        physical_machines: vec![pm(1), pm(2)],
        virtual_machines: vec![vm(1, Some(1), 0.5), vm(2, Some(2), 0.5)],
    };
    let (utilization, wanted) = uniform_inputs(&snapshot, 0.5);
    // Consolidation saves about 0.28 of normalized power, a migration costs 1/2.
    let weights = CostWeights::new(1.0, 1.0, 0.0);
    let mut solver = BranchAndBoundPlacementSolver::new(PlacementProblemKind::Migration, 10_000, true);
    let solution = solver.solve(&snapshot, &weights, &utilization, &wanted);

    assert!(solution.solved);
    let placement = solution.to_placement().unwrap();
    assert!(placement.placed_on(1, 1));
    assert!(placement.placed_on(2, 2));
}

#[test]
fn test_tracks_wanted_shares_without_power_term() {
    let snapshot = DataCenterSnapshot {
        physical_machines: vec![pm(1)],
        virtual_machines: vec![vm(1, None, 0.3)],
    };
    let (utilization, wanted) = uniform_inputs(&snapshot, 1.0);
    let weights = CostWeights::new(0.0, 0.0, 1.0);
    let mut solver = BranchAndBoundPlacementSolver::new(PlacementProblemKind::Migration, 10_000, false);
    let solution = solver.solve(&snapshot, &weights, &utilization, &wanted);

    assert!(solution.solved);
    assert!(solution.cost.abs() < 1e-9);
    let shares = &solution.placement[&(1, 1)];
    assert!((shares[0].1 - 0.3).abs() < 1e-6);
}

#[test]
fn test_initial_problem_respects_reservation() {
    let snapshot = DataCenterSnapshot {
        physical_machines: vec![pm(1)],
        virtual_machines: vec![vm(1, None, 0.5), vm(2, None, 0.5)],
    };
    let (utilization, wanted) = uniform_inputs(&snapshot, 1.0);
    let weights = CostWeights::new(0.0, 0.0, 1.0);
    let kind = PlacementProblemKind::Initial { reservation_penalty: 0.5 };
    assert_eq!(kind.max_aggregate_share(), 0.5);
    assert_eq!(PlacementProblemKind::Migration.max_aggregate_share(), 1.0);

    let mut solver = BranchAndBoundPlacementSolver::new(kind, 10_000, false);
    let solution = solver.solve(&snapshot, &weights, &utilization, &wanted);
    assert!(solution.solved);
    let total: f64 = solution.placement.values().map(|shares| shares[0].1).sum();
    assert!(total <= 0.5 + 1e-6);
    for shares in solution.placement.values() {
        assert!((shares[0].1 - 0.25).abs() < 1e-6);
    }
}

#[test]
fn test_threshold_violation_is_unsolved() {
    let snapshot = DataCenterSnapshot {
        physical_machines: vec![pm(1)],
        virtual_machines: vec![vm(1, None, 0.5), vm(2, None, 0.5), vm(3, None, 0.5)],
    };
    let (utilization, wanted) = uniform_inputs(&snapshot, 1.0);
    let weights = CostWeights::new(1.0, 1.0, 1.0);
    let mut solver = BranchAndBoundPlacementSolver::new(PlacementProblemKind::Migration, 10_000, true);
    let solution = solver.solve(&snapshot, &weights, &utilization, &wanted);
    assert!(!solution.solved);
    assert!(solution.placement.is_empty());
}

#[test]
fn test_node_limit_gives_up() {
    let snapshot = DataCenterSnapshot {
        physical_machines: vec![pm(1), pm(2)],
        virtual_machines: vec![vm(1, Some(1), 0.5), vm(2, Some(2), 0.5)],
    };
    let (utilization, wanted) = uniform_inputs(&snapshot, 0.5);
    let weights = CostWeights::new(1.0, 1.0, 1.0);
    let mut solver = BranchAndBoundPlacementSolver::new(PlacementProblemKind::Migration, 1, true);
    let solution = solver.solve(&snapshot, &weights, &utilization, &wanted);
    assert!(!solution.solved);
    assert!(solution.placement.is_empty());
}

#[test]
fn test_degenerate_instances() {
    let weights = CostWeights::new(1.0, 1.0, 1.0);
    let mut solver = BranchAndBoundPlacementSolver::new(PlacementProblemKind::Migration, 10_000, true);

    let empty = DataCenterSnapshot {
        physical_machines: vec![pm(1)],
        virtual_machines: Vec::new(),
    };
    let solution = solver.solve(&empty, &weights, &BTreeMap::new(), &BTreeMap::new());
    assert!(solution.solved);
    assert_eq!(solution.cost, 0.0);
    assert!(solution.placement.is_empty());

    let no_machines = DataCenterSnapshot {
        physical_machines: Vec::new(),
        virtual_machines: vec![vm(1, None, 0.5)],
    };
    let solution = solver.solve(&no_machines, &weights, &BTreeMap::new(), &BTreeMap::new());
    assert!(!solution.solved);
}

#[test]
fn test_problem_quantities() {
    let snapshot = DataCenterSnapshot {
        physical_machines: vec![pm(1), pm(2)],
        virtual_machines: vec![vm(1, Some(2), 0.5)],
    };
    let (utilization, wanted) = uniform_inputs(&snapshot, 0.4);
    let weights = CostWeights::new(1.0, 1.0, 1.0);
    let problem = PlacementProblem::new(PlacementProblemKind::Migration, &snapshot, &weights, &utilization, &wanted);

    assert_eq!(problem.num_physical_machines(), 2);
    assert_eq!(problem.num_virtual_machines(), 1);
    assert_eq!(problem.current_host(0), Some(1));
    assert!((problem.lower_bound(0, 0) - 0.1).abs() < 1e-12);
    assert!((problem.demand(0, 0) - 0.2).abs() < 1e-12);
    assert_eq!(problem.migration_cost(1, 0), 0.0);
    assert_eq!(problem.migration_cost(0, 0), 1.0);
    assert!(problem.fits(0, 1.0, 1.0));
    assert!(!problem.fits(0, 1.1, 0.5));
    assert!(problem.machine_cost(0, &[]).unwrap().0 == 0.0);
}
