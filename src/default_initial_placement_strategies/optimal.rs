use std::collections::BTreeMap;

use crate::default_placement_solvers::branch_and_bound_solver::BranchAndBoundPlacementSolver;
use crate::initial_placement_strategy::InitialPlacementStrategy;
use crate::placement_solver::{CostWeights, DataCenterSnapshot, PlacementProblemKind, PlacementSolver};
use crate::resource::ResourceCategory;
use crate::virtual_machines_placement::VirtualMachinesPlacement;

/// Solves the initial placement problem, assuming every tier runs at full reference utilization.
pub struct OptimalInitialPlacement {
    solver: BranchAndBoundPlacementSolver,
    weights: CostWeights,
}

impl OptimalInitialPlacement {
    pub fn new(reservation_penalty: f64, weights: CostWeights, max_explored_nodes: u64) -> Self {
        Self {
            solver: BranchAndBoundPlacementSolver::new(
                PlacementProblemKind::Initial { reservation_penalty },
                max_explored_nodes,
                false,
            ),
            weights,
        }
    }
}

impl InitialPlacementStrategy for OptimalInitialPlacement {
    fn place(&mut self, snapshot: &DataCenterSnapshot) -> Option<VirtualMachinesPlacement> {
        let utilization: BTreeMap<_, _> = snapshot.virtual_machines.iter().map(|vm| (vm.id, 1.0)).collect();
        let wanted_share: BTreeMap<_, _> = snapshot
            .virtual_machines
            .iter()
            .map(|vm| (vm.id, BTreeMap::from([(ResourceCategory::Cpu, vm.reference_share)])))
            .collect();
        let solution = self.solver.solve(snapshot, &self.weights, &utilization, &wanted_share);
        if !solution.solved {
            log::warn!("initial placement problem has no solution");
            return None;
        }
        solution.to_placement().ok()
    }
}
