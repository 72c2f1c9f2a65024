use std::collections::BTreeMap;

use crate::common::VirtualMachineId;
use crate::placement_problem::PlacementProblem;
use crate::placement_solver::{CostWeights, DataCenterSnapshot, PlacementProblemKind, PlacementSolution, PlacementSolver};
use crate::resource::ResourceCategory;

/// Exact solver for small instances: depth-first enumeration of VM to PM assignments, pruned by
/// the machine constraints and by a lower bound of the objective.
pub struct BranchAndBoundPlacementSolver {
    kind: PlacementProblemKind,
    max_explored_nodes: u64,
    warm_start: bool,
}

struct SearchState {
    assignment: Vec<usize>,
    lower_bound_sums: Vec<f64>,
    demand_sums: Vec<f64>,
    explored_nodes: u64,
    best: Option<(f64, Vec<usize>, Vec<f64>)>,
    exhausted: bool,
}

impl BranchAndBoundPlacementSolver {
    pub fn new(kind: PlacementProblemKind, max_explored_nodes: u64, warm_start: bool) -> Self {
        Self {
            kind,
            max_explored_nodes,
            warm_start,
        }
    }

    pub fn kind(&self) -> PlacementProblemKind {
        self.kind
    }

    /// Machines to try for `vm`, the current host first when warm starting.
    fn candidate_machines(&self, problem: &PlacementProblem, vm: usize) -> Vec<usize> {
        let mut machines: Vec<usize> = (0..problem.num_physical_machines()).collect();
        if self.warm_start {
            if let Some(host) = problem.current_host(vm) {
                machines.retain(|pm| *pm != host);
                machines.insert(0, host);
            }
        }
        machines
    }

    fn bound(problem: &PlacementProblem, state: &SearchState, depth: usize) -> f64 {
        let migration: f64 = state.assignment[..depth]
            .iter()
            .enumerate()
            .map(|(j, i)| problem.migration_cost(*i, j))
            .sum();
        let power: f64 = state
            .lower_bound_sums
            .iter()
            .enumerate()
            .filter(|(_, sum)| **sum > 0.0)
            .map(|(i, sum)| problem.power_lower_bound(i, *sum))
            .sum();
        migration + power
    }

    fn search(&self, problem: &PlacementProblem, state: &mut SearchState, depth: usize) {
        if state.exhausted {
            return;
        }
        state.explored_nodes += 1;
        if state.explored_nodes > self.max_explored_nodes {
            state.exhausted = true;
            return;
        }
        if depth == problem.num_virtual_machines() {
            if let Some((cost, shares)) = problem.evaluate(&state.assignment) {
                let better = state.best.as_ref().map_or(true, |(best, _, _)| cost < *best);
                if better {
                    state.best = Some((cost, state.assignment.clone(), shares));
                }
            }
            return;
        }
        for pm in self.candidate_machines(problem, depth) {
            let lower_bound = problem.lower_bound(pm, depth);
            let demand = problem.demand(pm, depth);
            if !problem.fits(
                pm,
                state.lower_bound_sums[pm] + lower_bound,
                state.demand_sums[pm] + demand,
            ) {
                continue;
            }
            state.assignment[depth] = pm;
            state.lower_bound_sums[pm] += lower_bound;
            state.demand_sums[pm] += demand;
            let prune = match state.best.as_ref() {
                Some((best, _, _)) => Self::bound(problem, state, depth + 1) >= *best,
                None => false,
            };
            if !prune {
                self.search(problem, state, depth + 1);
            }
            state.lower_bound_sums[pm] -= lower_bound;
            state.demand_sums[pm] -= demand;
            if state.exhausted {
                return;
            }
        }
    }
}

impl PlacementSolver for BranchAndBoundPlacementSolver {
    fn solve(
        &mut self,
        snapshot: &DataCenterSnapshot,
        weights: &CostWeights,
        vm_utilization: &BTreeMap<VirtualMachineId, f64>,
        vm_wanted_share: &BTreeMap<VirtualMachineId, BTreeMap<ResourceCategory, f64>>,
    ) -> PlacementSolution {
        let problem = PlacementProblem::new(self.kind, snapshot, weights, vm_utilization, vm_wanted_share);
        let num_vms = problem.num_virtual_machines();
        let num_pms = problem.num_physical_machines();
        if num_vms > 0 && num_pms == 0 {
            return PlacementSolution::unsolved();
        }

        let mut state = SearchState {
            assignment: vec![0; num_vms],
            lower_bound_sums: vec![0.0; num_pms],
            demand_sums: vec![0.0; num_pms],
            explored_nodes: 0,
            best: None,
            exhausted: false,
        };
        if self.warm_start {
            let current: Option<Vec<usize>> = (0..num_vms).map(|j| problem.current_host(j)).collect();
            if let Some(current) = current {
                if let Some((cost, shares)) = problem.evaluate(&current) {
                    state.best = Some((cost, current, shares));
                }
            }
        }

        self.search(&problem, &mut state, 0);
        if state.exhausted {
            log::debug!("placement search gave up after {} nodes", self.max_explored_nodes);
            return PlacementSolution::unsolved();
        }
        match state.best {
            Some((cost, assignment, shares)) => PlacementSolution {
                solved: true,
                cost,
                placement: assignment
                    .iter()
                    .zip(shares)
                    .enumerate()
                    .map(|(j, (i, share))| {
                        (
                            (snapshot.physical_machines[*i].id, snapshot.virtual_machines[j].id),
                            vec![(ResourceCategory::Cpu, share)],
                        )
                    })
                    .collect(),
            },
            None => PlacementSolution::unsolved(),
        }
    }
}
