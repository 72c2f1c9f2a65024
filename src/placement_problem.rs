//! Numeric encoding of the VM placement problem.
//!
//! Minimize over the assignment `x_ij` (VM `j` on PM `i`) and the shares `s_ij`:
//!
//! ```text
//! wp' * sum_i P_i(S_i) + wm' * sum_ij x_ij * m_ij + ws' * sum_ij x_ij * (a_ij * s_ij - b_j)^2
//! ```
//!
//! where `S_i = sum_j x_ij * s_ij`, `m_ij` is 0 if `j` already runs on `i` and 1 otherwise and
//! `a_ij = C_i / C_ref`. Weights are normalized: `wp' = wp / sum_i P_i(1)`, `wm' = wm / n` and
//! `ws' = ws / n` with `n` VMs; a zero weight or normalizer disables its term. Constraints:
//! `s_ij >= 0.2 * b_j` moved to the frame of `i`, `S_i <= S_max` and the demand of the VMs on `i`
//! does not exceed the utilization threshold of `i`.

use std::collections::BTreeMap;

use crate::common::VirtualMachineId;
use crate::placement_solver::{CostWeights, DataCenterSnapshot, PlacementProblemKind};
use crate::resource::ResourceCategory;
use crate::scaling::{scale_resource_share, scale_resource_share_by_capacity};

/// Minimum share of a VM as a fraction of its reference demand.
pub const MIN_SHARE_FRACTION: f64 = 0.2;

const EPSILON: f64 = 1e-9;
const BISECTION_STEPS: usize = 100;

pub struct PlacementProblem<'a> {
    snapshot: &'a DataCenterSnapshot,
    max_share: f64,
    power_weight: f64,
    migration_weight: f64,
    sla_weight: f64,
    /// Wanted share of every VM in the reference frame.
    targets: Vec<f64>,
    current_hosts: Vec<Option<usize>>,
    /// Indexed `[pm][vm]`.
    scales: Vec<Vec<f64>>,
    lower_bounds: Vec<Vec<f64>>,
    demands: Vec<Vec<f64>>,
}

impl<'a> PlacementProblem<'a> {
    pub fn new(
        kind: PlacementProblemKind,
        snapshot: &'a DataCenterSnapshot,
        weights: &CostWeights,
        vm_utilization: &BTreeMap<VirtualMachineId, f64>,
        vm_wanted_share: &BTreeMap<VirtualMachineId, BTreeMap<ResourceCategory, f64>>,
    ) -> Self {
        let n = snapshot.virtual_machines.len() as f64;
        let full_power: f64 = snapshot
            .physical_machines
            .iter()
            .map(|pm| pm.energy_model.consumed_energy(1.0))
            .sum();
        let normalize = |weight: f64, normalizer: f64| {
            if weight == 0.0 || normalizer <= 0.0 {
                0.0
            } else {
                weight / normalizer
            }
        };

        let targets: Vec<f64> = snapshot
            .virtual_machines
            .iter()
            .map(|vm| {
                vm_wanted_share
                    .get(&vm.id)
                    .and_then(|shares| shares.get(&ResourceCategory::Cpu).copied())
                    .unwrap_or(vm.reference_share)
            })
            .collect();
        let current_hosts = snapshot
            .virtual_machines
            .iter()
            .map(|vm| vm.host.and_then(|h| snapshot.physical_machines.iter().position(|pm| pm.id == h)))
            .collect();

        let mut scales = Vec::new();
        let mut lower_bounds = Vec::new();
        let mut demands = Vec::new();
        for pm in snapshot.physical_machines.iter() {
            let mut pm_scales = Vec::new();
            let mut pm_lower_bounds = Vec::new();
            let mut pm_demands = Vec::new();
            for (j, vm) in snapshot.virtual_machines.iter().enumerate() {
                pm_scales.push(pm.cpu_capacity / vm.reference_cpu_capacity);
                pm_lower_bounds.push(
                    MIN_SHARE_FRACTION
                        * scale_resource_share(
                            vm.reference_cpu_capacity,
                            vm.reference_cpu_threshold,
                            pm.cpu_capacity,
                            pm.cpu_threshold,
                            targets[j],
                        ),
                );
                let utilization = vm_utilization.get(&vm.id).copied().unwrap_or(1.0);
                pm_demands.push(scale_resource_share_by_capacity(
                    vm.reference_cpu_capacity,
                    pm.cpu_capacity,
                    utilization * vm.reference_share,
                ));
            }
            scales.push(pm_scales);
            lower_bounds.push(pm_lower_bounds);
            demands.push(pm_demands);
        }

        Self {
            snapshot,
            max_share: kind.max_aggregate_share(),
            power_weight: normalize(weights.power, full_power),
            migration_weight: normalize(weights.migration, n),
            sla_weight: normalize(weights.sla, n),
            targets,
            current_hosts,
            scales,
            lower_bounds,
            demands,
        }
    }

    pub fn snapshot(&self) -> &DataCenterSnapshot {
        self.snapshot
    }

    pub fn num_physical_machines(&self) -> usize {
        self.snapshot.physical_machines.len()
    }

    pub fn num_virtual_machines(&self) -> usize {
        self.snapshot.virtual_machines.len()
    }

    pub fn max_share(&self) -> f64 {
        self.max_share
    }

    pub fn current_host(&self, vm: usize) -> Option<usize> {
        self.current_hosts[vm]
    }

    pub fn lower_bound(&self, pm: usize, vm: usize) -> f64 {
        self.lower_bounds[pm][vm]
    }

    pub fn demand(&self, pm: usize, vm: usize) -> f64 {
        self.demands[pm][vm]
    }

    pub fn migration_cost(&self, pm: usize, vm: usize) -> f64 {
        if self.current_hosts[vm] == Some(pm) {
            0.0
        } else {
            self.migration_weight
        }
    }

    /// Whether machine `pm` can host VMs with the given aggregate minimum shares and demands.
    pub fn fits(&self, pm: usize, lower_bound_sum: f64, demand_sum: f64) -> bool {
        let threshold = self.snapshot.physical_machines[pm].cpu_threshold;
        lower_bound_sum <= self.max_share + EPSILON && demand_sum <= threshold + EPSILON
    }

    /// Cheapest possible power term of a machine whose VMs need `lower_bound_sum` at least.
    pub fn power_lower_bound(&self, pm: usize, lower_bound_sum: f64) -> f64 {
        self.power_weight * self.power(pm, lower_bound_sum)
    }

    /// Optimal shares and cost (power and share deviation terms) of hosting `vms` on `pm`.
    ///
    /// Returns `None` when the VMs do not fit.
    pub fn machine_cost(&self, pm: usize, vms: &[usize]) -> Option<(f64, Vec<f64>)> {
        if vms.is_empty() {
            return Some((0.0, Vec::new()));
        }
        let lower_sum: f64 = vms.iter().map(|j| self.lower_bounds[pm][*j]).sum();
        let demand_sum: f64 = vms.iter().map(|j| self.demands[pm][*j]).sum();
        if !self.fits(pm, lower_sum, demand_sum) {
            return None;
        }
        let shares = self.optimal_shares(pm, vms);
        let total: f64 = shares.iter().sum();
        let deviation: f64 = vms
            .iter()
            .zip(shares.iter())
            .map(|(j, s)| (self.scales[pm][*j] * s - self.targets[*j]).powi(2))
            .sum();
        Some((self.power_weight * self.power(pm, total) + self.sla_weight * deviation, shares))
    }

    /// Objective of a complete assignment (`assignment[vm] = pm`), with the optimal shares.
    pub fn evaluate(&self, assignment: &[usize]) -> Option<(f64, Vec<f64>)> {
        let mut shares = vec![0.0; assignment.len()];
        let mut cost: f64 = assignment
            .iter()
            .enumerate()
            .map(|(j, i)| self.migration_cost(*i, j))
            .sum();
        for pm in 0..self.num_physical_machines() {
            let vms: Vec<usize> = (0..assignment.len()).filter(|j| assignment[*j] == pm).collect();
            let (pm_cost, pm_shares) = self.machine_cost(pm, &vms)?;
            cost += pm_cost;
            for (j, s) in vms.iter().zip(pm_shares) {
                shares[*j] = s;
            }
        }
        Some((cost, shares))
    }

    fn power(&self, pm: usize, share: f64) -> f64 {
        self.snapshot.physical_machines[pm]
            .energy_model
            .consumed_energy(share.clamp(0.0, 1.0))
    }

    fn marginal_power(&self, pm: usize, share: f64) -> f64 {
        self.snapshot.physical_machines[pm]
            .energy_model
            .marginal_energy(share.clamp(0.0, 1.0))
    }

    /// Solves the convex share subproblem of one machine from its KKT conditions.
    ///
    /// With multiplier `l` of the aggregate share, `s_j(l) = clamp(b_j/a_j - l/(2 ws' a_j^2), low_j, 1)`
    /// and `l = wp' P'(S(l))`, raised until `S(l) <= S_max` if the cap binds.
    fn optimal_shares(&self, pm: usize, vms: &[usize]) -> Vec<f64> {
        let lower: Vec<f64> = vms.iter().map(|j| self.lower_bounds[pm][*j].min(1.0)).collect();
        let scales: Vec<f64> = vms.iter().map(|j| self.scales[pm][*j]).collect();
        let ideal: Vec<f64> = vms
            .iter()
            .zip(scales.iter())
            .map(|(j, a)| self.targets[*j] / a)
            .collect();

        if self.sla_weight == 0.0 {
            if self.power_weight > 0.0 {
                return lower;
            }
            let targets: Vec<f64> = ideal
                .iter()
                .zip(lower.iter())
                .map(|(t, l)| t.clamp(*l, 1.0))
                .collect();
            return self.fit_to_cap(&targets, &lower);
        }

        let shares_at = |lambda: f64| -> Vec<f64> {
            ideal
                .iter()
                .zip(scales.iter())
                .zip(lower.iter())
                .map(|((t, a), l)| (t - lambda / (2.0 * self.sla_weight * a * a)).min(1.0).max(*l))
                .collect()
        };
        let total_at = |lambda: f64| -> f64 { shares_at(lambda).iter().sum() };

        // Beyond this multiplier every share sits at its lower bound.
        let lambda_floor = ideal
            .iter()
            .zip(scales.iter())
            .zip(lower.iter())
            .map(|((t, a), l)| 2.0 * self.sla_weight * a * a * (t.min(1.0) - l))
            .fold(0.0, f64::max);

        let mut lambda = 0.0;
        if self.power_weight > 0.0 {
            let gap = |lambda: f64| lambda - self.power_weight * self.marginal_power(pm, total_at(lambda));
            let mut high = self.power_weight * self.marginal_power(pm, total_at(0.0));
            if !high.is_finite() {
                high = lambda_floor.max(1.0);
                let mut steps = 0;
                while gap(high) < 0.0 && steps < BISECTION_STEPS {
                    high *= 2.0;
                    steps += 1;
                }
            }
            let mut low = 0.0;
            for _ in 0..BISECTION_STEPS {
                let mid = 0.5 * (low + high);
                if gap(mid) < 0.0 {
                    low = mid;
                } else {
                    high = mid;
                }
            }
            lambda = high;
        }

        if total_at(lambda) > self.max_share {
            let mut low = lambda;
            let mut high = lambda_floor.max(lambda);
            for _ in 0..BISECTION_STEPS {
                let mid = 0.5 * (low + high);
                if total_at(mid) > self.max_share {
                    low = mid;
                } else {
                    high = mid;
                }
            }
            lambda = high;
        }
        shares_at(lambda)
    }

    /// Shrinks `targets` towards `lower` proportionally until they fit under the aggregate cap.
    fn fit_to_cap(&self, targets: &[f64], lower: &[f64]) -> Vec<f64> {
        let total: f64 = targets.iter().sum();
        if total <= self.max_share {
            return targets.to_vec();
        }
        let lower_total: f64 = lower.iter().sum();
        let slack = total - lower_total;
        if slack <= 0.0 {
            return lower.to_vec();
        }
        let ratio = ((self.max_share - lower_total) / slack).clamp(0.0, 1.0);
        targets
            .iter()
            .zip(lower.iter())
            .map(|(t, l)| l + (t - l) * ratio)
            .collect()
    }
}
