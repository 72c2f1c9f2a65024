//! Periodic consolidation controller.
//!
//! Every sampling period the controller filters the observed utilization of the active VMs, asks
//! the placement solver for a new placement and applies it through the data center. A failed
//! solve leaves the placement untouched until the next period.

use std::cell::RefCell;
use std::collections::BTreeMap;
use std::rc::Rc;

use dslab_core::{cast, log_debug, log_warn, Event, EventHandler, SimulationContext};
use serde::{Deserialize, Serialize};

use crate::common::VirtualMachineId;
use crate::data_center::DataCenter;
use crate::error::{Result, SimulationError};
use crate::events::controller::MigrationControlTick;
use crate::placement_solver::{CostWeights, DataCenterSnapshot, PlacementSolver};
use crate::resource::ResourceCategory;
use crate::scaling::{scale_resource_share, scale_resource_utilization};
use crate::statistics::{EwmaFilter, MeanEstimator, ReplicatedStatistic};

/// Which shares feed the solver as the wanted share of a VM.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WantedShareSource {
    /// The configured share of the VM's tier.
    #[default]
    TierReference,
    /// The wanted share currently set on the VM.
    MonitoredVm,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub enum ControllerState {
    Idle,
    Armed,
}

type SolverInput = (
    DataCenterSnapshot,
    BTreeMap<VirtualMachineId, f64>,
    BTreeMap<VirtualMachineId, BTreeMap<ResourceCategory, f64>>,
);

pub struct MigrationController {
    pub id: u32,
    data_center: Rc<RefCell<DataCenter>>,
    solver: Box<dyn PlacementSolver>,
    weights: CostWeights,
    sampling_period: f64,
    ewma_smoothing_factor: f64,
    wanted_share_source: WantedShareSource,
    state: ControllerState,
    filtered_utilization: BTreeMap<VirtualMachineId, EwmaFilter>,

    count: u64,
    fail_count: u64,
    migr_count: u64,
    migr_rate_num: f64,
    migr_rate_den: f64,

    cost: ReplicatedStatistic<MeanEstimator>,
    num_migrations: ReplicatedStatistic<MeanEstimator>,
    migration_rate: ReplicatedStatistic<MeanEstimator>,

    ctx: SimulationContext,
}

impl MigrationController {
    pub fn new(
        data_center: Rc<RefCell<DataCenter>>,
        solver: Box<dyn PlacementSolver>,
        weights: CostWeights,
        sampling_period: f64,
        ewma_smoothing_factor: f64,
        wanted_share_source: WantedShareSource,
        ctx: SimulationContext,
    ) -> Self {
        assert!(sampling_period > 0.0, "sampling period must be positive");
        Self {
            id: ctx.id(),
            data_center,
            solver,
            weights,
            sampling_period,
            ewma_smoothing_factor,
            wanted_share_source,
            state: ControllerState::Idle,
            filtered_utilization: BTreeMap::new(),
            count: 0,
            fail_count: 0,
            migr_count: 0,
            migr_rate_num: 0.0,
            migr_rate_den: 0.0,
            cost: ReplicatedStatistic::new(MeanEstimator::new()),
            num_migrations: ReplicatedStatistic::new(MeanEstimator::new()),
            migration_rate: ReplicatedStatistic::new(MeanEstimator::new()),
            ctx,
        }
    }

    pub fn state(&self) -> ControllerState {
        self.state
    }

    pub fn sampling_period(&self) -> f64 {
        self.sampling_period
    }

    pub fn weights(&self) -> CostWeights {
        self.weights
    }

    /// Number of control invocations in the current replication.
    pub fn count(&self) -> u64 {
        self.count
    }

    /// Number of unsolved optimizations in the current replication.
    pub fn fail_count(&self) -> u64 {
        self.fail_count
    }

    /// Number of relocated VMs in the current replication.
    pub fn migr_count(&self) -> u64 {
        self.migr_count
    }

    /// Relocated VMs per active VM and control period, NaN before the first applied placement.
    pub fn current_migration_rate(&self) -> f64 {
        if self.migr_rate_den > 0.0 {
            self.migr_rate_num / self.migr_rate_den
        } else {
            f64::NAN
        }
    }

    pub fn filtered_utilization(&self, vm: VirtualMachineId) -> Option<f64> {
        self.filtered_utilization.get(&vm).and_then(|f| f.value())
    }

    pub fn cost_statistic(&self) -> &ReplicatedStatistic<MeanEstimator> {
        &self.cost
    }

    pub fn num_migrations_statistic(&self) -> &ReplicatedStatistic<MeanEstimator> {
        &self.num_migrations
    }

    pub fn migration_rate_statistic(&self) -> &ReplicatedStatistic<MeanEstimator> {
        &self.migration_rate
    }

    pub fn on_begin_of_simulation(&mut self) {
        self.cost.clear();
        self.num_migrations.clear();
        self.migration_rate.clear();
    }

    /// Resets the per-replication state and schedules the first control tick.
    pub fn on_system_initialization(&mut self) {
        self.count = 0;
        self.fail_count = 0;
        self.migr_count = 0;
        self.migr_rate_num = 0.0;
        self.migr_rate_den = 0.0;
        self.filtered_utilization.clear();
        self.cost.begin_replication();
        self.num_migrations.begin_replication();
        self.migration_rate.begin_replication();
        self.state = ControllerState::Armed;
        self.ctx.emit_self(MigrationControlTick {}, self.sampling_period);
    }

    pub fn on_system_finalization(&mut self) {
        if self.state != ControllerState::Armed {
            return;
        }
        self.num_migrations.collect(self.migr_count as f64);
        if self.migr_rate_den > 0.0 {
            self.migration_rate.collect(self.migr_rate_num / self.migr_rate_den);
        }
        self.cost.end_replication();
        self.num_migrations.end_replication();
        self.migration_rate.end_replication();
        self.state = ControllerState::Idle;
    }

    /// One control step.
    ///
    /// Solver failures are counted and logged. Errors raised while applying a placement are
    /// returned.
    pub fn process_control(&mut self) -> Result<()> {
        self.count += 1;
        let active = self.data_center.borrow().active_virtual_machines();
        if active.is_empty() {
            log_warn!(self.ctx, "no active VM, powering off every physical machine");
            let mut data_center = self.data_center.borrow_mut();
            for pm in data_center.powered_on_physical_machines() {
                data_center.power_off_physical_machine(pm)?;
            }
            return Ok(());
        }

        let (snapshot, utilization, wanted_share) = match self.prepare_solver_input(&active) {
            Ok(input) => input,
            Err(e) => {
                self.fail_count += 1;
                log_warn!(self.ctx, "cannot build the placement problem: {}", e);
                return Ok(());
            }
        };
        let solution = self.solver.solve(&snapshot, &self.weights, &utilization, &wanted_share);
        if !solution.solved {
            self.fail_count += 1;
            log_warn!(self.ctx, "placement problem not solved, keeping the current placement");
            return Ok(());
        }
        let placement = match solution.to_placement() {
            Ok(placement) => placement,
            Err(e) => {
                self.fail_count += 1;
                log_warn!(self.ctx, "solver returned an inconsistent placement: {}", e);
                return Ok(());
            }
        };
        self.cost.collect(solution.cost);

        let relocated = self.data_center.borrow_mut().migrate(&placement)?;
        self.migr_count += relocated as u64;
        self.migr_rate_num += relocated as f64;
        self.migr_rate_den += active.len() as f64;
        log_debug!(
            self.ctx,
            "applied placement with cost {:.4}: {} of {} VMs relocated",
            solution.cost,
            relocated,
            active.len()
        );
        Ok(())
    }

    /// Reads and filters the utilization of every active VM, in the reference frame.
    fn prepare_solver_input(&mut self, active: &[VirtualMachineId]) -> Result<SolverInput> {
        let data_center = self.data_center.borrow();
        let snapshot = DataCenterSnapshot::capture(&data_center, active)?;
        let mut utilization = BTreeMap::new();
        let mut wanted_share = BTreeMap::new();
        for vm_id in active {
            let vm = data_center.virtual_machine(*vm_id)?;
            let application = data_center.application(vm.application_id)?;
            let reference = application.reference_resource(ResourceCategory::Cpu)?;
            let reference_share = application
                .tier(vm.tier)?
                .share(ResourceCategory::Cpu)
                .ok_or(SimulationError::IncompatibleCategory(ResourceCategory::Cpu))?;
            let (host_capacity, host_threshold) = match vm.host() {
                Some(pm) => {
                    let cpu = data_center.physical_machine(pm)?.resource(ResourceCategory::Cpu)?;
                    (cpu.capacity, cpu.threshold)
                }
                None => (reference.capacity, reference.threshold),
            };

            let tier_share_on_host = scale_resource_share(
                reference.capacity,
                reference.threshold,
                host_capacity,
                host_threshold,
                reference_share,
            );
            let host_wanted_share = match self.wanted_share_source {
                WantedShareSource::TierReference => tier_share_on_host,
                WantedShareSource::MonitoredVm => vm
                    .wanted_share(ResourceCategory::Cpu)
                    .unwrap_or(tier_share_on_host),
            };
            wanted_share.insert(
                *vm_id,
                BTreeMap::from([(
                    ResourceCategory::Cpu,
                    scale_resource_share(
                        host_capacity,
                        host_threshold,
                        reference.capacity,
                        reference.threshold,
                        host_wanted_share,
                    ),
                )]),
            );

            let busy = application
                .simulation_model()
                .borrow_mut()
                .actual_tier_utilization(vm.tier)?;
            let reference_utilization = scale_resource_utilization(
                host_capacity,
                host_threshold,
                reference.capacity,
                reference.threshold,
                busy * host_wanted_share,
            );
            let observed = if reference_share > 0.0 {
                reference_utilization / reference_share
            } else {
                0.0
            };
            let alpha = self.ewma_smoothing_factor;
            let filtered = self
                .filtered_utilization
                .entry(*vm_id)
                .or_insert_with(|| EwmaFilter::new(alpha))
                .filter(observed);
            utilization.insert(*vm_id, filtered);
        }
        Ok((snapshot, utilization, wanted_share))
    }
}

impl EventHandler for MigrationController {
    fn on(&mut self, event: Event) {
        cast!(match event.data {
            MigrationControlTick {} => {
                if self.state == ControllerState::Armed {
                    if let Err(e) = self.process_control() {
                        panic!("migration control failed: {}", e);
                    }
                    self.ctx.emit_self(MigrationControlTick {}, self.sampling_period);
                }
            }
        })
    }
}
