use std::cell::{Cell, RefCell};
use std::rc::Rc;

use dslab_core::simulation::Simulation;
use sugars::{rc, refcell};

use crate::application::{ApplicationTier, MultiTierApplication};
use crate::application_controller::{ApplicationControlLoop, ApplicationController};
use crate::application_simulation_model::ApplicationSimulationModel;
use crate::common::{find_share, ApplicationId, ShareList};
use crate::data_center::DataCenter;
use crate::data_center_manager::DataCenterManager;
use crate::default_application_controllers::dummy_controller::DummyApplicationController;
use crate::default_application_controllers::utilization_controller::UtilizationApplicationController;
use crate::default_initial_placement_strategies::first_fit::FirstFitInitialPlacement;
use crate::default_initial_placement_strategies::optimal::OptimalInitialPlacement;
use crate::default_placement_solvers::branch_and_bound_solver::BranchAndBoundPlacementSolver;
use crate::energy_model::{ConstantEnergyModel, EnergyModel, Fan2007EnergyModel};
use crate::engine::SimulationEngine;
use crate::error::{Result, SimulationError};
use crate::initial_placement_strategy::InitialPlacementStrategy;
use crate::migration_controller::MigrationController;
use crate::physical_machine_controller::{
    DummyPhysicalMachineController, PhysicalMachineController, ProportionalPhysicalMachineController,
};
use crate::placement_solver::{CostWeights, PlacementProblemKind};
use crate::queueing_network::RequestClass;
use crate::resource::{Resource, ResourceCategory};
use crate::simulation_config::{
    ApplicationConfig, ApplicationControllerConfig, EnergyModelConfig, InitialPlacementConfig,
    PhysicalMachineControllerConfig, ResourceConfig, SimulationConfig,
};
use crate::simulation_metrics::{ApplicationMetrics, MetricsLogger, ReplicationMetrics, SimulationMetrics};
use crate::sla::{PerformanceMeasureCategory, SlaCostModel, StepSlaCostModel};
use crate::statistics::Statistic;

/// A virtualized data center hosting multi-tier applications, consolidated by a migration
/// controller and simulated over independent replications.
pub struct DataCenterSimulation {
    engine: SimulationEngine,
    data_center: Rc<RefCell<DataCenter>>,
    migration_controller: Rc<RefCell<MigrationController>>,
    metrics: Rc<RefCell<SimulationMetrics>>,
    metrics_logger: Rc<RefCell<Box<dyn MetricsLogger>>>,
    sim_config: Rc<SimulationConfig>,
}

impl DataCenterSimulation {
    /// Creates a simulation with specified config.
    pub fn new(sim: Simulation, sim_config: SimulationConfig, metrics_logger: Box<dyn MetricsLogger>) -> Result<Self> {
        sim_config.validate()?;
        let sim_config = rc!(sim_config);
        let mut engine = SimulationEngine::new(sim, sim_config.num_replications, sim_config.replication_duration);

        let data_center = rc!(refcell!(DataCenter::new(engine.create_context("data_center"))));

        for pm_config in sim_config.physical_machines.iter() {
            for i in 0..pm_config.count {
                let name = if pm_config.count > 1 {
                    format!("{}_{}", pm_config.name, i)
                } else {
                    pm_config.name.clone()
                };
                let resources = pm_config.resources.iter().map(make_resource).collect();
                let controller: Box<dyn PhysicalMachineController> = match sim_config.physical_machine_controller {
                    PhysicalMachineControllerConfig::Dummy => Box::new(DummyPhysicalMachineController::new()),
                    PhysicalMachineControllerConfig::Proportional => {
                        Box::new(ProportionalPhysicalMachineController::new())
                    }
                };
                data_center
                    .borrow_mut()
                    .add_physical_machine(&name, resources, controller);
            }
        }

        let mut control_loops = Vec::new();
        for app_config in sim_config.applications.iter() {
            let (id, sampling_period) = add_application(&mut engine, &data_center, app_config)?;
            let control_loop = rc!(refcell!(ApplicationControlLoop::new(
                id,
                sampling_period,
                data_center.clone(),
                engine.create_context(format!("{}_controller", app_config.name)),
            )));
            engine.add_handler(format!("{}_controller", app_config.name), control_loop.clone());
            control_loops.push(control_loop);
        }

        let mc_config = &sim_config.migration_controller;
        let weights = CostWeights::new(mc_config.wp, mc_config.wm, mc_config.ws);
        let strategy: Box<dyn InitialPlacementStrategy> = match sim_config.initial_placement {
            InitialPlacementConfig::FirstFit { reservation_penalty } => {
                Box::new(FirstFitInitialPlacement::new(reservation_penalty))
            }
            InitialPlacementConfig::Optimal { reservation_penalty } => Box::new(OptimalInitialPlacement::new(
                reservation_penalty,
                weights,
                mc_config.solver.max_explored_nodes,
            )),
        };
        let manager = rc!(refcell!(DataCenterManager::new(
            data_center.clone(),
            strategy,
            engine.stop_handle(),
            engine.create_context("data_center_manager"),
        )));

        let solver = BranchAndBoundPlacementSolver::new(
            PlacementProblemKind::Migration,
            mc_config.solver.max_explored_nodes,
            mc_config.solver.warm_start,
        );
        let migration_controller = rc!(refcell!(MigrationController::new(
            data_center.clone(),
            Box::new(solver),
            weights,
            mc_config.sampling_period,
            mc_config.ewma_smoothing_factor,
            mc_config.wanted_share_source,
            engine.create_context("migration_controller"),
        )));
        engine.add_handler("migration_controller", migration_controller.clone());

        let metrics = rc!(refcell!(SimulationMetrics::new()));
        let metrics_logger = rc!(refcell!(metrics_logger));
        let replication_start = rc!(Cell::new(0.0));

        // Subscribers run in connection order.
        {
            let migration_controller = migration_controller.clone();
            let metrics = metrics.clone();
            engine.begin_of_simulation().connect(move |_, _| {
                migration_controller.borrow_mut().on_begin_of_simulation();
                *metrics.borrow_mut() = SimulationMetrics::new();
            });
        }
        {
            let data_center = data_center.clone();
            let replication_start = replication_start.clone();
            engine.system_initialization().connect(move |time, _| {
                replication_start.set(time);
                if let Err(e) = data_center.borrow_mut().on_system_initialization() {
                    panic!("data center initialization failed: {}", e);
                }
            });
        }
        for control_loop in control_loops {
            engine
                .system_initialization()
                .connect(move |_, _| control_loop.borrow_mut().on_system_initialization());
        }
        {
            let manager = manager.clone();
            engine.system_initialization().connect(move |_, _| {
                if let Err(e) = manager.borrow_mut().on_system_initialization() {
                    panic!("data center manager initialization failed: {}", e);
                }
            });
        }
        {
            let migration_controller = migration_controller.clone();
            engine
                .system_initialization()
                .connect(move |_, _| migration_controller.borrow_mut().on_system_initialization());
        }

        {
            let migration_controller = migration_controller.clone();
            engine
                .system_finalization()
                .connect(move |_, _| migration_controller.borrow_mut().on_system_finalization());
        }
        {
            let manager = manager.clone();
            engine.system_finalization().connect(move |_, _| {
                if let Err(e) = manager.borrow_mut().on_system_finalization() {
                    panic!("data center manager finalization failed: {}", e);
                }
            });
        }
        {
            let data_center = data_center.clone();
            engine.system_finalization().connect(move |_, _| {
                if let Err(e) = data_center.borrow_mut().on_system_finalization() {
                    panic!("data center finalization failed: {}", e);
                }
            });
        }
        {
            let data_center = data_center.clone();
            let migration_controller = migration_controller.clone();
            let metrics = metrics.clone();
            let metrics_logger = metrics_logger.clone();
            engine.system_finalization().connect(move |time, event| {
                let replication_metrics = collect_replication_metrics(
                    &data_center.borrow(),
                    &migration_controller.borrow(),
                    event.replication,
                    replication_start.get(),
                    time,
                );
                metrics_logger.borrow_mut().log_replication(&replication_metrics);
                metrics.borrow_mut().add_replication(replication_metrics);
            });
        }

        Ok(Self {
            engine,
            data_center,
            migration_controller,
            metrics,
            metrics_logger,
            sim_config,
        })
    }

    /// Runs every replication.
    pub fn run(&mut self) {
        self.engine.run();
    }

    /// Gives access to the engine for running replications step by step.
    pub fn engine(&mut self) -> &mut SimulationEngine {
        &mut self.engine
    }

    pub fn data_center(&self) -> Rc<RefCell<DataCenter>> {
        self.data_center.clone()
    }

    pub fn migration_controller(&self) -> Rc<RefCell<MigrationController>> {
        self.migration_controller.clone()
    }

    pub fn config(&self) -> &SimulationConfig {
        &self.sim_config
    }

    pub fn metrics(&self) -> SimulationMetrics {
        self.metrics.borrow().clone()
    }

    /// Writes the collected metrics with the configured logger.
    pub fn save_metrics(&mut self, path: &str) -> std::result::Result<(), std::io::Error> {
        self.metrics_logger.borrow_mut().save_log(path)
    }

    /// Returns the total number of created events.
    pub fn event_count(&self) -> u64 {
        self.engine.event_count()
    }

    /// Returns the current simulation time.
    pub fn current_time(&self) -> f64 {
        self.engine.time()
    }
}

fn make_energy_model(config: &EnergyModelConfig) -> Box<dyn EnergyModel> {
    match *config {
        EnergyModelConfig::Constant { c0 } => Box::new(ConstantEnergyModel::new(c0)),
        EnergyModelConfig::Fan2007 { c0, c1, c2, r } => Box::new(Fan2007EnergyModel::new(c0, c1, c2, r)),
    }
}

fn make_resource(config: &ResourceConfig) -> Resource {
    let resource = Resource::new(config.category, config.capacity, config.threshold);
    match config.energy_model.as_ref() {
        Some(energy_model) => resource.with_energy_model(make_energy_model(energy_model)),
        None => resource,
    }
}

/// Registers the application and its simulation model. Returns the application id and the
/// sampling period of its controller.
fn add_application(
    engine: &mut SimulationEngine,
    data_center: &Rc<RefCell<DataCenter>>,
    config: &ApplicationConfig,
) -> Result<(ApplicationId, f64)> {
    let mut classes = Vec::with_capacity(config.request_classes.len());
    for class in config.request_classes.iter() {
        classes.push(RequestClass::new(
            class.name.clone(),
            class.arrival_rate,
            class.service_demands.clone(),
            class.service_distribution,
        )?);
    }

    let mut tiers = Vec::with_capacity(config.tiers.len());
    let mut tier_reference_shares = Vec::with_capacity(config.tiers.len());
    for tier in config.tiers.iter() {
        let shares: ShareList = tier.shares.iter().map(|s| (s.category, s.share)).collect();
        let cpu_share = find_share(&shares, ResourceCategory::Cpu).ok_or_else(|| {
            SimulationError::InvalidConfiguration(format!(
                "tier {} of application {} has no CPU share",
                tier.name, config.name
            ))
        })?;
        tier_reference_shares.push(cpu_share);
        tiers.push(ApplicationTier::new(tier.name.clone(), shares));
    }

    let sla_cost_model: Rc<dyn SlaCostModel> = rc!(StepSlaCostModel::new(
        config.slos.iter().map(|slo| (slo.category, slo.target)).collect(),
        config.sla_penalty,
    ));
    let model = rc!(refcell!(ApplicationSimulationModel::new(
        classes,
        tier_reference_shares,
        sla_cost_model.clone(),
        engine.create_context(&config.name),
    )));
    engine.add_handler(&config.name, model.clone());

    let application = MultiTierApplication::new(
        config.name.clone(),
        tiers,
        config.reference_resources.iter().map(make_resource).collect(),
        model,
        sla_cost_model,
    )?;
    let (controller, sampling_period): (Box<dyn ApplicationController>, f64) = match config.controller {
        ApplicationControllerConfig::Dummy => (Box::new(DummyApplicationController::new()), 0.0),
        ApplicationControllerConfig::Utilization {
            sampling_period,
            target_utilization,
            min_share,
        } => (
            Box::new(UtilizationApplicationController::new(
                sampling_period,
                target_utilization,
                min_share,
            )),
            sampling_period,
        ),
    };
    let id = data_center.borrow_mut().add_application(application, controller);
    Ok((id, sampling_period))
}

fn collect_replication_metrics(
    data_center: &DataCenter,
    migration_controller: &MigrationController,
    replication: u32,
    start_time: f64,
    end_time: f64,
) -> ReplicationMetrics {
    let applications = data_center
        .applications()
        .map(|app| {
            let summary = app.simulation_model().borrow().summary();
            let predicted_response_time = app.performance_model().response_time(&vec![1.0; app.num_tiers()]);
            let predicted_sla_satisfied = app
                .sla_cost_model()
                .satisfied(&[(PerformanceMeasureCategory::ResponseTime, predicted_response_time)]);
            ApplicationMetrics {
                application_id: app.id,
                name: app.name.clone(),
                num_arrivals: summary.num_arrivals,
                num_departures: summary.num_departures,
                num_sla_violations: summary.num_sla_violations,
                sla_cost: summary.sla_cost,
                throughput: summary.throughput,
                mean_response_time: summary.mean_response_time,
                predicted_response_time,
                predicted_sla_satisfied,
            }
        })
        .collect();
    ReplicationMetrics {
        replication,
        start_time,
        end_time,
        num_control_ticks: migration_controller.count(),
        num_solver_failures: migration_controller.fail_count(),
        num_migrations: migration_controller.migr_count(),
        migration_rate: migration_controller.current_migration_rate(),
        mean_cost: migration_controller.cost_statistic().current().estimate(),
        energy_consumed: data_center.energy_consumed(),
        applications,
    }
}
