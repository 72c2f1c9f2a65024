//! Simulation configuration.

use serde::{Deserialize, Serialize};

use crate::error::{Result, SimulationError};
use crate::migration_controller::WantedShareSource;
use crate::queueing_network::ServiceDistribution;
use crate::resource::ResourceCategory;
use crate::sla::PerformanceMeasureCategory;

fn default_threshold() -> f64 {
    1.0
}

fn default_count() -> u32 {
    1
}

fn default_service_distribution() -> ServiceDistribution {
    ServiceDistribution::Exponential
}

/// Energy model of a physical resource.
#[derive(Debug, PartialEq, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum EnergyModelConfig {
    Constant { c0: f64 },
    Fan2007 { c0: f64, c1: f64, c2: f64, r: f64 },
}

/// Holds configuration of a physical or reference resource.
#[derive(Debug, PartialEq, Clone, Serialize, Deserialize)]
pub struct ResourceConfig {
    pub category: ResourceCategory,
    pub capacity: f64,
    /// Usable fraction of the capacity.
    #[serde(default = "default_threshold")]
    pub threshold: f64,
    /// Only meaningful for physical machines.
    #[serde(default)]
    pub energy_model: Option<EnergyModelConfig>,
}

impl ResourceConfig {
    pub fn new(category: ResourceCategory, capacity: f64, threshold: f64, energy_model: Option<EnergyModelConfig>) -> Self {
        Self {
            category,
            capacity,
            threshold,
            energy_model,
        }
    }
}

/// Holds configuration of a single physical machine or a set of identical machines.
#[derive(Debug, PartialEq, Clone, Serialize, Deserialize)]
pub struct PhysicalMachineConfig {
    pub name: String,
    /// Number of such machines.
    #[serde(default = "default_count")]
    pub count: u32,
    pub resources: Vec<ResourceConfig>,
}

impl PhysicalMachineConfig {
    pub fn new(name: &str, count: u32, resources: Vec<ResourceConfig>) -> Self {
        Self {
            name: name.to_string(),
            count,
            resources,
        }
    }
}

#[derive(Debug, PartialEq, Clone, Serialize, Deserialize)]
pub struct ShareConfig {
    pub category: ResourceCategory,
    pub share: f64,
}

#[derive(Debug, PartialEq, Clone, Serialize, Deserialize)]
pub struct TierConfig {
    pub name: String,
    /// Shares of the reference machine.
    pub shares: Vec<ShareConfig>,
}

impl TierConfig {
    pub fn new(name: &str, cpu_share: f64) -> Self {
        Self {
            name: name.to_string(),
            shares: vec![ShareConfig {
                category: ResourceCategory::Cpu,
                share: cpu_share,
            }],
        }
    }
}

#[derive(Debug, PartialEq, Clone, Serialize, Deserialize)]
pub struct RequestClassConfig {
    pub name: String,
    /// Requests per second.
    pub arrival_rate: f64,
    /// Mean service demand at every tier on the reference machine, in seconds.
    pub service_demands: Vec<f64>,
    #[serde(default = "default_service_distribution")]
    pub service_distribution: ServiceDistribution,
}

#[derive(Debug, PartialEq, Clone, Serialize, Deserialize)]
pub struct SloConfig {
    pub category: PerformanceMeasureCategory,
    pub target: f64,
}

#[derive(Debug, Default, PartialEq, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ApplicationControllerConfig {
    #[default]
    Dummy,
    Utilization {
        sampling_period: f64,
        target_utilization: f64,
        #[serde(default)]
        min_share: f64,
    },
}

#[derive(Debug, PartialEq, Clone, Serialize, Deserialize)]
pub struct ApplicationConfig {
    pub name: String,
    pub reference_resources: Vec<ResourceConfig>,
    pub tiers: Vec<TierConfig>,
    pub request_classes: Vec<RequestClassConfig>,
    #[serde(default)]
    pub slos: Vec<SloConfig>,
    /// Penalty charged per violated request.
    #[serde(default)]
    pub sla_penalty: f64,
    #[serde(default)]
    pub controller: ApplicationControllerConfig,
}

#[derive(Debug, PartialEq, Clone, Serialize, Deserialize)]
pub struct SolverConfig {
    /// The solve fails once this many search nodes are explored.
    pub max_explored_nodes: u64,
    /// Evaluate the current placement first.
    pub warm_start: bool,
}

impl Default for SolverConfig {
    fn default() -> Self {
        Self {
            max_explored_nodes: 1_000_000,
            warm_start: true,
        }
    }
}

/// Holds raw migration controller config parsed from YAML file.
#[derive(Debug, PartialEq, Clone, Serialize, Deserialize)]
struct RawMigrationControllerConfig {
    pub sampling_period: Option<f64>,
    pub wp: Option<f64>,
    pub wm: Option<f64>,
    pub ws: Option<f64>,
    pub ewma_smoothing_factor: Option<f64>,
    pub wanted_share_source: Option<WantedShareSource>,
    pub solver: Option<SolverConfig>,
}

#[derive(Debug, PartialEq, Clone, Serialize, Deserialize)]
pub struct MigrationControllerConfig {
    /// Control period in seconds.
    pub sampling_period: f64,
    /// Weight of the power term.
    pub wp: f64,
    /// Weight of the migration term.
    pub wm: f64,
    /// Weight of the SLA share deviation term.
    pub ws: f64,
    pub ewma_smoothing_factor: f64,
    pub wanted_share_source: WantedShareSource,
    pub solver: SolverConfig,
}

impl Default for MigrationControllerConfig {
    fn default() -> Self {
        Self {
            sampling_period: 60.0,
            wp: 1.0,
            wm: 1.0,
            ws: 1.0,
            ewma_smoothing_factor: 0.7,
            wanted_share_source: WantedShareSource::TierReference,
            solver: SolverConfig::default(),
        }
    }
}

impl From<RawMigrationControllerConfig> for MigrationControllerConfig {
    fn from(raw: RawMigrationControllerConfig) -> Self {
        let default = Self::default();
        Self {
            sampling_period: raw.sampling_period.unwrap_or(default.sampling_period),
            wp: raw.wp.unwrap_or(default.wp),
            wm: raw.wm.unwrap_or(default.wm),
            ws: raw.ws.unwrap_or(default.ws),
            ewma_smoothing_factor: raw.ewma_smoothing_factor.unwrap_or(default.ewma_smoothing_factor),
            wanted_share_source: raw.wanted_share_source.unwrap_or(default.wanted_share_source),
            solver: raw.solver.unwrap_or(default.solver),
        }
    }
}

#[derive(Debug, PartialEq, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum InitialPlacementConfig {
    FirstFit { reservation_penalty: f64 },
    Optimal { reservation_penalty: f64 },
}

impl Default for InitialPlacementConfig {
    fn default() -> Self {
        InitialPlacementConfig::FirstFit {
            reservation_penalty: 0.0,
        }
    }
}

#[derive(Debug, Default, PartialEq, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum PhysicalMachineControllerConfig {
    #[default]
    Dummy,
    Proportional,
}

/// Holds raw simulation config parsed from YAML file.
#[derive(Debug, PartialEq, Serialize, Deserialize, Clone)]
struct RawSimulationConfig {
    pub seed: Option<u64>,
    pub num_replications: Option<u32>,
    pub replication_duration: Option<f64>,
    pub physical_machines: Option<Vec<PhysicalMachineConfig>>,
    pub applications: Option<Vec<ApplicationConfig>>,
    pub migration_controller: Option<RawMigrationControllerConfig>,
    pub initial_placement: Option<InitialPlacementConfig>,
    pub physical_machine_controller: Option<PhysicalMachineControllerConfig>,
}

/// Represents simulation configuration.
#[derive(Debug, PartialEq, Clone, Serialize, Deserialize)]
pub struct SimulationConfig {
    /// Seed of the random number generator.
    pub seed: u64,
    pub num_replications: u32,
    /// Length of a replication in seconds.
    pub replication_duration: f64,
    pub physical_machines: Vec<PhysicalMachineConfig>,
    pub applications: Vec<ApplicationConfig>,
    pub migration_controller: MigrationControllerConfig,
    pub initial_placement: InitialPlacementConfig,
    pub physical_machine_controller: PhysicalMachineControllerConfig,
}

impl SimulationConfig {
    pub fn new(seed: u64, num_replications: u32, replication_duration: f64) -> Self {
        Self {
            seed,
            num_replications,
            replication_duration,
            physical_machines: Vec::default(),
            applications: Vec::default(),
            migration_controller: MigrationControllerConfig::default(),
            initial_placement: InitialPlacementConfig::default(),
            physical_machine_controller: PhysicalMachineControllerConfig::default(),
        }
    }

    pub fn from_file(file_name: &str) -> Result<Self> {
        let content = std::fs::read_to_string(file_name)
            .map_err(|e| SimulationError::InvalidConfiguration(format!("can't read file {}: {}", file_name, e)))?;
        Self::from_yaml(&content)
            .map_err(|e| SimulationError::InvalidConfiguration(format!("{} (file {})", e, file_name)))
    }

    pub fn from_yaml(content: &str) -> Result<Self> {
        let raw: RawSimulationConfig = serde_yaml::from_str(content)
            .map_err(|e| SimulationError::InvalidConfiguration(format!("can't parse YAML: {}", e)))?;

        let config = Self {
            seed: raw.seed.unwrap_or(42),
            num_replications: raw.num_replications.unwrap_or(1),
            replication_duration: raw.replication_duration.unwrap_or(3600.0),
            physical_machines: raw.physical_machines.unwrap_or_default(),
            applications: raw.applications.unwrap_or_default(),
            migration_controller: raw
                .migration_controller
                .map(MigrationControllerConfig::from)
                .unwrap_or_default(),
            initial_placement: raw.initial_placement.unwrap_or_default(),
            physical_machine_controller: raw.physical_machine_controller.unwrap_or_default(),
        };
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        let invalid = |msg: String| Err(SimulationError::InvalidConfiguration(msg));
        if self.replication_duration <= 0.0 {
            return invalid(format!("replication duration {} is not positive", self.replication_duration));
        }
        if self.migration_controller.sampling_period <= 0.0 {
            return invalid("migration controller sampling period must be positive".to_string());
        }
        if !(0.0..=1.0).contains(&self.migration_controller.ewma_smoothing_factor) {
            return invalid("EWMA smoothing factor must be in [0, 1]".to_string());
        }
        for pm in self.physical_machines.iter() {
            for resource in pm.resources.iter() {
                if resource.capacity <= 0.0 || resource.threshold <= 0.0 || resource.threshold > 1.0 {
                    return invalid(format!("physical machine {} has an invalid {} resource", pm.name, resource.category));
                }
            }
        }
        for app in self.applications.iter() {
            for class in app.request_classes.iter() {
                if class.service_demands.len() != app.tiers.len() {
                    return invalid(format!(
                        "request class {} of application {} needs one service demand per tier",
                        class.name, app.name
                    ));
                }
            }
            for resource in app.reference_resources.iter() {
                if resource.capacity <= 0.0 || resource.threshold <= 0.0 || resource.threshold > 1.0 {
                    return invalid(format!("application {} has an invalid {} reference resource", app.name, resource.category));
                }
            }
        }
        Ok(())
    }
}
