//! Resource categories, resources and power status.

use std::fmt::{Display, Formatter};

use serde::{Deserialize, Serialize};

use crate::energy_model::EnergyModel;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResourceCategory {
    Cpu,
    Memory,
    Disk,
    Nic,
}

impl Display for ResourceCategory {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        match self {
            ResourceCategory::Cpu => write!(f, "cpu"),
            ResourceCategory::Memory => write!(f, "memory"),
            ResourceCategory::Disk => write!(f, "disk"),
            ResourceCategory::Nic => write!(f, "nic"),
        }
    }
}

/// Power status of physical and virtual machines.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub enum PowerStatus {
    Off,
    On,
}

impl Display for PowerStatus {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        match self {
            PowerStatus::Off => write!(f, "off"),
            PowerStatus::On => write!(f, "on"),
        }
    }
}

/// A machine resource.
///
/// Resources owned by physical machines carry an energy model; reference resources declared by
/// applications (the machine the application was profiled on) do not.
#[derive(Clone, Serialize)]
pub struct Resource {
    pub category: ResourceCategory,
    pub capacity: f64,
    /// Fraction of the capacity that may be used, at most 1.
    pub threshold: f64,
    energy_model: Option<Box<dyn EnergyModel>>,
}

impl Resource {
    pub fn new(category: ResourceCategory, capacity: f64, threshold: f64) -> Self {
        assert!(capacity > 0.0, "resource capacity must be positive");
        assert!(threshold > 0.0 && threshold <= 1.0, "resource threshold must be in (0, 1]");
        Self {
            category,
            capacity,
            threshold,
            energy_model: None,
        }
    }

    pub fn with_energy_model(mut self, energy_model: Box<dyn EnergyModel>) -> Self {
        self.energy_model = Some(energy_model);
        self
    }

    pub fn energy_model(&self) -> Option<&dyn EnergyModel> {
        self.energy_model.as_deref()
    }
}
