//! Error types shared by the data center state machine and its collaborators.

use thiserror::Error;

use crate::common::{ApplicationId, PhysicalMachineId, VirtualMachineId};
use crate::resource::ResourceCategory;

/// Fatal precondition violations.
///
/// Recoverable lifecycle conditions (starting an application whose VMs are not placed yet, migrating a
/// powered-off VM, ...) are not represented here: those operations return `Ok(false)` and log a warning.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum SimulationError {
    #[error("invalid application id: {0}")]
    InvalidApplication(ApplicationId),

    #[error("invalid physical machine id: {0}")]
    InvalidPhysicalMachine(PhysicalMachineId),

    #[error("invalid virtual machine id: {0}")]
    InvalidVirtualMachine(VirtualMachineId),

    #[error("invalid tier {tier} for application {application}")]
    InvalidTier { application: ApplicationId, tier: usize },

    #[error("virtual machine {0} is already placed")]
    AlreadyPlaced(VirtualMachineId),

    #[error("virtual machine {0} is not placed")]
    NotPlaced(VirtualMachineId),

    #[error("application {0} is not deployed")]
    NotDeployed(ApplicationId),

    #[error("incompatible resource category: {0}")]
    IncompatibleCategory(ResourceCategory),

    #[error("physical machine {0} has no energy model for resource category {1}")]
    MissingEnergyModel(PhysicalMachineId, ResourceCategory),

    #[error("invalid configuration: {0}")]
    InvalidConfiguration(String),
}

pub type Result<T> = std::result::Result<T, SimulationError>;
