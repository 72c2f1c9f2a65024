//! Placement solver interface and the data center snapshot it works on.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::common::{ApplicationId, PhysicalMachineId, ShareList, VirtualMachineId};
use crate::data_center::DataCenter;
use crate::energy_model::EnergyModel;
use crate::error::{Result, SimulationError};
use crate::resource::ResourceCategory;
use crate::virtual_machines_placement::VirtualMachinesPlacement;

/// Weights of the power, migration and SLA-share-deviation objective terms.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct CostWeights {
    pub power: f64,
    pub migration: f64,
    pub sla: f64,
}

impl CostWeights {
    pub fn new(power: f64, migration: f64, sla: f64) -> Self {
        Self { power, migration, sla }
    }
}

/// The initial placement keeps a reservation margin on every machine, the steady-state migration
/// problem does not.
#[derive(Clone, Copy, Debug, PartialEq, Serialize)]
pub enum PlacementProblemKind {
    Initial { reservation_penalty: f64 },
    Migration,
}

impl PlacementProblemKind {
    /// Upper bound of the aggregate share assigned on a machine.
    pub fn max_aggregate_share(&self) -> f64 {
        match self {
            PlacementProblemKind::Initial { reservation_penalty } => 1.0 - reservation_penalty,
            PlacementProblemKind::Migration => 1.0,
        }
    }
}

#[derive(Clone, Serialize)]
pub struct PhysicalMachineSnapshot {
    pub id: PhysicalMachineId,
    pub cpu_capacity: f64,
    pub cpu_threshold: f64,
    pub powered_on: bool,
    pub energy_model: Box<dyn EnergyModel>,
}

#[derive(Clone, Debug, Serialize)]
pub struct VirtualMachineSnapshot {
    pub id: VirtualMachineId,
    pub application: ApplicationId,
    pub tier: usize,
    pub host: Option<PhysicalMachineId>,
    pub reference_cpu_capacity: f64,
    pub reference_cpu_threshold: f64,
    /// CPU share of the tier on the reference machine.
    pub reference_share: f64,
}

/// Immutable view of the data center handed to placement solvers.
#[derive(Clone, Serialize)]
pub struct DataCenterSnapshot {
    pub physical_machines: Vec<PhysicalMachineSnapshot>,
    pub virtual_machines: Vec<VirtualMachineSnapshot>,
}

impl DataCenterSnapshot {
    /// Captures every physical machine and the given VMs.
    pub fn capture(data_center: &DataCenter, vms: &[VirtualMachineId]) -> Result<Self> {
        let mut physical_machines = Vec::new();
        for pm in data_center.physical_machines() {
            let cpu = pm.resource(ResourceCategory::Cpu)?;
            physical_machines.push(PhysicalMachineSnapshot {
                id: pm.id,
                cpu_capacity: cpu.capacity,
                cpu_threshold: cpu.threshold,
                powered_on: pm.is_powered_on(),
                energy_model: dyn_clone::clone_box(pm.energy_model(ResourceCategory::Cpu)?),
            });
        }
        let mut virtual_machines = Vec::new();
        for id in vms {
            let vm = data_center.virtual_machine(*id)?;
            let application = data_center.application(vm.application_id)?;
            let reference = application.reference_resource(ResourceCategory::Cpu)?;
            let reference_share = application
                .tier(vm.tier)?
                .share(ResourceCategory::Cpu)
                .ok_or(SimulationError::IncompatibleCategory(ResourceCategory::Cpu))?;
            virtual_machines.push(VirtualMachineSnapshot {
                id: vm.id,
                application: vm.application_id,
                tier: vm.tier,
                host: vm.host(),
                reference_cpu_capacity: reference.capacity,
                reference_cpu_threshold: reference.threshold,
                reference_share,
            });
        }
        Ok(Self {
            physical_machines,
            virtual_machines,
        })
    }

    pub fn physical_machine(&self, id: PhysicalMachineId) -> Option<&PhysicalMachineSnapshot> {
        self.physical_machines.iter().find(|pm| pm.id == id)
    }

    pub fn virtual_machine(&self, id: VirtualMachineId) -> Option<&VirtualMachineSnapshot> {
        self.virtual_machines.iter().find(|vm| vm.id == id)
    }
}

/// Outcome of a solve. An unsolved result never carries a partial placement.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct PlacementSolution {
    pub solved: bool,
    pub cost: f64,
    pub placement: BTreeMap<(PhysicalMachineId, VirtualMachineId), ShareList>,
}

impl PlacementSolution {
    pub fn unsolved() -> Self {
        Self {
            solved: false,
            cost: f64::NAN,
            placement: BTreeMap::new(),
        }
    }

    pub fn to_placement(&self) -> Result<VirtualMachinesPlacement> {
        let mut placement = VirtualMachinesPlacement::new();
        for ((pm, vm), shares) in self.placement.iter() {
            placement.place(*vm, *pm, shares.clone())?;
        }
        Ok(placement)
    }
}

/// Utilization is per VM, in the reference frame, relative to the tier's reference share. Wanted
/// shares are per VM and category, in the reference frame.
pub trait PlacementSolver {
    fn solve(
        &mut self,
        snapshot: &DataCenterSnapshot,
        weights: &CostWeights,
        vm_utilization: &BTreeMap<VirtualMachineId, f64>,
        vm_wanted_share: &BTreeMap<VirtualMachineId, BTreeMap<ResourceCategory, f64>>,
    ) -> PlacementSolution;
}
