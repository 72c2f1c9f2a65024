//! Representation of the physical machine and its virtual machine monitor.

use std::collections::{BTreeMap, BTreeSet};

use serde::Serialize;

use crate::common::{PhysicalMachineId, VirtualMachineId};
use crate::energy_meter::EnergyMeter;
use crate::energy_model::EnergyModel;
use crate::error::{Result, SimulationError};
use crate::resource::{PowerStatus, Resource, ResourceCategory};

/// Tracks the VM domains created on a physical machine.
#[derive(Clone, Debug, Default, Serialize)]
pub struct VirtualMachineMonitor {
    domains: BTreeSet<VirtualMachineId>,
}

impl VirtualMachineMonitor {
    pub fn new() -> Self {
        Default::default()
    }

    /// Creates the domain of `vm`. Returns false if it already exists.
    pub fn create_domain(&mut self, vm: VirtualMachineId) -> bool {
        self.domains.insert(vm)
    }

    /// Destroys the domain of `vm`. Returns false if there is no such domain.
    pub fn destroy_domain(&mut self, vm: VirtualMachineId) -> bool {
        self.domains.remove(&vm)
    }

    pub fn hosts(&self, vm: VirtualMachineId) -> bool {
        self.domains.contains(&vm)
    }

    pub fn domains(&self) -> impl Iterator<Item = VirtualMachineId> + '_ {
        self.domains.iter().copied()
    }

    pub fn num_domains(&self) -> usize {
        self.domains.len()
    }

    pub fn clear(&mut self) {
        self.domains.clear();
    }
}

#[derive(Clone, Serialize)]
pub struct PhysicalMachine {
    pub id: PhysicalMachineId,
    pub name: String,
    resources: BTreeMap<ResourceCategory, Resource>,
    power_status: PowerStatus,
    vmm: VirtualMachineMonitor,
    energy_meter: EnergyMeter,
    uptime: f64,
    last_power_on_time: f64,
}

impl PhysicalMachine {
    pub fn new(id: PhysicalMachineId, name: String, resources: Vec<Resource>) -> Self {
        Self {
            id,
            name,
            resources: resources.into_iter().map(|r| (r.category, r)).collect(),
            power_status: PowerStatus::Off,
            vmm: VirtualMachineMonitor::new(),
            energy_meter: EnergyMeter::new(),
            uptime: 0.0,
            last_power_on_time: 0.0,
        }
    }

    pub fn resource(&self, category: ResourceCategory) -> Result<&Resource> {
        self.resources
            .get(&category)
            .ok_or(SimulationError::IncompatibleCategory(category))
    }

    pub fn resources(&self) -> impl Iterator<Item = &Resource> {
        self.resources.values()
    }

    pub fn has_resource(&self, category: ResourceCategory) -> bool {
        self.resources.contains_key(&category)
    }

    pub fn energy_model(&self, category: ResourceCategory) -> Result<&dyn EnergyModel> {
        self.resources
            .get(&category)
            .and_then(|r| r.energy_model())
            .ok_or(SimulationError::MissingEnergyModel(self.id, category))
    }

    pub fn power_status(&self) -> PowerStatus {
        self.power_status
    }

    pub fn is_powered_on(&self) -> bool {
        self.power_status == PowerStatus::On
    }

    /// Powers the machine on. Returns false if it is already on.
    ///
    /// The caller updates the drawn power afterwards with [`Self::update_power`].
    pub fn power_on(&mut self, time: f64) -> bool {
        if self.is_powered_on() {
            return false;
        }
        self.power_status = PowerStatus::On;
        self.last_power_on_time = time;
        true
    }

    /// Powers the machine off. Hosted VMs must have been powered off before.
    pub fn power_off(&mut self, time: f64) -> bool {
        if !self.is_powered_on() {
            return false;
        }
        self.uptime += time - self.last_power_on_time;
        self.power_status = PowerStatus::Off;
        self.energy_meter.update(time, 0.0);
        true
    }

    /// Recomputes the drawn power from the aggregate CPU share of the running VMs.
    pub fn update_power(&mut self, time: f64, cpu_share: f64) -> Result<()> {
        let power = if self.is_powered_on() {
            self.energy_model(ResourceCategory::Cpu)?
                .consumed_energy(cpu_share.clamp(0.0, 1.0))
        } else {
            0.0
        };
        self.energy_meter.update(time, power);
        Ok(())
    }

    pub fn current_power(&self) -> f64 {
        self.energy_meter.current_power()
    }

    pub fn energy_consumed(&self, time: f64) -> f64 {
        self.energy_meter.energy_consumed_until(time)
    }

    pub fn uptime(&self, time: f64) -> f64 {
        if self.is_powered_on() {
            self.uptime + (time - self.last_power_on_time)
        } else {
            self.uptime
        }
    }

    pub fn vmm(&self) -> &VirtualMachineMonitor {
        &self.vmm
    }

    pub fn vmm_mut(&mut self) -> &mut VirtualMachineMonitor {
        &mut self.vmm
    }

    /// Brings the machine back to its initial state: off, no domains, accounting restarted at `time`.
    pub fn reset(&mut self, time: f64) {
        self.power_status = PowerStatus::Off;
        self.vmm.clear();
        self.energy_meter.reset(time, 0.0);
        self.uptime = 0.0;
        self.last_power_on_time = time;
    }
}
