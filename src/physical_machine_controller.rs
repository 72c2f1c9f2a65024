//! Physical machine controllers turn the wanted shares of hosted VMs into enforced shares.

use crate::common::VirtualMachineId;
use crate::physical_machine::PhysicalMachine;
use crate::resource::ResourceCategory;
use crate::virtual_machine::VirtualMachine;

pub type ShareUpdate = (VirtualMachineId, ResourceCategory, f64);

pub trait PhysicalMachineController {
    fn enable(&mut self, flag: bool);

    fn enabled(&self) -> bool;

    /// Computes the actual shares of the VMs hosted on `pm`.
    fn enforce(&mut self, pm: &PhysicalMachine, vms: &[&VirtualMachine]) -> Vec<ShareUpdate>;
}

/// Grants every VM exactly what it wants.
pub struct DummyPhysicalMachineController {
    enabled: bool,
}

impl DummyPhysicalMachineController {
    pub fn new() -> Self {
        Self { enabled: true }
    }
}

impl Default for DummyPhysicalMachineController {
    fn default() -> Self {
        Self::new()
    }
}

impl PhysicalMachineController for DummyPhysicalMachineController {
    fn enable(&mut self, flag: bool) {
        self.enabled = flag;
    }

    fn enabled(&self) -> bool {
        self.enabled
    }

    fn enforce(&mut self, _pm: &PhysicalMachine, vms: &[&VirtualMachine]) -> Vec<ShareUpdate> {
        if !self.enabled {
            return Vec::new();
        }
        vms.iter()
            .flat_map(|vm| vm.wanted_shares().into_iter().map(move |(c, s)| (vm.id, c, s)))
            .collect()
    }
}

/// Scales the wanted shares of running VMs down proportionally when they oversubscribe the host.
pub struct ProportionalPhysicalMachineController {
    enabled: bool,
}

impl ProportionalPhysicalMachineController {
    pub fn new() -> Self {
        Self { enabled: true }
    }
}

impl Default for ProportionalPhysicalMachineController {
    fn default() -> Self {
        Self::new()
    }
}

impl PhysicalMachineController for ProportionalPhysicalMachineController {
    fn enable(&mut self, flag: bool) {
        self.enabled = flag;
    }

    fn enabled(&self) -> bool {
        self.enabled
    }

    fn enforce(&mut self, pm: &PhysicalMachine, vms: &[&VirtualMachine]) -> Vec<ShareUpdate> {
        if !self.enabled {
            return Vec::new();
        }
        let mut updates = Vec::new();
        for category in pm.resources().map(|r| r.category) {
            let total: f64 = vms
                .iter()
                .filter(|vm| vm.is_powered_on())
                .filter_map(|vm| vm.wanted_share(category))
                .sum();
            let scale = if total > 1.0 { 1.0 / total } else { 1.0 };
            for vm in vms {
                if let Some(wanted) = vm.wanted_share(category) {
                    let share = if vm.is_powered_on() { wanted * scale } else { wanted };
                    updates.push((vm.id, category, share));
                }
            }
        }
        updates
    }
}
