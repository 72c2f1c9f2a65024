//! Table of VM to PM assignments together with the shares granted on the host.

use std::collections::BTreeMap;

use serde::Serialize;

use crate::common::{PhysicalMachineId, ShareList, VirtualMachineId};
use crate::error::{Result, SimulationError};

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct PlacementEntry {
    pub physical_machine: PhysicalMachineId,
    pub shares: ShareList,
}

/// Every VM appears at most once; a VM is placed iff it is a key of the table.
#[derive(Clone, Debug, Default, PartialEq, Serialize)]
pub struct VirtualMachinesPlacement {
    entries: BTreeMap<VirtualMachineId, PlacementEntry>,
}

impl VirtualMachinesPlacement {
    pub fn new() -> Self {
        Default::default()
    }

    /// Fails if `vm` is already placed; use [`Self::replace`] then.
    pub fn place(&mut self, vm: VirtualMachineId, pm: PhysicalMachineId, shares: ShareList) -> Result<()> {
        if self.entries.contains_key(&vm) {
            return Err(SimulationError::AlreadyPlaced(vm));
        }
        self.entries.insert(
            vm,
            PlacementEntry {
                physical_machine: pm,
                shares,
            },
        );
        Ok(())
    }

    /// Updates the host and shares of an already placed VM.
    pub fn replace(&mut self, vm: VirtualMachineId, pm: PhysicalMachineId, shares: ShareList) -> Result<()> {
        let entry = self.entries.get_mut(&vm).ok_or(SimulationError::NotPlaced(vm))?;
        entry.physical_machine = pm;
        entry.shares = shares;
        Ok(())
    }

    /// Returns false if `vm` was not placed.
    pub fn displace(&mut self, vm: VirtualMachineId) -> bool {
        self.entries.remove(&vm).is_some()
    }

    pub fn displace_all(&mut self) {
        self.entries.clear();
    }

    pub fn placed(&self, vm: VirtualMachineId) -> bool {
        self.entries.contains_key(&vm)
    }

    /// Whether `vm` is placed on `pm`.
    pub fn placed_on(&self, vm: VirtualMachineId, pm: PhysicalMachineId) -> bool {
        self.entries.get(&vm).map_or(false, |e| e.physical_machine == pm)
    }

    pub fn find(&self, vm: VirtualMachineId) -> Option<&PlacementEntry> {
        self.entries.get(&vm)
    }

    pub fn iter(&self) -> impl Iterator<Item = (VirtualMachineId, &PlacementEntry)> {
        self.entries.iter().map(|(vm, e)| (*vm, e))
    }

    pub fn vms_on(&self, pm: PhysicalMachineId) -> Vec<VirtualMachineId> {
        self.entries
            .iter()
            .filter(|(_, e)| e.physical_machine == pm)
            .map(|(vm, _)| *vm)
            .collect()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
