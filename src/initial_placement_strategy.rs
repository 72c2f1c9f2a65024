//! Initial placement strategies decide where the VMs go when a replication starts.

use crate::placement_solver::DataCenterSnapshot;
use crate::virtual_machines_placement::VirtualMachinesPlacement;

pub trait InitialPlacementStrategy {
    /// Returns `None` if the VMs cannot be placed.
    fn place(&mut self, snapshot: &DataCenterSnapshot) -> Option<VirtualMachinesPlacement>;
}
