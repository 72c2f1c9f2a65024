use crate::initial_placement_strategy::InitialPlacementStrategy;
use crate::placement_solver::DataCenterSnapshot;
use crate::resource::ResourceCategory;
use crate::scaling::scale_resource_share;
use crate::virtual_machines_placement::VirtualMachinesPlacement;

/// Places every VM, in tier order, on the first machine with enough room left for the tier's
/// reference share. Each machine keeps `reservation_penalty` of its capacity free.
pub struct FirstFitInitialPlacement {
    reservation_penalty: f64,
}

impl FirstFitInitialPlacement {
    pub fn new(reservation_penalty: f64) -> Self {
        Self { reservation_penalty }
    }
}

impl InitialPlacementStrategy for FirstFitInitialPlacement {
    fn place(&mut self, snapshot: &DataCenterSnapshot) -> Option<VirtualMachinesPlacement> {
        let mut assigned = vec![0.0; snapshot.physical_machines.len()];
        let mut placement = VirtualMachinesPlacement::new();
        for vm in snapshot.virtual_machines.iter() {
            let (pm, share) = snapshot.physical_machines.iter().enumerate().find_map(|(i, pm)| {
                let share = scale_resource_share(
                    vm.reference_cpu_capacity,
                    vm.reference_cpu_threshold,
                    pm.cpu_capacity,
                    pm.cpu_threshold,
                    vm.reference_share,
                );
                (assigned[i] + share <= 1.0 - self.reservation_penalty).then_some((i, share))
            })?;
            assigned[pm] += share;
            placement
                .place(vm.id, snapshot.physical_machines[pm].id, vec![(ResourceCategory::Cpu, share)])
                .ok()?;
        }
        Some(placement)
    }
}
