//! Brings applications up at the start of every replication and down at its end.

use std::cell::RefCell;
use std::rc::Rc;

use dslab_core::{log_info, log_warn, SimulationContext};

use crate::common::VirtualMachineId;
use crate::data_center::DataCenter;
use crate::engine::StopHandle;
use crate::error::Result;
use crate::initial_placement_strategy::InitialPlacementStrategy;
use crate::placement_solver::DataCenterSnapshot;

pub struct DataCenterManager {
    data_center: Rc<RefCell<DataCenter>>,
    strategy: Box<dyn InitialPlacementStrategy>,
    stop: StopHandle,

    ctx: SimulationContext,
}

impl DataCenterManager {
    pub fn new(
        data_center: Rc<RefCell<DataCenter>>,
        strategy: Box<dyn InitialPlacementStrategy>,
        stop: StopHandle,
        ctx: SimulationContext,
    ) -> Self {
        Self {
            data_center,
            strategy,
            stop,
            ctx,
        }
    }

    /// Deploys every application, places its VMs and starts it. Stops the replication if no
    /// application could be started.
    pub fn on_system_initialization(&mut self) -> Result<()> {
        let mut data_center = self.data_center.borrow_mut();
        let applications: Vec<_> = data_center.applications().map(|app| app.id).collect();
        for id in applications {
            data_center.deploy_application(id)?;
        }

        let mut vms: Vec<VirtualMachineId> = Vec::new();
        for id in data_center.active_applications() {
            vms.extend_from_slice(data_center.application_virtual_machines(id)?);
        }
        let snapshot = DataCenterSnapshot::capture(&data_center, &vms)?;
        match self.strategy.place(&snapshot) {
            Some(placement) => {
                for (vm, entry) in placement.iter() {
                    data_center.place_virtual_machine(
                        vm,
                        entry.physical_machine,
                        entry.shares.clone(),
                        false,
                        true,
                    )?;
                }
            }
            None => log_warn!(self.ctx, "initial placement failed for {} VMs", vms.len()),
        }

        let started = data_center.start_applications()?;
        if started == 0 {
            log_warn!(self.ctx, "unable to start any application, stopping the simulation");
            self.stop.request_stop();
        } else {
            log_info!(self.ctx, "started {} applications", started);
        }
        Ok(())
    }

    /// Stops every running application.
    pub fn on_system_finalization(&mut self) -> Result<()> {
        let mut data_center = self.data_center.borrow_mut();
        let running = data_center.applications().filter(|app| app.is_running()).count();
        let stopped = data_center.stop_applications()?;
        if running > 0 && stopped == 0 {
            log_warn!(self.ctx, "unable to stop any application, stopping the simulation");
            self.stop.request_stop();
        }
        Ok(())
    }
}
