//! Application controllers adjust the wanted shares of the VMs of one application.

use std::cell::RefCell;
use std::rc::Rc;

use dslab_core::{cast, Event, EventHandler, SimulationContext};

use crate::common::{ApplicationId, VirtualMachineId};
use crate::data_center::DataCenter;
use crate::events::controller::ApplicationControlTick;
use crate::physical_machine_controller::ShareUpdate;

/// What a controller sees of one tier at a control instant.
#[derive(Clone, Debug)]
pub struct TierObservation {
    pub vm: VirtualMachineId,
    pub tier: usize,
    /// Cumulative busy time of the tier station.
    pub busy_time: f64,
    /// Wanted CPU share of the VM on its host.
    pub wanted_share: Option<f64>,
}

pub trait ApplicationController {
    fn enable(&mut self, flag: bool);

    fn enabled(&self) -> bool;

    fn sampling_period(&self) -> f64;

    /// Forgets the state accumulated during the previous replication.
    fn reset(&mut self);

    /// Returns new wanted shares for the VMs of the application.
    fn control(&mut self, time: f64, observations: &[TierObservation]) -> Vec<ShareUpdate>;
}

/// Periodically triggers the controller of one application.
pub struct ApplicationControlLoop {
    pub id: u32,
    application: ApplicationId,
    sampling_period: f64,
    data_center: Rc<RefCell<DataCenter>>,

    ctx: SimulationContext,
}

impl ApplicationControlLoop {
    pub fn new(
        application: ApplicationId,
        sampling_period: f64,
        data_center: Rc<RefCell<DataCenter>>,
        ctx: SimulationContext,
    ) -> Self {
        Self {
            id: ctx.id(),
            application,
            sampling_period,
            data_center,
            ctx,
        }
    }

    pub fn on_system_initialization(&mut self) {
        if self.sampling_period > 0.0 {
            self.ctx.emit_self(ApplicationControlTick {}, self.sampling_period);
        }
    }
}

impl EventHandler for ApplicationControlLoop {
    fn on(&mut self, event: Event) {
        cast!(match event.data {
            ApplicationControlTick {} => {
                if let Err(e) = self.data_center.borrow_mut().control_application(self.application) {
                    panic!("application {} control failed: {}", self.application, e);
                }
                self.ctx.emit_self(ApplicationControlTick {}, self.sampling_period);
            }
        })
    }
}
