use crate::application_controller::{ApplicationController, TierObservation};
use crate::physical_machine_controller::ShareUpdate;

/// Leaves the wanted shares as configured.
pub struct DummyApplicationController {
    enabled: bool,
}

impl DummyApplicationController {
    pub fn new() -> Self {
        Self { enabled: true }
    }
}

impl Default for DummyApplicationController {
    fn default() -> Self {
        Self::new()
    }
}

impl ApplicationController for DummyApplicationController {
    fn enable(&mut self, flag: bool) {
        self.enabled = flag;
    }

    fn enabled(&self) -> bool {
        self.enabled
    }

    fn sampling_period(&self) -> f64 {
        0.0
    }

    fn reset(&mut self) {}

    fn control(&mut self, _time: f64, _observations: &[TierObservation]) -> Vec<ShareUpdate> {
        Vec::new()
    }
}
