use std::collections::BTreeMap;

use crate::application_controller::{ApplicationController, TierObservation};
use crate::common::VirtualMachineId;
use crate::physical_machine_controller::ShareUpdate;
use crate::resource::ResourceCategory;

/// Sizes every tier VM so that its observed CPU usage runs at the target utilization.
///
/// Per period: `wanted = busy_fraction * wanted / target_utilization`, clamped to `[min_share, 1]`.
pub struct UtilizationApplicationController {
    enabled: bool,
    sampling_period: f64,
    target_utilization: f64,
    min_share: f64,
    /// Time and cumulative busy time of the previous observation of each VM.
    last_observations: BTreeMap<VirtualMachineId, (f64, f64)>,
}

impl UtilizationApplicationController {
    pub fn new(sampling_period: f64, target_utilization: f64, min_share: f64) -> Self {
        assert!(
            target_utilization > 0.0 && target_utilization <= 1.0,
            "target utilization must be in (0, 1]"
        );
        Self {
            enabled: true,
            sampling_period,
            target_utilization,
            min_share: min_share.clamp(0.0, 1.0),
            last_observations: BTreeMap::new(),
        }
    }
}

impl ApplicationController for UtilizationApplicationController {
    fn enable(&mut self, flag: bool) {
        self.enabled = flag;
    }

    fn enabled(&self) -> bool {
        self.enabled
    }

    fn sampling_period(&self) -> f64 {
        self.sampling_period
    }

    fn reset(&mut self) {
        self.last_observations.clear();
    }

    fn control(&mut self, time: f64, observations: &[TierObservation]) -> Vec<ShareUpdate> {
        let mut updates = Vec::new();
        for observation in observations {
            let previous = self.last_observations.insert(observation.vm, (time, observation.busy_time));
            let (last_time, last_busy) = match previous {
                Some(p) => p,
                None => continue,
            };
            let elapsed = time - last_time;
            let busy = observation.busy_time - last_busy;
            // Busy time goes backwards when the station was reset in between.
            if elapsed <= 0.0 || busy < 0.0 {
                continue;
            }
            let wanted = match observation.wanted_share {
                Some(w) => w,
                None => continue,
            };
            let used_share = (busy / elapsed).clamp(0.0, 1.0) * wanted;
            let share = (used_share / self.target_utilization).clamp(self.min_share, 1.0);
            updates.push((observation.vm, ResourceCategory::Cpu, share));
        }
        updates
    }
}
