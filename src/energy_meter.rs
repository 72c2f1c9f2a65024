//! Energy meter integrating machine power over simulated time.

use serde::Serialize;

#[derive(Debug, Clone, Serialize)]
pub struct EnergyMeter {
    energy_consumed: f64,
    current_power: f64,
    prev_time: f64,
}

impl EnergyMeter {
    pub fn new() -> Self {
        Self {
            energy_consumed: 0.0,
            current_power: 0.0,
            prev_time: 0.0,
        }
    }

    /// Invoked each time the power drawn by the machine changes.
    pub fn update(&mut self, time: f64, power: f64) {
        self.energy_consumed += (time - self.prev_time) * self.current_power;
        self.current_power = power;
        self.prev_time = time;
    }

    /// Drops the accumulated energy and restarts integration at `time` with the given power.
    pub fn reset(&mut self, time: f64, power: f64) {
        self.energy_consumed = 0.0;
        self.current_power = power;
        self.prev_time = time;
    }

    pub fn current_power(&self) -> f64 {
        self.current_power
    }

    pub fn energy_consumed(&self) -> f64 {
        self.energy_consumed
    }

    /// Energy consumed up to `time`, including the currently open interval.
    pub fn energy_consumed_until(&self, time: f64) -> f64 {
        self.energy_consumed + (time - self.prev_time).max(0.0) * self.current_power
    }
}

impl Default for EnergyMeter {
    fn default() -> Self {
        Self::new()
    }
}
