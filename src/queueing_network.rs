//! Building blocks of the open tandem queueing network simulating an application.

use std::collections::VecDeque;

use rand_distr::Exp1;
use serde::{Deserialize, Serialize};

use dslab_core::SimulationContext;

use crate::error::{Result, SimulationError};

/// A request (customer) travelling through the tiers of an application.
#[derive(Clone, Debug, Serialize)]
pub struct Request {
    pub id: u64,
    pub class: usize,
    pub arrival_time: f64,
    /// Time the request entered its current tier.
    pub tier_arrival_time: f64,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ServiceDistribution {
    Exponential,
    Deterministic,
}

impl ServiceDistribution {
    pub fn sample(&self, ctx: &mut SimulationContext, mean: f64) -> f64 {
        match self {
            ServiceDistribution::Exponential => {
                let x: f64 = ctx.sample_from_distribution(&Exp1);
                mean * x
            }
            ServiceDistribution::Deterministic => mean,
        }
    }
}

/// Open class of requests: Poisson arrivals and per-tier mean service demands measured on the
/// reference machine.
#[derive(Clone, Debug, Serialize)]
pub struct RequestClass {
    pub name: String,
    pub arrival_rate: f64,
    pub service_demands: Vec<f64>,
    pub service_distribution: ServiceDistribution,
}

impl RequestClass {
    pub fn new(
        name: String,
        arrival_rate: f64,
        service_demands: Vec<f64>,
        service_distribution: ServiceDistribution,
    ) -> Result<Self> {
        if arrival_rate <= 0.0 {
            return Err(SimulationError::InvalidConfiguration(format!(
                "request class {} has non-positive arrival rate {}",
                name, arrival_rate
            )));
        }
        if service_demands.iter().any(|d| *d < 0.0) {
            return Err(SimulationError::InvalidConfiguration(format!(
                "request class {} has a negative service demand",
                name
            )));
        }
        Ok(Self {
            name,
            arrival_rate,
            service_demands,
            service_distribution,
        })
    }

    pub fn next_interarrival_time(&self, ctx: &mut SimulationContext) -> f64 {
        let x: f64 = ctx.sample_from_distribution(&Exp1);
        x / self.arrival_rate
    }
}

/// Single-server FCFS station. Service speed is scaled by a capacity multiplier; a zero multiplier
/// stalls the station.
#[derive(Clone, Debug, Serialize)]
pub struct Station {
    queue: VecDeque<Request>,
    in_service: Option<Request>,
    multiplier: f64,
    busy_since: Option<f64>,
    busy_time: f64,
    window_start: f64,
    window_busy_time: f64,
    num_arrivals: u64,
    num_departures: u64,
}

impl Station {
    pub fn new() -> Self {
        Self {
            queue: VecDeque::new(),
            in_service: None,
            multiplier: 1.0,
            busy_since: None,
            busy_time: 0.0,
            window_start: 0.0,
            window_busy_time: 0.0,
            num_arrivals: 0,
            num_departures: 0,
        }
    }

    pub fn multiplier(&self) -> f64 {
        self.multiplier
    }

    pub fn set_multiplier(&mut self, multiplier: f64) {
        self.multiplier = multiplier.max(0.0);
    }

    pub fn enqueue(&mut self, request: Request) {
        self.num_arrivals += 1;
        self.queue.push_back(request);
    }

    pub fn is_busy(&self) -> bool {
        self.in_service.is_some()
    }

    pub fn can_start_service(&self) -> bool {
        self.in_service.is_none() && self.multiplier > 0.0 && !self.queue.is_empty()
    }

    /// Takes the head of the queue into service.
    pub fn start_service(&mut self, time: f64) -> Option<&Request> {
        if !self.can_start_service() {
            return None;
        }
        self.in_service = self.queue.pop_front();
        self.busy_since = Some(time);
        self.in_service.as_ref()
    }

    pub fn complete_service(&mut self, time: f64) -> Option<Request> {
        let request = self.in_service.take()?;
        if let Some(since) = self.busy_since.take() {
            self.busy_time += time - since;
        }
        self.num_departures += 1;
        Some(request)
    }

    /// Cumulative busy time up to `time`.
    pub fn busy_time(&self, time: f64) -> f64 {
        self.busy_time + self.busy_since.map_or(0.0, |since| time - since)
    }

    /// Busy fraction since the previous reading; restarts the measurement window.
    pub fn take_utilization(&mut self, time: f64) -> f64 {
        let busy = self.busy_time(time);
        let elapsed = time - self.window_start;
        let utilization = if elapsed > 0.0 {
            ((busy - self.window_busy_time) / elapsed).clamp(0.0, 1.0)
        } else if self.is_busy() {
            1.0
        } else {
            0.0
        };
        self.window_start = time;
        self.window_busy_time = busy;
        utilization
    }

    pub fn queue_length(&self) -> usize {
        self.queue.len() + self.in_service.iter().count()
    }

    pub fn num_arrivals(&self) -> u64 {
        self.num_arrivals
    }

    pub fn num_departures(&self) -> u64 {
        self.num_departures
    }

    /// Drops every request and restarts the busy-time accounting at `time`. The multiplier is kept.
    pub fn reset(&mut self, time: f64) {
        self.queue.clear();
        self.in_service = None;
        self.busy_since = None;
        self.busy_time = 0.0;
        self.window_start = time;
        self.window_busy_time = 0.0;
        self.num_arrivals = 0;
        self.num_departures = 0;
    }
}

impl Default for Station {
    fn default() -> Self {
        Self::new()
    }
}
