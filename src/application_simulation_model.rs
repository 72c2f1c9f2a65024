//! Event-driven simulation model of a multi-tier application.
//!
//! The model is an open tandem queueing network: requests of every class arrive from a Poisson
//! source, visit the tier stations in order and leave to the sink. It publishes arrivals and
//! departures through event sources and checks every completed request against the SLA.

use std::rc::Rc;

use dslab_core::{cast, log_debug, Event, EventHandler, SimulationContext};
use serde::Serialize;

use crate::common::ApplicationId;
use crate::error::{Result, SimulationError};
use crate::event_source::EventSource;
use crate::events::application::{RequestArrival, ServiceCompletion};
use crate::queueing_network::{Request, RequestClass, Station};
use crate::resource::ResourceCategory;
use crate::sla::{PerformanceMeasureCategory, SlaCostModel};
use crate::statistics::{MaxEstimator, MeanEstimator, Statistic};

/// Payload of the request event sources.
#[derive(Clone, Debug, Serialize)]
pub struct RequestEvent {
    pub request: Request,
    /// Tier the event refers to, `None` for application-level events.
    pub tier: Option<usize>,
    /// End-to-end response time, set on application departures.
    pub response_time: Option<f64>,
}

#[derive(Clone, Debug, Default, Serialize)]
pub struct ApplicationSimulationSummary {
    pub num_arrivals: u64,
    pub num_departures: u64,
    pub num_sla_violations: u64,
    pub sla_cost: f64,
    pub throughput: f64,
    pub mean_response_time: f64,
    pub max_response_time: f64,
}

pub struct ApplicationSimulationModel {
    pub id: u32,
    application_id: ApplicationId,
    classes: Vec<RequestClass>,
    stations: Vec<Station>,
    tier_reference_shares: Vec<f64>,
    sla_cost_model: Rc<dyn SlaCostModel>,

    enabled: bool,
    running: bool,
    generation: u64,
    next_request_id: u64,

    num_arrivals: u64,
    num_departures: u64,
    num_sla_violations: u64,
    sla_cost: f64,
    /// Time the sources were first started since the last reset.
    observation_start: Option<f64>,
    response_time: MeanEstimator,
    max_response_time: MaxEstimator,

    request_arrival: EventSource<RequestEvent>,
    request_departure: EventSource<RequestEvent>,
    tier_arrival: EventSource<RequestEvent>,
    tier_departure: EventSource<RequestEvent>,

    ctx: SimulationContext,
}

impl ApplicationSimulationModel {
    /// `tier_reference_shares` are the CPU shares of the reference machine the service demands of
    /// `classes` were measured with.
    pub fn new(
        classes: Vec<RequestClass>,
        tier_reference_shares: Vec<f64>,
        sla_cost_model: Rc<dyn SlaCostModel>,
        ctx: SimulationContext,
    ) -> Self {
        let num_tiers = tier_reference_shares.len();
        Self {
            id: ctx.id(),
            application_id: 0,
            classes,
            stations: (0..num_tiers).map(|_| Station::new()).collect(),
            tier_reference_shares,
            sla_cost_model,
            enabled: true,
            running: false,
            generation: 0,
            next_request_id: 0,
            num_arrivals: 0,
            num_departures: 0,
            num_sla_violations: 0,
            sla_cost: 0.0,
            observation_start: None,
            response_time: MeanEstimator::new(),
            max_response_time: MaxEstimator::new(),
            request_arrival: EventSource::new("request_arrival"),
            request_departure: EventSource::new("request_departure"),
            tier_arrival: EventSource::new("tier_arrival"),
            tier_departure: EventSource::new("tier_departure"),
            ctx,
        }
    }

    pub(crate) fn set_application_id(&mut self, application_id: ApplicationId) {
        self.application_id = application_id;
    }

    pub fn num_tiers(&self) -> usize {
        self.stations.len()
    }

    pub fn request_classes(&self) -> &[RequestClass] {
        &self.classes
    }

    pub fn request_arrival(&self) -> &EventSource<RequestEvent> {
        &self.request_arrival
    }

    pub fn request_departure(&self) -> &EventSource<RequestEvent> {
        &self.request_departure
    }

    pub fn tier_arrival(&self) -> &EventSource<RequestEvent> {
        &self.tier_arrival
    }

    pub fn tier_departure(&self) -> &EventSource<RequestEvent> {
        &self.tier_departure
    }

    /// Statistics are only recorded while enabled. Events keep flowing either way.
    pub fn enable(&mut self, flag: bool) {
        self.enabled = flag;
    }

    pub fn enabled(&self) -> bool {
        self.enabled
    }

    pub fn is_running(&self) -> bool {
        self.running
    }

    /// Sets the share granted to a tier, expressed in the reference machine frame.
    ///
    /// Only CPU affects the service speed; other categories are accepted and ignored.
    pub fn resource_share(&mut self, tier: usize, category: ResourceCategory, share: f64) -> Result<()> {
        if tier >= self.stations.len() {
            return Err(SimulationError::InvalidTier {
                application: self.application_id,
                tier,
            });
        }
        if category != ResourceCategory::Cpu {
            return Ok(());
        }
        let reference_share = self.tier_reference_shares[tier];
        let multiplier = if reference_share > 0.0 {
            share / reference_share
        } else {
            0.0
        };
        self.stations[tier].set_multiplier(multiplier);
        if self.running {
            self.try_start_service(tier);
        }
        Ok(())
    }

    pub fn tier_multiplier(&self, tier: usize) -> Option<f64> {
        self.stations.get(tier).map(|s| s.multiplier())
    }

    /// Busy fraction of the tier station since the previous call, in the tier's own frame.
    pub fn actual_tier_utilization(&mut self, tier: usize) -> Result<f64> {
        let time = self.ctx.time();
        let application = self.application_id;
        self.stations
            .get_mut(tier)
            .map(|s| s.take_utilization(time))
            .ok_or(SimulationError::InvalidTier { application, tier })
    }

    /// Cumulative busy time of the tier station since the model was last reset.
    pub fn tier_busy_time(&self, tier: usize) -> Result<f64> {
        self.stations
            .get(tier)
            .map(|s| s.busy_time(self.ctx.time()))
            .ok_or(SimulationError::InvalidTier {
                application: self.application_id,
                tier,
            })
    }

    pub fn tier_queue_length(&self, tier: usize) -> Option<usize> {
        self.stations.get(tier).map(|s| s.queue_length())
    }

    /// Starts the request sources.
    pub fn start(&mut self) {
        if self.running {
            return;
        }
        self.running = true;
        self.generation += 1;
        let time = self.ctx.time();
        self.observation_start.get_or_insert(time);
        for station in self.stations.iter_mut() {
            station.reset(time);
        }
        for class in 0..self.classes.len() {
            self.schedule_arrival(class);
        }
        log_debug!(self.ctx, "application {} started", self.application_id);
    }

    /// Stops the sources and drops the requests in flight.
    pub fn stop(&mut self) {
        if !self.running {
            return;
        }
        self.running = false;
        self.generation += 1;
        let time = self.ctx.time();
        for station in self.stations.iter_mut() {
            station.reset(time);
        }
        log_debug!(self.ctx, "application {} stopped", self.application_id);
    }

    /// Clears the collected statistics and the network state.
    pub fn reset(&mut self) {
        self.running = false;
        self.generation += 1;
        let time = self.ctx.time();
        for station in self.stations.iter_mut() {
            station.reset(time);
            station.set_multiplier(1.0);
        }
        self.num_arrivals = 0;
        self.num_departures = 0;
        self.num_sla_violations = 0;
        self.sla_cost = 0.0;
        self.observation_start = None;
        self.response_time.reset();
        self.max_response_time.reset();
    }

    pub fn num_arrivals(&self) -> u64 {
        self.num_arrivals
    }

    pub fn num_departures(&self) -> u64 {
        self.num_departures
    }

    pub fn num_sla_violations(&self) -> u64 {
        self.num_sla_violations
    }

    /// Total SLA penalty charged to the completed requests.
    pub fn sla_cost(&self) -> f64 {
        self.sla_cost
    }

    /// Completed requests per unit of time since the sources were started, `None` before any time
    /// has elapsed.
    pub fn throughput(&self) -> Option<f64> {
        let start = self.observation_start?;
        let elapsed = self.ctx.time() - start;
        if elapsed > 0.0 {
            Some(self.num_departures as f64 / elapsed)
        } else {
            None
        }
    }

    pub fn summary(&self) -> ApplicationSimulationSummary {
        ApplicationSimulationSummary {
            num_arrivals: self.num_arrivals,
            num_departures: self.num_departures,
            num_sla_violations: self.num_sla_violations,
            sla_cost: self.sla_cost,
            throughput: self.throughput().unwrap_or(f64::NAN),
            mean_response_time: self.response_time.estimate(),
            max_response_time: self.max_response_time.estimate(),
        }
    }

    fn schedule_arrival(&mut self, class: usize) {
        let delay = self.classes[class].next_interarrival_time(&mut self.ctx);
        self.ctx.emit_self(
            RequestArrival {
                class,
                generation: self.generation,
            },
            delay,
        );
    }

    fn on_request_arrival(&mut self, class: usize) {
        let time = self.ctx.time();
        self.next_request_id += 1;
        let request = Request {
            id: self.next_request_id,
            class,
            arrival_time: time,
            tier_arrival_time: time,
        };
        if self.enabled {
            self.num_arrivals += 1;
        }
        self.request_arrival.fire(
            time,
            &RequestEvent {
                request: request.clone(),
                tier: None,
                response_time: None,
            },
        );
        self.schedule_arrival(class);
        if self.stations.is_empty() {
            self.depart(request);
        } else {
            self.enter_tier(0, request);
        }
    }

    fn enter_tier(&mut self, tier: usize, mut request: Request) {
        let time = self.ctx.time();
        request.tier_arrival_time = time;
        self.tier_arrival.fire(
            time,
            &RequestEvent {
                request: request.clone(),
                tier: Some(tier),
                response_time: None,
            },
        );
        self.stations[tier].enqueue(request);
        self.try_start_service(tier);
    }

    fn try_start_service(&mut self, tier: usize) {
        let time = self.ctx.time();
        let multiplier = self.stations[tier].multiplier();
        let class = match self.stations[tier].start_service(time) {
            Some(request) => request.class,
            None => return,
        };
        let request_class = &self.classes[class];
        let mean = request_class.service_demands.get(tier).copied().unwrap_or(0.0) / multiplier;
        let distribution = request_class.service_distribution;
        let service_time = distribution.sample(&mut self.ctx, mean);
        self.ctx.emit_self(
            ServiceCompletion {
                tier,
                generation: self.generation,
            },
            service_time,
        );
    }

    fn on_service_completion(&mut self, tier: usize) {
        let time = self.ctx.time();
        let request = match self.stations[tier].complete_service(time) {
            Some(request) => request,
            None => return,
        };
        self.tier_departure.fire(
            time,
            &RequestEvent {
                request: request.clone(),
                tier: Some(tier),
                response_time: None,
            },
        );
        if tier + 1 < self.stations.len() {
            self.enter_tier(tier + 1, request);
        } else {
            self.depart(request);
        }
        self.try_start_service(tier);
    }

    /// Measures of every monitored category as of the departure of a request.
    fn performance_measures(&self, response_time: f64) -> Vec<(PerformanceMeasureCategory, f64)> {
        let mut measures = Vec::new();
        for category in self.sla_cost_model.categories() {
            match category {
                PerformanceMeasureCategory::ResponseTime => measures.push((category, response_time)),
                PerformanceMeasureCategory::Throughput => {
                    // Undefined until time has elapsed.
                    if let Some(throughput) = self.throughput() {
                        measures.push((category, throughput));
                    }
                }
            }
        }
        measures
    }

    fn depart(&mut self, request: Request) {
        let time = self.ctx.time();
        let response_time = time - request.arrival_time;
        if self.enabled {
            self.num_departures += 1;
            self.response_time.collect(response_time);
            self.max_response_time.collect(response_time);
            let measures = self.performance_measures(response_time);
            if !self.sla_cost_model.satisfied(&measures) {
                self.num_sla_violations += 1;
            }
            self.sla_cost += self.sla_cost_model.score(&measures);
        }
        self.request_departure.fire(
            time,
            &RequestEvent {
                request,
                tier: None,
                response_time: Some(response_time),
            },
        );
    }
}

impl EventHandler for ApplicationSimulationModel {
    fn on(&mut self, event: Event) {
        cast!(match event.data {
            RequestArrival { class, generation } => {
                if self.running && generation == self.generation {
                    self.on_request_arrival(class);
                }
            }
            ServiceCompletion { tier, generation } => {
                if self.running && generation == self.generation {
                    self.on_service_completion(tier);
                }
            }
        })
    }
}
