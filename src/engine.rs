//! Replication driver on top of the dslab-core event loop.

use std::cell::{Cell, RefCell};
use std::rc::Rc;

use dslab_core::{cast, log_info, log_warn, Event, EventHandler, Simulation, SimulationContext};
use serde::Serialize;
use sugars::{rc, refcell};

use crate::event_source::EventSource;
use crate::events::engine::{Checkpoint, ReplicationEnd};

/// Payload of the simulation lifecycle event sources.
#[derive(Clone, Copy, Debug, PartialEq, Serialize)]
pub struct LifecycleEvent {
    pub replication: u32,
}

/// Cloneable "stop simulation now" signal. Requesting a stop aborts the current replication; its
/// finalization still runs.
#[derive(Clone, Default)]
pub struct StopHandle {
    requested: Rc<Cell<bool>>,
}

impl StopHandle {
    pub fn new() -> Self {
        Default::default()
    }

    pub fn request_stop(&self) {
        self.requested.set(true);
    }

    pub fn is_stop_requested(&self) -> bool {
        self.requested.get()
    }

    fn clear(&self) {
        self.requested.set(false);
    }
}

struct ReplicationClock {
    finished: Rc<Cell<bool>>,
    checkpoint_reached: Rc<Cell<bool>>,
}

impl EventHandler for ReplicationClock {
    fn on(&mut self, event: Event) {
        cast!(match event.data {
            ReplicationEnd { replication: _ } => {
                self.finished.set(true);
            }
            Checkpoint {} => {
                self.checkpoint_reached.set(true);
            }
        })
    }
}

/// Runs independent replications of a simulation and publishes its lifecycle events.
///
/// A replication starts by firing `system_initialization`, runs the event loop for a fixed duration
/// (or until a stop is requested), fires `system_finalization` and discards every pending event.
pub struct SimulationEngine {
    sim: Simulation,
    ctx: SimulationContext,
    clock_id: u32,
    replication_finished: Rc<Cell<bool>>,
    checkpoint_reached: Rc<Cell<bool>>,
    stop: StopHandle,
    num_replications: u32,
    replication_duration: f64,
    current_replication: u32,
    replication_start_time: f64,
    in_replication: bool,

    begin_of_simulation: EventSource<LifecycleEvent>,
    system_initialization: EventSource<LifecycleEvent>,
    system_finalization: EventSource<LifecycleEvent>,
    end_of_simulation: EventSource<LifecycleEvent>,
}

impl SimulationEngine {
    pub fn new(mut sim: Simulation, num_replications: u32, replication_duration: f64) -> Self {
        assert!(replication_duration > 0.0, "replication duration must be positive");
        let replication_finished = rc!(Cell::new(false));
        let checkpoint_reached = rc!(Cell::new(false));
        let clock = rc!(refcell!(ReplicationClock {
            finished: replication_finished.clone(),
            checkpoint_reached: checkpoint_reached.clone(),
        }));
        let clock_id = sim.add_handler("replication_clock", clock);
        let ctx = sim.create_context("engine");
        Self {
            sim,
            ctx,
            clock_id,
            replication_finished,
            checkpoint_reached,
            stop: StopHandle::new(),
            num_replications,
            replication_duration,
            current_replication: 0,
            replication_start_time: 0.0,
            in_replication: false,
            begin_of_simulation: EventSource::new("begin_of_simulation"),
            system_initialization: EventSource::new("system_initialization"),
            system_finalization: EventSource::new("system_finalization"),
            end_of_simulation: EventSource::new("end_of_simulation"),
        }
    }

    pub fn create_context<S: AsRef<str>>(&mut self, name: S) -> SimulationContext {
        self.sim.create_context(name.as_ref())
    }

    pub fn add_handler<S: AsRef<str>>(&mut self, name: S, handler: Rc<RefCell<dyn EventHandler>>) -> u32 {
        self.sim.add_handler(name.as_ref(), handler)
    }

    pub fn stop_handle(&self) -> StopHandle {
        self.stop.clone()
    }

    pub fn begin_of_simulation(&self) -> &EventSource<LifecycleEvent> {
        &self.begin_of_simulation
    }

    pub fn system_initialization(&self) -> &EventSource<LifecycleEvent> {
        &self.system_initialization
    }

    pub fn system_finalization(&self) -> &EventSource<LifecycleEvent> {
        &self.system_finalization
    }

    pub fn end_of_simulation(&self) -> &EventSource<LifecycleEvent> {
        &self.end_of_simulation
    }

    pub fn num_replications(&self) -> u32 {
        self.num_replications
    }

    pub fn replication_duration(&self) -> f64 {
        self.replication_duration
    }

    pub fn current_replication(&self) -> u32 {
        self.current_replication
    }

    pub fn replication_start_time(&self) -> f64 {
        self.replication_start_time
    }

    /// Runs all replications.
    pub fn run(&mut self) {
        self.begin();
        for replication in 0..self.num_replications {
            self.run_replication(replication);
        }
        self.end();
    }

    pub fn begin(&mut self) {
        let time = self.sim.time();
        self.begin_of_simulation.fire(time, &LifecycleEvent { replication: 0 });
    }

    pub fn end(&mut self) {
        let time = self.sim.time();
        self.end_of_simulation.fire(
            time,
            &LifecycleEvent {
                replication: self.current_replication,
            },
        );
    }

    /// Runs a single replication. Returns false if it was stopped before its scheduled end.
    pub fn run_replication(&mut self, replication: u32) -> bool {
        self.initialize_replication(replication);
        while !self.replication_finished.get() && !self.stop.is_stop_requested() {
            if !self.sim.step() {
                break;
            }
        }
        let completed = self.replication_finished.get();
        if !completed {
            log_warn!(self.ctx, "replication {} stopped before its scheduled end", replication);
        }
        self.finalize_replication();
        completed
    }

    /// Fires `system_initialization` and schedules the end of the replication.
    pub fn initialize_replication(&mut self, replication: u32) {
        self.current_replication = replication;
        self.replication_start_time = self.sim.time();
        self.replication_finished.set(false);
        self.stop.clear();
        self.in_replication = true;
        log_info!(self.ctx, "replication {} started", replication);
        self.system_initialization
            .fire(self.replication_start_time, &LifecycleEvent { replication });
        self.ctx
            .emit(ReplicationEnd { replication }, self.clock_id, self.replication_duration);
    }

    /// Fires `system_finalization` and discards the pending events of the current replication.
    pub fn finalize_replication(&mut self) {
        if !self.in_replication {
            return;
        }
        self.in_replication = false;
        let time = self.sim.time();
        self.system_finalization.fire(
            time,
            &LifecycleEvent {
                replication: self.current_replication,
            },
        );
        self.sim.cancel_events(|_| true);
        log_info!(self.ctx, "replication {} finished", self.current_replication);
    }

    /// Steps through the current replication for the given duration, stopping early at the
    /// replication end or on a stop request.
    pub fn step_for_duration(&mut self, duration: f64) {
        self.checkpoint_reached.set(false);
        let checkpoint = self.ctx.emit(Checkpoint {}, self.clock_id, duration);
        while !self.checkpoint_reached.get() && !self.replication_finished.get() && !self.stop.is_stop_requested() {
            if !self.sim.step() {
                break;
            }
        }
        if !self.checkpoint_reached.get() {
            self.ctx.cancel_event(checkpoint);
        }
    }

    pub fn time(&self) -> f64 {
        self.sim.time()
    }

    pub fn event_count(&self) -> u64 {
        self.sim.event_count()
    }
}
