pub mod application;
pub mod application_controller;
pub mod application_simulation_model;
pub mod common;
pub mod data_center;
pub mod data_center_manager;
pub mod energy_meter;
pub mod energy_model;
pub mod engine;
pub mod error;
pub mod event_source;
pub mod events;
pub mod initial_placement_strategy;
pub mod migration_controller;
pub mod performance_model;
pub mod physical_machine;
pub mod physical_machine_controller;
pub mod placement_problem;
pub mod placement_solver;
pub mod queueing_network;
pub mod resource;
pub mod scaling;
pub mod simulation;
pub mod simulation_config;
pub mod simulation_metrics;
pub mod sla;
pub mod statistics;
pub mod virtual_machine;
pub mod virtual_machines_placement;

pub mod default_application_controllers {
    pub mod dummy_controller;
    pub mod utilization_controller;
}

pub mod default_initial_placement_strategies {
    pub mod first_fit;
    pub mod optimal;
}

pub mod default_placement_solvers {
    pub mod branch_and_bound_solver;
}
