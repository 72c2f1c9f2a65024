use std::io::Write;

use dslab_core::Simulation;
use env_logger::Builder;
use vdc_simulator::simulation::DataCenterSimulation;
use vdc_simulator::simulation_config::SimulationConfig;
use vdc_simulator::simulation_metrics::{FileMetricsLogger, MetricsLogger, StdoutMetricsLogger};

fn main() {
    Builder::from_default_env()
        .format(|buf, record| writeln!(buf, "{}", record.args()))
        .init();

    let args: Vec<String> = std::env::args().collect();
    let config_path = args.get(1).map(String::as_str).unwrap_or("test-configs/config.yaml");
    let results_path = args.get(2).map(String::as_str);

    let sim_config = match SimulationConfig::from_file(config_path) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("{}", e);
            std::process::exit(1);
        }
    };
    let sim = Simulation::new(sim_config.seed);
    let metrics_logger: Box<dyn MetricsLogger> = match results_path {
        Some(_) => Box::new(FileMetricsLogger::new()),
        None => Box::new(StdoutMetricsLogger::new()),
    };
    let mut vdc_sim = match DataCenterSimulation::new(sim, sim_config, metrics_logger) {
        Ok(vdc_sim) => vdc_sim,
        Err(e) => {
            eprintln!("{}", e);
            std::process::exit(1);
        }
    };
    vdc_sim.run();

    let metrics = vdc_sim.metrics();
    println!(
        "Replications: {}, mean migrations: {:.2}, mean migration rate: {:.4}, mean energy: {:.1} J",
        metrics.replications.len(),
        metrics.mean_num_migrations,
        metrics.mean_migration_rate,
        metrics.mean_energy_consumed
    );
    if let Some(path) = results_path {
        vdc_sim.save_metrics(path).unwrap();
    }
}
