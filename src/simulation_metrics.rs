use std::fs::File;
use std::io::{BufWriter, Error, Write};

use serde::Serialize;

use crate::common::ApplicationId;

#[derive(Clone, Debug, Serialize)]
pub struct ApplicationMetrics {
    pub application_id: ApplicationId,
    pub name: String,
    pub num_arrivals: u64,
    pub num_departures: u64,
    pub num_sla_violations: u64,
    pub sla_cost: f64,
    pub throughput: f64,
    pub mean_response_time: f64,
    /// Response time of the analytic tandem model with every tier at its reference share.
    pub predicted_response_time: f64,
    /// Whether the predicted response time meets the application's SLA.
    pub predicted_sla_satisfied: bool,
}

/// Outputs of one replication.
#[derive(Clone, Debug, Serialize)]
pub struct ReplicationMetrics {
    pub replication: u32,
    pub start_time: f64,
    pub end_time: f64,
    pub num_control_ticks: u64,
    pub num_solver_failures: u64,
    pub num_migrations: u64,
    pub migration_rate: f64,
    pub mean_cost: f64,
    /// Energy consumed by all physical machines, in joules.
    pub energy_consumed: f64,
    pub applications: Vec<ApplicationMetrics>,
}

#[derive(Clone, Debug, Default, Serialize)]
pub struct SimulationMetrics {
    pub replications: Vec<ReplicationMetrics>,
    /// Means over replications, NaN-valued replications skipped.
    pub mean_num_migrations: f64,
    pub mean_migration_rate: f64,
    pub mean_cost: f64,
    pub mean_energy_consumed: f64,
}

impl SimulationMetrics {
    pub fn new() -> Self {
        Default::default()
    }

    pub fn add_replication(&mut self, metrics: ReplicationMetrics) {
        self.replications.push(metrics);
        self.mean_num_migrations = self.mean_of(|r| r.num_migrations as f64);
        self.mean_migration_rate = self.mean_of(|r| r.migration_rate);
        self.mean_cost = self.mean_of(|r| r.mean_cost);
        self.mean_energy_consumed = self.mean_of(|r| r.energy_consumed);
    }

    fn mean_of<F: Fn(&ReplicationMetrics) -> f64>(&self, value: F) -> f64 {
        let values: Vec<f64> = self.replications.iter().map(value).filter(|v| !v.is_nan()).collect();
        if values.is_empty() {
            return f64::NAN;
        }
        values.iter().sum::<f64>() / values.len() as f64
    }
}

pub trait MetricsLogger {
    fn log_replication(&mut self, metrics: &ReplicationMetrics);
    fn save_log(&mut self, path: &str) -> Result<(), std::io::Error>;
}

pub struct EmptyMetricsLogger {}

impl EmptyMetricsLogger {
    pub fn new() -> Self {
        Self {}
    }
}

impl Default for EmptyMetricsLogger {
    fn default() -> Self {
        Self::new()
    }
}

impl MetricsLogger for EmptyMetricsLogger {
    fn log_replication(&mut self, _metrics: &ReplicationMetrics) {}

    fn save_log(&mut self, _path: &str) -> Result<(), Error> {
        Ok(())
    }
}

pub struct StdoutMetricsLogger {}

impl StdoutMetricsLogger {
    pub fn new() -> Self {
        Self {}
    }
}

impl Default for StdoutMetricsLogger {
    fn default() -> Self {
        Self::new()
    }
}

impl MetricsLogger for StdoutMetricsLogger {
    fn log_replication(&mut self, metrics: &ReplicationMetrics) {
        println!(
            "Replication {}: control ticks {}, solver failures {}, migrations {}, \
             migration rate {:.4}, mean cost {:.4}, energy {:.1} J",
            metrics.replication,
            metrics.num_control_ticks,
            metrics.num_solver_failures,
            metrics.num_migrations,
            metrics.migration_rate,
            metrics.mean_cost,
            metrics.energy_consumed
        );
        for app in metrics.applications.iter() {
            println!(
                "  {}: arrivals {}, departures {}, SLA violations {}, mean response time {:.4} (predicted {:.4})",
                app.name,
                app.num_arrivals,
                app.num_departures,
                app.num_sla_violations,
                app.mean_response_time,
                app.predicted_response_time
            );
        }
    }

    fn save_log(&mut self, _path: &str) -> Result<(), Error> {
        Ok(())
    }
}

pub struct FileMetricsLogger {
    metrics_history: Vec<ReplicationMetrics>,
}

impl FileMetricsLogger {
    pub fn new() -> Self {
        Self {
            metrics_history: Vec::default(),
        }
    }
}

impl Default for FileMetricsLogger {
    fn default() -> Self {
        Self::new()
    }
}

impl MetricsLogger for FileMetricsLogger {
    fn log_replication(&mut self, metrics: &ReplicationMetrics) {
        self.metrics_history.push(metrics.clone());
    }

    fn save_log(&mut self, path: &str) -> Result<(), Error> {
        let mut writer = BufWriter::new(File::create(path)?);
        serde_json::to_writer_pretty(&mut writer, &self.metrics_history)?;
        writer.flush()
    }
}

/// Flat per-replication row, application metrics summed over applications.
#[derive(Serialize)]
struct CsvRow {
    replication: u32,
    start_time: f64,
    end_time: f64,
    num_control_ticks: u64,
    num_solver_failures: u64,
    num_migrations: u64,
    migration_rate: f64,
    mean_cost: f64,
    energy_consumed: f64,
    num_arrivals: u64,
    num_departures: u64,
    num_sla_violations: u64,
    sla_cost: f64,
}

impl From<&ReplicationMetrics> for CsvRow {
    fn from(metrics: &ReplicationMetrics) -> Self {
        Self {
            replication: metrics.replication,
            start_time: metrics.start_time,
            end_time: metrics.end_time,
            num_control_ticks: metrics.num_control_ticks,
            num_solver_failures: metrics.num_solver_failures,
            num_migrations: metrics.num_migrations,
            migration_rate: metrics.migration_rate,
            mean_cost: metrics.mean_cost,
            energy_consumed: metrics.energy_consumed,
            num_arrivals: metrics.applications.iter().map(|a| a.num_arrivals).sum(),
            num_departures: metrics.applications.iter().map(|a| a.num_departures).sum(),
            num_sla_violations: metrics.applications.iter().map(|a| a.num_sla_violations).sum(),
            sla_cost: metrics.applications.iter().map(|a| a.sla_cost).sum(),
        }
    }
}

pub struct CsvMetricsLogger {
    rows: Vec<CsvRow>,
}

impl CsvMetricsLogger {
    pub fn new() -> Self {
        Self { rows: Vec::default() }
    }
}

impl Default for CsvMetricsLogger {
    fn default() -> Self {
        Self::new()
    }
}

impl MetricsLogger for CsvMetricsLogger {
    fn log_replication(&mut self, metrics: &ReplicationMetrics) {
        self.rows.push(CsvRow::from(metrics));
    }

    fn save_log(&mut self, path: &str) -> Result<(), Error> {
        let mut writer = csv::Writer::from_path(path)?;
        for row in self.rows.iter() {
            writer.serialize(row)?;
        }
        writer.flush()
    }
}
