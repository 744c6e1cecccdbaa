#![cfg_attr(test, allow(clippy::disallowed_methods))]
// Forbid unwrap() in production code to prevent panics from corrupt data.
#![cfg_attr(not(test), deny(clippy::unwrap_used))]

use tablestore::config::ToolConfig;
use tablestore::simulation::{Simulator, SimulatorConfig};
use tablestore::{Migrator, consistency, snapshot};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

fn main() {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "tablestore=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Load configuration from environment variables
    let config = match ToolConfig::from_env() {
        Ok(config) => config,
        Err(e) => {
            tracing::error!("Failed to load configuration: {e}");
            std::process::exit(1);
        }
    };

    tracing::info!(
        "Loaded configuration: max_record_size={}, allow_overwrite={}, require_primary={}, strict_eject={}",
        config.store.max_record_size,
        config.store.allow_overwrite,
        config.store.require_primary,
        config.store.strict_eject
    );

    let clean = match &config.snapshot_path {
        Some(path) => verify_snapshot(&config, path),
        None => run_simulation(&config),
    };

    if !clean {
        std::process::exit(1);
    }
}

/// Import a snapshot into a fresh store and run the consistency check.
fn verify_snapshot(config: &ToolConfig, path: &std::path::Path) -> bool {
    let mut migrator = Migrator::new(config.store.clone());

    let stats = match snapshot::import_from_path(path, &mut migrator) {
        Ok(stats) => stats,
        Err(e) => {
            tracing::error!("Failed to import snapshot {}: {e}", path.display());
            return false;
        }
    };
    tracing::info!(
        "Imported {} rows and {} secondary entries from {}",
        stats.rows,
        stats.entries,
        path.display()
    );

    match consistency::check(&migrator) {
        Ok(report) => {
            for issue in &report.issues {
                tracing::error!("{issue}");
            }
            tracing::info!(
                "Checked {} rows and {} secondary entries, {} issues",
                report.rows_checked,
                report.entries_checked,
                report.issues.len()
            );
            report.is_clean()
        }
        Err(e) => {
            tracing::error!("Consistency check failed: {e}");
            false
        }
    }
}

fn run_simulation(config: &ToolConfig) -> bool {
    let sim_config = SimulatorConfig::new(config.sim_seed).with_store_config(config.store.clone());
    let mut simulator = Simulator::new(sim_config);
    let result = simulator.run(config.sim_operations);

    for violation in &result.invariant_violations {
        tracing::error!(
            "operation {}: {} ({})",
            violation.operation_index,
            violation.description,
            violation.context
        );
    }
    if let Some(error) = &result.error {
        tracing::error!("Simulation stopped early: {error}");
    }

    result.passed()
}
