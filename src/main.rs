use anyhow::{Context, Result};
use std::env;
use std::path::PathBuf;
use std::process::ExitCode;
use tracing::{error, info};
use wmotables::core::config::Config;
use wmotables::core::state::AppState;
use wmotables::core::startup::{audit_users, restore_from_wal};
use wmotables::core::tracing_init::init_tracing;
use wmotables::wal::wal::Wal;

fn main() -> Result<ExitCode> {
    let args: Vec<String> = env::args().collect();

    let config_path = if args.len() > 1 {
        PathBuf::from(&args[1])
    } else {
        PathBuf::from("config.toml")
    };

    // Load and validate configuration
    let config = Config::from_file(&config_path)
        .context(format!(
            "Failed to load configuration from '{}'. \
            Copy config.example.toml to config.toml and adjust the values.",
            config_path.display()
        ))?;

    init_tracing(&config.logging);

    info!(
        config_path = %config_path.display(),
        journal_path = %config.storage.journal_path.display(),
        log_level = %config.logging.level,
        log_format = %config.logging.format,
        "wmotables account store starting"
    );

    let wal = Wal::new(config.storage.journal_path.clone())
        .context("Failed to initialize WAL")?;

    info!(wal_path = %wal.path().display(), "WAL initialized");

    let state = AppState::new(config, wal);

    restore_from_wal(&state)?;

    let report = audit_users(&state);

    info!(
        users_checked = report.users_checked,
        invalid_users = report.invalid_users,
        duplicate_keys = report.duplicate_keys.len(),
        "Account audit completed"
    );

    let output = serde_json::to_string_pretty(&report)
        .context("Failed to serialize audit report")?;
    println!("{}", output);

    if !report.is_clean() {
        error!(
            invalid_users = report.invalid_users,
            duplicate_keys = report.duplicate_keys.len(),
            "Stored accounts violate field constraints"
        );
        return Ok(ExitCode::FAILURE);
    }

    Ok(ExitCode::SUCCESS)
}
