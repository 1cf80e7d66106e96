pub mod app;

use std::process::ExitCode;
use std::time::{Duration, Instant};

use chrono::Utc;
use clap::Parser;
use tracing::{error, info, warn};
use uuid::Uuid;

use app::cli::Cli;
use app::config::{load_config, WalkthroughConfig};
use app::error::{AppError, ErrorCode};
use app::interrupt::install_interrupt_handler;
use app::logging::init_logging;
use app::models::{WalkthroughRequest, WalkthroughResult};
use app::session::DeviceSession;
use app::walkthrough::run_walkthrough;

pub fn run() -> ExitCode {
    let cli = Cli::parse();
    let trace_id = Uuid::new_v4().to_string();
    let config = match load_config(cli.config.as_deref(), &trace_id) {
        Ok(config) => config,
        Err(err) => {
            eprintln!("{}: {err}", err.code.as_str());
            return ExitCode::FAILURE;
        }
    };
    init_logging(&config.logging);
    if let Err(err) = install_interrupt_handler() {
        warn!(trace_id = %trace_id, error = %err, "Interrupts will not stop the run cleanly");
    }

    let started_at = Utc::now();
    let started = Instant::now();
    info!(trace_id = %trace_id, apps = ?cli.apps, verify = cli.verify_installation, "Starting walkthrough");
    let outcome = walkthrough(&cli, &config, &trace_id);
    let result = WalkthroughResult::from_outcome(&outcome, started_at, started.elapsed());

    match &outcome {
        Err(err) if err.code == ErrorCode::WatchdogTimeout => {
            warn!(trace_id = %trace_id, error = %err, "Timed out");
        }
        Err(err) => error!(trace_id = %trace_id, code = %err.code.as_str(), error = %err, "Walkthrough aborted"),
        Ok(_) => {}
    }
    info!(
        trace_id = %trace_id,
        success = result.success,
        timed_out = result.timed_out,
        duration_ms = result.duration_ms as u64,
        "Took {:.1}s to complete the walkthrough {}",
        started.elapsed().as_secs_f64(),
        if result.success { "successfully" } else { "unsuccessfully" }
    );
    ExitCode::from(result.exit_code())
}

/// The device session lives only inside this call, so it is torn down before the result is
/// reported.
fn walkthrough(cli: &Cli, config: &WalkthroughConfig, trace_id: &str) -> Result<bool, AppError> {
    let request = WalkthroughRequest::new(
        cli.username.as_str(),
        cli.password.as_str(),
        cli.apps.clone(),
        cli.verify_installation,
        trace_id,
    )?;
    let budget = cli
        .budget_secs
        .map(Duration::from_secs)
        .unwrap_or_else(|| config.budget.overall_budget(request.apps.len()));
    info!(trace_id = %trace_id, budget_secs = budget.as_secs(), "Walkthrough budget");

    let mut session = DeviceSession::open(config, cli.serial.as_deref(), trace_id)?;
    run_walkthrough(session.device(), &request, config, budget)
}
