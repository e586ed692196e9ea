//! Run a templated scenario for every test-data record in parallel.
//!
//! ```text
//! load_test -c config.conf -t scenario.json
//! ```

#[macro_use]
extern crate log;

use gumdrop::Options;

use gander::prelude::*;

// Print why the run can't start and exit with -1.
fn exit_with(error: GanderError) -> ! {
    eprintln!("{}", error);
    std::process::exit(-1);
}

#[tokio::main]
async fn main() {
    let configuration = GanderConfiguration::parse_args_default_or_exit();

    // If version flag is set, display package name and version and exit.
    if configuration.version {
        println!("load_test ({} {})", env!("CARGO_PKG_NAME"), env!("CARGO_PKG_VERSION"));
        std::process::exit(0);
    }

    if let Err(e) = configuration.validate() {
        exit_with(e);
    }
    let config = OAuthConfig::from_file(&configuration.config_file).unwrap_or_else(|e| exit_with(e));
    let plan = LoadTestPlan::from_file(&configuration.test_case).unwrap_or_else(|e| exit_with(e));

    let log_file = if configuration.no_log_file {
        None
    } else {
        Some(configuration.load_test_log_path(&config.username))
    };
    if let Err(e) = configuration.initialize_logger(log_file) {
        exit_with(e);
    }

    info!("Load testing:{}", configuration.test_case);
    let cache = SessionCache::new(&configuration.session_cache_dir);
    let summary = run_load_test(&config, &cache, &plan).await;

    for outcome in &summary.outcomes {
        match outcome {
            WorkerOutcome::Completed(report) => info!(
                "{}: {} requests, {} errors",
                report.label,
                report.requests,
                report.errors.len()
            ),
            WorkerOutcome::Failed { label, error } => error!("{}: {}", label, error),
        }
    }

    if !summary.is_success() {
        error!(
            "{} of {} workers failed",
            summary.failed_workers(),
            summary.outcomes.len()
        );
        std::process::exit(1);
    }
}
