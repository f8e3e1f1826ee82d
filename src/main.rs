use std::sync::atomic::Ordering;
use std::sync::mpsc;
use std::thread;

use anyhow::{Context, Result};
use clap::Parser;
use tracing::info;

use gerrit_trigger::cli::Cli;
use gerrit_trigger::config::Config;
use gerrit_trigger::trigger::Trigger;

fn main() -> Result<()> {
    let cli = Cli::parse();

    tracing_subscriber::fmt()
        .with_env_filter(cli.log_level.directive())
        .with_target(false)
        .init();

    let config = Config::load(&cli.config_file).context("failed to load config")?;
    info!(name = %config.meta_data.name, host = %config.spec.connect.hostname, "starting");

    let trigger = Trigger::init(config).context("failed to init trigger")?;

    let shutdown = trigger.shutdown_handle();
    ctrlc::set_handler(move || {
        shutdown.store(true, Ordering::Relaxed);
    })
    .context("failed to set signal handler")?;

    let (params_tx, params_rx) = mpsc::channel();
    let worker = thread::spawn(move || trigger.run(Vec::new(), Vec::new(), params_tx));

    // Drain until the pipeline drops its sender on shutdown.
    for bundle in params_rx {
        info!(params = ?bundle, "report parameters");
    }

    worker.join().expect("pipeline thread panicked")?;

    Ok(())
}
