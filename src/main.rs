use std::time::Duration;

use anyhow::Result;
use inspectmaker::cli;
use inspectmaker::config::EngineSettings;
use tokio::runtime::Runtime;

fn main() -> Result<()> {
    let options = cli::process_cli();

    // Logs go to the temp log file (and stderr when RUST_LOG is set); stdout
    // carries the command protocol.
    inspectmaker::debug::init_log_bridge(options.log_level);
    log::info!("Starting inspectmaker {}", env!("CARGO_PKG_VERSION"));

    let settings = match &options.config_path {
        Some(path) => EngineSettings::load_from(path)?,
        None => EngineSettings::load()?,
    };
    inspectmaker::debug::apply_config_level(settings.log_level_filter());

    let runtime = Runtime::new()?;
    let code = runtime.block_on(cli::run(options.command, settings))?;
    runtime.shutdown_timeout(Duration::from_secs(2));

    if code != 0 {
        std::process::exit(code);
    }
    Ok(())
}
