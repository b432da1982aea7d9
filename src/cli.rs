//! Command-line interface for inspectmaker.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use clap::{Parser, Subcommand};
use inspectmaker_config::{BridgeMethod, EngineSettings, ScriptDefinition, TriggerMode};
use inspectmaker_scripting::LifecycleManager;
use log::LevelFilter;
use serde_json::json;
use tokio::io::BufReader;
use tokio::sync::mpsc;

use crate::build_page;
use crate::debug;
use crate::host::CommandHost;
use crate::storage::JsonScriptStore;

/// inspectmaker - run user scripts in a page on timers, events and page changes
#[derive(Parser)]
#[command(name = "inspectmaker")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Config file to use instead of ~/.config/inspectmaker/config.yaml
    #[arg(long, value_name = "PATH", global = true)]
    pub config: Option<PathBuf>,

    /// Log level: off, error, warn, info, debug or trace
    #[arg(long, value_name = "LEVEL", global = true, value_parser = debug::parse_level)]
    pub log_level: Option<LevelFilter>,
}

#[derive(Subcommand, Debug, Clone)]
pub enum Commands {
    /// Load a page, arm its scripts, then serve JSON commands on stdin/stdout
    Serve {
        /// URL of the page
        #[arg(long)]
        url: String,

        /// Script list (JSON); defaults to `scripts_path` from the config
        #[arg(long, value_name = "FILE")]
        scripts: Option<PathBuf>,
    },
    /// List the scripts that would be armed on a URL
    Check {
        /// URL to test
        #[arg(long)]
        url: String,

        /// Script list (JSON); defaults to `scripts_path` from the config
        #[arg(long, value_name = "FILE")]
        scripts: Option<PathBuf>,
    },
    /// Execute one snippet in a page and print its completion value
    Run {
        /// Code to execute
        #[arg(long)]
        code: String,

        /// Bridge method: standard, eval-injection or browser-api
        #[arg(long, value_name = "METHOD", default_value = "standard")]
        method: String,

        /// URL of the page
        #[arg(long, default_value = "about:blank")]
        url: String,
    },
}

/// Runtime options passed from CLI to the application
#[derive(Debug, Clone)]
pub struct RuntimeOptions {
    pub command: Commands,
    pub config_path: Option<PathBuf>,
    pub log_level: Option<LevelFilter>,
}

/// Parse CLI arguments.
pub fn process_cli() -> RuntimeOptions {
    let cli = Cli::parse();
    RuntimeOptions {
        command: cli.command,
        config_path: cli.config,
        log_level: cli.log_level,
    }
}

/// Run a subcommand. Returns the process exit code.
pub async fn run(command: Commands, settings: EngineSettings) -> anyhow::Result<i32> {
    match command {
        Commands::Serve { url, scripts } => {
            let store = script_store(scripts, &settings)?;
            serve(&url, store, &settings).await
        }
        Commands::Check { url, scripts } => {
            let store = script_store(scripts, &settings)?;
            check(&url, store, &settings)
        }
        Commands::Run { code, method, url } => run_snippet(&url, code, &method, &settings).await,
    }
}

fn script_store(
    scripts: Option<PathBuf>,
    settings: &EngineSettings,
) -> anyhow::Result<JsonScriptStore> {
    let path = scripts
        .or_else(|| settings.scripts_path.clone())
        .context("No script list given (use --scripts or set scripts_path in the config)")?;
    Ok(JsonScriptStore::new(path))
}

async fn serve(url: &str, store: JsonScriptStore, settings: &EngineSettings) -> anyhow::Result<i32> {
    let page = build_page(url, settings);
    let (events_tx, events_rx) = mpsc::unbounded_channel();
    let manager = Arc::new(LifecycleManager::with_events(
        page.clone(),
        settings,
        Arc::new(store),
        events_tx,
    ));
    let host = CommandHost::new(manager);

    let init = host
        .handle_command(json!({ "action": "initializeScripts" }))
        .await;
    if !init.success {
        log::error!(
            "Initial script load failed: {}",
            init.error.as_deref().unwrap_or("unknown error")
        );
    }

    let stdin = BufReader::new(tokio::io::stdin());
    host.serve(stdin, tokio::io::stdout(), Some(events_rx)).await?;
    page.unload();
    log::info!("Command host finished");
    Ok(0)
}

fn check(url: &str, store: JsonScriptStore, settings: &EngineSettings) -> anyhow::Result<i32> {
    let page = build_page(url, settings);
    let manager = LifecycleManager::new(page.clone(), settings, Arc::new(store));
    let scripts = manager.matching_scripts().map_err(anyhow::Error::msg)?;

    if scripts.is_empty() {
        println!("No scripts match {url}");
    }
    for script in &scripts {
        println!("{}\t{}\t{}", script.id, script.trigger.kind(), script.name);
    }
    page.unload();
    Ok(0)
}

async fn run_snippet(
    url: &str,
    code: String,
    method: &str,
    settings: &EngineSettings,
) -> anyhow::Result<i32> {
    let page = build_page(url, settings);
    let manager = LifecycleManager::new(
        page.clone(),
        settings,
        Arc::new(Vec::<ScriptDefinition>::new()),
    );

    let mut script = ScriptDefinition::new(0, code, TriggerMode::Instantaneous);
    script
        .browser_specific_injection
        .insert(manager.browser(), BridgeMethod::from(method.to_string()));
    let result = manager.execute_script(&script).await;
    page.unload();

    if result.success {
        if let Some(output) = result.output {
            println!("{output}");
        }
        Ok(0)
    } else {
        eprintln!(
            "inspectmaker: error: {}",
            result.error.as_deref().unwrap_or("unknown error")
        );
        Ok(1)
    }
}
