//! Node Maintainer - Entry Point
//!
//! Runs the application maintenance jobs until terminated.

use std::collections::HashMap;
use std::env;

use node_maintainer::app::options::AppOptions;
use node_maintainer::app::run::run;
use node_maintainer::logs::{init_logging, LogOptions};
use node_maintainer::storage::json_file::JsonFile;
use node_maintainer::storage::settings::Settings;
use node_maintainer::utils::version_info;

use tracing::{error, info};

const DEFAULT_SETTINGS_FILE: &str = "/etc/node-maintainer/settings.json";

#[tokio::main]
async fn main() {
    // Parse command line arguments
    let args: Vec<String> = env::args().collect();
    let mut cli_args: HashMap<String, String> = HashMap::new();

    for arg in args.iter().skip(1) {
        if let Some((key, value)) = arg.split_once('=') {
            // Handle --key=value format
            let clean_key = key.trim_start_matches('-');
            cli_args.insert(clean_key.to_string(), value.to_string());
        } else if arg.starts_with("--") {
            // Handle standalone flags like --version
            let clean_key = arg.trim_start_matches('-');
            cli_args.insert(clean_key.to_string(), "true".to_string());
        }
    }

    // Print version and exit
    if cli_args.contains_key("version") {
        match serde_json::to_string_pretty(&version_info()) {
            Ok(version) => println!("{version}"),
            Err(e) => eprintln!("Failed to render version: {e}"),
        }
        return;
    }

    // Retrieve the settings file
    let settings_path = cli_args
        .get("settings")
        .cloned()
        .unwrap_or_else(|| DEFAULT_SETTINGS_FILE.to_string());
    let settings_file: JsonFile<Settings> = JsonFile::new(&settings_path);
    let settings = match settings_file.read_or_default().await {
        Ok(settings) => settings,
        Err(e) => {
            eprintln!("Unable to read settings file {settings_path}: {e}");
            return;
        }
    };

    // Initialize logging
    let log_options = LogOptions {
        log_level: settings.log_level.clone(),
        json_format: settings.json_logs,
        log_dir: settings.log_dir.as_ref().map(Into::into),
        ..Default::default()
    };
    let _log_guard = match init_logging(log_options) {
        Ok(guard) => guard,
        Err(e) => {
            eprintln!("Failed to initialize logging: {e}");
            None
        }
    };

    let options = AppOptions::from(&settings);
    info!("Running node maintainer with options: {:?}", options);
    if let Err(e) = run(options, await_shutdown_signal()).await {
        error!("Node maintainer failed: {e}");
        std::process::exit(1);
    }
}

async fn await_shutdown_signal() {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};
        let (mut sigterm, mut sigint) =
            match (signal(SignalKind::terminate()), signal(SignalKind::interrupt())) {
                (Ok(sigterm), Ok(sigint)) => (sigterm, sigint),
                _ => {
                    error!("Failed to install signal handlers, waiting for Ctrl+C only");
                    let _ = tokio::signal::ctrl_c().await;
                    return;
                }
            };

        tokio::select! {
            _ = sigterm.recv() => {
                info!("SIGTERM received, shutting down...");
            }
            _ = sigint.recv() => {
                info!("SIGINT received, shutting down...");
            }
        }
    }

    #[cfg(not(unix))]
    {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!("Failed to listen for Ctrl+C: {}", e);
        }
        info!("Ctrl+C received, shutting down...");
    }
}
