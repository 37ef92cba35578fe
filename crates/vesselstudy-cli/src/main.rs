use anyhow::{Context, Result};
use clap::Parser;
use colored::Colorize;
use tracing::debug;
use tracing_subscriber::{filter::EnvFilter, layer::SubscriberExt, Registry};
use vesselstudy_cli::{execute, print_output, Cli};
use vesselstudy_core::ConfigManager;

fn init_tracing(level: &str) {
    let filter = EnvFilter::try_new(level).unwrap_or_else(|_| EnvFilter::new("info"));
    let subscriber = Registry::default()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr));
    tracing::subscriber::set_global_default(subscriber).ok();
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let config_mgr =
        ConfigManager::load(cli.config.as_deref()).context("Failed to load configuration")?;
    let level = if cli.verbose {
        "debug".to_string()
    } else {
        config_mgr.config().logging.level.clone()
    };
    init_tracing(&level);
    if let Some(path) = config_mgr.config_path() {
        debug!("configuration from {}", path.display());
    }

    match execute(&cli.command, config_mgr.into_config()) {
        Ok(output) => print_output(cli.output, &output),
        Err(e) => {
            eprintln!("{} {:#}", "Error:".red().bold(), e);
            std::process::exit(1);
        }
    }
}
