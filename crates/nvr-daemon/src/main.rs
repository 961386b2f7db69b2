mod cli;
mod http;
mod source;

use anyhow::Context;
use clap::Parser;
use nvr_core::state::{CardSettings, StateManager, View};
use nvr_proto::config::Config;
use tracing::info;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

use crate::cli::{Cli, Command};
use crate::source::AnySource;

fn init_logging() -> anyhow::Result<()> {
    let data_dir = nvr_proto::platform::data_dir();
    std::fs::create_dir_all(&data_dir)?;
    let log_path = nvr_proto::platform::log_path();

    let log_file = std::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(&log_path)?;

    let fmt_layer = tracing_subscriber::fmt::layer()
        .with_writer(log_file)
        .with_ansi(false);

    tracing_subscriber::registry()
        .with(fmt_layer)
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info,nvr_core=debug")),
        )
        .init();

    eprintln!("Logging to {}", log_path.display());
    info!("Log file: {:?}", log_path);
    Ok(())
}

fn load_config(cli: &Cli) -> anyhow::Result<Config> {
    let config = match &cli.config {
        Some(path) => Config::load_from(path)
            .with_context(|| format!("reading config {}", path.display()))?,
        None => Config::load()?,
    };
    info!(
        "Config loaded from: {:?}",
        cli.config.clone().unwrap_or_else(Config::config_path)
    );
    Ok(config)
}

fn build_manager(config: &Config) -> anyhow::Result<StateManager<AnySource>> {
    let source = AnySource::from_config(config)?;
    let settings = CardSettings::from_config(&config.card, &config.source);
    Ok(StateManager::new(source, settings))
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let mut cli = Cli::parse();
    init_logging()?;
    let config = load_config(&cli)?;

    match cli.command.take().unwrap_or(Command::Serve) {
        Command::Serve => serve(&config).await,
        Command::List { day } => list(&config, day.as_deref()).await,
        Command::Config => {
            let path = cli.config.unwrap_or_else(Config::config_path);
            println!("# {}", path.display());
            print!("{}", toml::to_string_pretty(&config)?);
            Ok(())
        }
    }
}

async fn serve(config: &Config) -> anyhow::Result<()> {
    if !config.http.enabled {
        anyhow::bail!("http.enabled is false in the config; nothing to serve");
    }

    let manager = build_manager(config)?;
    let day = manager.set_day(None).await;
    tokio::spawn({
        let manager = manager.clone();
        async move { manager.ensure(day).await }
    });

    let server = http::start_server(
        config.http.bind_address.clone(),
        config.http.port,
        manager,
    );

    info!("Daemon initialised, serving until interrupted");
    tokio::select! {
        _ = server => {}
        _ = tokio::signal::ctrl_c() => info!("Interrupted, shutting down"),
    }
    Ok(())
}

async fn list(config: &Config, day: Option<&str>) -> anyhow::Result<()> {
    let day = cli::day_arg(day)?;

    let manager = build_manager(config)?;
    manager.select_day(day).await;

    let view = manager.view().await;
    if let Some(error) = &view.last_error {
        anyhow::bail!("failed to load {}: {}", view.day, error);
    }
    print_view(&view);
    Ok(())
}

fn print_view(view: &View) {
    if let Some(header) = &view.header {
        println!("{}", header);
    }
    println!("{}", view.day);
    if view.recordings.is_empty() {
        println!("No recordings found");
        return;
    }
    for recording in &view.recordings {
        println!("  {}  {}", recording.label, recording.url);
    }
}
