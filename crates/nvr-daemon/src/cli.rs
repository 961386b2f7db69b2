use std::path::PathBuf;

use anyhow::Context;
use clap::{Parser, Subcommand};
use nvr_core::timestamp::DayKey;

#[derive(Debug, Parser)]
#[command(
    name = "nvr",
    version,
    about = "Browse camera recordings day by day from a Home Assistant media source"
)]
pub struct Cli {
    /// Config file to use instead of the default location.
    #[arg(long, global = true, value_name = "PATH")]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Run the HTTP API (the default).
    Serve,
    /// Print one day's recordings and exit.
    List {
        /// Day to list as YYYY-MM-DD; today when omitted.
        #[arg(long)]
        day: Option<String>,
    },
    /// Print the effective configuration.
    Config,
}

/// `--day` as a [`DayKey`]; absent stays `None`, blank means today.
pub fn day_arg(day: Option<&str>) -> anyhow::Result<Option<DayKey>> {
    day.map(|d| DayKey::parse_or_today(d).with_context(|| format!("invalid day '{}'", d)))
        .transpose()
}
