use std::path::PathBuf;

use anyhow::{bail, Result};
use clap::Parser;

#[derive(Parser, Debug)]
#[command(
    about = "Keeps a snapshot of a running game and drives automation modules from it",
    version
)]
pub struct Args {
    /// JSON settings file (reading time and per-module toggles)
    #[arg(long, default_value = "settings.json")]
    pub settings: PathBuf,

    /// Replay a recorded snapshot dump instead of attaching to the game
    #[arg(long)]
    pub dump: Option<PathBuf>,

    /// Address the overlay stream listens on (e.g. 127.0.0.1:7878)
    #[arg(long, value_name = "ADDR")]
    pub stream_bind: Option<String>,

    /// Minimum pause between ticks in milliseconds (overrides the settings file)
    #[arg(long, value_name = "MS")]
    pub reading_time: Option<u64>,

    /// Stop after this many ticks instead of waiting for Ctrl-C
    #[arg(long)]
    pub max_ticks: Option<u64>,

    /// Log synthetic input instead of sending it to the OS
    #[arg(long)]
    pub dry_run_input: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct RunArgs {
    pub settings: PathBuf,
    pub dump: PathBuf,
    pub stream_bind: Option<String>,
    pub reading_time: Option<u64>,
    pub max_ticks: Option<u64>,
}

pub fn parse() -> Result<RunArgs> {
    let args = Args::parse();
    args.into_run_args()
}

impl Args {
    pub fn into_run_args(self) -> Result<RunArgs> {
        let Some(dump) = self.dump else {
            bail!("attaching to a live game is not supported by this build; pass --dump <path>");
        };
        if !self.dry_run_input {
            bail!("no OS input backend is available; pass --dry-run-input");
        }
        if self.max_ticks == Some(0) {
            bail!("--max-ticks must be at least 1");
        }
        Ok(RunArgs {
            settings: self.settings,
            dump,
            stream_bind: self.stream_bind,
            reading_time: self.reading_time,
            max_ticks: self.max_ticks,
        })
    }
}
