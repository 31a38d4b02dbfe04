mod app;
mod cli;
mod config;
mod cue;
mod executor;
mod ffmpeg;
mod jobs;
mod util;
mod walk;

use anyhow::Result;
use clap::Parser;

fn main() -> Result<()> {
    env_logger::builder()
        .filter_level(log::LevelFilter::Warn)
        .parse_default_env()
        .init();
    let args = cli::Args::parse();
    app::run(args)
}
