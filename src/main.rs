use std::io::{self, IsTerminal};

use anyhow::Context;
use clap::Parser;
use owo_colors::OwoColorize;
use tracing_subscriber::EnvFilter;

use crate::{
    cli::{Cli, Command},
    config::Config,
    pipeline::Summary,
};

mod authors;
mod cli;
mod config;
mod error;
mod extract;
mod merge;
mod normalize;
mod people;
mod pipeline;
mod record;
mod render;
mod store;

fn main() {
    let args = Cli::parse();
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(args.log_filter())),
        )
        .with_writer(io::stderr)
        .with_ansi(use_color() && io::stderr().is_terminal())
        .with_target(false)
        .init();

    // Errors end the run before any write; the exit status stays zero.
    if let Err(err) = run(args) {
        if use_color() {
            eprintln!("{} {err:#}", "error:".red().bold());
        } else {
            eprintln!("error: {err:#}");
        }
    }
}

fn run(args: Cli) -> anyhow::Result<()> {
    let config = Config::load(&args.root, args.config.as_deref())
        .context("could not load configuration")?;
    let today = chrono::Local::now().date_naive();

    let summary = match args.command {
        Command::Ads { token } => {
            let api = pipeline::ads_client(&config, token)?;
            pipeline::run_ads(&config, &api).context("ADS update failed")?
        }
        Command::Cv => pipeline::run_cv(&config).context("CV update failed")?,
        Command::Yaml { input, output } => pipeline::run_yaml(&config, &input, &output, today)
            .with_context(|| format!("could not convert {}", input.display()))?,
        Command::Group => pipeline::run_group(&config, today).context("group page update failed")?,
    };
    print_summary(&summary, use_color());
    Ok(())
}

fn use_color() -> bool {
    std::env::var_os("NO_COLOR").is_none()
}

fn print_summary(summary: &Summary, use_color: bool) {
    match summary {
        Summary::Store(update) => {
            println!(
                "Updated {} with {} publications:",
                update.path.display(),
                update.counts.total()
            );
            let lines = [
                ("✓", update.counts.added, "added"),
                ("↻", update.counts.updated, "updated"),
                ("=", update.counts.kept, "kept"),
            ];
            for (mark, n, what) in lines {
                let mark = match (use_color, what) {
                    (false, _) => mark.to_string(),
                    (true, "added") => mark.green().bold().to_string(),
                    (true, "updated") => mark.cyan().bold().to_string(),
                    (true, _) => mark.dimmed().to_string(),
                };
                println!("  {mark} {n} {what}");
            }
            if update.dropped > 0 {
                if use_color {
                    println!("  {} {} skipped (unparseable)", "✗".red().bold(), update.dropped);
                } else {
                    println!("  ✗ {} skipped (unparseable)", update.dropped);
                }
            }
        }
        Summary::Listing { path, entries } => {
            println!("Converted {entries} entries to {}", path.display());
        }
        Summary::Group(update) => {
            println!(
                "Group page written to {} ({} current, {} alumni)",
                update.path.display(),
                update.current,
                update.alumni
            );
            if update.manual_region_kept {
                println!("  kept the hand-written introduction");
            }
        }
        Summary::Nothing(reason) => {
            if use_color {
                println!("{} {reason}; nothing written", "!".yellow().bold());
            } else {
                println!("! {reason}; nothing written");
            }
        }
    }
}
