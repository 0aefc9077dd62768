mod commands;
mod config;

use clap::{Parser, Subcommand};
use colored::Colorize;
use commands::{check, dump, render, slice, CheckArgs, DumpArgs, RenderArgs, SliceArgs};
use tracing_subscriber::EnvFilter;

/// Stencil CLI - check, inspect and draw stencil patterns
#[derive(Parser, Debug)]
#[command(name = "stencil")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Log binder and renderer progress (RUST_LOG takes precedence)
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Parse and bind .stencil files and report diagnostics
    Check(CheckArgs),

    /// Print the bound patterns of a file as JSON
    Dump(DumpArgs),

    /// Compute an n-slice scaling and optionally map a point
    Slice(SliceArgs),

    /// Draw a pattern onto a recording surface and print the commands
    Render(RenderArgs),
}

fn init_logging(verbose: bool) {
    let default = if verbose { "debug" } else { "warn" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn main() {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let result = std::env::current_dir()
        .map_err(anyhow::Error::from)
        .and_then(|cwd| match cli.command {
            Command::Check(args) => check(args, &cwd),
            Command::Dump(args) => dump(args, &cwd),
            Command::Slice(args) => slice(args),
            Command::Render(args) => render(args, &cwd),
        });

    if let Err(err) = result {
        eprintln!();
        eprintln!("{} {}", "Error:".red().bold(), err);
        eprintln!();
        std::process::exit(1);
    }
}
