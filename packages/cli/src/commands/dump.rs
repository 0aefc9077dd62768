use super::load;
use crate::config::Config;
use anyhow::Result;
use clap::Args;
use colored::Colorize;
use serde::Serialize;
use std::path::{Path, PathBuf};
use stencil_common::RealFileSystem;
use stencil_parser::format_diagnostics;

#[derive(Args, Debug)]
pub struct DumpArgs {
    /// The .stencil file to bind
    pub file: PathBuf,

    /// Only dump this pattern (qualified or plain name)
    #[arg(short, long)]
    pub pattern: Option<String>,

    /// Print compact JSON
    #[arg(long)]
    pub compact: bool,
}

pub fn dump(args: DumpArgs, cwd: &Path) -> Result<()> {
    let config = Config::load(cwd)?;
    let (source, bound) = load(&RealFileSystem, &args.file, &config.bind_options())?;

    if !bound.diagnostics.is_empty() {
        eprintln!(
            "{}",
            format_diagnostics(&source, &args.file.to_string_lossy(), &bound.diagnostics)
        );
    }

    let json = match &args.pattern {
        Some(name) => to_json(bound.pattern(name)?, args.compact)?,
        None => to_json(&bound, args.compact)?,
    };
    println!("{}", json);

    if bound.has_errors() {
        eprintln!("{} {} has errors", "!".yellow(), args.file.display());
    }
    Ok(())
}

pub(crate) fn to_json<T: Serialize>(value: &T, compact: bool) -> Result<String> {
    let json = if compact {
        serde_json::to_string(value)?
    } else {
        serde_json::to_string_pretty(value)?
    };
    Ok(json)
}
