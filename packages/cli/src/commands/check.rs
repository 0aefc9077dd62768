use super::load;
use crate::config::Config;
use anyhow::{anyhow, Result};
use clap::Args;
use colored::Colorize;
use glob::Pattern;
use std::path::{Path, PathBuf};
use stencil_binder::BindOptions;
use stencil_common::{FileSystem, RealFileSystem};
use stencil_parser::{format_diagnostics, Severity};
use tracing::debug;
use walkdir::WalkDir;

#[derive(Args, Debug)]
pub struct CheckArgs {
    /// Files or directories to check (defaults to the configured source directory)
    pub paths: Vec<PathBuf>,

    /// Do not warn about markup the binder never reads
    #[arg(long)]
    pub no_unused: bool,

    /// Only print files that have diagnostics
    #[arg(short, long)]
    pub quiet: bool,
}

/// Outcome of checking one file.
#[derive(Debug)]
pub struct FileReport {
    pub patterns: usize,
    pub errors: usize,
    pub warnings: usize,
    /// Diagnostics rendered with source context; empty when there are none.
    pub rendered: String,
}

pub fn check(args: CheckArgs, cwd: &Path) -> Result<()> {
    let config = Config::load(cwd)?;
    let mut options = config.bind_options();
    if args.no_unused {
        options.report_unused = false;
    }

    let roots = if args.paths.is_empty() {
        vec![config.get_src_dir(cwd)]
    } else {
        args.paths.clone()
    };
    let files = find_stencil_files(&roots, &config.include)?;
    if files.is_empty() {
        println!("{}", "⚠️  No .stencil files found".yellow());
        return Ok(());
    }

    println!("🔍 {} {} files", "Checking".green().bold(), files.len());
    println!();

    let mut total_errors = 0;
    let mut total_warnings = 0;
    let mut total_patterns = 0;
    for file in &files {
        let report = check_file(&RealFileSystem, file, &options)?;
        total_errors += report.errors;
        total_warnings += report.warnings;
        total_patterns += report.patterns;

        if report.errors > 0 {
            println!("{} {}", "✗".red(), file.display());
        } else if report.warnings > 0 {
            println!("{} {}", "!".yellow(), file.display());
        } else if !args.quiet {
            println!("{} {}", "✓".green(), file.display());
        }
        if !report.rendered.is_empty() {
            eprintln!("{}", report.rendered);
        }
    }

    println!();
    println!(
        "✨ {} Checked {} files, {} patterns",
        if total_errors > 0 {
            "Done".red().bold()
        } else {
            "Done".green().bold()
        },
        files.len(),
        total_patterns
    );
    if total_errors > 0 {
        println!("   {} {}", "Errors:".red(), total_errors);
    }
    if total_warnings > 0 {
        println!("   {} {}", "Warnings:".yellow(), total_warnings);
    }
    if total_errors == 0 && total_warnings == 0 {
        println!("   {} No issues found!", "✓".green());
    }

    if total_errors > 0 {
        std::process::exit(1);
    }
    Ok(())
}

pub fn check_file(fs: &dyn FileSystem, path: &Path, options: &BindOptions) -> Result<FileReport> {
    let (source, bound) = load(fs, path, options)?;
    let errors = bound
        .diagnostics
        .iter()
        .filter(|d| d.severity == Severity::Error)
        .count();
    let warnings = bound.diagnostics.len() - errors;
    debug!(file = %path.display(), errors, warnings, "checked");

    let rendered = if bound.diagnostics.is_empty() {
        String::new()
    } else {
        format_diagnostics(&source, &path.to_string_lossy(), &bound.diagnostics)
    };
    Ok(FileReport {
        patterns: bound.patterns.iter().filter(|p| !p.is_error).count(),
        errors,
        warnings,
        rendered,
    })
}

/// Files under `roots` matching one of `include`; explicit files are kept
/// as given.
pub fn find_stencil_files(roots: &[PathBuf], include: &[String]) -> Result<Vec<PathBuf>> {
    let patterns = include
        .iter()
        .map(|p| Pattern::new(p).map_err(|e| anyhow!("Invalid include pattern '{}': {}", p, e)))
        .collect::<Result<Vec<_>>>()?;

    let mut files = Vec::new();
    for root in roots {
        if root.is_file() {
            files.push(root.clone());
            continue;
        }
        if !root.is_dir() {
            return Err(anyhow!("Input path does not exist: {}", root.display()));
        }
        for entry in WalkDir::new(root)
            .follow_links(true)
            .sort_by_file_name()
            .into_iter()
            .filter_map(|e| e.ok())
        {
            let path = entry.path();
            if !path.is_file() {
                continue;
            }
            let relative = path.strip_prefix(root).unwrap_or(path);
            if patterns.iter().any(|p| p.matches_path(relative)) {
                files.push(path.to_path_buf());
            }
        }
    }
    Ok(files)
}
