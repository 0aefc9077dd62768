use super::dump::to_json;
use super::{load, parse_size};
use crate::config::Config;
use anyhow::Result;
use clap::Args;
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::rc::Rc;
use stencil_binder::{
    BoundDocument, CommandRecorder, DrawCommand, Instance, MonospaceMetrics, Renderer,
};
use stencil_common::RealFileSystem;
use stencil_geometry::{Rect, Size};
use stencil_parser::{format_diagnostics, Diagnostics};

/// Used when neither `--size` nor the pattern's `example-size` is given.
const FALLBACK_SIZE: Size = Size::new(100.0, 100.0);

#[derive(Args, Debug)]
pub struct RenderArgs {
    /// The .stencil file holding the pattern
    pub file: PathBuf,

    /// Pattern to draw (qualified or plain name)
    pub pattern: String,

    /// Target size as W,H (defaults to the pattern's example size)
    #[arg(long, value_parser = parse_size)]
    pub size: Option<Size>,

    /// Argument as name=value; repeat for several. Without any, the
    /// pattern's example values are used.
    #[arg(short, long = "arg", value_parser = parse_key_value)]
    pub args: Vec<(String, String)>,

    /// Print compact JSON
    #[arg(long)]
    pub compact: bool,
}

#[derive(Debug, Serialize)]
pub struct RenderOutput {
    pub pattern: String,
    pub target: Rect,
    pub drawn: usize,
    pub skipped: usize,
    pub commands: Vec<DrawCommand>,
}

pub fn render(args: RenderArgs, cwd: &Path) -> Result<()> {
    let config = Config::load(cwd)?;
    let (source, bound) = load(&RealFileSystem, &args.file, &config.bind_options())?;
    let file = args.file.to_string_lossy();
    if !bound.diagnostics.is_empty() {
        eprintln!("{}", format_diagnostics(&source, &file, &bound.diagnostics));
    }

    let (output, diagnostics) = draw(&bound, &args)?;
    if !diagnostics.is_empty() {
        eprintln!("{}", format_diagnostics(&source, &file, &diagnostics));
    }
    println!("{}", to_json(&output, args.compact)?);
    Ok(())
}

fn draw(bound: &BoundDocument, args: &RenderArgs) -> Result<(RenderOutput, Diagnostics)> {
    let pattern = bound.pattern(&args.pattern)?;
    let instance = if args.args.is_empty() {
        pattern.example_instance()
    } else {
        args.args
            .iter()
            .fold(Instance::new(), |instance, (name, value)| {
                instance.with_attribute(name.clone(), value.clone())
            })
    };
    let size = args.size.or(pattern.example_size).unwrap_or(FALLBACK_SIZE);
    let target = Rect::new(0.0, 0.0, size.width, size.height);

    let renderer = Renderer::new(Rc::new(MonospaceMetrics::default()));
    let mut surface = CommandRecorder::new();
    let report = renderer.render(pattern, &instance, target, &mut surface)?;
    let output = RenderOutput {
        pattern: pattern.qualified_name.clone(),
        target,
        drawn: report.drawn,
        skipped: report.skipped,
        commands: surface.commands,
    };
    Ok((output, report.diagnostics))
}

fn parse_key_value(text: &str) -> Result<(String, String), String> {
    match text.split_once('=') {
        Some((name, value)) if !name.trim().is_empty() => {
            Ok((name.trim().to_string(), value.to_string()))
        }
        _ => Err(format!("expected name=value, found '{}'", text)),
    }
}
