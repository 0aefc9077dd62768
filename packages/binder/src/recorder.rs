//! In-memory collaborators: a surface that records what it is asked to do,
//! fixed-advance font metrics and a table of image sizes. Used by the CLI
//! to show what a pattern draws, and by tests.

use crate::render::{FontMetrics, ImageSource, ResolvedPaint, Surface, TextStyle};
use serde::Serialize;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use stencil_geometry::{PathData, Point, Rect, Size};

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "op", rename_all = "kebab-case")]
pub enum DrawCommand {
    Save,
    Restore,
    Clip {
        path: PathData,
    },
    Fill {
        path: PathData,
        paint: ResolvedPaint,
    },
    Stroke {
        path: PathData,
        paint: ResolvedPaint,
        width: f64,
    },
    Text {
        text: String,
        origin: Point,
        style: TextStyle,
    },
    Image {
        href: PathBuf,
        rect: Rect,
    },
    Field {
        name: String,
        rect: Rect,
    },
}

#[derive(Debug, Default, Serialize)]
pub struct CommandRecorder {
    pub commands: Vec<DrawCommand>,
}

impl CommandRecorder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn texts(&self) -> Vec<&str> {
        self.commands
            .iter()
            .filter_map(|c| match c {
                DrawCommand::Text { text, .. } => Some(text.as_str()),
                _ => None,
            })
            .collect()
    }

    pub fn fields(&self) -> Vec<(&str, Rect)> {
        self.commands
            .iter()
            .filter_map(|c| match c {
                DrawCommand::Field { name, rect } => Some((name.as_str(), *rect)),
                _ => None,
            })
            .collect()
    }
}

impl Surface for CommandRecorder {
    fn save(&mut self) {
        self.commands.push(DrawCommand::Save);
    }

    fn restore(&mut self) {
        self.commands.push(DrawCommand::Restore);
    }

    fn clip(&mut self, path: &PathData) {
        self.commands.push(DrawCommand::Clip { path: path.clone() });
    }

    fn fill_path(&mut self, path: &PathData, paint: &ResolvedPaint) {
        self.commands.push(DrawCommand::Fill {
            path: path.clone(),
            paint: paint.clone(),
        });
    }

    fn stroke_path(&mut self, path: &PathData, paint: &ResolvedPaint, width: f64) {
        self.commands.push(DrawCommand::Stroke {
            path: path.clone(),
            paint: paint.clone(),
            width,
        });
    }

    fn draw_text(&mut self, text: &str, origin: Point, style: &TextStyle) {
        self.commands.push(DrawCommand::Text {
            text: text.to_string(),
            origin,
            style: style.clone(),
        });
    }

    fn draw_image(&mut self, href: &Path, rect: Rect) {
        self.commands.push(DrawCommand::Image {
            href: href.to_path_buf(),
            rect,
        });
    }

    fn field(&mut self, name: &str, rect: Rect) {
        self.commands.push(DrawCommand::Field {
            name: name.to_string(),
            rect,
        });
    }
}

/// Every character advances by `advance` times the font size.
#[derive(Debug, Clone, Copy)]
pub struct MonospaceMetrics {
    pub advance: f64,
}

impl Default for MonospaceMetrics {
    fn default() -> Self {
        Self { advance: 0.6 }
    }
}

impl FontMetrics for MonospaceMetrics {
    fn text_width(&self, text: &str, font_size: f64) -> f64 {
        text.chars().count() as f64 * font_size * self.advance
    }
}

#[derive(Debug, Clone, Default)]
pub struct ImageTable {
    sizes: HashMap<PathBuf, Size>,
}

impl ImageTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, href: impl Into<PathBuf>, size: Size) {
        self.sizes.insert(href.into(), size);
    }
}

impl ImageSource for ImageTable {
    fn intrinsic_size(&self, href: &Path) -> Option<Size> {
        self.sizes.get(href).copied()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_monospace_width() {
        let metrics = MonospaceMetrics::default();
        assert!((metrics.text_width("abcd", 10.0) - 24.0).abs() < 1e-9);
        assert_eq!(metrics.text_width("", 10.0), 0.0);
    }

    #[test]
    fn test_image_table_lookup() {
        let mut images = ImageTable::new();
        images.insert("icons/a.png", Size::new(16.0, 16.0));
        assert_eq!(images.intrinsic_size(Path::new("icons/a.png")), Some(Size::new(16.0, 16.0)));
        assert_eq!(images.intrinsic_size(Path::new("icons/b.png")), None);
    }
}
