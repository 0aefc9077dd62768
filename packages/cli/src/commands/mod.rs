pub mod check;
pub mod dump;
pub mod render;
pub mod slice;

pub use check::{check, CheckArgs};
pub use dump::{dump, DumpArgs};
pub use render::{render, RenderArgs};
pub use slice::{slice, SliceArgs};

use anyhow::Result;
use std::path::Path;
use stencil_binder::{bind_source, BindOptions, BoundDocument};
use stencil_common::FileSystem;
use stencil_geometry::{Point, Rect, Size};

/// Reads and binds one file, keeping the source for diagnostics output.
pub(crate) fn load(
    fs: &dyn FileSystem,
    path: &Path,
    options: &BindOptions,
) -> Result<(String, BoundDocument)> {
    let source = fs.read_to_string(path)?;
    let mut options = options.clone();
    options.path = Some(path.to_path_buf());
    options.source_dir = path.parent().map(Path::to_path_buf);
    let bound = bind_source(&source, &options);
    Ok((source, bound))
}

/// `n` comma separated numbers.
pub(crate) fn parse_numbers(text: &str, n: usize) -> Result<Vec<f64>, String> {
    let numbers = text
        .split(',')
        .map(|part| {
            part.trim()
                .parse::<f64>()
                .map_err(|_| format!("'{}' is not a number", part.trim()))
        })
        .collect::<Result<Vec<_>, _>>()?;
    if numbers.len() != n {
        return Err(format!("expected {} comma separated numbers, found {}", n, numbers.len()));
    }
    Ok(numbers)
}

pub(crate) fn parse_size(text: &str) -> Result<Size, String> {
    let n = parse_numbers(text, 2)?;
    Ok(Size::new(n[0], n[1]))
}

pub(crate) fn parse_point(text: &str) -> Result<Point, String> {
    let n = parse_numbers(text, 2)?;
    Ok(Point::new(n[0], n[1]))
}

pub(crate) fn parse_rect(text: &str) -> Result<Rect, String> {
    let n = parse_numbers(text, 4)?;
    Ok(Rect::new(n[0], n[1], n[2], n[3]))
}

#[cfg(test)]
mod tests {
    use super::*;
    use stencil_common::MockFileSystem;

    #[test]
    fn test_parse_numbers() {
        assert_eq!(parse_size("30, 20"), Ok(Size::new(30.0, 20.0)));
        assert_eq!(parse_rect("0,0,100,60"), Ok(Rect::new(0.0, 0.0, 100.0, 60.0)));
        assert!(parse_point("1").unwrap_err().contains("expected 2"));
        assert!(parse_size("1,x").unwrap_err().contains("'x' is not a number"));
    }

    #[test]
    fn test_load_records_origin() {
        let mut fs = MockFileSystem::new();
        fs.add_file("ui/arrows.stencil", r#"<pattern name="up" type="widget"/>"#);
        let (source, bound) = load(&fs, Path::new("ui/arrows.stencil"), &BindOptions::default()).unwrap();
        assert!(source.starts_with("<pattern"));
        assert_eq!(bound.patterns[0].qualified_name, "arrows.up");
    }

    #[test]
    fn test_load_missing_file() {
        let fs = MockFileSystem::new();
        assert!(load(&fs, Path::new("nope.stencil"), &BindOptions::default()).is_err());
    }
}
