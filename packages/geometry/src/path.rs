//! SVG-style path data (`d` attribute) subset: `M L H V C Q Z` in absolute
//! and relative forms. Commands are normalized to absolute coordinates so a
//! path can be pushed through any point mapping (affine or n-slice).

use crate::error::{PathError, PathResult};
use crate::primitives::Point;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum PathCommand {
    MoveTo(Point),
    LineTo(Point),
    QuadTo(Point, Point),
    CubicTo(Point, Point, Point),
    Close,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PathData {
    pub commands: Vec<PathCommand>,
}

impl PathData {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn move_to(&mut self, p: Point) -> &mut Self {
        self.commands.push(PathCommand::MoveTo(p));
        self
    }

    pub fn line_to(&mut self, p: Point) -> &mut Self {
        self.commands.push(PathCommand::LineTo(p));
        self
    }

    pub fn close(&mut self) -> &mut Self {
        self.commands.push(PathCommand::Close);
        self
    }

    pub fn polyline(points: &[Point], closed: bool) -> Self {
        let mut path = PathData::new();
        for (i, p) in points.iter().enumerate() {
            if i == 0 {
                path.move_to(*p);
            } else {
                path.line_to(*p);
            }
        }
        if closed && !points.is_empty() {
            path.close();
        }
        path
    }

    pub fn is_empty(&self) -> bool {
        self.commands.is_empty()
    }

    /// Maps every anchor and control point through `f`.
    pub fn map_points(&self, mut f: impl FnMut(Point) -> Point) -> PathData {
        let commands = self
            .commands
            .iter()
            .map(|cmd| match *cmd {
                PathCommand::MoveTo(p) => PathCommand::MoveTo(f(p)),
                PathCommand::LineTo(p) => PathCommand::LineTo(f(p)),
                PathCommand::QuadTo(c, p) => PathCommand::QuadTo(f(c), f(p)),
                PathCommand::CubicTo(c1, c2, p) => PathCommand::CubicTo(f(c1), f(c2), f(p)),
                PathCommand::Close => PathCommand::Close,
            })
            .collect();
        PathData { commands }
    }

    pub fn parse(text: &str) -> PathResult<PathData> {
        PathParser::new(text).parse()
    }
}

struct PathParser<'a> {
    bytes: &'a [u8],
    pos: usize,
}

impl<'a> PathParser<'a> {
    fn new(text: &'a str) -> Self {
        Self {
            bytes: text.as_bytes(),
            pos: 0,
        }
    }

    fn parse(mut self) -> PathResult<PathData> {
        let mut path = PathData::new();
        let mut current = Point::default();
        let mut subpath_start = Point::default();
        let mut command: Option<u8> = None;

        loop {
            self.skip_separators();
            let Some(&byte) = self.bytes.get(self.pos) else {
                break;
            };
            if byte.is_ascii_alphabetic() {
                if !b"MmLlHhVvCcQqZz".contains(&byte) {
                    return Err(PathError::UnknownCommand {
                        offset: self.pos,
                        command: byte as char,
                    });
                }
                command = Some(byte);
                self.pos += 1;
            } else if command.is_none() {
                return Err(PathError::MissingMoveTo { offset: self.pos });
            }

            let Some(cmd) = command else {
                return Err(PathError::MissingMoveTo { offset: self.pos });
            };
            if path.is_empty() && !matches!(cmd, b'M' | b'm') {
                return Err(PathError::MissingMoveTo { offset: self.pos });
            }

            let relative = cmd.is_ascii_lowercase();
            let base = if relative { current } else { Point::default() };
            match cmd.to_ascii_uppercase() {
                b'M' => {
                    let p = base + self.point()?;
                    path.move_to(p);
                    current = p;
                    subpath_start = p;
                    // Extra coordinate pairs after a move are implicit line-tos.
                    command = Some(if relative { b'l' } else { b'L' });
                }
                b'L' => {
                    let p = base + self.point()?;
                    path.line_to(p);
                    current = p;
                }
                b'H' => {
                    let x = self.number()?;
                    let p = Point::new(if relative { current.x + x } else { x }, current.y);
                    path.line_to(p);
                    current = p;
                }
                b'V' => {
                    let y = self.number()?;
                    let p = Point::new(current.x, if relative { current.y + y } else { y });
                    path.line_to(p);
                    current = p;
                }
                b'C' => {
                    let c1 = base + self.point()?;
                    let c2 = base + self.point()?;
                    let p = base + self.point()?;
                    path.commands.push(PathCommand::CubicTo(c1, c2, p));
                    current = p;
                }
                b'Q' => {
                    let c = base + self.point()?;
                    let p = base + self.point()?;
                    path.commands.push(PathCommand::QuadTo(c, p));
                    current = p;
                }
                _ => {
                    path.close();
                    current = subpath_start;
                    command = None;
                }
            }
        }

        Ok(path)
    }

    fn skip_separators(&mut self) {
        while let Some(&b) = self.bytes.get(self.pos) {
            if b.is_ascii_whitespace() || b == b',' {
                self.pos += 1;
            } else {
                break;
            }
        }
    }

    fn point(&mut self) -> PathResult<Point> {
        let x = self.number()?;
        let y = self.number()?;
        Ok(Point::new(x, y))
    }

    fn number(&mut self) -> PathResult<f64> {
        self.skip_separators();
        let start = self.pos;
        if matches!(self.bytes.get(self.pos), Some(b'+' | b'-')) {
            self.pos += 1;
        }
        let mut seen_dot = false;
        let mut seen_digit = false;
        while let Some(&b) = self.bytes.get(self.pos) {
            if b.is_ascii_digit() {
                seen_digit = true;
            } else if b == b'.' && !seen_dot {
                seen_dot = true;
            } else {
                break;
            }
            self.pos += 1;
        }
        if seen_digit && matches!(self.bytes.get(self.pos), Some(b'e' | b'E')) {
            let save = self.pos;
            self.pos += 1;
            if matches!(self.bytes.get(self.pos), Some(b'+' | b'-')) {
                self.pos += 1;
            }
            let exp_start = self.pos;
            while matches!(self.bytes.get(self.pos), Some(b) if b.is_ascii_digit()) {
                self.pos += 1;
            }
            if self.pos == exp_start {
                self.pos = save;
            }
        }
        if !seen_digit {
            self.pos = start;
            return Err(PathError::ExpectedNumber { offset: start });
        }
        let text = std::str::from_utf8(&self.bytes[start..self.pos])
            .map_err(|_| PathError::ExpectedNumber { offset: start })?;
        text.parse::<f64>()
            .map_err(|_| PathError::ExpectedNumber { offset: start })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn absolute_and_relative_commands() {
        let path = PathData::parse("M10,10 l5 0 V20 h-5 z").unwrap();
        assert_eq!(
            path.commands,
            vec![
                PathCommand::MoveTo(Point::new(10.0, 10.0)),
                PathCommand::LineTo(Point::new(15.0, 10.0)),
                PathCommand::LineTo(Point::new(15.0, 20.0)),
                PathCommand::LineTo(Point::new(10.0, 20.0)),
                PathCommand::Close,
            ]
        );
    }

    #[test]
    fn implicit_line_after_move() {
        let path = PathData::parse("M0 0 10 0 10 10").unwrap();
        assert_eq!(path.commands.len(), 3);
        assert_eq!(path.commands[2], PathCommand::LineTo(Point::new(10.0, 10.0)));
    }

    #[test]
    fn curves_and_exponents() {
        let path = PathData::parse("M0 0 C1e1 0 10 10 0 10 Q-5 5 0 0").unwrap();
        assert_eq!(
            path.commands[1],
            PathCommand::CubicTo(Point::new(10.0, 0.0), Point::new(10.0, 10.0), Point::new(0.0, 10.0))
        );
    }

    #[test]
    fn errors_carry_offsets() {
        assert_eq!(
            PathData::parse("L 1 2"),
            Err(PathError::MissingMoveTo { offset: 1 })
        );
        assert_eq!(
            PathData::parse("M 1 x"),
            Err(PathError::ExpectedNumber { offset: 4 })
        );
        assert!(matches!(
            PathData::parse("M 0 0 A 1 1"),
            Err(PathError::UnknownCommand { command: 'A', .. })
        ));
    }

    #[test]
    fn map_points_keeps_shape() {
        let path = PathData::polyline(&[Point::new(0.0, 0.0), Point::new(1.0, 1.0)], true);
        let doubled = path.map_points(|p| p * 2.0);
        assert_eq!(doubled.commands[1], PathCommand::LineTo(Point::new(2.0, 2.0)));
        assert_eq!(doubled.commands[2], PathCommand::Close);
    }
}
