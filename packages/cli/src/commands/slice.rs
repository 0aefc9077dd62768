use super::dump::to_json;
use super::{parse_point, parse_rect, parse_size};
use anyhow::Result;
use clap::Args;
use serde::Serialize;
use stencil_geometry::{NSliceScaling, NSliceValues, Point, Rect, Size};

#[derive(Args, Debug)]
pub struct SliceArgs {
    /// Reference size as W,H
    #[arg(long, value_parser = parse_size)]
    pub reference: Size,

    /// Horizontal cuts in reference space, comma separated
    #[arg(long, value_delimiter = ',')]
    pub xs: Vec<f64>,

    /// Vertical cuts in reference space, comma separated
    #[arg(long, value_delimiter = ',')]
    pub ys: Vec<f64>,

    /// Target rectangle as X,Y,W,H
    #[arg(long, value_parser = parse_rect)]
    pub target: Rect,

    /// Reference-space point to map, as X,Y
    #[arg(long, value_parser = parse_point)]
    pub point: Option<Point>,

    /// Print compact JSON
    #[arg(long)]
    pub compact: bool,
}

#[derive(Debug, Serialize)]
pub struct SliceOutput {
    pub scaling: NSliceScaling,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub point: Option<Point>,
}

pub fn slice(args: SliceArgs) -> Result<()> {
    let output = compute(&args)?;
    println!("{}", to_json(&output, args.compact)?);
    Ok(())
}

fn compute(args: &SliceArgs) -> Result<SliceOutput> {
    let values = NSliceValues::new(args.reference, args.xs.clone(), args.ys.clone())?;
    let scaling = NSliceScaling::compute(&values, args.target);
    let point = args.point.map(|p| scaling.transform_point(p));
    Ok(SliceOutput { scaling, point })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(xs: Vec<f64>, point: Option<Point>) -> SliceArgs {
        SliceArgs {
            reference: Size::new(30.0, 30.0),
            xs,
            ys: vec![10.0, 20.0],
            target: Rect::new(0.0, 0.0, 100.0, 60.0),
            point,
            compact: true,
        }
    }

    #[test]
    fn test_maps_point_through_cuts() {
        let output = compute(&args(vec![10.0, 20.0], Some(Point::new(25.0, 5.0)))).unwrap();
        assert_eq!(output.point, Some(Point::new(95.0, 5.0)));
        assert_eq!(output.scaling.scale(), (1.0, 1.0));
    }

    #[test]
    fn test_invalid_cuts_are_an_error() {
        assert!(compute(&args(vec![20.0, 10.0], None)).is_err());
    }
}
