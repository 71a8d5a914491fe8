//! Brush strokes given on the command line as `"x,y x,y ..."`.

use std::str::FromStr;

use maskedit_core::{EditSession, EditorError, Point};

/// One stroke: the pointer goes down on the first point, moves through
/// the rest and is released.
#[derive(Debug, Clone, PartialEq)]
pub struct Stroke(pub Vec<Point>);

impl FromStr for Stroke {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let points = s
            .split_whitespace()
            .map(parse_point)
            .collect::<Result<Vec<_>, _>>()?;
        if points.is_empty() {
            return Err("a stroke needs at least one point".to_owned());
        }
        Ok(Self(points))
    }
}

/// Parse `"x,y"`.
pub fn parse_point(s: &str) -> Result<Point, String> {
    let (x, y) = s
        .split_once(',')
        .ok_or_else(|| format!("expected x,y but got {s:?}"))?;
    Ok(Point::new(parse_coordinate(x)?, parse_coordinate(y)?))
}

/// Parse one finite coordinate.
pub fn parse_coordinate(s: &str) -> Result<f64, String> {
    let value: f64 = s
        .trim()
        .parse()
        .map_err(|_| format!("invalid coordinate {s:?}"))?;
    if value.is_finite() {
        Ok(value)
    } else {
        Err(format!("invalid coordinate {s:?}"))
    }
}

/// Turn masking on at `surface_width` and replay `strokes` as pointer
/// events with the surface at the screen origin.
///
/// # Errors
///
/// Any [`EditorError`] raised by the session while masking.
pub fn paint_strokes(
    session: &mut EditSession,
    surface_width: u32,
    strokes: &[Stroke],
) -> Result<(), EditorError> {
    if !session.is_masking() {
        session.toggle_masking(surface_width)?;
    }
    session.set_surface_origin(Point::new(0.0, 0.0))?;
    for Stroke(points) in strokes {
        let Some((first, rest)) = points.split_first() else {
            continue;
        };
        session.pointer_down(*first)?;
        for point in rest {
            session.pointer_move(*point)?;
        }
        session.pointer_up()?;
    }
    log::debug!("painted {} stroke(s)", strokes.len());
    Ok(())
}
