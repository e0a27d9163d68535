//! Drawing surfaces
//!
//! Reconstruction hands finished point paths to a [`DrawSurface`]. How the
//! path is rasterized is up to the surface; [`SmoothPath`] describes the
//! curve a canvas-style renderer should draw for it.

use strokecast_core::Point;

/// Something a reconstructed path can be drawn onto
pub trait DrawSurface {
    /// Draw one continuous path; `points` always has at least two entries
    fn draw_path(&mut self, points: &[Point]);
}

impl<S: DrawSurface + ?Sized> DrawSurface for &mut S {
    fn draw_path(&mut self, points: &[Point]) {
        (**self).draw_path(points)
    }
}

/// One drawing command of a smoothed path
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum PathSegment {
    MoveTo(Point),
    QuadTo { control: Point, to: Point },
    LineTo(Point),
}

/// A polyline rendered as chained quadratic curves
///
/// Each interior point becomes the control point of a curve ending at the
/// midpoint between it and its successor, which keeps the path tangent
/// continuous. A final line segment reaches the last point.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SmoothPath {
    segments: Vec<PathSegment>,
}

impl SmoothPath {
    pub fn from_points(points: &[Point]) -> Self {
        let mut segments = Vec::with_capacity(points.len() + 1);
        let Some((first, rest)) = points.split_first() else {
            return Self { segments };
        };
        segments.push(PathSegment::MoveTo(*first));

        if rest.is_empty() {
            return Self { segments };
        }

        for i in 1..points.len() - 1 {
            let control = points[i];
            let next = points[i + 1];
            let to = Point::new(
                (control.x + next.x) / 2.0,
                (control.y + next.y) / 2.0,
                midpoint_timestamp(control.timestamp, next.timestamp),
            );
            segments.push(PathSegment::QuadTo { control, to });
        }

        if let Some(last) = points.last() {
            segments.push(PathSegment::LineTo(*last));
        }
        Self { segments }
    }

    pub fn segments(&self) -> &[PathSegment] {
        &self.segments
    }

    pub fn is_empty(&self) -> bool {
        self.segments.is_empty()
    }
}

fn midpoint_timestamp(a: i64, b: i64) -> i64 {
    ((i128::from(a) + i128::from(b)) / 2) as i64
}

/// A surface that remembers every path drawn on it
#[derive(Debug, Clone, Default)]
pub struct RecordingSurface {
    paths: Vec<Vec<Point>>,
}

impl RecordingSurface {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn paths(&self) -> &[Vec<Point>] {
        &self.paths
    }

    /// Paths converted to the curves a renderer would draw
    pub fn smooth_paths(&self) -> Vec<SmoothPath> {
        self.paths.iter().map(|p| SmoothPath::from_points(p)).collect()
    }

    /// Every drawn point, in drawing order
    pub fn all_points(&self) -> Vec<Point> {
        self.paths.iter().flatten().copied().collect()
    }

    pub fn clear(&mut self) {
        self.paths.clear();
    }
}

impl DrawSurface for RecordingSurface {
    fn draw_path(&mut self, points: &[Point]) {
        self.paths.push(points.to_vec());
    }
}
