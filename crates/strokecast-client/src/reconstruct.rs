//! Stroke reconstruction
//!
//! Packages of a stroke are drawn as they arrive. To keep the line
//! continuous across package boundaries the reconstructor remembers the last
//! point drawn for every open stroke and prepends it to the next package:
//!
//! - **Standalone** (first and last): drawn as-is
//! - **First**: drawn as-is; its last point becomes the boundary
//! - **Last**: boundary prepended; the package's first point is dropped if
//!   it lies within `duplicate_tolerance` of the boundary; the boundary is
//!   then cleared
//! - **Middle**: boundary prepended; its last point becomes the boundary
//!
//! Stitched points are gap-filled by [`interpolate`] before drawing.
//! Boundaries are tracked per stroke id, so interleaved strokes from
//! several participants never stitch into each other.

use std::collections::HashMap;

use tracing::trace;

use strokecast_core::{Package, Point, StrokeId};

use crate::config::ReconstructorConfig;
use crate::interpolate::interpolate;
use crate::surface::DrawSurface;

/// Where a package sits within its stroke
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PackagePosition {
    Standalone,
    First,
    Middle,
    Last,
}

impl PackagePosition {
    pub fn of(package: &Package) -> Self {
        match (package.is_first(), package.is_last()) {
            (true, true) => PackagePosition::Standalone,
            (true, false) => PackagePosition::First,
            (false, true) => PackagePosition::Last,
            (false, false) => PackagePosition::Middle,
        }
    }
}

/// Stitches packages into continuous paths
#[derive(Debug, Default)]
pub struct Reconstructor {
    config: ReconstructorConfig,
    boundaries: HashMap<StrokeId, Point>,
}

impl Reconstructor {
    pub fn new(config: ReconstructorConfig) -> Self {
        Self {
            config,
            boundaries: HashMap::new(),
        }
    }

    pub fn config(&self) -> &ReconstructorConfig {
        &self.config
    }

    /// Last drawn point of an open stroke
    pub fn boundary(&self, stroke_id: &StrokeId) -> Option<&Point> {
        self.boundaries.get(stroke_id)
    }

    /// Strokes with a remembered boundary
    pub fn open_strokes(&self) -> usize {
        self.boundaries.len()
    }

    /// Drop the boundary of a stroke that will never finish
    pub fn forget(&mut self, stroke_id: &StrokeId) -> bool {
        self.boundaries.remove(stroke_id).is_some()
    }

    /// Join a package onto its stroke and update the boundary
    ///
    /// Returns the points to draw, before gap filling. An empty terminal
    /// package yields nothing and closes the stroke.
    pub fn stitch(&mut self, package: &Package) -> Vec<Point> {
        let stroke_id = package.stroke_id();
        let points = package.points();
        let position = PackagePosition::of(package);

        if points.is_empty() {
            if package.is_last() {
                self.boundaries.remove(stroke_id);
            }
            return Vec::new();
        }

        let stitched = match position {
            PackagePosition::Standalone => {
                self.boundaries.remove(stroke_id);
                points.to_vec()
            }
            PackagePosition::First => points.to_vec(),
            PackagePosition::Last => match self.boundaries.remove(stroke_id) {
                Some(boundary) => {
                    let skip = usize::from(
                        points[0].distance_to(&boundary) < self.config.duplicate_tolerance,
                    );
                    std::iter::once(boundary)
                        .chain(points[skip..].iter().copied())
                        .collect()
                }
                None => points.to_vec(),
            },
            PackagePosition::Middle => match self.boundaries.get(stroke_id) {
                Some(boundary) => std::iter::once(*boundary)
                    .chain(points.iter().copied())
                    .collect(),
                None => points.to_vec(),
            },
        };

        if matches!(position, PackagePosition::First | PackagePosition::Middle) {
            if let Some(last) = package.last_point() {
                self.boundaries.insert(stroke_id.clone(), *last);
            }
        }

        trace!(
            package = %package.key(),
            ?position,
            points = stitched.len(),
            "Package stitched"
        );
        stitched
    }

    /// Stitch, gap-fill and draw a package
    ///
    /// Returns the path handed to the surface, or `None` if there was
    /// nothing to draw.
    pub fn on_package_arrived<S: DrawSurface + ?Sized>(
        &mut self,
        package: &Package,
        surface: &mut S,
    ) -> Option<Vec<Point>> {
        let stitched = self.stitch(package);
        let path = interpolate(&stitched, self.config.max_gap, self.config.damping);
        if path.len() < 2 {
            return None;
        }
        surface.draw_path(&path);
        Some(path)
    }
}
