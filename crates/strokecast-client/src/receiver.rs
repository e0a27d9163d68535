//! Receiving side of a stroke stream
//!
//! [`StrokeReceiver`] takes packages forwarded by the relay, draws them
//! immediately through a [`Reconstructor`] and records them in a
//! [`GapDetector`] so the caller can tell which strokes are complete and
//! which packages were lost.

use tracing::{debug, instrument, warn};

use strokecast_core::{
    CompletionResult, GapDetector, Package, PackageError, ServerMessage, StrokeId,
};

use crate::config::StreamingConfig;
use crate::reconstruct::Reconstructor;
use crate::surface::DrawSurface;

/// Draws and tracks incoming strokes
pub struct StrokeReceiver<S: DrawSurface> {
    detector: GapDetector,
    reconstructor: Reconstructor,
    surface: S,
}

impl<S: DrawSurface> StrokeReceiver<S> {
    pub fn new(config: &StreamingConfig, surface: S) -> Self {
        Self {
            detector: GapDetector::new(config.gap.clone()),
            reconstructor: Reconstructor::new(config.reconstructor.clone()),
            surface,
        }
    }

    /// Draw a package and record its arrival
    ///
    /// Packages are drawn in arrival order, even out of sequence; the
    /// returned result says what is still missing from the stroke.
    ///
    /// # Errors
    ///
    /// Returns an error for a malformed package, which is neither drawn nor
    /// recorded.
    #[instrument(skip(self, package), fields(package = %package.key()))]
    pub fn on_package(&mut self, package: Package) -> Result<CompletionResult, PackageError> {
        if let Err(e) = package.validate() {
            warn!(error = %e, "Dropping malformed package");
            return Err(e);
        }

        self.reconstructor
            .on_package_arrived(&package, &mut self.surface);
        let result = self.detector.add_package(package);

        if result.is_complete {
            debug!(total_packages = result.total_packages, "Stroke complete");
        }
        Ok(result)
    }

    /// Handle a relay message; only forwarded packages carry stroke data
    pub fn handle_message(
        &mut self,
        message: ServerMessage,
    ) -> Result<Option<CompletionResult>, PackageError> {
        match message {
            ServerMessage::ReceivedData { data } => self.on_package(data).map(Some),
            _ => Ok(None),
        }
    }

    pub fn status(&self, stroke_id: &StrokeId) -> Option<CompletionResult> {
        self.detector.status(stroke_id)
    }

    pub fn is_complete(&self, stroke_id: &StrokeId) -> bool {
        self.detector.is_complete(stroke_id)
    }

    /// Evict stale strokes from the detector and forget their boundaries
    ///
    /// Returns the number of strokes evicted.
    pub fn evict_expired(&mut self) -> usize {
        let evicted = self.detector.evict_expired();
        for (stroke_id, _) in &evicted {
            self.reconstructor.forget(stroke_id);
        }
        evicted.len()
    }

    pub fn detector(&self) -> &GapDetector {
        &self.detector
    }

    pub fn reconstructor(&self) -> &Reconstructor {
        &self.reconstructor
    }

    pub fn surface(&self) -> &S {
        &self.surface
    }

    pub fn surface_mut(&mut self) -> &mut S {
        &mut self.surface
    }

    pub fn into_surface(self) -> S {
        self.surface
    }
}
