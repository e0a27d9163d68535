//! Stroke segmentation
//!
//! Splits the point stream of a stroke into bounded packages. A package is
//! emitted as soon as `package_capacity` points are buffered; a partial
//! batch is flushed once the pointer has been quiet for `flush_timeout`;
//! ending the stroke always emits a terminal package carrying whatever is
//! still buffered, possibly nothing.
//!
//! The segmenter does no I/O and never reads the clock. Callers pass the
//! current time in and drive the flush timer through
//! [`Segmenter::flush_deadline`] and [`Segmenter::poll_flush`].

use tokio::time::Instant;
use tracing::{debug, instrument, trace};

use strokecast_core::{Package, PackageError, Point, StrokeId};

use crate::config::SegmenterConfig;

/// Sequencing and buffer state for one stroke
///
/// Package sequence numbers start at 1 and are consecutive; the terminal
/// package takes the next number after the last data package.
#[derive(Debug)]
pub struct StrokeSession {
    stroke_id: StrokeId,
    /// Ordinal of this stroke within the segmenter's lifetime
    stroke_sequence: u32,
    next_sequence: u32,
    buffer: Vec<Point>,
    flush_deadline: Option<Instant>,
}

impl StrokeSession {
    pub fn new(stroke_sequence: u32) -> Self {
        Self::with_id(StrokeId::generate(), stroke_sequence)
    }

    pub fn with_id(stroke_id: StrokeId, stroke_sequence: u32) -> Self {
        Self {
            stroke_id,
            stroke_sequence,
            next_sequence: 1,
            buffer: Vec::new(),
            flush_deadline: None,
        }
    }

    pub fn stroke_id(&self) -> &StrokeId {
        &self.stroke_id
    }

    pub fn stroke_sequence(&self) -> u32 {
        self.stroke_sequence
    }

    /// Points waiting to be packaged
    pub fn buffered(&self) -> usize {
        self.buffer.len()
    }

    /// Packages emitted so far
    pub fn packages_emitted(&self) -> u32 {
        self.next_sequence - 1
    }

    fn push(&mut self, point: Point) {
        self.buffer.push(point);
    }

    fn seal(&mut self, points: Vec<Point>) -> Result<Package, PackageError> {
        let package = Package::data(self.stroke_id.clone(), self.next_sequence, points)?;
        self.next_sequence += 1;
        Ok(package)
    }

    /// Package every full batch in the buffer
    fn drain_full(&mut self, capacity: usize) -> Result<Vec<Package>, PackageError> {
        let full = self.buffer.len() / capacity * capacity;
        let batches: Vec<Vec<Point>> = self
            .buffer
            .drain(..full)
            .collect::<Vec<_>>()
            .chunks(capacity)
            .map(<[Point]>::to_vec)
            .collect();

        batches.into_iter().map(|batch| self.seal(batch)).collect()
    }

    /// Package the partial batch, if any
    fn flush_partial(&mut self) -> Result<Option<Package>, PackageError> {
        if self.buffer.is_empty() {
            return Ok(None);
        }
        let points = std::mem::take(&mut self.buffer);
        self.seal(points).map(Some)
    }

    /// Consume the session into its terminal package
    fn finish(mut self) -> Result<Package, PackageError> {
        let points = std::mem::take(&mut self.buffer);
        Package::terminal(
            self.stroke_id,
            self.next_sequence,
            points,
            self.stroke_sequence,
        )
    }
}

/// Turns pointer samples into packages
///
/// At most one stroke is open at a time. Starting a stroke while another is
/// open ends the previous one first, so its terminal package is never lost.
#[derive(Debug)]
pub struct Segmenter {
    config: SegmenterConfig,
    session: Option<StrokeSession>,
    strokes_started: u32,
}

impl Segmenter {
    pub fn new(config: SegmenterConfig) -> Self {
        Self {
            config,
            session: None,
            strokes_started: 0,
        }
    }

    /// Whether a stroke is open
    pub fn is_drawing(&self) -> bool {
        self.session.is_some()
    }

    /// The open stroke's id
    pub fn active_stroke(&self) -> Option<&StrokeId> {
        self.session.as_ref().map(StrokeSession::stroke_id)
    }

    /// When the pending partial batch is due, if a flush timer is armed
    pub fn flush_deadline(&self) -> Option<Instant> {
        self.session.as_ref().and_then(|s| s.flush_deadline)
    }

    /// Open a new stroke whose first point is `origin`
    ///
    /// Returns the terminal package of a still-open previous stroke followed
    /// by any package the origin completes.
    #[instrument(skip(self, origin))]
    pub fn start_stroke(
        &mut self,
        origin: Point,
        now: Instant,
    ) -> Result<Vec<Package>, PackageError> {
        if !origin.is_finite() {
            return Err(PackageError::NonFinitePoint { index: 0 });
        }

        let mut packages = Vec::new();
        if let Some(previous) = self.end_stroke()? {
            packages.push(previous);
        }

        self.strokes_started += 1;
        let session = StrokeSession::new(self.strokes_started);
        debug!(
            stroke_id = %session.stroke_id().short(),
            stroke_sequence = self.strokes_started,
            "Stroke started"
        );
        self.session = Some(session);

        packages.extend(self.observe(origin, now)?);
        Ok(packages)
    }

    /// Add a point to the open stroke
    ///
    /// Returns the packages completed by this point. Points observed while
    /// no stroke is open are ignored.
    pub fn observe(&mut self, point: Point, now: Instant) -> Result<Vec<Package>, PackageError> {
        if !point.is_finite() {
            return Err(PackageError::NonFinitePoint { index: 0 });
        }
        let capacity = self.config.package_capacity.max(1);
        let flush_timeout = self.config.flush_timeout;

        let Some(session) = self.session.as_mut() else {
            trace!("Point observed outside a stroke");
            return Ok(Vec::new());
        };

        session.push(point);
        if session.buffered() >= capacity {
            session.flush_deadline = None;
            return session.drain_full(capacity);
        }

        // Re-arm so the timer measures the quiet period since this point
        session.flush_deadline = Some(now + flush_timeout);
        Ok(Vec::new())
    }

    /// Flush the partial batch if its timer has expired
    pub fn poll_flush(&mut self, now: Instant) -> Result<Option<Package>, PackageError> {
        let Some(session) = self.session.as_mut() else {
            return Ok(None);
        };
        match session.flush_deadline {
            Some(deadline) if deadline <= now => {
                session.flush_deadline = None;
                let package = session.flush_partial()?;
                if let Some(package) = &package {
                    debug!(package = %package.key(), points = package.points().len(), "Partial batch flushed");
                }
                Ok(package)
            }
            _ => Ok(None),
        }
    }

    /// End the open stroke
    ///
    /// Returns its terminal package, which carries any buffered points or
    /// none at all. Returns `None` if no stroke was open.
    pub fn end_stroke(&mut self) -> Result<Option<Package>, PackageError> {
        let Some(session) = self.session.take() else {
            return Ok(None);
        };
        let emitted = session.packages_emitted();
        let terminal = session.finish()?;
        debug!(
            package = %terminal.key(),
            data_packages = emitted,
            trailing_points = terminal.points().len(),
            "Stroke ended"
        );
        Ok(Some(terminal))
    }
}
