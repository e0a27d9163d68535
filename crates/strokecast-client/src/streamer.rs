//! Pointer-to-network streaming actor
//!
//! [`StrokeStreamer`] owns a [`Segmenter`] and runs as a task: it reads
//! pointer events from a channel, fires the flush timer, and hands every
//! finished package to a [`PackageSender`] on its own task so a slow
//! acknowledgement never holds up input. Send outcomes are reported on a
//! separate channel.

use std::sync::Arc;

use tokio::sync::mpsc;
use tokio::task::{JoinHandle, JoinSet};
use tokio::time::{Instant, sleep_until};
use tracing::{debug, info, warn};

use strokecast_core::{AckTransport, Package, PackageError, Point};

use crate::config::StreamingConfig;
use crate::error::{SendError, StreamerError};
use crate::segmenter::Segmenter;
use crate::sender::{Delivery, PackageSender};

/// Input events from a pointing device
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum PointerEvent {
    Down(Point),
    Move(Point),
    Up,
    /// Pointer left the drawing area; ends the stroke like `Up`
    Leave,
}

/// Result of sending one package
pub type SendOutcome = Result<Delivery, SendError>;

/// Capacity of the pointer event channel
const EVENT_BUFFER: usize = 256;

/// The streaming task
pub struct StrokeStreamer<T: AckTransport + 'static> {
    segmenter: Segmenter,
    sender: Arc<PackageSender<T>>,
    events: mpsc::Receiver<PointerEvent>,
    outcomes: mpsc::UnboundedSender<SendOutcome>,
    in_flight: JoinSet<()>,
}

impl<T: AckTransport + 'static> StrokeStreamer<T> {
    /// Start streaming over `transport`
    pub fn spawn(config: StreamingConfig, transport: T) -> StreamerHandle<T> {
        for warning in config.validate() {
            warn!(%warning, "Questionable streaming configuration");
        }

        let (event_tx, event_rx) = mpsc::channel(EVENT_BUFFER);
        let (outcome_tx, outcome_rx) = mpsc::unbounded_channel();
        let sender = Arc::new(PackageSender::new(transport, config.sender.clone()));

        let streamer = Self {
            segmenter: Segmenter::new(config.segmenter),
            sender: sender.clone(),
            events: event_rx,
            outcomes: outcome_tx,
            in_flight: JoinSet::new(),
        };
        let task = tokio::spawn(streamer.run());

        StreamerHandle {
            events: event_tx,
            outcomes: outcome_rx,
            sender,
            task,
        }
    }

    async fn run(mut self) {
        info!("Stroke streamer started");
        loop {
            let deadline = self.segmenter.flush_deadline();
            let flush = sleep_until(deadline.unwrap_or_else(Instant::now));

            tokio::select! {
                event = self.events.recv() => match event {
                    Some(event) => self.handle_event(event),
                    None => break,
                },
                _ = flush, if deadline.is_some() => {
                    let flushed = self.segmenter.poll_flush(Instant::now());
                    self.dispatch_one(flushed.map(|p| p.into_iter().collect()));
                }
            }

            while self.in_flight.try_join_next().is_some() {}
        }

        // Input is gone: close any open stroke so receivers see it end
        let terminal = self.segmenter.end_stroke();
        self.dispatch_one(terminal.map(|p| p.into_iter().collect()));

        while self.in_flight.join_next().await.is_some() {}
        info!("Stroke streamer stopped");
    }

    fn handle_event(&mut self, event: PointerEvent) {
        let now = Instant::now();
        let packages = match event {
            PointerEvent::Down(point) => self.segmenter.start_stroke(point, now),
            PointerEvent::Move(point) => self.segmenter.observe(point, now),
            PointerEvent::Up | PointerEvent::Leave => self
                .segmenter
                .end_stroke()
                .map(|p| p.into_iter().collect()),
        };
        self.dispatch_one(packages);
    }

    fn dispatch_one(&mut self, packages: Result<Vec<Package>, PackageError>) {
        match packages {
            Ok(packages) => {
                for package in packages {
                    self.dispatch(package);
                }
            }
            Err(e) => warn!(error = %e, "Pointer sample discarded"),
        }
    }

    fn dispatch(&mut self, package: Package) {
        debug!(package = %package.key(), last = package.is_last(), "Dispatching package");
        let sender = self.sender.clone();
        let outcomes = self.outcomes.clone();
        self.in_flight.spawn(async move {
            let outcome = sender.send(package).await;
            // Nobody listening is fine; the sender has already logged it
            let _ = outcomes.send(outcome);
        });
    }
}

/// Handle to a running [`StrokeStreamer`]
pub struct StreamerHandle<T: AckTransport + 'static> {
    events: mpsc::Sender<PointerEvent>,
    outcomes: mpsc::UnboundedReceiver<SendOutcome>,
    sender: Arc<PackageSender<T>>,
    task: JoinHandle<()>,
}

impl<T: AckTransport + 'static> StreamerHandle<T> {
    /// Feed one pointer event
    pub async fn pointer(&self, event: PointerEvent) -> Result<(), StreamerError> {
        self.events
            .send(event)
            .await
            .map_err(|_| StreamerError::Stopped)
    }

    pub async fn down(&self, point: Point) -> Result<(), StreamerError> {
        self.pointer(PointerEvent::Down(point)).await
    }

    pub async fn move_to(&self, point: Point) -> Result<(), StreamerError> {
        self.pointer(PointerEvent::Move(point)).await
    }

    pub async fn up(&self) -> Result<(), StreamerError> {
        self.pointer(PointerEvent::Up).await
    }

    /// Next send outcome, or `None` once the streamer has stopped
    pub async fn next_outcome(&mut self) -> Option<SendOutcome> {
        self.outcomes.recv().await
    }

    /// Outcomes already available, without waiting
    pub fn drain_outcomes(&mut self) -> Vec<SendOutcome> {
        let mut drained = Vec::new();
        while let Ok(outcome) = self.outcomes.try_recv() {
            drained.push(outcome);
        }
        drained
    }

    pub fn sender(&self) -> &Arc<PackageSender<T>> {
        &self.sender
    }

    /// Stop accepting input, end any open stroke and wait for in-flight sends
    ///
    /// Returns every outcome not yet taken from the handle.
    pub async fn shutdown(self) -> Result<Vec<SendOutcome>, StreamerError> {
        let StreamerHandle {
            events,
            mut outcomes,
            task,
            ..
        } = self;
        drop(events);
        task.await
            .map_err(|e| StreamerError::Task(e.to_string()))?;

        let mut remaining = Vec::new();
        while let Some(outcome) = outcomes.recv().await {
            remaining.push(outcome);
        }
        Ok(remaining)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;
    use strokecast_core::{MockAckTransport, MockOutcome};

    fn p(i: usize) -> Point {
        Point::new(i as f64, 0.0, i as i64)
    }

    fn delivered(outcomes: &[SendOutcome]) -> Vec<u32> {
        let mut sequences: Vec<u32> = outcomes
            .iter()
            .filter_map(|o| o.as_ref().ok())
            .map(|d| d.key.sequence)
            .collect();
        sequences.sort_unstable();
        sequences
    }

    #[tokio::test(start_paused = true)]
    async fn test_stroke_streams_and_terminates() {
        let handle = StrokeStreamer::spawn(StreamingConfig::default(), MockAckTransport::new());

        handle.down(p(0)).await.unwrap();
        for i in 1..12 {
            handle.move_to(p(i)).await.unwrap();
        }
        handle.up().await.unwrap();

        let sender = handle.sender().clone();
        let outcomes = handle.shutdown().await.unwrap();
        assert_eq!(delivered(&outcomes), vec![1, 2, 3]);

        let emitted = sender.transport().emitted();
        let terminals: Vec<&Package> = emitted.iter().filter(|p| p.is_last()).collect();
        assert_eq!(terminals.len(), 1);
        assert_eq!(terminals[0].sequence(), 3);
        assert_eq!(terminals[0].points().len(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_quiet_pointer_flushes_partial_batch() {
        let handle = StrokeStreamer::spawn(StreamingConfig::default(), MockAckTransport::new());

        handle.down(p(0)).await.unwrap();
        handle.move_to(p(1)).await.unwrap();
        tokio::time::sleep(Duration::from_millis(600)).await;

        let emitted = handle.sender().transport().emitted();
        assert_eq!(emitted.len(), 1);
        assert!(!emitted[0].is_last());
        assert_eq!(emitted[0].points().len(), 2);

        handle.up().await.unwrap();
        let sender = handle.sender().clone();
        handle.shutdown().await.unwrap();

        let emitted = sender.transport().emitted();
        assert_eq!(emitted.len(), 2);
        assert!(emitted[1].is_last());
        assert!(emitted[1].is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_leave_ends_stroke() {
        let handle = StrokeStreamer::spawn(StreamingConfig::default(), MockAckTransport::new());

        handle.down(p(0)).await.unwrap();
        handle.pointer(PointerEvent::Leave).await.unwrap();
        let sender = handle.sender().clone();
        handle.shutdown().await.unwrap();

        let emitted = sender.transport().emitted();
        assert_eq!(emitted.len(), 1);
        assert!(emitted[0].is_standalone());
    }

    #[tokio::test(start_paused = true)]
    async fn test_shutdown_closes_open_stroke() {
        let handle = StrokeStreamer::spawn(StreamingConfig::default(), MockAckTransport::new());

        handle.down(p(0)).await.unwrap();
        handle.move_to(p(1)).await.unwrap();
        let sender = handle.sender().clone();
        let outcomes = handle.shutdown().await.unwrap();

        assert_eq!(delivered(&outcomes), vec![1]);
        assert!(sender.transport().emitted()[0].is_last());
    }

    #[tokio::test(start_paused = true)]
    async fn test_slow_ack_does_not_block_input() {
        let transport = MockAckTransport::new()
            .with_script([MockOutcome::Timeout])
            .with_latency(Duration::from_millis(10));
        let mut handle = StrokeStreamer::spawn(StreamingConfig::default(), transport);

        handle.down(p(0)).await.unwrap();
        for i in 1..10 {
            handle.move_to(p(i)).await.unwrap();
        }
        handle.up().await.unwrap();

        // Package 1 is stuck retrying while 2 and the terminal go through
        tokio::time::sleep(Duration::from_millis(100)).await;
        let early = handle.drain_outcomes();
        assert_eq!(delivered(&early), vec![2, 3]);
        assert_eq!(handle.sender().pending_count(), 1);

        let late = handle.shutdown().await.unwrap();
        assert_eq!(delivered(&late), vec![1]);
    }
}
