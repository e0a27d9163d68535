//! # Strokecast Client
//!
//! Client side of real-time stroke streaming: turning pointer input into
//! acknowledged packages on the sending side, and packages back into
//! smooth strokes on the receiving side.
//!
//! ## Sending
//!
//! - [`Segmenter`] splits a stroke into packages of `package_capacity`
//!   points, flushes partial batches after a quiet period, and always ends a
//!   stroke with a terminal package
//! - [`PackageSender`] emits each package over an
//!   [`AckTransport`](strokecast_core::AckTransport) and retries with linear
//!   backoff until it is acknowledged or given up on
//! - [`StrokeStreamer`] runs both as a task fed by [`PointerEvent`]s
//!
//! ## Receiving
//!
//! - [`Reconstructor`] stitches packages together at their boundaries and
//!   fills wide gaps with [`interpolate`]
//! - [`StrokeReceiver`] adds gap detection and draws onto a [`DrawSurface`]
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use strokecast_client::{StreamingConfig, StrokeStreamer};
//! use strokecast_core::{MockAckTransport, Point};
//!
//! let handle = StrokeStreamer::spawn(StreamingConfig::default(), MockAckTransport::new());
//! handle.down(Point::now(10.0, 10.0)).await?;
//! handle.move_to(Point::now(12.0, 11.0)).await?;
//! handle.up().await?;
//! let outcomes = handle.shutdown().await?;
//! ```

pub mod config;
pub mod error;
pub mod interpolate;
pub mod metrics;
pub mod receiver;
pub mod reconstruct;
pub mod segmenter;
pub mod sender;
pub mod streamer;
pub mod surface;

// Re-export main types
pub use config::{
    ConfigWarning, ReconstructorConfig, SegmenterConfig, SenderConfig, StreamingConfig,
};
pub use error::{SendError, SendResult, StreamerError};
pub use interpolate::{MAX_POINTS_PER_SEGMENT, interpolate};
pub use metrics::{ConnectionQuality, TransmissionLog, TransmissionRecord, TransmissionSummary};
pub use receiver::StrokeReceiver;
pub use reconstruct::{PackagePosition, Reconstructor};
pub use segmenter::{Segmenter, StrokeSession};
pub use sender::{Delivery, PackageSender, PendingPackage};
pub use streamer::{PointerEvent, SendOutcome, StreamerHandle, StrokeStreamer};
pub use surface::{DrawSurface, PathSegment, RecordingSurface, SmoothPath};
