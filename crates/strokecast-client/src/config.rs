//! Configuration for the streaming client
//!
//! Each component has its own config struct with sensible defaults;
//! [`StreamingConfig`] bundles them and offers presets for common network
//! conditions.

use std::time::Duration;

use strokecast_core::GapDetectorConfig;

/// Configuration for stroke segmentation
#[derive(Debug, Clone)]
pub struct SegmenterConfig {
    /// Points per package; a package is emitted as soon as this many are buffered
    pub package_capacity: usize,
    /// Quiet period after which a partial batch is flushed
    pub flush_timeout: Duration,
}

impl Default for SegmenterConfig {
    fn default() -> Self {
        Self {
            package_capacity: 5,
            flush_timeout: Duration::from_millis(500),
        }
    }
}

/// Configuration for acknowledged sending
#[derive(Debug, Clone)]
pub struct SenderConfig {
    /// Retries after the initial attempt
    pub max_retries: u32,
    /// The k-th retry waits `backoff_step * k`
    pub backoff_step: Duration,
    /// How long to wait for an acknowledgement before counting the attempt as failed
    pub ack_timeout: Duration,
    /// Number of transmission records kept for instrumentation
    pub log_capacity: usize,
}

impl Default for SenderConfig {
    fn default() -> Self {
        Self {
            max_retries: 3,
            backoff_step: Duration::from_millis(100),
            ack_timeout: Duration::from_secs(1),
            log_capacity: 1024,
        }
    }
}

impl SenderConfig {
    /// Delay before the given retry (1-based)
    pub fn backoff_for(&self, retry: u32) -> Duration {
        self.backoff_step.saturating_mul(retry)
    }
}

/// Configuration for stroke reconstruction on the receiving side
#[derive(Debug, Clone)]
pub struct ReconstructorConfig {
    /// Largest distance between consecutive points before intermediate
    /// points are synthesized
    pub max_gap: f64,
    /// Curvature damping for the quadratic control point
    pub damping: f64,
    /// A terminal package whose first point lies closer than this to the
    /// previous boundary point drops that first point
    pub duplicate_tolerance: f64,
}

impl Default for ReconstructorConfig {
    fn default() -> Self {
        Self {
            max_gap: 5.0,
            damping: 0.3,
            duplicate_tolerance: 1.0,
        }
    }
}

/// Configuration for the whole client pipeline
#[derive(Debug, Clone, Default)]
pub struct StreamingConfig {
    pub segmenter: SegmenterConfig,
    pub sender: SenderConfig,
    pub reconstructor: ReconstructorConfig,
    pub gap: GapDetectorConfig,
}

impl StreamingConfig {
    /// Smaller packages and short timeouts for fast, reliable links
    pub fn low_latency() -> Self {
        Self {
            segmenter: SegmenterConfig {
                package_capacity: 3,
                flush_timeout: Duration::from_millis(100),
            },
            sender: SenderConfig {
                max_retries: 2,
                backoff_step: Duration::from_millis(50),
                ack_timeout: Duration::from_millis(500),
                log_capacity: 1024,
            },
            reconstructor: ReconstructorConfig::default(),
            gap: GapDetectorConfig::default(),
        }
    }

    /// Larger packages and more patient retries for lossy links
    pub fn lossy_network() -> Self {
        Self {
            segmenter: SegmenterConfig {
                package_capacity: 8,
                flush_timeout: Duration::from_millis(500),
            },
            sender: SenderConfig {
                max_retries: 5,
                backoff_step: Duration::from_millis(200),
                ack_timeout: Duration::from_secs(2),
                log_capacity: 4096,
            },
            reconstructor: ReconstructorConfig {
                max_gap: 8.0,
                ..ReconstructorConfig::default()
            },
            gap: GapDetectorConfig {
                abandoned_after: Duration::from_secs(1200),
                ..GapDetectorConfig::default()
            },
        }
    }

    /// Check for settings that will misbehave
    ///
    /// Returns every problem found; an empty list means the config is sane.
    pub fn validate(&self) -> Vec<ConfigWarning> {
        let mut warnings = Vec::new();

        if self.segmenter.package_capacity == 0 {
            warnings.push(ConfigWarning::ZeroPackageCapacity);
        }
        if self.segmenter.flush_timeout.is_zero() {
            warnings.push(ConfigWarning::ZeroFlushTimeout);
        }
        if self.sender.ack_timeout.is_zero() {
            warnings.push(ConfigWarning::ZeroAckTimeout);
        }
        if self.sender.log_capacity == 0 {
            warnings.push(ConfigWarning::ZeroLogCapacity);
        }
        if !(self.reconstructor.max_gap.is_finite() && self.reconstructor.max_gap > 0.0) {
            warnings.push(ConfigWarning::InvalidMaxGap(self.reconstructor.max_gap));
        }
        if !(0.0..=1.0).contains(&self.reconstructor.damping) {
            warnings.push(ConfigWarning::DampingOutOfRange(self.reconstructor.damping));
        }
        if self.gap.completed_retention > self.gap.abandoned_after {
            warnings.push(ConfigWarning::RetentionExceedsAbandonment);
        }

        warnings
    }
}

/// A problem found by [`StreamingConfig::validate`]
#[derive(Debug, Clone, PartialEq)]
pub enum ConfigWarning {
    /// Packages could never fill; every point would wait for the flush timer
    ZeroPackageCapacity,
    /// Partial batches would be flushed on every point
    ZeroFlushTimeout,
    /// Every attempt would time out immediately
    ZeroAckTimeout,
    ZeroLogCapacity,
    /// Interpolation needs a positive, finite spacing
    InvalidMaxGap(f64),
    /// Damping outside [0, 1] overshoots the curve
    DampingOutOfRange(f64),
    /// Completed strokes outlive abandoned ones
    RetentionExceedsAbandonment,
}

impl std::fmt::Display for ConfigWarning {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigWarning::ZeroPackageCapacity => write!(f, "package_capacity is 0"),
            ConfigWarning::ZeroFlushTimeout => write!(f, "flush_timeout is 0"),
            ConfigWarning::ZeroAckTimeout => write!(f, "ack_timeout is 0"),
            ConfigWarning::ZeroLogCapacity => write!(f, "log_capacity is 0"),
            ConfigWarning::InvalidMaxGap(gap) => {
                write!(f, "max_gap must be positive and finite (got {gap})")
            }
            ConfigWarning::DampingOutOfRange(damping) => {
                write!(f, "damping should be within [0, 1] (got {damping})")
            }
            ConfigWarning::RetentionExceedsAbandonment => {
                write!(f, "completed_retention exceeds abandoned_after")
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = StreamingConfig::default();
        assert_eq!(config.segmenter.package_capacity, 5);
        assert_eq!(config.segmenter.flush_timeout, Duration::from_millis(500));
        assert_eq!(config.sender.max_retries, 3);
        assert_eq!(config.sender.backoff_step, Duration::from_millis(100));
        assert_eq!(config.reconstructor.max_gap, 5.0);
        assert_eq!(config.reconstructor.damping, 0.3);
    }

    #[test]
    fn test_backoff_is_linear() {
        let config = SenderConfig::default();
        assert_eq!(config.backoff_for(1), Duration::from_millis(100));
        assert_eq!(config.backoff_for(2), Duration::from_millis(200));
        assert_eq!(config.backoff_for(3), Duration::from_millis(300));
    }

    #[test]
    fn test_presets_validate_cleanly() {
        assert!(StreamingConfig::default().validate().is_empty());
        assert!(StreamingConfig::low_latency().validate().is_empty());
        assert!(StreamingConfig::lossy_network().validate().is_empty());
    }

    #[test]
    fn test_validate_reports_every_problem() {
        let mut config = StreamingConfig::default();
        config.segmenter.package_capacity = 0;
        config.reconstructor.max_gap = f64::NAN;
        config.reconstructor.damping = 1.5;

        let warnings = config.validate();
        assert_eq!(warnings.len(), 3);
        assert!(warnings.contains(&ConfigWarning::ZeroPackageCapacity));
        assert!(warnings.contains(&ConfigWarning::DampingOutOfRange(1.5)));
        assert!(
            warnings
                .iter()
                .any(|w| matches!(w, ConfigWarning::InvalidMaxGap(g) if g.is_nan()))
        );
    }
}
