//! Transmission instrumentation
//!
//! Every send attempt is recorded with its payload size and round-trip
//! time. The log is bounded; old records fall off the front while the
//! running totals keep counting.

use std::collections::VecDeque;
use std::time::Duration;

use parking_lot::Mutex;

use strokecast_core::PackageKey;

/// One send attempt
#[derive(Debug, Clone, PartialEq)]
pub struct TransmissionRecord {
    pub key: PackageKey,
    /// 1 for the initial attempt, 2 for the first retry, ...
    pub attempt: u32,
    /// Serialized package size in bytes
    pub payload_bytes: usize,
    /// Time from emit to acknowledgement or failure
    pub rtt: Duration,
    pub acknowledged: bool,
}

/// Coarse link quality derived from round-trip time
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum ConnectionQuality {
    Excellent,
    Good,
    Fair,
    Decent,
    Poor,
}

impl ConnectionQuality {
    pub fn from_rtt(rtt: Duration) -> Self {
        match rtt.as_millis() {
            0..50 => ConnectionQuality::Excellent,
            50..100 => ConnectionQuality::Good,
            100..200 => ConnectionQuality::Fair,
            200..500 => ConnectionQuality::Decent,
            _ => ConnectionQuality::Poor,
        }
    }
}

impl std::fmt::Display for ConnectionQuality {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let label = match self {
            ConnectionQuality::Excellent => "excellent",
            ConnectionQuality::Good => "good",
            ConnectionQuality::Fair => "fair",
            ConnectionQuality::Decent => "decent",
            ConnectionQuality::Poor => "poor",
        };
        f.write_str(label)
    }
}

/// Aggregate view of the transmission log
#[derive(Debug, Clone, PartialEq)]
pub struct TransmissionSummary {
    pub attempts: u64,
    pub acknowledged: u64,
    pub failed: u64,
    /// Attempts that were retries
    pub retried: u64,
    pub total_bytes: u64,
    /// Mean round-trip time over the acknowledged attempts still in the log
    pub average_rtt: Option<Duration>,
    pub quality: Option<ConnectionQuality>,
}

#[derive(Debug, Default)]
struct Totals {
    attempts: u64,
    acknowledged: u64,
    retried: u64,
    total_bytes: u64,
}

/// Bounded log of send attempts
#[derive(Debug)]
pub struct TransmissionLog {
    records: Mutex<VecDeque<TransmissionRecord>>,
    totals: Mutex<Totals>,
    capacity: usize,
}

impl TransmissionLog {
    pub fn new(capacity: usize) -> Self {
        Self {
            records: Mutex::new(VecDeque::with_capacity(capacity.min(1024))),
            totals: Mutex::new(Totals::default()),
            capacity,
        }
    }

    pub fn record(&self, record: TransmissionRecord) {
        {
            let mut totals = self.totals.lock();
            totals.attempts += 1;
            totals.total_bytes += record.payload_bytes as u64;
            if record.acknowledged {
                totals.acknowledged += 1;
            }
            if record.attempt > 1 {
                totals.retried += 1;
            }
        }

        if self.capacity == 0 {
            return;
        }
        let mut records = self.records.lock();
        if records.len() >= self.capacity {
            records.pop_front();
        }
        records.push_back(record);
    }

    /// Records currently retained, oldest first
    pub fn records(&self) -> Vec<TransmissionRecord> {
        self.records.lock().iter().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.records.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.lock().is_empty()
    }

    pub fn summary(&self) -> TransmissionSummary {
        let (attempts, acknowledged, retried, total_bytes) = {
            let totals = self.totals.lock();
            (
                totals.attempts,
                totals.acknowledged,
                totals.retried,
                totals.total_bytes,
            )
        };

        let average_rtt = {
            let records = self.records.lock();
            let acked: Vec<Duration> = records
                .iter()
                .filter(|r| r.acknowledged)
                .map(|r| r.rtt)
                .collect();
            if acked.is_empty() {
                None
            } else {
                Some(acked.iter().sum::<Duration>() / acked.len() as u32)
            }
        };

        TransmissionSummary {
            attempts,
            acknowledged,
            failed: attempts - acknowledged,
            retried,
            total_bytes,
            average_rtt,
            quality: average_rtt.map(ConnectionQuality::from_rtt),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use strokecast_core::StrokeId;

    fn record(sequence: u32, rtt_ms: u64, acknowledged: bool) -> TransmissionRecord {
        TransmissionRecord {
            key: PackageKey {
                stroke_id: StrokeId::new("s"),
                sequence,
            },
            attempt: 1,
            payload_bytes: 100,
            rtt: Duration::from_millis(rtt_ms),
            acknowledged,
        }
    }

    #[test]
    fn test_quality_thresholds() {
        let q = |ms| ConnectionQuality::from_rtt(Duration::from_millis(ms));
        assert_eq!(q(0), ConnectionQuality::Excellent);
        assert_eq!(q(49), ConnectionQuality::Excellent);
        assert_eq!(q(50), ConnectionQuality::Good);
        assert_eq!(q(150), ConnectionQuality::Fair);
        assert_eq!(q(499), ConnectionQuality::Decent);
        assert_eq!(q(500), ConnectionQuality::Poor);
    }

    #[test]
    fn test_summary() {
        let log = TransmissionLog::new(16);
        log.record(record(1, 20, true));
        log.record(record(2, 1000, false));
        log.record(TransmissionRecord {
            attempt: 2,
            ..record(2, 60, true)
        });

        let summary = log.summary();
        assert_eq!(summary.attempts, 3);
        assert_eq!(summary.acknowledged, 2);
        assert_eq!(summary.failed, 1);
        assert_eq!(summary.retried, 1);
        assert_eq!(summary.total_bytes, 300);
        assert_eq!(summary.average_rtt, Some(Duration::from_millis(40)));
        assert_eq!(summary.quality, Some(ConnectionQuality::Excellent));
    }

    #[test]
    fn test_log_is_bounded_but_totals_keep_counting() {
        let log = TransmissionLog::new(2);
        for seq in 1..=5 {
            log.record(record(seq, 10, true));
        }

        assert_eq!(log.len(), 2);
        let sequences: Vec<u32> = log.records().iter().map(|r| r.key.sequence).collect();
        assert_eq!(sequences, vec![4, 5]);
        assert_eq!(log.summary().attempts, 5);
    }

    #[test]
    fn test_empty_summary() {
        let summary = TransmissionLog::new(4).summary();
        assert_eq!(summary.attempts, 0);
        assert!(summary.average_rtt.is_none());
        assert!(summary.quality.is_none());
    }
}
