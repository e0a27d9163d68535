//! Per-stroke gap detection and completeness tracking
//!
//! The detector records every package it sees, keyed by stroke id and
//! package sequence number, and after each insertion reports which
//! sequence numbers up to the highest one seen are still missing.
//!
//! A stroke is complete once its terminal package has been observed and
//! no sequence number from 1 to the highest known one is missing.
//! Completion is monotonic: a complete stroke stays complete until the
//! detector evicts it.
//!
//! State is partitioned by stroke id in a [`DashMap`], so concurrent
//! strokes never contend on the same entry while insertions for one
//! stroke are serialized by its shard lock.

use std::collections::BTreeMap;
use std::time::{Duration, Instant};

use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, instrument, warn};

use crate::package::{MAX_PACKAGE_SEQUENCE, Package, StrokeId};

/// Configuration for gap detection retention
#[derive(Debug, Clone)]
pub struct GapDetectorConfig {
    /// How long a completed stroke is remembered after completion
    pub completed_retention: Duration,
    /// How long an incomplete stroke may go without new packages before it
    /// is considered abandoned
    pub abandoned_after: Duration,
    /// Upper bound on tracked strokes; the least recently active stroke is
    /// evicted when exceeded
    pub max_strokes: usize,
}

impl Default for GapDetectorConfig {
    fn default() -> Self {
        Self {
            completed_retention: Duration::from_secs(300),
            abandoned_after: Duration::from_secs(600),
            max_strokes: 10_000,
        }
    }
}

/// Result of recording one package
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CompletionResult {
    pub stroke_id: StrokeId,
    pub is_complete: bool,
    /// Missing sequence numbers in ascending order
    pub missing_packages: Vec<u32>,
    /// Highest package sequence number seen so far
    pub total_packages: u32,
}

/// Why a stroke left the detector
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EvictionReason {
    /// Completed and past its retention window
    Retired,
    /// Never completed and idle past `abandoned_after`
    Abandoned,
    /// Removed to stay under `max_strokes`
    Capacity,
}

#[derive(Debug)]
struct StrokeEntry {
    packages: BTreeMap<u32, Package>,
    highest: u32,
    terminal: Option<u32>,
    completed_at: Option<Instant>,
    last_activity: Instant,
}

impl StrokeEntry {
    fn new(now: Instant) -> Self {
        Self {
            packages: BTreeMap::new(),
            highest: 0,
            terminal: None,
            completed_at: None,
            last_activity: now,
        }
    }

    fn record(&mut self, package: Package, now: Instant) {
        let sequence = package.sequence();
        self.highest = self.highest.max(sequence);
        self.last_activity = now;

        if package.is_last() {
            match self.terminal {
                Some(existing) if existing != sequence => {
                    warn!(
                        existing,
                        sequence, "Second terminal package for stroke, keeping the first"
                    );
                }
                _ => self.terminal = Some(sequence),
            }
        }

        self.packages.insert(sequence, package);

        if self.completed_at.is_none() && self.terminal.is_some() && self.missing().is_empty() {
            self.completed_at = Some(now);
        }
    }

    fn missing(&self) -> Vec<u32> {
        (1..=self.highest)
            .filter(|seq| !self.packages.contains_key(seq))
            .collect()
    }

    fn result(&self, stroke_id: &StrokeId) -> CompletionResult {
        CompletionResult {
            stroke_id: stroke_id.clone(),
            is_complete: self.completed_at.is_some(),
            missing_packages: self.missing(),
            total_packages: self.highest,
        }
    }

    fn eviction_reason(&self, now: Instant, config: &GapDetectorConfig) -> Option<EvictionReason> {
        match self.completed_at {
            Some(done) if now.saturating_duration_since(done) >= config.completed_retention => {
                Some(EvictionReason::Retired)
            }
            Some(_) => None,
            None if now.saturating_duration_since(self.last_activity) >= config.abandoned_after => {
                Some(EvictionReason::Abandoned)
            }
            None => None,
        }
    }
}

/// Tracks received packages per stroke and reports gaps
pub struct GapDetector {
    strokes: DashMap<StrokeId, StrokeEntry>,
    config: GapDetectorConfig,
}

impl Default for GapDetector {
    fn default() -> Self {
        Self::new(GapDetectorConfig::default())
    }
}

impl GapDetector {
    /// Create a new detector
    pub fn new(config: GapDetectorConfig) -> Self {
        Self {
            strokes: DashMap::new(),
            config,
        }
    }

    /// Record a package and report the stroke's status
    #[instrument(skip(self, package), fields(stroke_id = %package.stroke_id().short(), seq = package.sequence(), last = package.is_last()))]
    pub fn add_package(&self, package: Package) -> CompletionResult {
        self.add_package_at(package, Instant::now())
    }

    /// Record a package using an explicit clock reading
    ///
    /// Packages numbered above [`MAX_PACKAGE_SEQUENCE`] are not recorded;
    /// the stroke's current status is returned unchanged.
    pub fn add_package_at(&self, package: Package, now: Instant) -> CompletionResult {
        let stroke_id = package.stroke_id().clone();

        if package.sequence() > MAX_PACKAGE_SEQUENCE {
            warn!(sequence = package.sequence(), "Ignoring package beyond the sequence limit");
            return self.status(&stroke_id).unwrap_or_else(|| CompletionResult {
                stroke_id,
                is_complete: false,
                missing_packages: Vec::new(),
                total_packages: 0,
            });
        }

        // The shard guard must be released before the capacity check below.
        let result = {
            let mut entry = self.strokes.entry(stroke_id.clone()).or_insert_with(|| {
                debug!("Tracking new stroke");
                StrokeEntry::new(now)
            });
            let was_complete = entry.completed_at.is_some();
            entry.record(package, now);
            let result = entry.result(&stroke_id);
            if result.is_complete && !was_complete {
                info!(packages = result.total_packages, "Stroke complete");
            }
            result
        };

        if !result.is_complete && !result.missing_packages.is_empty() {
            debug!(missing = ?result.missing_packages, "Stroke has gaps");
        }

        if self.strokes.len() > self.config.max_strokes {
            self.evict_least_recent();
        }

        result
    }

    /// Sequence numbers in `[1, up_to]` not yet received for a stroke
    ///
    /// Returns an empty list for unknown strokes.
    pub fn detect_gaps(&self, stroke_id: &StrokeId, up_to: u32) -> Vec<u32> {
        match self.strokes.get(stroke_id) {
            Some(entry) => (1..=up_to.min(MAX_PACKAGE_SEQUENCE))
                .filter(|seq| !entry.packages.contains_key(seq))
                .collect(),
            None => Vec::new(),
        }
    }

    /// Current status of a stroke, if tracked
    pub fn status(&self, stroke_id: &StrokeId) -> Option<CompletionResult> {
        self.strokes.get(stroke_id).map(|entry| entry.result(stroke_id))
    }

    /// Check if a stroke has been marked complete
    pub fn is_complete(&self, stroke_id: &StrokeId) -> bool {
        self.strokes
            .get(stroke_id)
            .map(|entry| entry.completed_at.is_some())
            .unwrap_or(false)
    }

    /// Packages received for a stroke, in sequence order
    pub fn packages(&self, stroke_id: &StrokeId) -> Vec<Package> {
        self.strokes
            .get(stroke_id)
            .map(|entry| entry.packages.values().cloned().collect())
            .unwrap_or_default()
    }

    /// Number of strokes being tracked
    pub fn tracked_count(&self) -> usize {
        self.strokes.len()
    }

    /// Number of tracked strokes that are complete
    pub fn completed_count(&self) -> usize {
        self.strokes
            .iter()
            .filter(|entry| entry.completed_at.is_some())
            .count()
    }

    /// Forget a stroke
    pub fn remove(&self, stroke_id: &StrokeId) -> bool {
        self.strokes.remove(stroke_id).is_some()
    }

    /// Evict retired and abandoned strokes
    pub fn evict_expired(&self) -> Vec<(StrokeId, EvictionReason)> {
        self.evict_expired_at(Instant::now())
    }

    /// Evict retired and abandoned strokes using an explicit clock reading
    pub fn evict_expired_at(&self, now: Instant) -> Vec<(StrokeId, EvictionReason)> {
        let mut evicted = Vec::new();
        self.strokes.retain(|stroke_id, entry| {
            match entry.eviction_reason(now, &self.config) {
                Some(reason) => {
                    if reason == EvictionReason::Abandoned {
                        warn!(
                            stroke_id = %stroke_id.short(),
                            missing = ?entry.missing(),
                            terminal_seen = entry.terminal.is_some(),
                            "Abandoning incomplete stroke"
                        );
                    }
                    evicted.push((stroke_id.clone(), reason));
                    false
                }
                None => true,
            }
        });
        evicted
    }

    fn evict_least_recent(&self) {
        let oldest = self
            .strokes
            .iter()
            .min_by_key(|entry| entry.last_activity)
            .map(|entry| entry.key().clone());

        if let Some(stroke_id) = oldest {
            warn!(
                stroke_id = %stroke_id.short(),
                max = self.config.max_strokes,
                "Stroke capacity reached, evicting least recently active stroke"
            );
            self.strokes.remove(&stroke_id);
        }
    }
}
