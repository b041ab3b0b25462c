//! Complete context pipeline integrating all classifiers.
//!
//! This module runs every sample through the three classifiers and turns
//! their state changes into [`PropertyChange`]s.
//!
//! # Architecture
//!
//! 1. **Deadline**: an overdue stability deadline fires before the sample is
//!    looked at, so the sample sees the post-deadline state
//! 2. **Orientation**: `Screen.TopEdge`, `Position.IsFlat`
//! 3. **Coverage**: `Screen.IsCovered`
//! 4. **Stability**: `Position.Stable`, `Position.Shaky`
//!
//! Changes are emitted in that order. The pipeline is synchronous and owns
//! no timer; callers with a clock use [`ContextPipeline::next_deadline_ms`]
//! and [`ContextPipeline::poll_deadline`].

use crate::config::EngineConfig;
use crate::coverage::CoverageClassifier;
use crate::orientation::OrientationClassifier;
use crate::stability::{StabilityClassifier, StabilityUpdate};
use crate::types::*;

/// Sample-in, changes-out pipeline.
#[derive(Debug, Clone)]
pub struct ContextPipeline {
    orientation: OrientationClassifier,
    coverage: CoverageClassifier,
    stability: StabilityClassifier,

    samples_processed: u64,
    last_timestamp_ms: Option<u64>,
}

impl ContextPipeline {
    /// Creates a new pipeline with given configuration.
    pub fn new(config: &EngineConfig) -> Self {
        Self {
            orientation: OrientationClassifier::new(config.orientation.clone()),
            coverage: CoverageClassifier::new(config.cover.clone()),
            stability: StabilityClassifier::new(config.context.clone()),
            samples_processed: 0,
            last_timestamp_ms: None,
        }
    }

    /// Processes a single sample through every classifier.
    ///
    /// Returns the properties that changed, in publication order.
    pub fn process_sample(&mut self, sample: &AccelSample) -> Vec<PropertyChange> {
        let mut changes = Vec::new();
        let t = sample.timestamp_ms;

        if let Some(change) = self.poll_deadline(t) {
            changes.push(change);
        }

        if let Some(last) = self.last_timestamp_ms {
            if t < last {
                tracing::warn!(timestamp_ms = t, last_ms = last, "sample timestamp went backwards");
            }
        }
        self.last_timestamp_ms = Some(t);
        self.samples_processed += 1;

        let orientation = self.orientation.process(sample);
        if let Some(edge) = orientation.top_edge {
            changes.push(PropertyChange::top_edge(edge, t));
        }
        if let Some(flat) = orientation.is_flat {
            changes.push(PropertyChange::flag(ContextProperty::PositionIsFlat, flat, t));
        }

        if let Some(covered) = self.coverage.process(sample) {
            changes.push(PropertyChange::flag(ContextProperty::ScreenIsCovered, covered, t));
        }

        let StabilityUpdate { stable, shaky } = self.stability.process(sample);
        if let Some(stable) = stable {
            changes.push(PropertyChange::flag(ContextProperty::PositionStable, stable, t));
        }
        if let Some(shaky) = shaky {
            changes.push(PropertyChange::flag(ContextProperty::PositionShaky, shaky, t));
        }

        changes
    }

    /// Fire the stability deadline if it is due at `now_ms`.
    pub fn poll_deadline(&mut self, now_ms: u64) -> Option<PropertyChange> {
        let deadline = self.stability.deadline_ms()?;
        let stable = self.stability.on_deadline(now_ms)?;
        // Report the change at the moment it became true, not when noticed
        Some(PropertyChange::flag(ContextProperty::PositionStable, stable, deadline))
    }

    /// When the pending stability deadline falls due, in sample time.
    pub fn next_deadline_ms(&self) -> Option<u64> {
        self.stability.deadline_ms()
    }

    /// Current value of every property.
    pub fn snapshot(&self) -> ContextSnapshot {
        ContextSnapshot {
            top_edge: self.orientation.top_edge(),
            is_flat: self.orientation.is_flat(),
            is_covered: self.coverage.is_covered(),
            stability: self.stability.state(),
            is_shaky: self.stability.is_shaky(),
        }
    }

    /// Returns the total sample count processed so far.
    pub fn samples_processed(&self) -> u64 {
        self.samples_processed
    }

    /// Timestamp of the most recent sample.
    pub fn last_timestamp_ms(&self) -> Option<u64> {
        self.last_timestamp_ms
    }

    /// Forget all classifier state.
    pub fn reset(&mut self) {
        self.orientation.reset();
        self.coverage.reset();
        self.stability.reset();
        self.samples_processed = 0;
        self.last_timestamp_ms = None;
    }
}

impl Default for ContextPipeline {
    fn default() -> Self {
        Self::new(&EngineConfig::default())
    }
}
