//! Stationary detection (`Position.Stable`) and its high-variance companion
//! (`Position.Shaky`).
//!
//! The classifier keeps a window of rate-limited acceleration magnitudes and
//! applies two independent rules over it:
//!
//! - **Fast to unstable**: a short run of consecutive samples (two by default)
//!   diverging from the prevailing cluster flips the flag immediately. A
//!   single spike never does. The prevailing cluster is the mean of the
//!   window entries that were not themselves divergent, so a spike stays out
//!   of the reference for as long as it sits in the window.
//! - **Slow to stable**: the flag only returns once the window is full and its
//!   variance is below the stable threshold, so every divergent sample must
//!   have been evicted first.
//!
//! A deadline backs the second rule. While the state is not stable a
//! deadline is pending; it is re-armed by every divergent sample and, when it
//! expires, forces the state to stable and clears the window, so the samples
//! that follow become the new reference. This bounds time-to-stable after
//! startup or an ambiguous transient.
//!
//! The deadline is expressed in sample time. Whoever drives the classifier
//! (the pipeline, or the service's timer) calls [`StabilityClassifier::on_deadline`].

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::signal::{MagnitudeNormalizer, StabilityWindow};
use crate::types::{AccelSample, Stability};

/// Default stationary timeout in seconds.
pub const DEFAULT_STABILITY_TIMEOUT_SECS: i64 = 60;

/// Longest accepted stationary timeout (one day).
pub const MAX_STABILITY_TIMEOUT_SECS: i64 = 86_400;

/// Upper bound on window entries, one day at one entry per second.
pub const MAX_WINDOW_CAPACITY: usize = 86_400;

/// Parameters for stability detection.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StabilityConfig {
    /// Window span and deadline, in seconds. Non-positive means default,
    /// anything above [`MAX_STABILITY_TIMEOUT_SECS`] is capped.
    pub stability_timeout: i64,

    /// Nominal spacing of window entries. Faster samples are dropped.
    pub sample_interval_ms: u64,

    /// Window variance below which the device is stable.
    pub stable_variance: f64,

    /// Window variance above which the device is shaky.
    pub shaky_variance: f64,

    /// Relative hysteresis around `shaky_variance`.
    pub hysteresis: f64,

    /// Distance (milli-g) from the prevailing cluster that makes a sample
    /// divergent.
    pub divergence_threshold: f64,

    /// Consecutive divergent samples needed to flip to unstable.
    pub unstable_run: usize,

    /// Vectors shorter than this (milli-g) are ignored.
    pub degenerate_magnitude: f64,
}

impl Default for StabilityConfig {
    fn default() -> Self {
        Self {
            stability_timeout: DEFAULT_STABILITY_TIMEOUT_SECS,
            sample_interval_ms: 1000,
            stable_variance: 7.0,
            shaky_variance: 300.0,
            hysteresis: 0.1,
            divergence_threshold: 20.0,
            unstable_run: 2,
            degenerate_magnitude: 100.0,
        }
    }
}

impl StabilityConfig {
    /// Effective timeout, with non-positive values mapped to the default and
    /// oversized ones capped.
    pub fn timeout(&self) -> Duration {
        let secs = if self.stability_timeout > 0 {
            self.stability_timeout.min(MAX_STABILITY_TIMEOUT_SECS)
        } else {
            DEFAULT_STABILITY_TIMEOUT_SECS
        };
        Duration::from_secs(secs.unsigned_abs())
    }

    /// Effective timeout in milliseconds.
    pub fn timeout_ms(&self) -> u64 {
        u64::try_from(self.timeout().as_millis()).unwrap_or(u64::MAX)
    }

    /// Window capacity: one entry per sample interval over the timeout,
    /// at most [`MAX_WINDOW_CAPACITY`].
    pub fn window_capacity(&self) -> usize {
        let interval_ms = self.sample_interval_ms.max(1);
        let entries = self.timeout_ms().div_ceil(interval_ms).max(1);
        usize::try_from(entries)
            .unwrap_or(MAX_WINDOW_CAPACITY)
            .min(MAX_WINDOW_CAPACITY)
    }
}

/// Changes produced by one sample or deadline. `None` means unchanged.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StabilityUpdate {
    pub stable: Option<bool>,
    pub shaky: Option<bool>,
}

impl StabilityUpdate {
    pub fn is_empty(&self) -> bool {
        self.stable.is_none() && self.shaky.is_none()
    }
}

/// Windowed stationary classifier.
#[derive(Debug, Clone)]
pub struct StabilityClassifier {
    config: StabilityConfig,
    timeout_ms: u64,

    normalizer: MagnitudeNormalizer,
    window: StabilityWindow,

    /// Consecutive divergent samples at the head of the window.
    divergent_streak: usize,

    state: Stability,
    shaky: Option<bool>,

    /// Sample-time deadline for the fallback to stable.
    deadline_ms: Option<u64>,

    deadline_fired_count: u64,
}

impl StabilityClassifier {
    pub fn new(config: StabilityConfig) -> Self {
        let timeout_ms = config.timeout_ms();
        let window = StabilityWindow::new(config.window_capacity());
        let normalizer = MagnitudeNormalizer::new(config.sample_interval_ms);

        Self {
            config,
            timeout_ms,
            normalizer,
            window,
            divergent_streak: 0,
            state: Stability::Unknown,
            shaky: None,
            deadline_ms: None,
            deadline_fired_count: 0,
        }
    }

    /// Feed one sample.
    pub fn process(&mut self, sample: &AccelSample) -> StabilityUpdate {
        if sample.is_degenerate(self.config.degenerate_magnitude) {
            return StabilityUpdate::default();
        }

        let magnitude = match self.normalizer.normalize(sample) {
            Some(magnitude) => magnitude,
            None => return StabilityUpdate::default(),
        };

        let divergent = self.is_divergent(magnitude);
        if divergent {
            self.divergent_streak += 1;
        } else {
            self.divergent_streak = 0;
        }
        self.window.push_marked(magnitude, divergent);

        let previous = self.state;
        if self.divergent_streak >= self.config.unstable_run.max(1) {
            self.state = Stability::Unstable;
        } else if self.window.is_full() && self.window.variance() < self.config.stable_variance {
            self.state = Stability::Stable;
        }

        if self.state == Stability::Stable {
            self.deadline_ms = None;
        } else if divergent || self.deadline_ms.is_none() {
            self.deadline_ms = Some(sample.timestamp_ms.saturating_add(self.timeout_ms));
        }

        tracing::trace!(
            magnitude,
            divergent,
            streak = self.divergent_streak,
            window = self.window.len(),
            outliers = self.window.outlier_count(),
            "stability sample"
        );

        StabilityUpdate {
            stable: self.changed(previous),
            shaky: self.update_shaky(),
        }
    }

    /// Apply the fallback deadline if it is due at `now_ms`.
    ///
    /// Returns `Some(true)` when this turned the published state to stable.
    pub fn on_deadline(&mut self, now_ms: u64) -> Option<bool> {
        let deadline = self.deadline_ms?;
        if now_ms < deadline {
            return None;
        }

        tracing::debug!(deadline_ms = deadline, now_ms, "stationary timeout triggered");
        self.deadline_ms = None;
        self.deadline_fired_count += 1;
        self.divergent_streak = 0;
        // Whatever comes next is the new reference
        self.window.clear();

        let previous = self.state;
        self.state = Stability::Stable;
        self.changed(previous)
    }

    /// Pending deadline in sample time, if any.
    pub fn deadline_ms(&self) -> Option<u64> {
        self.deadline_ms
    }

    pub fn state(&self) -> Stability {
        self.state
    }

    pub fn is_shaky(&self) -> Option<bool> {
        self.shaky
    }

    pub fn window(&self) -> &StabilityWindow {
        &self.window
    }

    pub fn config(&self) -> &StabilityConfig {
        &self.config
    }

    /// How often the fallback deadline has fired.
    pub fn deadline_fired_count(&self) -> u64 {
        self.deadline_fired_count
    }

    /// Forget all history and return to the unknown state.
    pub fn reset(&mut self) {
        self.normalizer.reset();
        self.window.clear();
        self.divergent_streak = 0;
        self.state = Stability::Unknown;
        self.shaky = None;
        self.deadline_ms = None;
    }

    // =========================================================================
    // PRIVATE METHODS
    // =========================================================================

    /// Compare against the window entries that were not divergent themselves.
    fn is_divergent(&self, magnitude: f64) -> bool {
        match self.window.consistent_mean() {
            Some(prevailing) => (magnitude - prevailing).abs() > self.config.divergence_threshold,
            None => false,
        }
    }

    fn changed(&self, previous: Stability) -> Option<bool> {
        if self.state == previous {
            return None;
        }
        tracing::debug!(from = ?previous, to = ?self.state, "stability changed");
        self.state.as_bool()
    }

    fn update_shaky(&mut self) -> Option<bool> {
        if !self.window.is_full() {
            return None;
        }

        let variance = self.window.variance();
        let high = self.config.shaky_variance * (1.0 + self.config.hysteresis);
        let low = self.config.shaky_variance * (1.0 - self.config.hysteresis);

        let shaky = if variance > high {
            true
        } else if variance < low {
            false
        } else {
            return None;
        };

        if self.shaky == Some(shaky) {
            return None;
        }
        self.shaky = Some(shaky);
        Some(shaky)
    }
}

impl Default for StabilityClassifier {
    fn default() -> Self {
        Self::new(StabilityConfig::default())
    }
}
