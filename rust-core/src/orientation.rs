//! Screen edge and flatness classification.
//!
//! The classifier turns each accelerometer sample into two independent
//! decisions:
//! - which screen edge points up (`Screen.TopEdge`)
//! - whether the device lies flat (`Position.IsFlat`)
//!
//! Both come from the tilt of the gravity vector along the two horizontal
//! axes. The x axis tilt is the *landscape* angle, the y axis tilt the
//! *portrait* angle. A family fires when its angle exceeds its configured
//! threshold; the family of the edge currently held is tested first, so a
//! device held in portrait stays in portrait until the portrait tilt drops
//! below its own threshold.
//!
//! Classification is sticky. When neither family fires the edge is kept,
//! and values are only reported when they change.

use std::collections::VecDeque;

use serde::{Deserialize, Serialize};

use crate::types::{AccelSample, TopEdge};

const RADIANS_TO_DEGREES: f64 = 180.0 / std::f64::consts::PI;

/// Minimum tilt (degrees) needed to flip between the two edges of the held
/// family.
const SAME_AXIS_LIMIT: i32 = 5;

/// Parameters for orientation classification.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OrientationConfig {
    /// Landscape (x axis) tilt in degrees that must be exceeded to decide
    /// Left/Right.
    pub threshold_landscape: i32,

    /// Portrait (y axis) tilt in degrees that must be exceeded to decide
    /// Top/Bottom.
    pub threshold_portrait: i32,

    /// Lower bound for `|v|² / 1000`; samples below are discarded.
    pub overflow_min: i64,

    /// Upper bound for `|v|² / 1000`; samples above are discarded.
    pub overflow_max: i64,

    /// Number of samples averaged before classifying. 1 disables smoothing.
    pub buffer_size: usize,

    /// Samples older than this relative to the newest leave the average.
    pub discard_time_ms: u64,

    /// Vectors shorter than this (milli-g) carry no usable direction.
    pub degenerate_magnitude: f64,
}

impl Default for OrientationConfig {
    fn default() -> Self {
        Self {
            threshold_landscape: 25,
            threshold_portrait: 20,
            overflow_min: 0,
            overflow_max: i32::MAX as i64,
            buffer_size: 1,
            discard_time_ms: 750,
            degenerate_magnitude: 100.0,
        }
    }
}

/// Which tilt axis is being evaluated.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum TiltFamily {
    Landscape,
    Portrait,
}

impl TiltFamily {
    fn other(self) -> Self {
        match self {
            TiltFamily::Landscape => TiltFamily::Portrait,
            TiltFamily::Portrait => TiltFamily::Landscape,
        }
    }
}

/// Changes produced by one sample. `None` means unchanged.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct OrientationUpdate {
    pub top_edge: Option<TopEdge>,
    pub is_flat: Option<bool>,
}

impl OrientationUpdate {
    pub fn is_empty(&self) -> bool {
        self.top_edge.is_none() && self.is_flat.is_none()
    }
}

/// Screen edge and flatness classifier.
#[derive(Debug, Clone)]
pub struct OrientationClassifier {
    config: OrientationConfig,

    /// Recent accepted samples for optional smoothing.
    buffer: VecDeque<AccelSample>,

    top_edge: TopEdge,
    is_flat: Option<bool>,

    sample_count: u64,
    discarded_count: u64,
}

impl OrientationClassifier {
    pub fn new(config: OrientationConfig) -> Self {
        let capacity = config.buffer_size.max(1);
        Self {
            config,
            buffer: VecDeque::with_capacity(capacity),
            top_edge: TopEdge::Unknown,
            is_flat: None,
            sample_count: 0,
            discarded_count: 0,
        }
    }

    /// Classify one sample and report what changed.
    pub fn process(&mut self, sample: &AccelSample) -> OrientationUpdate {
        if !self.accepts(sample) {
            self.discarded_count += 1;
            tracing::trace!(
                x = sample.x,
                y = sample.y,
                z = sample.z,
                "orientation sample discarded, out of range or degenerate"
            );
            return OrientationUpdate::default();
        }
        self.sample_count += 1;

        let averaged = self.smooth(sample);
        let landscape = tilt_degrees(averaged.x, averaged.y, averaged.z);
        let portrait = tilt_degrees(averaged.y, averaged.x, averaged.z);

        let mut update = OrientationUpdate::default();

        if let Some(edge) = self.decide_edge(landscape, portrait) {
            if edge != self.top_edge {
                tracing::debug!(from = ?self.top_edge, to = ?edge, "top edge changed");
                self.top_edge = edge;
                update.top_edge = Some(edge);
            }
        }

        let flat = !self.fires(TiltFamily::Landscape, landscape)
            && !self.fires(TiltFamily::Portrait, portrait);
        if self.is_flat != Some(flat) {
            tracing::debug!(is_flat = flat, "flatness changed");
            self.is_flat = Some(flat);
            update.is_flat = Some(flat);
        }

        update
    }

    /// Currently held edge.
    pub fn top_edge(&self) -> TopEdge {
        self.top_edge
    }

    /// Current flatness, `None` before the first accepted sample.
    pub fn is_flat(&self) -> Option<bool> {
        self.is_flat
    }

    /// (classified, discarded) sample counters.
    pub fn statistics(&self) -> (u64, u64) {
        (self.sample_count, self.discarded_count)
    }

    pub fn config(&self) -> &OrientationConfig {
        &self.config
    }

    pub fn reset(&mut self) {
        self.buffer.clear();
        self.top_edge = TopEdge::Unknown;
        self.is_flat = None;
        self.sample_count = 0;
        self.discarded_count = 0;
    }

    // =========================================================================
    // PRIVATE METHODS
    // =========================================================================

    fn accepts(&self, sample: &AccelSample) -> bool {
        if sample.is_degenerate(self.config.degenerate_magnitude) {
            return false;
        }
        let scaled = sample.magnitude_squared() / 1000;
        scaled >= self.config.overflow_min as i128 && scaled <= self.config.overflow_max as i128
    }

    fn smooth(&mut self, sample: &AccelSample) -> AccelSample {
        let max_size = self.config.buffer_size.max(1);
        self.buffer.push_back(*sample);

        while self.buffer.len() > max_size
            || (self.buffer.len() > 1
                && self.buffer.front().is_some_and(|oldest| {
                    sample.timestamp_ms.saturating_sub(oldest.timestamp_ms)
                        > self.config.discard_time_ms
                }))
        {
            self.buffer.pop_front();
        }

        let n = self.buffer.len() as i64;
        let (sx, sy, sz) = self.buffer.iter().fold((0i64, 0i64, 0i64), |acc, s| {
            (acc.0 + s.x as i64, acc.1 + s.y as i64, acc.2 + s.z as i64)
        });

        AccelSample::new(
            sample.timestamp_ms,
            (sx / n) as i32,
            (sy / n) as i32,
            (sz / n) as i32,
        )
    }

    fn threshold(&self, family: TiltFamily) -> i32 {
        match family {
            TiltFamily::Landscape => self.config.threshold_landscape,
            TiltFamily::Portrait => self.config.threshold_portrait,
        }
    }

    fn fires(&self, family: TiltFamily, angle: i32) -> bool {
        angle.abs() > self.threshold(family)
    }

    /// Edge decided by this sample, `None` when no family fires.
    fn decide_edge(&self, landscape: i32, portrait: i32) -> Option<TopEdge> {
        let first = if self.top_edge.is_portrait() {
            TiltFamily::Portrait
        } else {
            TiltFamily::Landscape
        };

        [first, first.other()].into_iter().find_map(|family| {
            let angle = match family {
                TiltFamily::Landscape => landscape,
                TiltFamily::Portrait => portrait,
            };
            if self.fires(family, angle) {
                Some(self.rotate(family, angle))
            } else {
                None
            }
        })
    }

    fn rotate(&self, family: TiltFamily, angle: i32) -> TopEdge {
        let (edge, held_in_family) = match family {
            TiltFamily::Portrait => (
                if angle >= 0 { TopEdge::Top } else { TopEdge::Bottom },
                self.top_edge.is_portrait(),
            ),
            TiltFamily::Landscape => (
                if angle >= 0 { TopEdge::Right } else { TopEdge::Left },
                self.top_edge.is_landscape(),
            ),
        };

        if held_in_family && angle.abs() < SAME_AXIS_LIMIT {
            self.top_edge
        } else {
            edge
        }
    }
}

impl Default for OrientationClassifier {
    fn default() -> Self {
        Self::new(OrientationConfig::default())
    }
}

/// Tilt of `axis` out of the plane spanned by the other two, in whole degrees.
fn tilt_degrees(axis: i32, other_a: i32, other_b: i32) -> i32 {
    let axis = axis as f64;
    let rest = (other_a as f64).hypot(other_b as f64);
    (axis.atan2(rest) * RADIANS_TO_DEGREES).round() as i32
}
