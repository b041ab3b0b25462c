//! Signal conditioning for the stability classifier.
//!
//! This module provides the low-level pieces the stability decision is built
//! from:
//! - Magnitude normalization with rate limiting (one value per interval)
//! - A fixed-capacity circular window of recent magnitudes with dispersion
//!   statistics
//!
//! Design note: the window has a fixed footprint decided at construction.
//! Pushing never allocates.

use crate::types::AccelSample;

/// Turns raw samples into a rate-limited magnitude stream.
///
/// Samples arriving closer than `min_interval_ms` to the last accepted one are
/// dropped, so the downstream window spans a predictable duration regardless of
/// the sensor's native rate.
#[derive(Debug, Clone)]
pub struct MagnitudeNormalizer {
    min_interval_ms: u64,
    last_accepted_ms: Option<u64>,
    accepted: u64,
    discarded: u64,
}

impl MagnitudeNormalizer {
    pub fn new(min_interval_ms: u64) -> Self {
        Self {
            min_interval_ms,
            last_accepted_ms: None,
            accepted: 0,
            discarded: 0,
        }
    }

    /// Returns the sample magnitude, or `None` if the sample came too soon.
    pub fn normalize(&mut self, sample: &AccelSample) -> Option<f64> {
        if let Some(last) = self.last_accepted_ms {
            if sample.timestamp_ms.saturating_sub(last) < self.min_interval_ms {
                self.discarded += 1;
                tracing::trace!(
                    timestamp_ms = sample.timestamp_ms,
                    "sample discarded by normalizer, interval too short"
                );
                return None;
            }
        }

        self.last_accepted_ms = Some(sample.timestamp_ms);
        self.accepted += 1;
        Some(sample.magnitude())
    }

    /// (accepted, discarded) counters.
    pub fn statistics(&self) -> (u64, u64) {
        (self.accepted, self.discarded)
    }

    pub fn reset(&mut self) {
        self.last_accepted_ms = None;
        self.accepted = 0;
        self.discarded = 0;
    }
}

/// Fixed-capacity FIFO of recent magnitudes.
///
/// Once full, every push evicts the oldest entry. Each entry carries an
/// outlier mark set by the caller; marked entries still count towards the
/// variance but not towards [`StabilityWindow::consistent_mean`]. Statistics
/// are recomputed over the live entries on demand; the capacity is small (one
/// entry per sample interval of the stability timeout) so this stays cheap and
/// exact.
#[derive(Debug, Clone)]
pub struct StabilityWindow {
    buffer: Vec<f64>,
    outliers: Vec<bool>,
    /// Index of the next write.
    head: usize,
    len: usize,
}

impl StabilityWindow {
    /// Create an empty window. A zero capacity is raised to one.
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            buffer: vec![0.0; capacity],
            outliers: vec![false; capacity],
            head: 0,
            len: 0,
        }
    }

    /// Append a consistent value, returning the evicted one when the window
    /// was full.
    pub fn push(&mut self, value: f64) -> Option<f64> {
        self.push_marked(value, false)
    }

    /// Append a value with its outlier mark.
    pub fn push_marked(&mut self, value: f64, outlier: bool) -> Option<f64> {
        let evicted = if self.is_full() {
            Some(self.buffer[self.head])
        } else {
            self.len += 1;
            None
        };

        self.buffer[self.head] = value;
        self.outliers[self.head] = outlier;
        self.head = (self.head + 1) % self.buffer.len();
        evicted
    }

    pub fn capacity(&self) -> usize {
        self.buffer.len()
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn is_full(&self) -> bool {
        self.len == self.buffer.len()
    }

    /// Number of live entries marked as outliers.
    pub fn outlier_count(&self) -> usize {
        self.entries().filter(|&(_, outlier)| outlier).count()
    }

    /// Live entries from oldest to newest.
    pub fn iter(&self) -> impl Iterator<Item = f64> + '_ {
        self.entries().map(|(value, _)| value)
    }

    /// Mean of all live entries.
    pub fn mean(&self) -> Option<f64> {
        average(self.iter())
    }

    /// Mean of the live entries not marked as outliers.
    ///
    /// Returns `None` when every entry is an outlier or the window is empty.
    pub fn consistent_mean(&self) -> Option<f64> {
        average(
            self.entries()
                .filter(|&(_, outlier)| !outlier)
                .map(|(value, _)| value),
        )
    }

    /// Unbiased sample variance of the live entries (0 with fewer than two).
    pub fn variance(&self) -> f64 {
        if self.len < 2 {
            return 0.0;
        }

        let n = self.len as f64;
        let mean = self.iter().sum::<f64>() / n;
        self.iter().map(|v| (v - mean) * (v - mean)).sum::<f64>() / (n - 1.0)
    }

    pub fn clear(&mut self) {
        self.head = 0;
        self.len = 0;
    }

    fn entries(&self) -> impl Iterator<Item = (f64, bool)> + '_ {
        let capacity = self.buffer.len();
        let start = (self.head + capacity - self.len) % capacity;
        (0..self.len).map(move |i| {
            let index = (start + i) % capacity;
            (self.buffer[index], self.outliers[index])
        })
    }
}

fn average(values: impl Iterator<Item = f64>) -> Option<f64> {
    let (sum, count) = values.fold((0.0, 0usize), |(sum, count), v| (sum + v, count + 1));
    (count > 0).then(|| sum / count as f64)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalizer_rate_limits() {
        let mut normalizer = MagnitudeNormalizer::new(1000);

        assert!(normalizer.normalize(&AccelSample::new(0, 0, 0, 1000)).is_some());
        assert!(normalizer.normalize(&AccelSample::new(400, 0, 0, 1000)).is_none());
        assert!(normalizer.normalize(&AccelSample::new(999, 0, 0, 1000)).is_none());

        let magnitude = normalizer.normalize(&AccelSample::new(1000, 0, 600, 800));
        assert_eq!(magnitude, Some(1000.0));
        assert_eq!(normalizer.statistics(), (2, 2));
    }

    #[test]
    fn test_normalizer_interval_measured_from_accepted_sample() {
        let mut normalizer = MagnitudeNormalizer::new(1000);
        normalizer.normalize(&AccelSample::new(0, 0, 0, 1000));
        normalizer.normalize(&AccelSample::new(900, 0, 0, 1000));

        // 1100ms after the last accepted sample, 200ms after the discarded one
        assert!(normalizer.normalize(&AccelSample::new(1100, 0, 0, 1000)).is_some());
    }

    #[test]
    fn test_window_eviction_order() {
        let mut window = StabilityWindow::new(3);
        assert_eq!(window.push(1.0), None);
        assert_eq!(window.push(2.0), None);
        assert_eq!(window.push(3.0), None);
        assert!(window.is_full());

        assert_eq!(window.push(4.0), Some(1.0));
        assert_eq!(window.push(5.0), Some(2.0));
        assert_eq!(window.iter().collect::<Vec<_>>(), vec![3.0, 4.0, 5.0]);
        assert_eq!(window.len(), 3);
    }

    #[test]
    fn test_window_zero_capacity() {
        let mut window = StabilityWindow::new(0);
        assert_eq!(window.capacity(), 1);
        window.push(7.0);
        assert_eq!(window.push(8.0), Some(7.0));
    }

    #[test]
    fn test_window_variance() {
        let mut window = StabilityWindow::new(4);
        for v in [958.0, 958.0, 958.0, 958.0] {
            window.push(v);
        }
        assert!(window.variance() < 1e-9);

        let mut window = StabilityWindow::new(4);
        for v in [2.0, 4.0, 4.0, 6.0] {
            window.push(v);
        }
        // mean 4, squared deviations 4+0+0+4, n-1 = 3
        assert!((window.variance() - 8.0 / 3.0).abs() < 1e-9);
    }

    #[test]
    fn test_consistent_mean_skips_outliers() {
        let mut window = StabilityWindow::new(5);
        window.push(10.0);
        window.push(10.0);
        window.push_marked(5000.0, true);
        window.push(10.0);

        assert_eq!(window.consistent_mean(), Some(10.0));
        assert_eq!(window.mean(), Some(1257.5));
        assert_eq!(window.outlier_count(), 1);
    }

    #[test]
    fn test_outlier_mark_leaves_with_its_entry() {
        let mut window = StabilityWindow::new(3);
        window.push_marked(90.0, true);
        window.push_marked(80.0, true);
        window.push_marked(70.0, true);
        assert_eq!(window.consistent_mean(), None);

        // The first outlier is evicted along with its mark
        window.push(20.0);
        assert_eq!(window.outlier_count(), 2);
        assert_eq!(window.consistent_mean(), Some(20.0));
    }

    #[test]
    fn test_window_clear() {
        let mut window = StabilityWindow::new(2);
        window.push(1.0);
        window.clear();
        assert!(window.is_empty());
        assert_eq!(window.mean(), None);
    }
}
