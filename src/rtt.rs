//! Bounded ring of recent round-trip samples (§4.8). Seeded with one large
//! sample so the deadline is never zero at startup, and never empty
//! thereafter.

use std::collections::VecDeque;

pub const DEFAULT_CAPACITY: usize = 10;
/// Default seed sample (10ms, in microseconds) when a caller doesn't thread
/// a different bootstrap value through [`crate::config::LinkConfig`].
pub const DEFAULT_BOOTSTRAP_RTT_US: u64 = 10_000;

pub struct RttWindow {
    samples: VecDeque<u64>,
    capacity: usize,
}

impl RttWindow {
    /// Builds a window of `capacity` samples, seeded with one `bootstrap_us`
    /// sample so `deadline_us()` is never zero before the first real reply
    /// (§4.8). `capacity` is the same knob as
    /// [`crate::config::LinkConfig::rtt_window_capacity`].
    pub fn new(capacity: usize, bootstrap_us: u64) -> Self {
        let mut samples = VecDeque::with_capacity(capacity.max(1));
        samples.push_back(bootstrap_us);
        RttWindow {
            samples,
            capacity: capacity.max(1),
        }
    }

    /// Appends a new RTT sample in microseconds, evicting the oldest entry
    /// once the window is at capacity.
    pub fn push(&mut self, rtt_us: u64) {
        if self.samples.len() == self.capacity {
            self.samples.pop_front();
        }
        self.samples.push_back(rtt_us);
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        false // invariant: never empty after construction
    }

    pub fn mean(&self) -> f64 {
        self.samples.iter().sum::<u64>() as f64 / self.samples.len() as f64
    }

    /// Computed for diagnostics only; per the Design Notes in §9, the
    /// deadline formula uses `2 * mean` and deliberately does not fold
    /// stdev in without explicit design intent.
    pub fn stdev(&self) -> f64 {
        let mean = self.mean();
        let variance = self
            .samples
            .iter()
            .map(|&s| {
                let diff = s as f64 - mean;
                diff * diff
            })
            .sum::<f64>()
            / self.samples.len() as f64;
        variance.sqrt()
    }

    /// The adaptive retransmit deadline, in microseconds.
    pub fn deadline_us(&self) -> u64 {
        (2.0 * self.mean()).round() as u64
    }
}

impl Default for RttWindow {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY, DEFAULT_BOOTSTRAP_RTT_US)
    }
}
