//! Link configuration: serial device candidates, baud rate, and the RTT
//! window's tuning knobs (§6 supplement).

use std::path::{Path, PathBuf};

use crate::rtt::{DEFAULT_BOOTSTRAP_RTT_US, DEFAULT_CAPACITY};

pub const DEFAULT_BAUD_RATE: u32 = 115_200;

#[derive(Debug, Clone)]
pub struct LinkConfig {
    /// Candidate serial device paths, probed in order.
    pub device_candidates: Vec<PathBuf>,
    pub baud_rate: u32,
    pub rtt_window_capacity: usize,
    /// Seed sample (microseconds) the RTT window is bootstrapped with
    /// before any reply has arrived (§4.8).
    pub bootstrap_rtt_us: u64,
}

impl LinkConfig {
    pub fn new(device_candidates: Vec<PathBuf>) -> Self {
        LinkConfig {
            device_candidates,
            baud_rate: DEFAULT_BAUD_RATE,
            rtt_window_capacity: DEFAULT_CAPACITY,
            bootstrap_rtt_us: DEFAULT_BOOTSTRAP_RTT_US,
        }
    }

    /// Returns the first candidate path that exists on the filesystem, in
    /// list order. `None` if none of the candidates are present; the
    /// caller decides what "no device found" means.
    pub fn open_first(&self) -> Option<&Path> {
        self.device_candidates
            .iter()
            .map(PathBuf::as_path)
            .find(|p| p.exists())
    }
}
