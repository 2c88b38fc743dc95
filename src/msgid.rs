//! Process-local, strictly increasing `msg_id` counter owned by the serial
//! endpoint (§4.4). A plain `AtomicU32` suffices: the counter is only ever
//! mutated by the send stage (§5), but making it atomic costs nothing and
//! removes any doubt under a multi-threaded runtime.

use std::sync::atomic::{AtomicU32, Ordering};

pub struct MsgIdCounter {
    next: AtomicU32,
}

impl MsgIdCounter {
    pub fn new() -> Self {
        MsgIdCounter {
            next: AtomicU32::new(0),
        }
    }

    /// Returns the next `msg_id` and advances the counter.
    pub fn next(&self) -> u32 {
        self.next.fetch_add(1, Ordering::Relaxed)
    }
}

impl Default for MsgIdCounter {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strictly_increasing() {
        let counter = MsgIdCounter::new();
        let mut last = None;
        for _ in 0..100 {
            let id = counter.next();
            if let Some(prev) = last {
                assert!(id > prev);
            }
            last = Some(id);
        }
    }
}
