//! In-flight log and payload cache (§3), unified into a single table per
//! the Design Note in §9: "In a threaded port, unify the two tables into a
//! single structure guarded by one lock; never split the lock across the
//! paired mutations." Keeping them as one `HashMap` makes the §3 invariant
//! ("every entry in the in-flight log has a matching entry in the payload
//! cache, and vice versa") true by construction instead of by discipline.
//!
//! Generic over [`RpcMessage`] so the table can hold any outbound request
//! type a schema swap brings in, not just [`crate::rpc::Call`].

use std::collections::HashMap;
use std::time::Instant;

use tokio::sync::oneshot;

use crate::rpc::{Reply, RpcMessage};

/// One request awaiting a reply: the in-flight log entry and the payload
/// cache entry merged into a single record.
pub struct PendingEntry<M: RpcMessage> {
    pub send_ts: Instant,
    pub source: u8,
    pub dest: u8,
    pub msg: M,
    /// Set when a [`crate::node::Node`] call is waiting on this entry.
    /// Carried forward across a timeout retransmit (§4.7) so the calling
    /// `Node::call` still sees the reply even though the `msg_id` changed.
    pub reply_tx: Option<oneshot::Sender<Reply>>,
}

pub struct PendingTable<M: RpcMessage> {
    entries: HashMap<u32, PendingEntry<M>>,
}

impl<M: RpcMessage> Default for PendingTable<M> {
    fn default() -> Self {
        PendingTable {
            entries: HashMap::new(),
        }
    }
}

impl<M: RpcMessage> PendingTable<M> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, msg_id: u32, source: u8, dest: u8, msg: M) {
        self.insert_with_reply(msg_id, source, dest, msg, None);
    }

    /// Like [`Self::insert`], but attaches a oneshot reply channel so a
    /// [`crate::node::Node`] caller can be woken directly when this
    /// `msg_id`'s reply arrives (§4.10).
    pub fn insert_with_reply(
        &mut self,
        msg_id: u32,
        source: u8,
        dest: u8,
        msg: M,
        reply_tx: Option<oneshot::Sender<Reply>>,
    ) {
        self.entries.insert(
            msg_id,
            PendingEntry {
                send_ts: Instant::now(),
                source,
                dest,
                msg,
                reply_tx,
            },
        );
    }

    /// Removes and returns the entry for `msg_id`, if present. Used by both
    /// the dispatch stage (on a matching reply) and the timeout stage (on
    /// resubmission) — the single removal point keeps both tables in sync.
    pub fn remove(&mut self, msg_id: u32) -> Option<PendingEntry<M>> {
        self.entries.remove(&msg_id)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn contains(&self, msg_id: u32) -> bool {
        self.entries.contains_key(&msg_id)
    }

    /// Returns the entry whose `send_ts` is oldest (smallest), i.e. the
    /// first entry the timeout stage should consider for retransmission.
    /// The timeout stage scans a point-in-time snapshot and stops after the
    /// first expired entry (§4.7 step 5), so callers should re-check the
    /// elapsed time against the deadline themselves.
    pub fn oldest(&self) -> Option<(u32, Instant)> {
        self.entries
            .iter()
            .min_by_key(|(_, e)| e.send_ts)
            .map(|(&id, e)| (id, e.send_ts))
    }
}

/// Tallies how often each byte value (0-255) appears in a retransmitted
/// message. Diagnostic only, dumped at shutdown (§3, §9).
#[derive(Default)]
pub struct TimeoutByteCounter {
    counts: HashMap<u8, u64>,
}

impl TimeoutByteCounter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn tally(&mut self, bytes: &[u8]) {
        for &b in bytes {
            *self.counts.entry(b).or_insert(0) += 1;
        }
    }

    pub fn snapshot(&self) -> HashMap<u8, u64> {
        self.counts.clone()
    }
}
