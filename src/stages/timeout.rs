//! Timeout stage (§4.7, `packet_check_timeout_loop`): periodically scans the
//! in-flight table and resubmits one expired request per scan, with a fresh
//! `msg_id` to be assigned on resend.

use std::sync::Arc;
use std::time::{Duration, Instant};

use log::error;
use tokio::sync::{mpsc, oneshot, Mutex};
use tokio::time::sleep;

use crate::inflight::{PendingTable, TimeoutByteCounter};
use crate::rpc::{Call, RpcMessage};
use crate::rtt::RttWindow;
use crate::stages::send::OutboundRequest;

/// Scans the in-flight table once and retransmits the single oldest entry
/// that has exceeded the deadline, per §4.7 steps 1-5. Returns `true` if a
/// retransmit was issued.
pub async fn scan_once(
    outbound_tx: &mpsc::Sender<OutboundRequest<Call>>,
    pending: &Arc<Mutex<PendingTable<Call>>>,
    rtt: &Arc<Mutex<RttWindow>>,
    timeout_bytes: &Arc<Mutex<TimeoutByteCounter>>,
) -> bool {
    let deadline_us = { rtt.lock().await.deadline_us() };

    let oldest = { pending.lock().await.oldest() };
    let Some((msg_id, send_ts)) = oldest else {
        return false;
    };

    let elapsed_us = Instant::now().saturating_duration_since(send_ts).as_micros() as u64;
    if elapsed_us <= deadline_us {
        return false;
    }

    let entry = { pending.lock().await.remove(msg_id) };
    let Some(entry) = entry else {
        return false;
    };

    let mut msg = entry.msg;
    let wire_bytes = msg.serialize();
    {
        let mut counter = timeout_bytes.lock().await;
        counter.tally(&wire_bytes);
    }
    msg.clear_msg_id();

    error!(target: "timeout", "msg_id={msg_id} timed out after {elapsed_us}us (deadline {deadline_us}us), resending");

    let _ = outbound_tx
        .send(OutboundRequest {
            source: entry.source,
            dest: entry.dest,
            msg,
            reply_tx: entry.reply_tx,
        })
        .await;
    true
}

/// Runs the timeout stage until `shutdown` fires. Sleeps for
/// `deadline / 1e6` seconds between scans, per §4.7's loop invariant.
pub async fn run(
    outbound_tx: mpsc::Sender<OutboundRequest<Call>>,
    pending: Arc<Mutex<PendingTable<Call>>>,
    rtt: Arc<Mutex<RttWindow>>,
    timeout_bytes: Arc<Mutex<TimeoutByteCounter>>,
    mut shutdown: oneshot::Receiver<()>,
) {
    loop {
        let deadline_us = { rtt.lock().await.deadline_us() };
        let sleep_fut = sleep(Duration::from_micros(deadline_us.max(1)));
        tokio::select! {
            _ = sleep_fut => {
                scan_once(&outbound_tx, &pending, &rtt, &timeout_bytes).await;
            }
            _ = &mut shutdown => {
                break;
            }
        }
    }
}
