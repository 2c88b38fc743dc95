//! Dispatch stage (§4.5): parses inbound
//! packets into reply messages, correlates by `msg_id`, updates RTT
//! statistics, and forwards to the received-packet queue.

use std::sync::Arc;
use std::time::Instant;

use log::{debug, warn};
use tokio::sync::{mpsc, Mutex};

use crate::inflight::PendingTable;
use crate::rpc::{Call, Reply, RpcMessage};
use crate::rtt::RttWindow;
use crate::serial::TimestampedPacket;

/// One packet handed to the application loop after dispatch, regardless of
/// whether its body parsed cleanly (§4.5 step 2: a parse failure still
/// produces an entry with `packet: None`, "the stage must not crash on
/// malformed bodies").
pub struct ReceivedPacket {
    pub ts: Instant,
    pub source: u8,
    pub dest: u8,
    pub reply: Option<Reply>,
}

/// Runs the dispatch stage until `inbound_rx` closes (serial disconnect).
pub async fn run(
    mut inbound_rx: mpsc::Receiver<TimestampedPacket>,
    received_tx: mpsc::Sender<ReceivedPacket>,
    pending: Arc<Mutex<PendingTable<Call>>>,
    rtt: Arc<Mutex<RttWindow>>,
) {
    while let Some(TimestampedPacket { ts, packet }) = inbound_rx.recv().await {
        let dest = packet.dest;
        let source = packet.source;
        // packet.bytes is [dest, source, length] ++ payload; byte 2 is the
        // already-validated length field, the reply body starts at 3.
        let inner = &packet.bytes[3..];

        let reply = match Reply::parse(inner) {
            Ok(reply) => Some(reply),
            Err(e) => {
                warn!(target: "dispatch", "reply parse failed, forwarding as orphan: {e}");
                None
            }
        };

        if let Some(reply) = &reply {
            let msg_id = reply
                .reply_msg_id()
                .expect("a parsed Reply always carries a correlating msg_id");
            let removed = {
                let mut table = pending.lock().await;
                table.remove(msg_id)
            };
            match removed {
                Some(entry) => {
                    let rtt_us = ts.saturating_duration_since(entry.send_ts).as_micros() as u64;
                    let mut window = rtt.lock().await;
                    window.push(rtt_us);
                    debug!(
                        target: "dispatch",
                        "source={source} rtt_us={rtt_us} mean={:.1} stdev={:.1} reply.ok={}",
                        window.mean(),
                        window.stdev(),
                        reply.result.ok,
                    );
                    if let Some(reply_tx) = entry.reply_tx {
                        let _ = reply_tx.send(reply.clone());
                    }
                }
                None => {
                    warn!(target: "dispatch", "duplicate packet for msg_id={msg_id}");
                }
            }
        }

        let item = ReceivedPacket {
            ts,
            source,
            dest,
            reply,
        };
        if received_tx.send(item).await.is_err() {
            // Application loop has shut down; nothing left to dispatch to.
            break;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rpc::{Call, CallBody, ReplyResult};

    fn make_packet(dest: u8, source: u8, reply: &Reply) -> TimestampedPacket {
        let body = reply.serialize();
        let mut bytes = vec![dest, source, body.len() as u8];
        bytes.extend_from_slice(&body);
        TimestampedPacket {
            ts: Instant::now(),
            packet: crate::packet::Packet { dest, source, bytes },
        }
    }

    #[tokio::test]
    async fn matching_reply_clears_pending_and_appends_rtt() {
        let pending = Arc::new(Mutex::new(PendingTable::new()));
        let rtt = Arc::new(Mutex::new(RttWindow::new(10, crate::rtt::DEFAULT_BOOTSTRAP_RTT_US)));

        pending
            .lock()
            .await
            .insert(7, 0, 10, Call::new(CallBody::Ping));
        let before_len = rtt.lock().await.len();

        let (inbound_tx, inbound_rx) = mpsc::channel(8);
        let (received_tx, mut received_rx) = mpsc::channel(8);

        let reply = Reply {
            result: ReplyResult {
                msg_id: 7,
                ok: true,
                payload: vec![],
            },
        };
        inbound_tx.send(make_packet(10, 0, &reply)).await.unwrap();
        drop(inbound_tx);

        run(inbound_rx, received_tx, pending.clone(), rtt.clone()).await;

        assert!(pending.lock().await.is_empty());
        assert_eq!(rtt.lock().await.len(), before_len + 1);

        let received = received_rx.recv().await.unwrap();
        assert!(received.reply.is_some());
    }

    #[tokio::test]
    async fn duplicate_reply_still_delivered_without_rtt_change() {
        let pending: Arc<Mutex<PendingTable<Call>>> = Arc::new(Mutex::new(PendingTable::new()));
        let rtt = Arc::new(Mutex::new(RttWindow::new(10, crate::rtt::DEFAULT_BOOTSTRAP_RTT_US)));
        let before_len = rtt.lock().await.len();

        let (inbound_tx, inbound_rx) = mpsc::channel(8);
        let (received_tx, mut received_rx) = mpsc::channel(8);

        let reply = Reply {
            result: ReplyResult {
                msg_id: 99,
                ok: true,
                payload: vec![],
            },
        };
        inbound_tx.send(make_packet(1, 2, &reply)).await.unwrap();
        drop(inbound_tx);

        run(inbound_rx, received_tx, pending.clone(), rtt.clone()).await;

        assert_eq!(rtt.lock().await.len(), before_len);
        assert!(received_rx.recv().await.is_some());
    }
}
