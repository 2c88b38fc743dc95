//! Application loop (§2.9, component 9, ~6%): pulls from the
//! received-packet queue and emits a follow-up `ping` to keep the link
//! exercised. Placeholder for real application logic.

use log::info;
use tokio::sync::mpsc;

use crate::rpc::{Call, CallBody};
use crate::stages::dispatch::ReceivedPacket;
use crate::stages::send::OutboundRequest;

/// Runs the application loop until `received_rx` closes. `source`/`dest`
/// address the far end that keep-alive pings are sent to.
pub async fn run(
    mut received_rx: mpsc::Receiver<ReceivedPacket>,
    outbound_tx: mpsc::Sender<OutboundRequest<Call>>,
    source: u8,
    dest: u8,
) {
    while let Some(received) = received_rx.recv().await {
        match &received.reply {
            Some(reply) => info!(
                target: "app",
                "received reply from source={} dest={} ok={}",
                received.source, received.dest, reply.result.ok,
            ),
            None => info!(
                target: "app",
                "received unparsable packet from source={} dest={}",
                received.source, received.dest,
            ),
        }

        let ping = OutboundRequest::new(source, dest, Call::new(CallBody::Ping));
        if outbound_tx.send(ping).await.is_err() {
            break;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rpc::{Reply, ReplyResult};
    use std::time::Instant;

    #[tokio::test]
    async fn every_received_packet_triggers_a_follow_up_ping() {
        let (received_tx, received_rx) = mpsc::channel(8);
        let (outbound_tx, mut outbound_rx) = mpsc::channel(8);

        let handle = tokio::spawn(run(received_rx, outbound_tx, 0, 10));

        received_tx
            .send(ReceivedPacket {
                ts: Instant::now(),
                source: 10,
                dest: 0,
                reply: Some(Reply {
                    result: ReplyResult {
                        msg_id: 1,
                        ok: true,
                        payload: vec![],
                    },
                }),
            })
            .await
            .unwrap();
        drop(received_tx);

        let ping = outbound_rx.recv().await.unwrap();
        assert_eq!(ping.dest, 10);
        assert_eq!(ping.msg.body, crate::rpc::CallBody::Ping);

        handle.await.unwrap();
    }

    #[tokio::test]
    async fn orphan_packet_still_triggers_a_ping() {
        let (received_tx, received_rx) = mpsc::channel(8);
        let (outbound_tx, mut outbound_rx) = mpsc::channel(8);

        let handle = tokio::spawn(run(received_rx, outbound_tx, 0, 10));

        received_tx
            .send(ReceivedPacket {
                ts: Instant::now(),
                source: 10,
                dest: 0,
                reply: None,
            })
            .await
            .unwrap();
        drop(received_tx);

        assert!(outbound_rx.recv().await.is_some());
        handle.await.unwrap();
    }
}
