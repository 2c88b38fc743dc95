//! Send stage (§4.6, `packet_send_loop`): serializes outbound messages,
//! pushes them through the serial endpoint, and records the send timestamp
//! and payload for retransmit.

use std::sync::Arc;

use log::warn;
use tokio::sync::{mpsc, oneshot, Mutex};

use crate::inflight::PendingTable;
use crate::rpc::{Reply, RpcMessage};
use crate::serial::SerialEndpoint;

/// One outbound request: `(source, dest, msg)` per §4.6, plus an optional
/// reply channel a [`crate::node::Node`] caller is waiting on. Generic over
/// [`RpcMessage`] so this stage never depends on the concrete request type.
pub struct OutboundRequest<M: RpcMessage> {
    pub source: u8,
    pub dest: u8,
    pub msg: M,
    pub reply_tx: Option<oneshot::Sender<Reply>>,
}

impl<M: RpcMessage> OutboundRequest<M> {
    pub fn new(source: u8, dest: u8, msg: M) -> Self {
        OutboundRequest {
            source,
            dest,
            msg,
            reply_tx: None,
        }
    }
}

/// Runs the send stage until `outbound_rx` closes.
pub async fn run<S, M>(
    mut outbound_rx: mpsc::Receiver<OutboundRequest<M>>,
    endpoint: Arc<Mutex<SerialEndpoint<S>>>,
    pending: Arc<Mutex<PendingTable<M>>>,
) where
    S: tokio::io::AsyncRead + tokio::io::AsyncWrite + Unpin + Send,
    M: RpcMessage,
{
    while let Some(OutboundRequest {
        source,
        dest,
        mut msg,
        reply_tx,
    }) = outbound_rx.recv().await
    {
        let sent = {
            let mut endpoint = endpoint.lock().await;
            endpoint.send_packet(source, dest, &mut msg).await
        };
        match sent {
            Ok(msg_id) => {
                let mut table = pending.lock().await;
                table.insert_with_reply(msg_id, source, dest, msg, reply_tx);
            }
            Err(e) => {
                warn!(target: "send", "failed to send to dest={dest}: {e}");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rpc::{Call, CallBody};
    use tokio::io::duplex;

    #[tokio::test]
    async fn send_inserts_into_pending_table_under_assigned_msg_id() {
        let (a, _b) = duplex(4096);
        let endpoint = Arc::new(Mutex::new(SerialEndpoint::new(a)));
        let pending = Arc::new(Mutex::new(PendingTable::new()));

        let (tx, rx) = mpsc::channel(8);
        tx.send(OutboundRequest::new(0, 5, Call::new(CallBody::Ping)))
            .await
            .unwrap();
        drop(tx);

        run(rx, endpoint, pending.clone()).await;

        let table = pending.lock().await;
        assert_eq!(table.len(), 1);
        assert!(table.contains(0));
    }
}
