//! Explicit, non-global handle for addressing one remote device (§9 Design
//! Note: avoid a process-wide "current node" global). Callers thread a
//! `&Node` through their call chain instead; there is no scoped
//! thread-local or implicit argument here.

use tokio::sync::{mpsc, oneshot};

use crate::error::LinkError;
use crate::rpc::{Call, Reply};
use crate::stages::send::OutboundRequest;

/// Addresses one remote device on the link and issues correlated RPC calls
/// against it over a [`crate::runtime::Runtime`]'s outbound queue.
pub struct Node {
    source: u8,
    dest: u8,
    outbound_tx: mpsc::Sender<OutboundRequest<Call>>,
}

impl Node {
    pub fn new(source: u8, dest: u8, outbound_tx: mpsc::Sender<OutboundRequest<Call>>) -> Self {
        Node {
            source,
            dest,
            outbound_tx,
        }
    }

    pub fn dest(&self) -> u8 {
        self.dest
    }

    /// Sends `msg` to this node and awaits its correlated reply. The wait
    /// survives a timeout-stage retransmit: the reply channel is carried
    /// forward onto the resubmitted request even though its `msg_id`
    /// changes (§4.7), so the caller never sees the id swap.
    pub async fn call(&self, msg: Call) -> Result<Reply, LinkError> {
        let (reply_tx, reply_rx) = oneshot::channel();
        let request = OutboundRequest {
            source: self.source,
            dest: self.dest,
            msg,
            reply_tx: Some(reply_tx),
        };
        self.outbound_tx
            .send(request)
            .await
            .map_err(|_| LinkError::SerialDisconnect)?;
        reply_rx.await.map_err(|_| LinkError::SerialDisconnect)
    }
}
