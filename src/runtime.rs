//! Wires the decode/dispatch/send/timeout pipeline and the application
//! loop together into one runnable unit (§2, §5). Owns the shared
//! `PendingTable` and `RttWindow`, the three inter-stage queues, and the
//! background tasks' `JoinHandle`s so the whole pipeline can be torn down
//! together on serial disconnect.

use std::collections::HashMap;
use std::sync::Arc;

use log::info;
use tokio::sync::{mpsc, oneshot, Mutex};
use tokio::task::JoinHandle;

use crate::config::LinkConfig;
use crate::inflight::{PendingTable, TimeoutByteCounter};
use crate::rpc::Call;
use crate::rtt::RttWindow;
use crate::serial::{SerialEndpoint, TimestampedPacket};
use crate::stages::{app, dispatch, send, timeout};

const RECEIVED_QUEUE_CAPACITY: usize = 64;
const OUTBOUND_QUEUE_CAPACITY: usize = 64;

/// A running pipeline: dispatch, send, timeout, and the application loop,
/// each as a detached `tokio::spawn`. The caller keeps ownership of the
/// byte-reading loop over the [`SerialEndpoint`] — serial disconnect is
/// detected there (see [`SerialEndpoint::read_and_dispatch`]) and should be
/// followed by [`Runtime::shutdown`].
pub struct Runtime {
    pending: Arc<Mutex<PendingTable<Call>>>,
    rtt: Arc<Mutex<RttWindow>>,
    timeout_bytes: Arc<Mutex<TimeoutByteCounter>>,
    outbound_tx: mpsc::Sender<send::OutboundRequest<Call>>,
    timeout_shutdown: Option<oneshot::Sender<()>>,
    handles: Vec<JoinHandle<()>>,
}

impl Runtime {
    /// Spawns the four background tasks over an already-open `endpoint`,
    /// consuming frames the caller feeds into `inbound_rx` (§5's task
    /// list: dispatch, send, timeout, application). `endpoint` should be a
    /// clone of the `Arc` the caller keeps for its own read loop (see
    /// [`SerialEndpoint::read_and_dispatch`]) — the send stage needs its
    /// own handle to write retransmits and outbound requests.
    pub fn spawn<S>(
        config: &LinkConfig,
        endpoint: Arc<Mutex<SerialEndpoint<S>>>,
        inbound_rx: mpsc::Receiver<TimestampedPacket>,
        source: u8,
        dest: u8,
    ) -> Self
    where
        S: tokio::io::AsyncRead + tokio::io::AsyncWrite + Unpin + Send + 'static,
    {
        let pending = Arc::new(Mutex::new(PendingTable::new()));
        let rtt = Arc::new(Mutex::new(RttWindow::new(
            config.rtt_window_capacity,
            config.bootstrap_rtt_us,
        )));
        let timeout_bytes = Arc::new(Mutex::new(TimeoutByteCounter::new()));

        let (received_tx, received_rx) = mpsc::channel(RECEIVED_QUEUE_CAPACITY);
        let (outbound_tx, outbound_rx) = mpsc::channel(OUTBOUND_QUEUE_CAPACITY);
        let (timeout_shutdown_tx, timeout_shutdown_rx) = oneshot::channel();

        let handles = vec![
            tokio::spawn(dispatch::run(
                inbound_rx,
                received_tx,
                pending.clone(),
                rtt.clone(),
            )),
            tokio::spawn(send::run(outbound_rx, endpoint, pending.clone())),
            tokio::spawn(timeout::run(
                outbound_tx.clone(),
                pending.clone(),
                rtt.clone(),
                timeout_bytes.clone(),
                timeout_shutdown_rx,
            )),
            tokio::spawn(app::run(received_rx, outbound_tx.clone(), source, dest)),
        ];

        Runtime {
            pending,
            rtt,
            timeout_bytes,
            outbound_tx,
            timeout_shutdown: Some(timeout_shutdown_tx),
            handles,
        }
    }

    /// The outbound queue handle, for constructing a [`crate::node::Node`]
    /// or for issuing requests directly.
    pub fn outbound(&self) -> mpsc::Sender<send::OutboundRequest<Call>> {
        self.outbound_tx.clone()
    }

    pub fn pending(&self) -> Arc<Mutex<PendingTable<Call>>> {
        self.pending.clone()
    }

    pub fn rtt(&self) -> Arc<Mutex<RttWindow>> {
        self.rtt.clone()
    }

    /// Tears the pipeline down: stops the timeout stage's sleep loop,
    /// aborts the rest, and returns the diagnostic byte tally (§9's "the
    /// source prints `self.timeout_bytes` on shutdown"). Outstanding
    /// in-flight entries are discarded with no drain, per §5's
    /// cancellation policy.
    pub async fn shutdown(mut self) -> HashMap<u8, u64> {
        if let Some(tx) = self.timeout_shutdown.take() {
            let _ = tx.send(());
        }
        for handle in self.handles.drain(..) {
            handle.abort();
        }
        let discarded = self.pending.lock().await.len();
        info!(target: "runtime", "pipeline shut down, {discarded} in-flight requests discarded");
        self.timeout_bytes.lock().await.snapshot()
    }
}
