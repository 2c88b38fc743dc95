//! Runs two link instances back to back over an in-memory duplex stream,
//! each with its own decode/dispatch/send/timeout pipeline.

use std::sync::Arc;

use log::{info, LevelFilter};
use tokio::io::duplex;
use tokio::sync::Mutex;

use mcu_link::config::LinkConfig;
use mcu_link::rpc::{Call, CallBody};
use mcu_link::serial::SerialEndpoint;
use mcu_link::Runtime;

const HOST: u8 = 0;
const MCU: u8 = 10;

#[tokio::main]
async fn main() {
    log::set_max_level(LevelFilter::Debug);
    env_logger::init();

    let (host_stream, mcu_stream) = duplex(4096);
    let config = LinkConfig::new(vec![]);

    let host_endpoint = Arc::new(Mutex::new(SerialEndpoint::new(host_stream)));
    let mcu_endpoint = Arc::new(Mutex::new(SerialEndpoint::new(mcu_stream)));

    let (host_inbound_tx, host_inbound_rx) = tokio::sync::mpsc::channel(64);
    let (mcu_inbound_tx, mcu_inbound_rx) = tokio::sync::mpsc::channel(64);

    let host_runtime = Runtime::spawn(&config, host_endpoint.clone(), host_inbound_rx, HOST, MCU);
    let _mcu_runtime = Runtime::spawn(&config, mcu_endpoint.clone(), mcu_inbound_rx, MCU, HOST);

    tokio::spawn(read_loop(host_endpoint, host_inbound_tx));
    tokio::spawn(read_loop(mcu_endpoint, mcu_inbound_tx));

    let node = mcu_link::Node::new(HOST, MCU, host_runtime.outbound());
    info!("sending ping to MCU id={MCU}");
    match tokio::time::timeout(std::time::Duration::from_secs(1), node.call(Call::new(CallBody::Ping))).await {
        Ok(Ok(reply)) => info!("got reply: ok={}", reply.result.ok),
        Ok(Err(e)) => info!("call failed: {e}"),
        Err(_) => info!("no MCU-side reply handler in this demo; request was framed and sent"),
    }

    let report = host_runtime.shutdown().await;
    info!("shutdown byte tally: {} distinct byte values seen on retransmit", report.len());
}

async fn read_loop<S>(
    endpoint: Arc<Mutex<SerialEndpoint<S>>>,
    inbound_tx: tokio::sync::mpsc::Sender<mcu_link::serial::TimestampedPacket>,
) where
    S: tokio::io::AsyncRead + tokio::io::AsyncWrite + Unpin + Send,
{
    let mut buf = [0u8; 512];
    loop {
        let result = {
            let mut endpoint = endpoint.lock().await;
            endpoint.read_and_dispatch(&mut buf, &inbound_tx).await
        };
        if result.is_err() {
            break;
        }
    }
}
