//! Opens the first serial device found among [`LinkConfig`]'s candidates,
//! resets the MCU, and pings it once a second, logging every reply.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use log::{info, warn, LevelFilter};
use tokio::sync::Mutex;
use tokio_serial::SerialPortBuilderExt;

use mcu_link::config::LinkConfig;
use mcu_link::rpc::{Call, CallBody};
use mcu_link::serial::{ResetPeer, SerialEndpoint};
use mcu_link::Runtime;

const HOST: u8 = 0;
const MCU: u8 = 10;

#[tokio::main]
async fn main() {
    log::set_max_level(LevelFilter::Debug);
    env_logger::init();

    let config = LinkConfig::new(vec![
        PathBuf::from("/dev/ttyUSB0"),
        PathBuf::from("/dev/ttyACM0"),
        PathBuf::from("/dev/ttyS5"),
    ]);

    let device = match config.open_first() {
        Some(path) => path.to_path_buf(),
        None => {
            warn!("no candidate serial device found, exiting");
            return;
        }
    };

    let mut stream = tokio_serial::new(device.to_string_lossy(), config.baud_rate)
        .open_native_async()
        .expect("failed to open serial port");
    stream.pulse_reset().expect("failed to pulse MCU reset");

    let endpoint = Arc::new(Mutex::new(SerialEndpoint::new(stream)));
    let (inbound_tx, inbound_rx) = tokio::sync::mpsc::channel(64);
    let runtime = Runtime::spawn(&config, endpoint.clone(), inbound_rx, HOST, MCU);

    let read_handle = tokio::spawn(async move {
        let mut buf = [0u8; 512];
        loop {
            let result = {
                let mut endpoint = endpoint.lock().await;
                endpoint.read_and_dispatch(&mut buf, &inbound_tx).await
            };
            if result.is_err() {
                warn!("serial connection lost");
                break;
            }
        }
    });

    let node = mcu_link::Node::new(HOST, MCU, runtime.outbound());
    loop {
        match node.call(Call::new(CallBody::Ping)).await {
            Ok(reply) => info!("ping reply ok={}", reply.result.ok),
            Err(e) => {
                warn!("ping failed: {e}");
                break;
            }
        }
        tokio::time::sleep(Duration::from_secs(1)).await;
    }

    read_handle.abort();
    let report = runtime.shutdown().await;
    info!("shutdown byte tally: {} distinct byte values seen on retransmit", report.len());
}
