//! Serial endpoint (§4.4): owns the byte stream, feeds inbound bytes to the
//! frame codec, writes encoded frames, and assigns `msg_id` on send.

use std::time::{Duration, Instant};

use log::{debug, warn};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::sync::mpsc;
use tokio::time::sleep;

use crate::error::LinkError;
use crate::frame::{self, Decoder};
use crate::msgid::MsgIdCounter;
use crate::packet::{self, Packet};
use crate::rpc::RpcMessage;

/// One freshly assembled inbound packet, timestamped at arrival the way
/// §4.3 step 5 requires (`(utc_now, pkt)`).
pub struct TimestampedPacket {
    pub ts: Instant,
    pub packet: Packet,
}

/// Owns the serial byte stream and the receive-side frame decoder. Generic
/// over the stream type so it can run against a real `tokio_serial`
/// connection or, in tests, an in-memory duplex — the concrete serial
/// device driver is an external collaborator per §1.
pub struct SerialEndpoint<S> {
    stream: S,
    decoder: Decoder,
    msg_ids: MsgIdCounter,
}

impl<S> SerialEndpoint<S>
where
    S: tokio::io::AsyncRead + tokio::io::AsyncWrite + Unpin + Send,
{
    pub fn new(stream: S) -> Self {
        SerialEndpoint {
            stream,
            decoder: Decoder::new(),
            msg_ids: MsgIdCounter::new(),
        }
    }

    /// Feeds `data` to the frame codec byte-by-byte. Every completed,
    /// validated packet is pushed onto `inbound_tx` non-blockingly; a full
    /// queue is fatal for that one frame and is logged and dropped (§4.3
    /// step 5, §7 `QueueFull`).
    pub fn on_bytes(&mut self, data: &[u8], inbound_tx: &mpsc::Sender<TimestampedPacket>) {
        for &byte in data {
            match self.decoder.push_byte(byte) {
                Ok(Some(buf)) => match packet::assemble(buf.0) {
                    Ok(pkt) => {
                        let item = TimestampedPacket {
                            ts: Instant::now(),
                            packet: pkt,
                        };
                        if let Err(_) = inbound_tx.try_send(item) {
                            warn!(target: "serial", "inbound queue full, dropping frame");
                        }
                    }
                    Err(e) => {
                        warn!(target: "serial", "dropping malformed frame: {e}");
                    }
                },
                Ok(None) => {}
                Err(_) => {
                    // GarbageByte: counted by the caller via the returned
                    // Err if it wants to track failures; nothing more to do
                    // here, the decoder has already resynchronized.
                }
            }
        }
    }

    /// Serializes `msg`, assigning the next `msg_id` if it does not already
    /// carry one, encodes it into a frame, and writes it to the stream.
    /// Returns the `msg_id` that was used (new or pre-existing) so the send
    /// stage can record it in the pending table. Generic over any
    /// [`RpcMessage`] so a real generated schema is a drop-in replacement
    /// for [`crate::rpc::Call`].
    pub async fn send_packet<M: RpcMessage>(
        &mut self,
        source: u8,
        dest: u8,
        msg: &mut M,
    ) -> Result<u32, LinkError> {
        if !msg.has_msg_id() {
            msg.set_msg_id(self.msg_ids.next());
        }
        let msg_id = msg.msg_id().expect("just assigned if absent");

        let payload = msg.serialize();
        if payload.len() >= frame::MAX_PAYLOAD {
            return Err(LinkError::FrameTooLarge);
        }

        let wire = frame::encode(source, dest, &payload)?;
        self.stream
            .write_all(&wire)
            .await
            .map_err(|_| LinkError::SerialDisconnect)?;
        debug!(target: "serial", "sent msg_id={msg_id} dest={dest} len={}", payload.len());
        Ok(msg_id)
    }

    /// Reads one chunk of bytes from the stream and feeds them through
    /// [`Self::on_bytes`]. Returns `Err(SerialDisconnect)` on EOF or a read
    /// error, terminal per §7.
    pub async fn read_and_dispatch(
        &mut self,
        buf: &mut [u8],
        inbound_tx: &mpsc::Sender<TimestampedPacket>,
    ) -> Result<(), LinkError> {
        let n = self
            .stream
            .read(buf)
            .await
            .map_err(|_| LinkError::SerialDisconnect)?;
        if n == 0 {
            return Err(LinkError::SerialDisconnect);
        }
        self.on_bytes(&buf[..n], inbound_tx);
        Ok(())
    }
}

/// One-shot MCU reset pulse (§4.4 `on_connect`): DTR and RTS high for 10ms,
/// then low again. Split out of `SerialEndpoint` so it can be implemented
/// only where the underlying stream actually exposes control lines (real
/// serial ports), not for the in-memory streams used in tests.
pub trait ResetPeer {
    fn pulse_reset(&mut self) -> Result<(), LinkError>;
}

impl ResetPeer for tokio_serial::SerialStream {
    fn pulse_reset(&mut self) -> Result<(), LinkError> {
        use tokio_serial::SerialPort;
        self.write_data_terminal_ready(true)
            .and_then(|_| self.write_request_to_send(true))
            .map_err(|_| LinkError::SerialDisconnect)?;
        std::thread::sleep(Duration::from_millis(10));
        self.write_data_terminal_ready(false)
            .and_then(|_| self.write_request_to_send(false))
            .map_err(|_| LinkError::SerialDisconnect)
    }
}

impl<S> SerialEndpoint<S>
where
    S: tokio::io::AsyncRead + tokio::io::AsyncWrite + Unpin + Send + ResetPeer,
{
    /// Pulses the reset line then begins reading (§4.4 `on_connect`).
    pub async fn on_connect(&mut self) -> Result<(), LinkError> {
        self.stream.pulse_reset()?;
        sleep(Duration::from_millis(0)).await; // yield once before the read loop starts
        Ok(())
    }
}
