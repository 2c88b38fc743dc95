//! Host-side link layer and RPC transport for remotely-articulated MCUs
//! over a byte-oriented serial channel.
//!
//! The hard engineering this crate owns is the serial link-layer and
//! reliable request/response scheduler: a byte-stuffed, CRC-protected
//! frame codec that recovers sync on arbitrary line noise ([`frame`],
//! [`packet`]); an asynchronous pipeline of decode/dispatch/send/timeout
//! stages sharing a unified in-flight table ([`stages`], [`inflight`]);
//! and an adaptive retransmit deadline driven by a rolling RTT window
//! ([`rtt`]).
//!
//! The RPC payload schema ([`rpc`]) and the concrete serial device driver
//! (`tokio_serial`, wired up in [`serial`]) are external collaborators
//! rather than part of the pipeline itself — they are a minimal concrete
//! schema and `tokio_serial::SerialStream` respectively, both swappable
//! without touching the pipeline.
//!
//! [`runtime::Runtime`] wires the four stages together; [`node::Node`]
//! gives callers a request/reply handle to one remote device without a
//! process-wide "current node" global.

pub mod config;
pub mod crc;
pub mod error;
pub mod frame;
pub mod inflight;
pub mod msgid;
pub mod node;
pub mod packet;
pub mod rpc;
pub mod rtt;
pub mod runtime;
pub mod serial;
pub mod stages;

pub use error::LinkError;
pub use node::Node;
pub use runtime::Runtime;
