use thiserror::Error;

/// Failure modes enumerated in the link layer's error handling design.
///
/// Every variant but [`LinkError::SerialDisconnect`] is recoverable: the
/// stage that produced it logs the detail, takes the recovery action
/// described alongside the variant, and continues. `SerialDisconnect` is
/// terminal and causes the owning [`crate::runtime::Runtime`] to tear down.
#[derive(Debug, Error)]
pub enum LinkError {
    /// A byte arrived while the frame decoder was idle and it was not the
    /// start marker. Counted and discarded.
    #[error("garbage byte outside a frame")]
    GarbageByte,

    /// The decoded inner length field did not match the observed payload
    /// length, or the buffer grew past what a frame can hold.
    #[error("frame too large or length field mismatch")]
    FrameTooLarge,

    /// The packet assembler's recomputed CRC did not match the CRC carried
    /// on the wire.
    #[error("CRC mismatch: computed {computed:#010x}, received {received:#010x}")]
    CrcMismatch { computed: u32, received: u32 },

    /// The payload could not be parsed as a reply message, or the parsed
    /// message was not fully initialized.
    #[error("payload parse error: {0}")]
    ParseError(String),

    /// A reply's `msg_id` had no matching entry in the in-flight log.
    #[error("duplicate or orphan reply for msg_id {0}")]
    UnknownMsgId(u32),

    /// A request exceeded the adaptive deadline without a reply.
    #[error("request msg_id {msg_id} timed out")]
    Timeout { msg_id: u32 },

    /// The serial connection closed. Terminal for the runtime.
    #[error("serial connection lost")]
    SerialDisconnect,

    /// A bounded queue could not accept an item.
    #[error("queue full, frame dropped")]
    QueueFull,
}
