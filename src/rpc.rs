//! Stand-in RPC payload schema (§1 "Out of scope", §4.9).
//!
//! The link layer never inspects payload contents: the pipeline only needs
//! a type that can serialize itself, be parsed back, and carry a `msg_id`
//! for correlation. [`RpcMessage`] is that seam. Every stage that touches a
//! message (`SerialEndpoint::send_packet`, the send stage, the in-flight
//! table) is generic over it instead of hard-coded to [`Call`], so a real
//! generated schema is a drop-in replacement for this module alone.

use serde::{Deserialize, Serialize};

use crate::error::LinkError;

/// What the link-layer pipeline requires from an RPC payload schema: enough
/// to serialize, retransmit, and correlate a message without ever looking
/// at its contents.
pub trait RpcMessage: Send + 'static {
    fn serialize(&self) -> Vec<u8>;

    fn parse(bytes: &[u8]) -> Result<Self, LinkError>
    where
        Self: Sized;

    /// The `msg_id` currently carried by this message, if any. The send
    /// stage reads this back after assigning one, so it can report the
    /// final id to its caller without reaching into a concrete field.
    fn msg_id(&self) -> Option<u32>;

    fn set_msg_id(&mut self, id: u32);

    fn clear_msg_id(&mut self);

    fn has_msg_id(&self) -> bool {
        self.msg_id().is_some()
    }

    /// `Some(msg_id)` for a reply correlating to a prior request; `None`
    /// for a request, which has no `result.msg_id` of its own (§1, §4.5).
    fn reply_msg_id(&self) -> Option<u32>;
}

/// A request variant: a discriminated-union RPC root with a handful of
/// representative calls rather than a generated schema.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub enum CallBody {
    Ping,
    Reset,
    ReadRegister { addr: u16 },
    WriteRegister { addr: u16, value: u32 },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Call {
    pub msg_id: Option<u32>,
    pub body: CallBody,
}

impl Call {
    pub fn new(body: CallBody) -> Self {
        Call { msg_id: None, body }
    }
}

impl RpcMessage for Call {
    fn serialize(&self) -> Vec<u8> {
        bincode::serialize(self).expect("Call serialization is infallible")
    }

    fn parse(bytes: &[u8]) -> Result<Self, LinkError> {
        bincode::deserialize(bytes).map_err(|e| LinkError::ParseError(e.to_string()))
    }

    fn msg_id(&self) -> Option<u32> {
        self.msg_id
    }

    fn set_msg_id(&mut self, id: u32) {
        self.msg_id = Some(id);
    }

    fn clear_msg_id(&mut self) {
        self.msg_id = None;
    }

    fn reply_msg_id(&self) -> Option<u32> {
        None
    }
}

/// The result payload a reply carries, exposing `msg_id` for correlation
/// the way a reply's `result.msg_id` field does.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReplyResult {
    pub msg_id: u32,
    pub ok: bool,
    pub payload: Vec<u8>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Reply {
    pub result: ReplyResult,
}

impl RpcMessage for Reply {
    fn serialize(&self) -> Vec<u8> {
        bincode::serialize(self).expect("Reply serialization is infallible")
    }

    fn parse(bytes: &[u8]) -> Result<Self, LinkError> {
        bincode::deserialize(bytes).map_err(|e| LinkError::ParseError(e.to_string()))
    }

    fn msg_id(&self) -> Option<u32> {
        Some(self.result.msg_id)
    }

    fn set_msg_id(&mut self, id: u32) {
        self.result.msg_id = id;
    }

    fn clear_msg_id(&mut self) {
        // A reply's msg_id always mirrors the request it answers; unlike a
        // Call awaiting send, there's no "absent" state to clear it to.
    }

    fn reply_msg_id(&self) -> Option<u32> {
        Some(self.result.msg_id)
    }
}

/// Reimplementation of the Design Note §9 "Dynamic attribute-based RPC
/// builder" as a plain lookup table instead of runtime attribute
/// interception: `call("ping")` looks up the variant by name and, when the
/// variant has no arguments, behaves like an auto-enabled same-named bool
/// field would.
pub mod builder {
    use super::{Call, CallBody};

    /// Looks up a zero-argument call by name. Variants that take
    /// arguments (`read_register`, `write_register`) are constructed
    /// directly via [`CallBody`] instead, since there is no ergonomic way
    /// to thread keyword arguments through a string lookup in a typed
    /// language.
    pub fn call(name: &str) -> Option<Call> {
        let body = match name {
            "ping" => CallBody::Ping,
            "reset" => CallBody::Reset,
            _ => return None,
        };
        Some(Call::new(body))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn call_round_trips_through_bytes() {
        let mut call = Call::new(CallBody::ReadRegister { addr: 0x10 });
        call.set_msg_id(7);
        let bytes = call.serialize();
        let parsed = Call::parse(&bytes).unwrap();
        assert_eq!(parsed.msg_id, Some(7));
        assert_eq!(parsed.body, CallBody::ReadRegister { addr: 0x10 });
    }

    #[test]
    fn clear_msg_id_drops_it() {
        let mut call = Call::new(CallBody::Ping);
        call.set_msg_id(3);
        assert!(call.has_msg_id());
        call.clear_msg_id();
        assert!(!call.has_msg_id());
    }

    #[test]
    fn call_reply_msg_id_is_always_none() {
        let call = Call::new(CallBody::Ping);
        assert_eq!(call.reply_msg_id(), None);
    }

    #[test]
    fn builder_looks_up_zero_arg_variants() {
        assert_eq!(builder::call("ping").unwrap().body, CallBody::Ping);
        assert_eq!(builder::call("reset").unwrap().body, CallBody::Reset);
        assert!(builder::call("no_such_call").is_none());
    }

    #[test]
    fn reply_exposes_msg_id() {
        let reply = Reply {
            result: ReplyResult {
                msg_id: 42,
                ok: true,
                payload: vec![],
            },
        };
        let bytes = reply.serialize();
        let parsed = Reply::parse(&bytes).unwrap();
        assert_eq!(parsed.reply_msg_id(), Some(42));
        assert_eq!(parsed.msg_id(), Some(42));
        assert!(parsed.has_msg_id());
    }
}
