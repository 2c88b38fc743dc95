//! The four cooperating pipeline stages (§2, §5 of the design): decode is
//! the frame codec's synchronous callback (see [`crate::serial`]); the
//! remaining three run as independent tasks over shared queues, plus the
//! application loop that consumes delivered replies.

pub mod app;
pub mod dispatch;
pub mod send;
pub mod timeout;
