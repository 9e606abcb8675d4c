//! Streaming chat over the backend's server-sent-event endpoint.
//!
//! - [`exchange`]: the per-question state machine, transport-agnostic.
//! - [`transport`]: the [`ChatTransport`] seam and the SSE implementation.
//! - [`view`]: input gating, submission, and transcript rendering.

pub mod exchange;
pub mod transport;
pub mod view;

pub use exchange::{ChatExchange, CloseReason, StreamEvent, StreamPhase};
pub use transport::{drive, ChatTransport, EventStream, SseTransport};
pub use view::{render, ChatView, RenderedTurn, SubmitError};
