//! Duplex message channel abstraction for the Constellation live-event client
//!
//! The channel carries requests and asynchronous notifications to/from the
//! remote service. Concrete transports (WebSocket, in-memory) live in
//! separate crates; the core client depends only on this contract.

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]

mod error;

use std::fmt::Debug;
use std::sync::Arc;

use async_trait::async_trait;
use futures::future::BoxFuture;
use serde::{Deserialize, Serialize};

pub use error::ChannelError;

/// Raw protocol envelope delivered by the channel: an event-kind tag plus an
/// arbitrary structured payload. Transient, never persisted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Envelope {
    /// The event-kind tag
    pub event: String,
    /// The structured payload tree
    pub data: serde_json::Value,
}

/// Which protocol personality a channel speaks
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChannelMode {
    /// Chat protocol
    Chat,
    /// Generic live-event protocol
    Event,
}

/// Post-connect handshake callback, run by the channel exactly once per
/// attempt, only after transport-level connect succeeds. A handshake error
/// fails the whole attempt.
pub type Handshake = Box<dyn FnOnce() -> BoxFuture<'static, Result<(), ChannelError>> + Send>;

/// Handler for raw envelopes delivered by the channel
///
/// Invoked synchronously from the channel's delivery context; handlers must
/// not block and must not assume a particular thread.
pub trait EnvelopeHandler: Send + Sync + 'static {
    /// Handles one delivered envelope
    fn on_envelope(&self, envelope: Envelope);
}

/// A duplex message channel to the remote service
///
/// Implementations own their connection pacing: `try_connect` performs a
/// single composite attempt (including any delay the implementation wants
/// between attempts) and the caller loops until it reports success. An
/// implementation that reconnects internally after a transport loss is
/// responsible for replaying the handshake it was given; the caller never
/// re-sends it.
#[async_trait]
pub trait Channel: Debug + Send + Sync + 'static {
    /// Makes a single composite connect attempt: establish the transport to
    /// `url` (authenticating with `token` when present) and, once connected,
    /// run `handshake`. Returns `true` only if both steps succeeded.
    /// Individual attempt failures are absorbed, never surfaced as errors.
    async fn try_connect(&self, url: &str, token: Option<&str>, handshake: Handshake) -> bool;

    /// Sends one request on the live connection
    async fn send(&self, method: &str, params: &str) -> Result<(), ChannelError>;

    /// Registers the single downstream handler for raw deliveries,
    /// replacing any previous one
    fn set_envelope_handler(&self, handler: Arc<dyn EnvelopeHandler>);

    /// Tears the channel down; a well-behaved implementation delivers no
    /// further envelopes after this returns
    async fn dispose(&self);
}

/// Factory for channels
pub trait ChannelFactory: Send + Sync + 'static {
    /// Creates a new, unconnected channel speaking the given protocol mode
    fn create_channel(&self, mode: ChannelMode) -> Arc<dyn Channel>;
}
