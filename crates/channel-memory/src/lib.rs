//! In-memory channel implementation for testing
//!
//! Scripts connect outcomes per attempt, records every connect and send
//! call, and delivers envelopes synchronously into the registered handler.

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]

use std::collections::VecDeque;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use constellation_channel::{
    Channel, ChannelError, ChannelFactory, ChannelMode, Envelope, EnvelopeHandler, Handshake,
};
use parking_lot::{Mutex, RwLock};
use tracing::debug;

/// Configuration for memory channels
#[derive(Debug, Clone, Default)]
pub struct MemoryChannelOptions {
    /// Scripted transport-connect outcomes, consumed one per attempt;
    /// once exhausted every further attempt connects
    pub connect_script: Vec<bool>,

    /// Number of leading `send` calls that fail with [`ChannelError::Send`]
    pub send_failures: usize,

    /// Pacing slept at the start of every connect attempt; the real channel
    /// owns backoff between attempts, the double models it with a flat delay
    pub connect_delay: Option<Duration>,
}

/// One recorded transport-connect attempt
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordedConnect {
    /// The endpoint URL the attempt targeted
    pub url: String,
    /// The credential token supplied, if any
    pub token: Option<String>,
}

/// In-memory channel implementation
pub struct MemoryChannel {
    mode: ChannelMode,
    connect_delay: Option<Duration>,
    connect_script: Mutex<VecDeque<bool>>,
    send_failures_left: Mutex<usize>,
    connects: Mutex<Vec<RecordedConnect>>,
    sends: Mutex<Vec<(String, String)>>,
    handler: RwLock<Option<Arc<dyn EnvelopeHandler>>>,
    connected: AtomicBool,
    disposed: AtomicBool,
}

impl std::fmt::Debug for MemoryChannel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MemoryChannel")
            .field("mode", &self.mode)
            .field("connected", &self.connected)
            .field("disposed", &self.disposed)
            .finish()
    }
}

impl MemoryChannel {
    /// Creates a new memory channel with options
    #[must_use]
    pub fn new(mode: ChannelMode, options: MemoryChannelOptions) -> Self {
        Self {
            mode,
            connect_delay: options.connect_delay,
            connect_script: Mutex::new(options.connect_script.into()),
            send_failures_left: Mutex::new(options.send_failures),
            connects: Mutex::new(Vec::new()),
            sends: Mutex::new(Vec::new()),
            handler: RwLock::new(None),
            connected: AtomicBool::new(false),
            disposed: AtomicBool::new(false),
        }
    }

    /// The protocol mode this channel was created with
    #[must_use]
    pub const fn mode(&self) -> ChannelMode {
        self.mode
    }

    /// All transport-connect attempts recorded so far
    #[must_use]
    pub fn connects(&self) -> Vec<RecordedConnect> {
        self.connects.lock().clone()
    }

    /// All `(method, params)` pairs sent so far
    #[must_use]
    pub fn sends(&self) -> Vec<(String, String)> {
        self.sends.lock().clone()
    }

    /// Whether the channel currently holds a live connection
    #[must_use]
    pub fn is_connected(&self) -> bool {
        self.connected.load(Ordering::SeqCst)
    }

    /// Whether `dispose` has been called
    #[must_use]
    pub fn is_disposed(&self) -> bool {
        self.disposed.load(Ordering::SeqCst)
    }

    /// Delivers an envelope synchronously into the registered handler.
    ///
    /// Deliberately ignores connection and disposal state so tests can
    /// simulate a late delivery callback arriving after `dispose`.
    pub fn deliver(&self, envelope: Envelope) {
        let handler = self.handler.read().clone();
        if let Some(handler) = handler {
            handler.on_envelope(envelope);
        }
    }
}

#[async_trait]
impl Channel for MemoryChannel {
    async fn try_connect(&self, url: &str, token: Option<&str>, handshake: Handshake) -> bool {
        if let Some(delay) = self.connect_delay {
            tokio::time::sleep(delay).await;
        }

        self.connects.lock().push(RecordedConnect {
            url: url.to_string(),
            token: token.map(ToString::to_string),
        });

        let transport_ok = self.connect_script.lock().pop_front().unwrap_or(true);
        if !transport_ok {
            debug!("memory channel scripted connect failure");
            return false;
        }

        self.connected.store(true, Ordering::SeqCst);

        if let Err(error) = handshake().await {
            debug!("memory channel handshake failed: {error}");
            self.connected.store(false, Ordering::SeqCst);
            return false;
        }

        true
    }

    async fn send(&self, method: &str, params: &str) -> Result<(), ChannelError> {
        if self.disposed.load(Ordering::SeqCst) {
            return Err(ChannelError::Closed);
        }

        {
            let mut failures = self.send_failures_left.lock();
            if *failures > 0 {
                *failures -= 1;
                return Err(ChannelError::Send("scripted send failure".to_string()));
            }
        }

        self.sends
            .lock()
            .push((method.to_string(), params.to_string()));

        Ok(())
    }

    fn set_envelope_handler(&self, handler: Arc<dyn EnvelopeHandler>) {
        *self.handler.write() = Some(handler);
    }

    async fn dispose(&self) {
        debug!("disposing memory channel");
        self.disposed.store(true, Ordering::SeqCst);
        self.connected.store(false, Ordering::SeqCst);
    }
}

/// Factory handing out memory channels and remembering every one it created
#[derive(Default)]
pub struct MemoryChannelFactory {
    options: MemoryChannelOptions,
    created: Mutex<Vec<Arc<MemoryChannel>>>,
}

impl MemoryChannelFactory {
    /// Creates a factory whose channels use the given options
    #[must_use]
    pub fn new(options: MemoryChannelOptions) -> Self {
        Self {
            options,
            created: Mutex::new(Vec::new()),
        }
    }

    /// All channels created so far, in creation order
    #[must_use]
    pub fn created(&self) -> Vec<Arc<MemoryChannel>> {
        self.created.lock().clone()
    }
}

impl ChannelFactory for MemoryChannelFactory {
    fn create_channel(&self, mode: ChannelMode) -> Arc<dyn Channel> {
        let channel = Arc::new(MemoryChannel::new(mode, self.options.clone()));
        self.created.lock().push(channel.clone());
        channel
    }
}
