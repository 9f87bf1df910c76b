//! Resilient client for the Constellation live-event service
//!
//! Connects to the remote publish/subscribe endpoint, authenticates,
//! subscribes to a channel's update feed, and republishes the filtered
//! stream of live updates to local observers. The transport itself is an
//! external collaborator behind the `constellation-channel` contract.

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]

mod config;
mod error;
mod observer;
mod translator;

pub use config::{Config, EnvConfig, MapConfig, TOKEN_CONFIG_KEY};
pub use error::Error;
pub use observer::{LiveEventObserver, ObserverId};

use std::sync::Arc;
use std::time::Duration;

use constellation_channel::{Channel, ChannelFactory, ChannelMode, Handshake};
use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use observer::ObserverRegistry;
use translator::LiveTranslator;

/// Fixed endpoint URL of the remote live-event service
static WS_URL: &str = "wss://constellation.mixer.com";

/// Subscribe request method name
static SUBSCRIBE_METHOD: &str = "livesubscribe";

/// A filtered, unwrapped live update delivered to local observers
#[derive(Debug, Clone, PartialEq)]
pub struct LiveEvent {
    /// The event-kind tag (always `"live"`)
    pub event: String,
    /// The update payload, exactly the nested payload field of the raw envelope
    pub data: serde_json::Value,
}

/// Builds the topic identifier for a channel's update feed
#[must_use]
pub fn update_topic(channel_id: u64) -> String {
    format!("channel:{channel_id}:update")
}

/// Configuration for [`LiveClient`]
#[derive(Debug, Clone)]
pub struct LiveClientOptions {
    /// Give up connecting after this long; `None` retries forever
    pub connect_deadline: Option<Duration>,

    /// Panic on a live envelope missing its nested payload instead of
    /// logging and discarding it
    pub strict_envelopes: bool,
}

impl Default for LiveClientOptions {
    fn default() -> Self {
        Self {
            connect_deadline: None,
            strict_envelopes: cfg!(debug_assertions),
        }
    }
}

/// Client for a channel's live update feed
///
/// Owns at most one channel handle at a time; each successful
/// [`connect_and_join`](Self::connect_and_join) call swaps a fresh handle in
/// and disposes the previous one.
pub struct LiveClient {
    config: Arc<dyn Config>,
    factory: Arc<dyn ChannelFactory>,
    shutdown: CancellationToken,
    options: LiveClientOptions,
    observers: Arc<ObserverRegistry>,
    channel: Mutex<Option<Arc<dyn Channel>>>,
}

impl LiveClient {
    /// Creates a new client with default options
    #[must_use]
    pub fn new(
        config: Arc<dyn Config>,
        factory: Arc<dyn ChannelFactory>,
        shutdown: CancellationToken,
    ) -> Self {
        Self::with_options(config, factory, shutdown, LiveClientOptions::default())
    }

    /// Creates a new client with explicit options
    #[must_use]
    pub fn with_options(
        config: Arc<dyn Config>,
        factory: Arc<dyn ChannelFactory>,
        shutdown: CancellationToken,
        options: LiveClientOptions,
    ) -> Self {
        Self {
            config,
            factory,
            shutdown,
            options,
            observers: Arc::new(ObserverRegistry::new()),
            channel: Mutex::new(None),
        }
    }

    /// Connects to the live-event service and subscribes to `channel_id`'s
    /// update feed
    ///
    /// Suspends until the transport connects AND the subscribe handshake
    /// succeeds. Attempt failures are absorbed and retried indefinitely;
    /// without a configured deadline the only ways out are success or the
    /// shutdown token firing. Attempt pacing belongs to the channel
    /// implementation.
    ///
    /// Calling this again before disposal builds a fresh channel and
    /// disposes the previous one; callers are responsible for not invoking
    /// it concurrently.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Cancelled`] when the shutdown token fires, or
    /// [`Error::ConnectTimeout`] when the configured deadline elapses first.
    pub async fn connect_and_join(&self, channel_id: u64) -> Result<(), Error> {
        // Include the token on connect if available; blank means anonymous
        let token = self
            .config
            .get(TOKEN_CONFIG_KEY)
            .map(|token| token.trim().to_string())
            .filter(|token| !token.is_empty());

        let channel = self.factory.create_channel(ChannelMode::Event);

        let connected = match self.options.connect_deadline {
            Some(deadline) => {
                match tokio::time::timeout(
                    deadline,
                    self.drive_connect(&channel, token.as_deref(), channel_id),
                )
                .await
                {
                    Ok(result) => result,
                    Err(_) => Err(Error::ConnectTimeout(deadline)),
                }
            }
            None => self.drive_connect(&channel, token.as_deref(), channel_id).await,
        };

        // The handle is not stored until connect succeeds; tear it down here
        // so a cancelled or timed-out attempt leaves nothing half-established
        if let Err(error) = connected {
            channel.dispose().await;
            return Err(error);
        }

        channel.set_envelope_handler(Arc::new(LiveTranslator::new(
            self.observers.clone(),
            self.options.strict_envelopes,
        )));

        // Swap-and-dispose-old: the previous handle stays valid until the
        // replacement is fully live
        let previous = self.channel.lock().await.replace(channel);
        if let Some(previous) = previous {
            previous.dispose().await;
        }

        Ok(())
    }

    /// Registers an observer for live events
    pub fn observe(&self, observer: Arc<dyn LiveEventObserver>) -> ObserverId {
        self.observers.add(observer)
    }

    /// Removes a previously registered observer; returns whether it was registered
    pub fn unobserve(&self, id: ObserverId) -> bool {
        self.observers.remove(id)
    }

    /// Tears the client down
    ///
    /// Stops observer fan-out first, then disposes the channel handle, so no
    /// live event is delivered after disposal begins. Safe to call at any
    /// point in the lifecycle, including more than once.
    pub async fn dispose(&self) {
        self.observers.close();

        let channel = self.channel.lock().await.take();
        if let Some(channel) = channel {
            channel.dispose().await;
        }
    }

    async fn drive_connect(
        &self,
        channel: &Arc<dyn Channel>,
        token: Option<&str>,
        channel_id: u64,
    ) -> Result<(), Error> {
        let topic = update_topic(channel_id);

        loop {
            let handshake = subscribe_handshake(Arc::clone(channel), topic.clone());

            tokio::select! {
                biased;

                () = self.shutdown.cancelled() => {
                    debug!(channel_id, "connect abandoned by shutdown");
                    return Err(Error::Cancelled);
                }
                connected = channel.try_connect(WS_URL, token, handshake) => {
                    if connected {
                        info!(channel_id, topic, "subscribed to live updates");
                        return Ok(());
                    }
                    debug!(channel_id, "connect attempt failed, retrying");
                }
            }
        }
    }
}

/// The post-connect handshake: join the channel and request live updates
fn subscribe_handshake(channel: Arc<dyn Channel>, topic: String) -> Handshake {
    Box::new(move || Box::pin(async move { channel.send(SUBSCRIBE_METHOD, &topic).await }))
}
