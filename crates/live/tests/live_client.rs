//! End-to-end tests for the live client against the in-memory channel

use std::sync::Arc;
use std::time::Duration;

use constellation_channel::{ChannelMode, Envelope};
use constellation_channel_memory::{MemoryChannel, MemoryChannelFactory, MemoryChannelOptions};
use constellation_live::{
    LiveClient, LiveClientOptions, LiveEvent, LiveEventObserver, MapConfig, TOKEN_CONFIG_KEY,
};
use parking_lot::Mutex;
use tokio_util::sync::CancellationToken;

#[derive(Default)]
struct Collector {
    seen: Mutex<Vec<LiveEvent>>,
}

impl Collector {
    fn events(&self) -> Vec<LiveEvent> {
        self.seen.lock().clone()
    }
}

impl LiveEventObserver for Collector {
    fn on_live_event(&self, event: &LiveEvent) {
        self.seen.lock().push(event.clone());
    }
}

struct Harness {
    client: LiveClient,
    factory: Arc<MemoryChannelFactory>,
    collector: Arc<Collector>,
}

impl Harness {
    fn channel(&self) -> Arc<MemoryChannel> {
        self.factory.created().last().cloned().expect("no channel created")
    }
}

fn harness(config: MapConfig, channel_options: MemoryChannelOptions) -> Harness {
    harness_with(config, channel_options, CancellationToken::new(), None)
}

fn harness_with(
    config: MapConfig,
    channel_options: MemoryChannelOptions,
    shutdown: CancellationToken,
    connect_deadline: Option<Duration>,
) -> Harness {
    let _ = tracing_subscriber::fmt::try_init();

    let factory = Arc::new(MemoryChannelFactory::new(channel_options));
    let client = LiveClient::with_options(
        Arc::new(config),
        factory.clone(),
        shutdown,
        LiveClientOptions {
            connect_deadline,
            strict_envelopes: false,
        },
    );
    let collector = Arc::new(Collector::default());
    client.observe(collector.clone());

    Harness {
        client,
        factory,
        collector,
    }
}

fn live_envelope(payload: serde_json::Value) -> Envelope {
    Envelope {
        event: "live".to_string(),
        data: serde_json::json!({ "payload": payload }),
    }
}

#[tokio::test]
async fn subscribes_with_update_topic_for_channel() {
    let h = harness(MapConfig::new(), MemoryChannelOptions::default());

    h.client.connect_and_join(56).await.unwrap();

    let channel = h.channel();
    assert_eq!(channel.mode(), ChannelMode::Event);
    assert_eq!(
        channel.sends(),
        vec![("livesubscribe".to_string(), "channel:56:update".to_string())]
    );
}

#[tokio::test]
async fn token_is_passed_through_on_connect() {
    let h = harness(
        MapConfig::new().with(TOKEN_CONFIG_KEY, "s3cret"),
        MemoryChannelOptions::default(),
    );

    h.client.connect_and_join(1).await.unwrap();

    let connects = h.channel().connects();
    assert_eq!(connects.len(), 1);
    assert_eq!(connects[0].url, "wss://constellation.mixer.com");
    assert_eq!(connects[0].token.as_deref(), Some("s3cret"));
}

#[tokio::test]
async fn blank_token_connects_anonymously() {
    let h = harness(
        MapConfig::new().with(TOKEN_CONFIG_KEY, "   \t"),
        MemoryChannelOptions::default(),
    );

    h.client.connect_and_join(1).await.unwrap();

    assert_eq!(h.channel().connects()[0].token, None);
}

#[tokio::test]
async fn retries_until_transport_connects() {
    let h = harness(
        MapConfig::new(),
        MemoryChannelOptions {
            connect_script: vec![false, false],
            ..MemoryChannelOptions::default()
        },
    );

    h.client.connect_and_join(9).await.unwrap();

    let channel = h.channel();
    assert_eq!(channel.connects().len(), 3);
    // Subscribe went out once, on the attempt that connected
    assert_eq!(channel.sends().len(), 1);
}

#[tokio::test]
async fn retries_when_subscribe_handshake_fails() {
    let h = harness(
        MapConfig::new(),
        MemoryChannelOptions {
            send_failures: 1,
            ..MemoryChannelOptions::default()
        },
    );

    h.client.connect_and_join(9).await.unwrap();

    let channel = h.channel();
    // First composite attempt connected but failed the handshake
    assert_eq!(channel.connects().len(), 2);
    assert_eq!(channel.sends().len(), 1);
}

#[tokio::test]
async fn live_envelope_flows_to_observer_unwrapped() {
    let h = harness(MapConfig::new(), MemoryChannelOptions::default());

    h.client.connect_and_join(1234).await.unwrap();

    let channel = h.channel();
    assert_eq!(channel.connects()[0].token, None);
    assert_eq!(
        channel.sends(),
        vec![("livesubscribe".to_string(), "channel:1234:update".to_string())]
    );

    channel.deliver(live_envelope(serde_json::json!({"viewers": 42})));

    assert_eq!(
        h.collector.events(),
        vec![LiveEvent {
            event: "live".to_string(),
            data: serde_json::json!({"viewers": 42}),
        }]
    );
}

#[tokio::test]
async fn non_live_envelopes_are_filtered_out() {
    let h = harness(MapConfig::new(), MemoryChannelOptions::default());

    h.client.connect_and_join(1).await.unwrap();

    let channel = h.channel();
    channel.deliver(Envelope {
        event: "chat:message".to_string(),
        data: serde_json::json!({"payload": {"text": "hi"}}),
    });
    channel.deliver(Envelope {
        event: "hello".to_string(),
        data: serde_json::json!({}),
    });

    assert!(h.collector.events().is_empty());
}

#[tokio::test]
async fn malformed_live_envelope_is_discarded_leniently() {
    let h = harness(MapConfig::new(), MemoryChannelOptions::default());

    h.client.connect_and_join(1).await.unwrap();

    let channel = h.channel();
    channel.deliver(Envelope {
        event: "live".to_string(),
        data: serde_json::json!({"unexpected": true}),
    });
    channel.deliver(live_envelope(serde_json::json!({"viewers": 7})));

    let events = h.collector.events();
    assert_eq!(events.len(), 1);
    assert_eq!(events[0].data, serde_json::json!({"viewers": 7}));
}

#[tokio::test]
async fn no_events_after_dispose_even_on_late_delivery() {
    let h = harness(MapConfig::new(), MemoryChannelOptions::default());

    h.client.connect_and_join(1).await.unwrap();
    let channel = h.channel();

    h.client.dispose().await;
    assert!(channel.is_disposed());

    // Simulate the transport's delivery callback racing disposal
    channel.deliver(live_envelope(serde_json::json!({"viewers": 1})));

    assert!(h.collector.events().is_empty());
}

#[tokio::test]
async fn dispose_is_safe_before_connect_and_twice() {
    let h = harness(MapConfig::new(), MemoryChannelOptions::default());

    h.client.dispose().await;
    h.client.dispose().await;

    assert!(h.factory.created().is_empty());
}

#[tokio::test]
async fn reconnect_disposes_previous_handle() {
    let h = harness(MapConfig::new(), MemoryChannelOptions::default());

    h.client.connect_and_join(1).await.unwrap();
    h.client.connect_and_join(2).await.unwrap();

    let created = h.factory.created();
    assert_eq!(created.len(), 2);
    assert!(created[0].is_disposed());
    assert!(!created[1].is_disposed());

    // Only the live handle feeds observers
    created[1].deliver(live_envelope(serde_json::json!({"viewers": 3})));
    assert_eq!(h.collector.events().len(), 1);
}

#[tokio::test]
async fn shutdown_cancels_connect() {
    let shutdown = CancellationToken::new();
    let h = harness_with(
        MapConfig::new(),
        MemoryChannelOptions {
            connect_script: vec![false; 1000],
            connect_delay: Some(Duration::from_millis(5)),
            ..MemoryChannelOptions::default()
        },
        shutdown.clone(),
        None,
    );

    let cancel = tokio::spawn({
        let shutdown = shutdown.clone();
        async move {
            tokio::time::sleep(Duration::from_millis(20)).await;
            shutdown.cancel();
        }
    });

    let result = h.client.connect_and_join(1).await;
    cancel.await.unwrap();

    assert!(matches!(
        result,
        Err(constellation_live::Error::Cancelled)
    ));
    // No handler was attached; deliveries go nowhere
    h.channel().deliver(live_envelope(serde_json::json!({"viewers": 1})));
    assert!(h.collector.events().is_empty());
}

#[tokio::test]
async fn pre_cancelled_shutdown_fails_immediately() {
    let shutdown = CancellationToken::new();
    shutdown.cancel();

    let h = harness_with(
        MapConfig::new(),
        MemoryChannelOptions::default(),
        shutdown,
        None,
    );

    let result = h.client.connect_and_join(1).await;
    assert!(matches!(
        result,
        Err(constellation_live::Error::Cancelled)
    ));
}

#[tokio::test]
async fn failed_connect_leaves_no_live_handle_behind() {
    let shutdown = CancellationToken::new();
    shutdown.cancel();

    let h = harness_with(
        MapConfig::new(),
        MemoryChannelOptions::default(),
        shutdown,
        None,
    );

    assert!(h.client.connect_and_join(1).await.is_err());

    // The abandoned channel is torn down, not leaked beyond dispose's reach
    assert!(h.channel().is_disposed());

    h.client.dispose().await;
    assert!(h.channel().is_disposed());
}

#[tokio::test]
async fn connect_deadline_bounds_the_retry_loop() {
    let h = harness_with(
        MapConfig::new(),
        MemoryChannelOptions {
            connect_script: vec![false; 1000],
            connect_delay: Some(Duration::from_millis(10)),
            ..MemoryChannelOptions::default()
        },
        CancellationToken::new(),
        Some(Duration::from_millis(40)),
    );

    let result = h.client.connect_and_join(1).await;

    assert!(matches!(
        result,
        Err(constellation_live::Error::ConnectTimeout(_))
    ));
    assert!(h.channel().is_disposed());
}

#[tokio::test]
async fn observers_fire_in_registration_order_and_can_unregister() {
    let h = harness(MapConfig::new(), MemoryChannelOptions::default());

    let log = Arc::new(Mutex::new(Vec::new()));

    struct Tagged {
        tag: &'static str,
        log: Arc<Mutex<Vec<&'static str>>>,
    }

    impl LiveEventObserver for Tagged {
        fn on_live_event(&self, _event: &LiveEvent) {
            self.log.lock().push(self.tag);
        }
    }

    let first = h.client.observe(Arc::new(Tagged {
        tag: "first",
        log: log.clone(),
    }));
    h.client.observe(Arc::new(Tagged {
        tag: "second",
        log: log.clone(),
    }));

    h.client.connect_and_join(1).await.unwrap();
    let channel = h.channel();

    channel.deliver(live_envelope(serde_json::json!({"n": 1})));
    assert_eq!(*log.lock(), vec!["first", "second"]);

    assert!(h.client.unobserve(first));
    channel.deliver(live_envelope(serde_json::json!({"n": 2})));
    assert_eq!(*log.lock(), vec!["first", "second", "second"]);
}
