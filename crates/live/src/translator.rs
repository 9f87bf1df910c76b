use std::sync::Arc;

use constellation_channel::{Envelope, EnvelopeHandler};
use tracing::{trace, warn};

use crate::LiveEvent;
use crate::observer::ObserverRegistry;

/// The one event kind that produces notifications
pub(crate) static LIVE_EVENT: &str = "live";

/// The nested envelope field carrying the actual update
static PAYLOAD_FIELD: &str = "payload";

/// Translates raw envelopes into live events
///
/// Anything that is not a `"live"` envelope is dropped silently. A `"live"`
/// envelope is trusted to carry a nested payload field; a missing payload is
/// an upstream contract violation, handled per the strict flag.
pub(crate) struct LiveTranslator {
    observers: Arc<ObserverRegistry>,
    strict: bool,
}

impl LiveTranslator {
    pub(crate) const fn new(observers: Arc<ObserverRegistry>, strict: bool) -> Self {
        Self { observers, strict }
    }
}

impl EnvelopeHandler for LiveTranslator {
    fn on_envelope(&self, envelope: Envelope) {
        if envelope.event != LIVE_EVENT {
            trace!(event = %envelope.event, "ignoring non-live envelope");
            return;
        }

        let Some(payload) = envelope.data.get(PAYLOAD_FIELD) else {
            if self.strict {
                panic!("live envelope missing nested payload: {envelope:?}");
            }
            warn!("discarding live envelope without nested payload");
            return;
        };

        self.observers.emit(&LiveEvent {
            event: envelope.event.clone(),
            data: payload.clone(),
        });
    }
}
