use std::{any::Any, sync::Arc, time::SystemTime};

use erased_serde::Serialize as ErasedSerialize;
use thiserror::Error;
use tokio::time::Instant;
use uuid::Uuid;

/// A fact published on the bus. Every stage output is an event.
pub trait Event: Send + Sync + ErasedSerialize + 'static {
    fn event_id(&self) -> Uuid;
    /// Events this one was derived from; empty for the event that starts a run.
    fn parent_ids(&self) -> &[Uuid];
    fn event_type(&self) -> &'static str;
    fn timestamp(&self) -> SystemTime;

    fn as_any(&self) -> &dyn Any;
}

erased_serde::serialize_trait_object!(Event);

/// An event as it sits in a subscriber's inbox, stamped by the bus.
pub struct EnrichedEvent {
    pub event: Arc<dyn Event>,
    /// Publish order within the session.
    pub ingest_ns: u64,
    pub session_id: Uuid,
    pub ingested_at: Instant,
}

/// A worker received an event type it did not subscribe to.
#[derive(Debug, Error)]
#[error("expected event_type={expected}, got={got}")]
pub struct UnexpectedEvent {
    pub expected: &'static str,
    pub got: &'static str,
}

pub fn downcast_ref<T: 'static>(e: &Arc<dyn Event>) -> Option<&T> {
    e.as_any().downcast_ref::<T>()
}

/// Downcasts `e` to the payload a handler was wired for.
pub fn expect<'a, T: 'static>(
    e: &'a Arc<dyn Event>,
    expected_event_type: &'static str,
) -> Result<&'a T, UnexpectedEvent> {
    downcast_ref::<T>(e).ok_or(UnexpectedEvent {
        expected: expected_event_type,
        got: e.event_type(),
    })
}

#[cfg(test)]
mod tests {
    use serde::Serialize;

    use super::*;

    #[derive(Serialize)]
    struct Started {
        id: Uuid,
    }

    impl Event for Started {
        fn event_id(&self) -> Uuid {
            self.id
        }
        fn parent_ids(&self) -> &[Uuid] {
            &[]
        }
        fn event_type(&self) -> &'static str {
            "run.started"
        }
        fn timestamp(&self) -> SystemTime {
            SystemTime::UNIX_EPOCH
        }
        fn as_any(&self) -> &dyn Any {
            self
        }
    }

    #[test]
    fn expect_names_both_types_on_mismatch() {
        let event: Arc<dyn Event> = Arc::new(Started { id: Uuid::new_v4() });

        assert!(expect::<Started>(&event, "run.started").is_ok());

        let err = expect::<String>(&event, "run.finished").unwrap_err();
        assert_eq!(err.expected, "run.finished");
        assert_eq!(err.got, "run.started");
        assert_eq!(
            err.to_string(),
            "expected event_type=run.finished, got=run.started"
        );
    }
}
