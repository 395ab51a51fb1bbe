use std::{
    collections::{HashMap, HashSet},
    sync::{
        Arc,
        atomic::{AtomicU64, Ordering},
    },
};

use thiserror::Error;
use tokio::sync::Notify;
use uuid::Uuid;

use crate::{
    events::{EnrichedEvent, EventBus},
    queues::{FifoDropOldestQueue, IsolatedForwarder, Latest1Queue, QueueKind, StartupTasks},
    routes::{Route, RouteInbox, Routes},
    workers::{
        FifoInput, FifoReceiver, Latest1Input, SubscriptionSpec, WorkerInputs, WorkerWiring,
    },
};

pub struct BusConfig {
    pub session_id: Uuid,
    pub strict_routing: bool,
}

impl BusConfig {
    pub fn new_session() -> Self {
        Self {
            session_id: Uuid::new_v4(),
            strict_routing: false,
        }
    }
}

#[derive(Default)]
pub struct BusMetrics {
    pub unrouted_publish_total: AtomicU64,
}

impl BusMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_unrouted(&self, _evt: &'static str) {
        self.unrouted_publish_total.fetch_add(1, Ordering::Relaxed);
    }

    pub fn unrouted(&self) -> u64 {
        self.unrouted_publish_total.load(Ordering::Relaxed)
    }
}

/// A subscription set the bus refuses to build.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum WiringError {
    #[error("subscriber id is empty")]
    EmptySubscriber,
    #[error("subscriber {0} is registered twice")]
    DuplicateSubscriber(&'static str),
    #[error("subscriber {0} listens to nothing")]
    NoInputs(&'static str),
    #[error("subscriber {0} has an input with an empty event type")]
    EmptyEventType(&'static str),
    #[error("subscriber {subscriber} listens to {event_type} twice")]
    DuplicateInput {
        subscriber: &'static str,
        event_type: &'static str,
    },
    #[error("subscriber {subscriber} has a zero-sized {event_type} queue")]
    ZeroCapacity {
        subscriber: &'static str,
        event_type: &'static str,
    },
}

fn validate(subs: &[SubscriptionSpec]) -> Result<(), WiringError> {
    let mut subscribers = HashSet::new();
    for sub in subs {
        let id = sub.subscriber_id;
        if id.trim().is_empty() {
            return Err(WiringError::EmptySubscriber);
        }
        if !subscribers.insert(id) {
            return Err(WiringError::DuplicateSubscriber(id));
        }
        if sub.inputs.is_empty() {
            return Err(WiringError::NoInputs(id));
        }

        let mut event_types = HashSet::new();
        for input in &sub.inputs {
            if input.event_type.trim().is_empty() {
                return Err(WiringError::EmptyEventType(id));
            }
            if !event_types.insert(input.event_type) {
                return Err(WiringError::DuplicateInput {
                    subscriber: id,
                    event_type: input.event_type,
                });
            }
            let size = match input.queue_kind {
                QueueKind::Latest1 => 1,
                QueueKind::FifoDropOldest { capacity } => capacity,
                QueueKind::Isolated { output_buffer } => output_buffer,
            };
            if size == 0 {
                return Err(WiringError::ZeroCapacity {
                    subscriber: id,
                    event_type: input.event_type,
                });
            }
        }
    }
    Ok(())
}

/// Registers subscriptions, then builds the bus and each worker's inputs.
pub struct EventBusBuilder {
    cfg: BusConfig,
    subs: Vec<SubscriptionSpec>,
}

/// Inbox halves of one subscription while it is being wired.
struct PendingInputs {
    notify_any: Arc<Notify>,
    latest: Vec<Latest1Input>,
    fifos: Vec<FifoInput>,
}

impl PendingInputs {
    /// Creates the queue for one input and returns the bus-side inbox.
    fn wire(
        &mut self,
        event_type: &'static str,
        kind: QueueKind,
        tasks: &mut StartupTasks,
    ) -> RouteInbox {
        let notify = Arc::clone(&self.notify_any);
        match kind {
            QueueKind::Latest1 => {
                let queue = Arc::new(Latest1Queue::new(notify));
                self.latest.push(Latest1Input {
                    event_type,
                    queue: Arc::clone(&queue),
                });
                RouteInbox::Latest1(queue)
            }
            QueueKind::FifoDropOldest { capacity } => {
                let queue = Arc::new(FifoDropOldestQueue::new(capacity, notify));
                self.fifos.push(FifoInput {
                    event_type,
                    receiver: FifoReceiver::FifoDropOldest(queue.receiver()),
                });
                RouteInbox::FifoDropOldest(queue)
            }
            QueueKind::Isolated { output_buffer } => {
                let (forwarder, out_rx, drain) =
                    IsolatedForwarder::<Arc<EnrichedEvent>>::new(output_buffer, notify);
                tasks.tokio.push(drain);
                self.fifos.push(FifoInput {
                    event_type,
                    receiver: FifoReceiver::Isolated(out_rx),
                });
                RouteInbox::Isolated(forwarder)
            }
        }
    }

    fn finish(self) -> WorkerInputs {
        WorkerInputs {
            latest: self.latest,
            fifos: self.fifos,
            notify_any: self.notify_any,
            fifo_index: 0,
        }
    }
}

impl EventBusBuilder {
    pub fn new(cfg: BusConfig) -> Self {
        Self {
            cfg,
            subs: Vec::new(),
        }
    }

    pub fn subscribe(mut self, s: SubscriptionSpec) -> Self {
        self.subs.push(s);
        self
    }

    /// Validates every subscription and wires its queues. The returned
    /// startup tasks must be spawned before the first publish.
    pub fn build(self) -> Result<(EventBus, WorkerWiring, StartupTasks), WiringError> {
        validate(&self.subs)?;

        let mut table: HashMap<&'static str, Vec<Route>> = HashMap::new();
        let mut wiring = HashMap::new();
        let mut tasks = StartupTasks { tokio: Vec::new() };

        for spec in self.subs {
            let mut pending = PendingInputs {
                notify_any: Arc::new(Notify::new()),
                latest: Vec::new(),
                fifos: Vec::new(),
            };

            for input in spec.inputs {
                let inbox = pending.wire(input.event_type, input.queue_kind, &mut tasks);
                table
                    .entry(input.event_type)
                    .or_default()
                    .push(Route::new(spec.subscriber_id, inbox));
            }

            wiring.insert(spec.subscriber_id, pending.finish());
        }

        let bus = EventBus::new(self.cfg, Routes::new(table), Arc::new(BusMetrics::new()));
        Ok((bus, WorkerWiring::new(wiring), tasks))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::workers::InputSpec;

    fn spec(id: &'static str, inputs: Vec<InputSpec>) -> SubscriptionSpec {
        SubscriptionSpec {
            subscriber_id: id,
            inputs,
        }
    }

    fn fifo(event_type: &'static str, capacity: usize) -> InputSpec {
        InputSpec {
            event_type,
            queue_kind: QueueKind::FifoDropOldest { capacity },
        }
    }

    #[test]
    fn rejects_duplicate_subscribers() {
        let result = EventBusBuilder::new(BusConfig::new_session())
            .subscribe(spec("a", vec![fifo("x", 1)]))
            .subscribe(spec("a", vec![fifo("y", 1)]))
            .build();
        assert_eq!(result.err(), Some(WiringError::DuplicateSubscriber("a")));
    }

    #[test]
    fn rejects_duplicate_inputs_and_zero_capacity() {
        let dup = EventBusBuilder::new(BusConfig::new_session())
            .subscribe(spec("a", vec![fifo("x", 1), fifo("x", 2)]))
            .build();
        assert!(dup.is_err());

        let zero = EventBusBuilder::new(BusConfig::new_session())
            .subscribe(spec("a", vec![fifo("x", 0)]))
            .build();
        assert!(matches!(zero.err(), Some(WiringError::ZeroCapacity { .. })));
    }

    #[test]
    fn rejects_subscriber_without_inputs() {
        let result = EventBusBuilder::new(BusConfig::new_session())
            .subscribe(spec("a", vec![]))
            .build();
        assert_eq!(result.err(), Some(WiringError::NoInputs("a")));
    }

    #[test]
    fn wires_every_subscriber() {
        let (_bus, mut wiring, tasks) = EventBusBuilder::new(BusConfig::new_session())
            .subscribe(spec("a", vec![fifo("x", 2)]))
            .subscribe(spec(
                "b",
                vec![InputSpec {
                    event_type: "x",
                    queue_kind: QueueKind::Isolated { output_buffer: 2 },
                }],
            ))
            .build()
            .unwrap();

        assert!(wiring.take("a").is_some());
        assert!(wiring.take("b").is_some());
        assert!(wiring.take("a").is_none());
        assert_eq!(tasks.tokio.len(), 1);
    }
}
