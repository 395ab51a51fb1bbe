use std::{any::Any, sync::Arc, time::SystemTime};

use async_trait::async_trait;
use kahani_core::{
    BusConfig, EnrichedEvent, Event, EventBus, EventBusBuilder, PipelineFailed, Worker,
    events::downcast_ref,
    queues::QueueKind,
    workers::{InputSpec, SubscriptionSpec},
};
use serde::Serialize;
use tokio::sync::{broadcast, mpsc};
use uuid::Uuid;

#[derive(Serialize)]
struct Ping {
    id: Uuid,
    n: u32,
}

impl Ping {
    const EVENT_TYPE: &'static str = "test.ping";

    fn new(n: u32) -> Self {
        Self {
            id: Uuid::new_v4(),
            n,
        }
    }
}

impl Event for Ping {
    fn event_id(&self) -> Uuid {
        self.id
    }

    fn parent_ids(&self) -> &[Uuid] {
        &[]
    }

    fn event_type(&self) -> &'static str {
        Self::EVENT_TYPE
    }

    fn timestamp(&self) -> SystemTime {
        SystemTime::UNIX_EPOCH
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

/// Forwards every ping to a channel and fails on odd numbers.
struct Echo {
    seen: mpsc::UnboundedSender<u32>,
}

#[async_trait]
impl Worker for Echo {
    const SUBSCRIBER_ID: &'static str = "test.echo";

    fn subscription() -> SubscriptionSpec {
        SubscriptionSpec {
            subscriber_id: Self::SUBSCRIBER_ID,
            inputs: vec![InputSpec {
                event_type: Ping::EVENT_TYPE,
                queue_kind: QueueKind::FifoDropOldest { capacity: 8 },
            }],
        }
    }

    async fn handle(&mut self, event: Arc<EnrichedEvent>, _bus: &EventBus) -> anyhow::Result<()> {
        let ping = downcast_ref::<Ping>(&event.event).expect("ping");
        let _ = self.seen.send(ping.n);
        anyhow::ensure!(ping.n % 2 == 0, "odd ping {}", ping.n);
        Ok(())
    }
}

struct FailureSink {
    failures: mpsc::UnboundedSender<PipelineFailed>,
}

#[async_trait]
impl Worker for FailureSink {
    const SUBSCRIBER_ID: &'static str = "test.failures";

    fn subscription() -> SubscriptionSpec {
        SubscriptionSpec {
            subscriber_id: Self::SUBSCRIBER_ID,
            inputs: vec![InputSpec {
                event_type: PipelineFailed::EVENT_TYPE,
                queue_kind: QueueKind::Isolated { output_buffer: 4 },
            }],
        }
    }

    async fn handle(&mut self, event: Arc<EnrichedEvent>, _bus: &EventBus) -> anyhow::Result<()> {
        if let Some(failed) = downcast_ref::<PipelineFailed>(&event.event) {
            let _ = self.failures.send(failed.clone());
        }
        Ok(())
    }
}

#[tokio::test]
async fn handler_errors_become_pipeline_failed() {
    let (bus, mut wiring, tasks) = EventBusBuilder::new(BusConfig::new_session())
        .subscribe(Echo::subscription())
        .subscribe(FailureSink::subscription())
        .build()
        .unwrap();
    tasks.spawn_all();

    let bus = Arc::new(bus);
    let (shutdown_tx, shutdown_rx) = broadcast::channel(1);
    let (seen_tx, mut seen_rx) = mpsc::unbounded_channel();
    let (fail_tx, mut fail_rx) = mpsc::unbounded_channel();

    tokio::spawn(Echo { seen: seen_tx }.run(
        wiring.take(Echo::SUBSCRIBER_ID).unwrap(),
        Arc::clone(&bus),
        shutdown_rx.resubscribe(),
    ));
    tokio::spawn(FailureSink { failures: fail_tx }.run(
        wiring.take(FailureSink::SUBSCRIBER_ID).unwrap(),
        Arc::clone(&bus),
        shutdown_rx,
    ));

    let odd = Ping::new(3);
    let odd_id = odd.id;
    bus.publish(Arc::new(Ping::new(2)));
    bus.publish(Arc::new(odd));

    assert_eq!(seen_rx.recv().await, Some(2));
    assert_eq!(seen_rx.recv().await, Some(3));

    let failed = fail_rx.recv().await.unwrap();
    assert_eq!(failed.stage, Echo::SUBSCRIBER_ID);
    assert_eq!(failed.parents, [odd_id]);
    assert!(failed.message.contains("odd ping 3"));
    assert_ne!(failed.event_id, odd_id);

    shutdown_tx.send(()).unwrap();
}

#[tokio::test]
async fn unrouted_publish_is_counted() {
    let (bus, _wiring, _tasks) = EventBusBuilder::new(BusConfig::new_session())
        .subscribe(Echo::subscription())
        .build()
        .unwrap();

    bus.publish(Arc::new(PipelineFailed::new(&Ping::new(1), "x", "boom")));
    assert_eq!(bus.metrics().unrouted(), 1);
}

#[tokio::test]
#[should_panic(expected = "Unrouted event type")]
async fn strict_routing_panics_on_unrouted() {
    let cfg = BusConfig {
        strict_routing: true,
        ..BusConfig::new_session()
    };
    let (bus, _wiring, _tasks) = EventBusBuilder::new(cfg)
        .subscribe(Echo::subscription())
        .build()
        .unwrap();

    bus.publish(Arc::new(PipelineFailed::new(&Ping::new(1), "x", "boom")));
}

#[tokio::test]
async fn fifo_overflow_counts_drops() {
    let (bus, _wiring, _tasks) = EventBusBuilder::new(BusConfig::new_session())
        .subscribe(Echo::subscription())
        .build()
        .unwrap();

    for n in 0..10 {
        bus.publish(Arc::new(Ping::new(n)));
    }
    assert_eq!(bus.drops_for(Echo::SUBSCRIBER_ID), 2);
}
