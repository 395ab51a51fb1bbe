use std::collections::HashMap;

use anyhow::{Context, Result};

use crate::{queues::QueueKind, workers::WorkerInputs};

/// What a worker listens to. Built by each worker's `subscription()`.
pub struct SubscriptionSpec {
    pub subscriber_id: &'static str,
    pub inputs: Vec<InputSpec>,
}

pub struct InputSpec {
    pub event_type: &'static str,
    pub queue_kind: QueueKind,
}

impl InputSpec {
    pub fn new(event_type: &'static str, queue_kind: QueueKind) -> Self {
        Self {
            event_type,
            queue_kind,
        }
    }
}

/// Inputs produced by the bus builder, claimed once per worker.
pub struct WorkerWiring {
    inputs: HashMap<&'static str, WorkerInputs>,
}

impl WorkerWiring {
    pub fn new(inputs: HashMap<&'static str, WorkerInputs>) -> Self {
        Self { inputs }
    }

    pub fn take(&mut self, subscriber_id: &'static str) -> Option<WorkerInputs> {
        self.inputs.remove(subscriber_id)
    }

    /// Like [`take`](Self::take) but errors when the worker was never subscribed.
    pub fn claim(&mut self, subscriber_id: &'static str) -> Result<WorkerInputs> {
        self.take(subscriber_id)
            .with_context(|| format!("no inputs wired for subscriber_id={subscriber_id}"))
    }
}
