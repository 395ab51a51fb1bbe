//! Pipeline runtime for kahani.
//!
//! Stages of the story pipeline are [`workers::Worker`]s wired to an
//! [`events::EventBus`]. Each worker subscribes to the event types it
//! consumes and publishes the event for the next stage. [`retry`] wraps the
//! external calls a stage makes.

pub mod events;
pub mod queues;
pub mod retry;
pub mod routes;
pub mod workers;

pub use events::{BusConfig, EnrichedEvent, Event, EventBus, EventBusBuilder};
pub use retry::{RetryPolicy, Retryable, retry};
pub use workers::{PipelineFailed, Worker};
