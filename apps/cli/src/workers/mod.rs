//! Pipeline stages as bus workers.
//!
//! Every stage consumes the previous stage's event, records a
//! [`StageReport`] in the run state and publishes its own event, so a
//! failing stage degrades the run instead of stopping it. Only the fetch
//! stage is fatal.

pub mod assemble_video;
pub mod cli_completion_sink;
pub mod events;
pub mod extract_scenery;
pub mod fetch_story;
pub mod generate_audio;
pub mod generate_images;
pub mod progress_reporter;
pub mod publish_story;
pub mod translate_story;

use std::fmt::Display;

use kahani_core::{EventBus, queues::QueueKind};
use tokio::time::Instant;
use uuid::Uuid;

use crate::{
    types::{Stage, StageReport, StageStatus},
    workers::events::StageProgress,
};

/// Queue used between consecutive stages. One story is in flight per bus.
pub const STAGE_QUEUE: QueueKind = QueueKind::FifoDropOldest { capacity: 4 };

pub(crate) fn report_progress(
    bus: &EventBus,
    parent: Uuid,
    story_id: Option<Uuid>,
    stage: Stage,
    message: impl Into<String>,
) {
    bus.publish(std::sync::Arc::new(StageProgress::new(
        parent, story_id, stage, message,
    )));
}

pub(crate) fn failed(err: &impl Display) -> StageStatus {
    StageStatus::Failed {
        error: err.to_string(),
    }
}

pub(crate) fn finished(stage: Stage, status: StageStatus, attempts: u32, started: Instant) -> StageReport {
    StageReport::new(stage, status, attempts, started.elapsed())
}
