use uuid::Uuid;

use crate::{
    types::Stage,
    workers::events::{EventHeader, impl_event},
};

/// Status line for the terminal. Only the newest one matters.
#[derive(serde::Serialize)]
pub struct StageProgress {
    pub header: EventHeader,
    pub story_id: Option<Uuid>,
    pub stage: Stage,
    pub message: String,
}

impl StageProgress {
    pub fn new(
        parent_event_id: Uuid,
        story_id: Option<Uuid>,
        stage: Stage,
        message: impl Into<String>,
    ) -> Self {
        Self {
            header: EventHeader::child_of(parent_event_id),
            story_id,
            stage,
            message: message.into(),
        }
    }
}

impl_event!(StageProgress, "stage.progress");
