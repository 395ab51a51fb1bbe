use crate::{
    types::RunReport,
    workers::events::{EventHeader, impl_event},
};

/// Final event of a run that got past fetching.
#[derive(serde::Serialize)]
pub struct StoryPublished {
    pub header: EventHeader,
    pub report: RunReport,
}

impl StoryPublished {
    pub fn new(parent_event_id: uuid::Uuid, report: RunReport) -> Self {
        Self {
            header: EventHeader::child_of(parent_event_id),
            report,
        }
    }
}

impl_event!(StoryPublished, "story.published");
