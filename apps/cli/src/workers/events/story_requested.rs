use crate::workers::events::{EventHeader, JobSpec, impl_event};

#[derive(serde::Serialize)]
pub struct StoryRequested {
    pub header: EventHeader,
    pub job: JobSpec,
}

impl StoryRequested {
    pub fn new(job: JobSpec) -> Self {
        Self {
            header: EventHeader::root(),
            job,
        }
    }
}

impl_event!(StoryRequested, "story.requested");
