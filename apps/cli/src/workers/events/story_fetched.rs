use crate::workers::events::stage_event;

stage_event!(
    /// Source text is available.
    StoryFetched,
    "story.fetched"
);
