use crate::workers::events::stage_event;

stage_event!(
    /// Translate stage finished, successfully or not.
    StoryTranslated,
    "story.translated"
);
