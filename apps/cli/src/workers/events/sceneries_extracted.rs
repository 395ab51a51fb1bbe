use crate::workers::events::stage_event;

stage_event!(
    /// Scenery extraction finished.
    SceneriesExtracted,
    "story.sceneries_extracted"
);
