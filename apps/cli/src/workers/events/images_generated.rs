use crate::workers::events::stage_event;

stage_event!(
    /// Image generation finished for every selected scenery.
    ImagesGenerated,
    "story.images_generated"
);
