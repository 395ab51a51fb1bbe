use crate::workers::events::stage_event;

stage_event!(
    AudioGenerated,
    "story.audio_generated"
);
