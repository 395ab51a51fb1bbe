use crate::workers::events::stage_event;

stage_event!(
    VideoAssembled,
    "story.video_assembled"
);
