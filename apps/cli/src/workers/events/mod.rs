use std::{path::PathBuf, time::SystemTime};

use uuid::Uuid;

use crate::{
    config::Settings,
    types::{StageReport, Story},
};

#[derive(Clone, Debug, serde::Serialize)]
pub struct EventHeader {
    pub event_id: Uuid,
    pub parent_ids: Vec<Uuid>,
    pub timestamp: SystemTime,
}

impl EventHeader {
    pub fn root() -> Self {
        Self {
            event_id: Uuid::new_v4(),
            parent_ids: Vec::new(),
            timestamp: SystemTime::now(),
        }
    }

    pub fn child_of(parent_event_id: Uuid) -> Self {
        Self {
            parent_ids: vec![parent_event_id],
            ..Self::root()
        }
    }
}

/// What the user asked for. Fixed for the whole run.
#[derive(Clone, Debug, serde::Serialize, serde::Deserialize)]
pub struct JobSpec {
    pub url: Option<String>,
    pub output_dir: PathBuf,
    pub target_language: String,
    pub max_images: Option<usize>,
    pub mock: bool,
    pub dry_run: bool,
}

impl JobSpec {
    pub fn new(settings: &Settings, url: Option<String>) -> Self {
        Self {
            url,
            output_dir: settings.output_dir.clone(),
            target_language: settings.target_language.clone(),
            max_images: settings.max_images,
            mock: settings.mock,
            dry_run: settings.dry_run,
        }
    }
}

/// The story so far plus the report of every stage that touched it.
#[derive(Clone, Debug, serde::Serialize)]
pub struct RunState {
    pub job: JobSpec,
    pub story: Story,
    pub stages: Vec<StageReport>,
}

impl RunState {
    pub fn record(&mut self, report: StageReport) {
        self.stages.push(report);
    }
}

/// Implements `kahani_core::Event` for a struct with a `header: EventHeader`.
macro_rules! impl_event {
    ($ty:ty, $event_type:literal) => {
        impl $ty {
            pub const EVENT_TYPE: &'static str = $event_type;
        }

        impl kahani_core::Event for $ty {
            fn event_id(&self) -> uuid::Uuid {
                self.header.event_id
            }

            fn parent_ids(&self) -> &[uuid::Uuid] {
                &self.header.parent_ids
            }

            fn event_type(&self) -> &'static str {
                Self::EVENT_TYPE
            }

            fn timestamp(&self) -> std::time::SystemTime {
                self.header.timestamp
            }

            fn as_any(&self) -> &dyn std::any::Any {
                self as &dyn std::any::Any
            }
        }
    };
}

pub(crate) use impl_event;

/// Declares a stage output event carrying the run state.
macro_rules! stage_event {
    ($(#[$meta:meta])* $name:ident, $event_type:literal) => {
        $(#[$meta])*
        #[derive(serde::Serialize)]
        pub struct $name {
            pub header: $crate::workers::events::EventHeader,
            pub run: $crate::workers::events::RunState,
        }

        impl $name {
            pub fn new(parent_event_id: uuid::Uuid, run: $crate::workers::events::RunState) -> Self {
                Self {
                    header: $crate::workers::events::EventHeader::child_of(parent_event_id),
                    run,
                }
            }
        }

        $crate::workers::events::impl_event!($name, $event_type);
    };
}

pub(crate) use stage_event;

pub mod audio_generated;
pub mod images_generated;
pub mod sceneries_extracted;
pub mod stage_progress;
pub mod story_fetched;
pub mod story_published;
pub mod story_requested;
pub mod story_translated;
pub mod video_assembled;

pub use audio_generated::*;
pub use images_generated::*;
pub use sceneries_extracted::*;
pub use stage_progress::*;
pub use story_fetched::*;
pub use story_published::*;
pub use story_requested::*;
pub use story_translated::*;
pub use video_assembled::*;
