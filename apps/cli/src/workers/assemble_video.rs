use std::{path::PathBuf, sync::Arc};

use async_trait::async_trait;
use kahani_core::{
    EnrichedEvent, EventBus, RetryPolicy,
    events::expect,
    retry,
    workers::{InputSpec, SubscriptionSpec, Worker},
};
use tokio::time::Instant;
use tracing::{info, instrument, warn};

use crate::{
    output::get_video_path,
    services::VideoAssembler,
    types::{Stage, StageReport, StageStatus},
    workers::{
        STAGE_QUEUE, failed, finished,
        events::{AudioGenerated, VideoAssembled},
        report_progress,
    },
};

pub struct AssembleVideoWorker {
    assembler: Arc<dyn VideoAssembler>,
    policy: RetryPolicy,
}

impl AssembleVideoWorker {
    pub fn new(assembler: Arc<dyn VideoAssembler>, policy: RetryPolicy) -> Self {
        Self { assembler, policy }
    }
}

#[async_trait]
impl Worker for AssembleVideoWorker {
    const SUBSCRIBER_ID: &'static str = "story.assemble_video";

    fn subscription() -> SubscriptionSpec {
        SubscriptionSpec {
            subscriber_id: Self::SUBSCRIBER_ID,
            inputs: vec![InputSpec::new(AudioGenerated::EVENT_TYPE, STAGE_QUEUE)],
        }
    }

    #[instrument(name = "assemble_video", skip_all)]
    async fn handle(&mut self, event: Arc<EnrichedEvent>, bus: &EventBus) -> anyhow::Result<()> {
        let req = expect::<AudioGenerated>(&event.event, AudioGenerated::EVENT_TYPE)?;
        let parent = event.event.event_id();
        let mut run = req.run.clone();
        let started = Instant::now();

        if run.story.images.is_empty() {
            run.record(StageReport::skipped(Stage::AssembleVideo, "no images"));
            bus.publish(Arc::new(VideoAssembled::new(parent, run)));
            return Ok(());
        }

        report_progress(
            bus,
            parent,
            Some(run.story.id),
            Stage::AssembleVideo,
            format!("assembling {} images", run.story.images.len()),
        );

        let images: Vec<PathBuf> = run.story.images.iter().map(|i| i.path.clone()).collect();
        let audio = run.story.audio.clone();
        let target = get_video_path(&run.job.output_dir, &run.story.name);

        let attempted = retry(&self.policy, Stage::AssembleVideo.name(), || {
            self.assembler.assemble(&images, audio.as_deref(), &target)
        })
        .await;

        let status = match attempted.result {
            Ok(video) => {
                info!(path = %video.display(), narrated = audio.is_some(), "video ready");
                run.story.video = Some(video);
                if audio.is_some() {
                    StageStatus::Completed
                } else {
                    StageStatus::Degraded {
                        reason: "no narration, silent slideshow".to_string(),
                    }
                }
            }
            Err(e) => {
                warn!(error = %e, "video assembly failed");
                failed(&e)
            }
        };

        run.record(finished(
            Stage::AssembleVideo,
            status,
            attempted.attempts,
            started,
        ));
        bus.publish(Arc::new(VideoAssembled::new(parent, run)));
        Ok(())
    }
}
