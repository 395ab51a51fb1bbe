use std::sync::Arc;

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
    error::StageError,
    output::get_audio_path,
    services::{SpeechSynthesizer, narration::narration},
    types::{Stage, StageStatus},
    workers::{
        STAGE_QUEUE, failed, finished,
        events::{AudioGenerated, ImagesGenerated},
        report_progress,
    },
};

/// Narrates the source-language story. A narration file left by an earlier
/// run is reused.
pub struct GenerateAudioWorker {
    speech: Arc<dyn SpeechSynthesizer>,
    policy: RetryPolicy,
}

impl GenerateAudioWorker {
    pub fn new(speech: Arc<dyn SpeechSynthesizer>, policy: RetryPolicy) -> Self {
        Self { speech, policy }
    }
}

async fn is_reusable(path: &std::path::Path) -> bool {
    tokio::fs::metadata(path)
        .await
        .is_ok_and(|m| m.is_file() && m.len() > 0)
}

#[async_trait]
impl Worker for GenerateAudioWorker {
    const SUBSCRIBER_ID: &'static str = "story.generate_audio";

    fn subscription() -> SubscriptionSpec {
        SubscriptionSpec {
            subscriber_id: Self::SUBSCRIBER_ID,
            inputs: vec![InputSpec::new(ImagesGenerated::EVENT_TYPE, STAGE_QUEUE)],
        }
    }

    #[instrument(name = "generate_audio", skip_all)]
    async fn handle(&mut self, event: Arc<EnrichedEvent>, bus: &EventBus) -> anyhow::Result<()> {
        let req = expect::<ImagesGenerated>(&event.event, ImagesGenerated::EVENT_TYPE)?;
        let parent = event.event.event_id();
        let mut run = req.run.clone();
        let started = Instant::now();

        let path = get_audio_path(
            &run.job.output_dir,
            self.speech.engine(),
            &run.story.name,
            self.speech.extension(),
        );

        let reusable = is_reusable(&path).await;
        let (status, attempts) = match run.story.source.as_ref() {
            None => (
                failed(&StageError::MissingInput("source text".to_string())),
                0,
            ),
            Some(_) if reusable => {
                info!(path = %path.display(), "reusing existing narration");
                run.story.audio = Some(path);
                (StageStatus::Completed, 0)
            }
            Some(source) => {
                report_progress(
                    bus,
                    parent,
                    Some(run.story.id),
                    Stage::GenerateAudio,
                    format!("narrating with {}", self.speech.engine()),
                );
                let script = narration(&source.language, &source.content);
                let attempted = retry(&self.policy, Stage::GenerateAudio.name(), || {
                    self.speech.synthesize(&script, &path)
                })
                .await;
                match attempted.result {
                    Ok(audio) => {
                        info!(path = %audio.display(), "narration ready");
                        run.story.audio = Some(audio);
                        (StageStatus::Completed, attempted.attempts)
                    }
                    Err(e) => {
                        warn!(error = %e, "narration failed");
                        (failed(&e), attempted.attempts)
                    }
                }
            }
        };

        run.record(finished(Stage::GenerateAudio, status, attempts, started));
        bus.publish(Arc::new(AudioGenerated::new(parent, run)));
        Ok(())
    }
}
