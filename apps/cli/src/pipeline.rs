use std::sync::Arc;

use anyhow::Context;
use indicatif::ProgressBar;
use kahani_core::{
    BusConfig, EventBus, EventBusBuilder, Worker,
    workers::WorkerWiring,
};
use tokio::sync::{broadcast, oneshot};
use tracing::{debug, info};

use crate::{
    config::StageRetries,
    publishers::Publisher,
    services::Services,
    types::PublishOutcome,
    workers::{
        assemble_video::AssembleVideoWorker,
        cli_completion_sink::{CliCompletionSinkWorker, RunOutcome},
        events::{JobSpec, StoryRequested},
        extract_scenery::ExtractSceneryWorker,
        fetch_story::FetchStoryWorker,
        generate_audio::GenerateAudioWorker,
        generate_images::GenerateImagesWorker,
        progress_reporter::ProgressReporterWorker,
        publish_story::PublishStoryWorker,
        translate_story::TranslateStoryWorker,
    },
};

/// Collaborators one run is wired with.
pub struct PipelineDeps {
    pub services: Services,
    pub publishers: Vec<Box<dyn Publisher>>,
    /// Selected platforms that could not be set up, reported as-is.
    pub unavailable: Vec<PublishOutcome>,
    pub retries: StageRetries,
    pub progress: ProgressBar,
}

pub struct PipelineHandle {
    pub bus: Arc<EventBus>,
    pub shutdown_tx: broadcast::Sender<()>,
    pub done_rx: oneshot::Receiver<RunOutcome>,
}

fn spawn_worker<W: Worker>(
    worker: W,
    wiring: &mut WorkerWiring,
    bus: &Arc<EventBus>,
    shutdown: &broadcast::Receiver<()>,
) -> anyhow::Result<()> {
    let inputs = wiring.claim(W::SUBSCRIBER_ID)?;
    tokio::spawn(worker.run(inputs, Arc::clone(bus), shutdown.resubscribe()));
    debug!(worker = W::SUBSCRIBER_ID, "worker started");
    Ok(())
}

/// Builds the bus for one run and starts every stage worker on it.
pub async fn start_pipeline(
    bus_config: BusConfig,
    deps: PipelineDeps,
) -> anyhow::Result<PipelineHandle> {
    let (shutdown_tx, shutdown_rx) = broadcast::channel::<()>(1);
    let (done_tx, done_rx) = oneshot::channel::<RunOutcome>();

    let builder = EventBusBuilder::new(bus_config)
        .subscribe(FetchStoryWorker::subscription())
        .subscribe(TranslateStoryWorker::subscription())
        .subscribe(ExtractSceneryWorker::subscription())
        .subscribe(GenerateImagesWorker::subscription())
        .subscribe(GenerateAudioWorker::subscription())
        .subscribe(AssembleVideoWorker::subscription())
        .subscribe(PublishStoryWorker::subscription())
        .subscribe(ProgressReporterWorker::subscription())
        .subscribe(CliCompletionSinkWorker::subscription());

    let (bus, mut wiring, tasks) = builder.build()?;
    let bus = Arc::new(bus);

    // isolated drain tasks must run before anything is published
    tasks.spawn_all();

    let PipelineDeps {
        services,
        publishers,
        unavailable,
        retries,
        progress,
    } = deps;

    let w = &mut wiring;
    let rx = &shutdown_rx;
    spawn_worker(FetchStoryWorker::new(services.source, retries.fetch), w, &bus, rx)?;
    spawn_worker(TranslateStoryWorker::new(services.translator), w, &bus, rx)?;
    spawn_worker(
        ExtractSceneryWorker::new(services.scenery, retries.scenery),
        w,
        &bus,
        rx,
    )?;
    spawn_worker(
        GenerateImagesWorker::new(services.images, retries.images),
        w,
        &bus,
        rx,
    )?;
    spawn_worker(
        GenerateAudioWorker::new(services.speech, retries.audio),
        w,
        &bus,
        rx,
    )?;
    spawn_worker(
        AssembleVideoWorker::new(services.video, retries.video),
        w,
        &bus,
        rx,
    )?;
    spawn_worker(
        PublishStoryWorker::new(publishers, unavailable, retries.publish),
        w,
        &bus,
        rx,
    )?;
    spawn_worker(ProgressReporterWorker::new(progress), w, &bus, rx)?;
    spawn_worker(CliCompletionSinkWorker::new(done_tx), w, &bus, rx)?;

    info!(session = %bus.session_id(), "pipeline started");

    Ok(PipelineHandle {
        bus,
        shutdown_tx,
        done_rx,
    })
}

/// Runs one story through every stage and waits for the run result.
pub async fn run_story(job: JobSpec, deps: PipelineDeps) -> anyhow::Result<RunOutcome> {
    let handle = start_pipeline(BusConfig::new_session(), deps).await?;
    handle.bus.publish(Arc::new(StoryRequested::new(job)));

    let outcome = handle
        .done_rx
        .await
        .context("pipeline stopped without a result")?;

    if handle.shutdown_tx.send(()).is_err() {
        debug!("workers already stopped");
    }
    Ok(outcome)
}

#[cfg(test)]
mod tests {
    use std::path::Path;

    use async_trait::async_trait;

    use super::*;
    use crate::{
        config::Settings,
        error::{HttpError, StageError},
        publishers::{PublisherKind, RecordingPublisher},
        services::{StorySource, Translator, mock::MOCK_TEXT_HINDI},
        types::{PublishStatus, RunReport, Stage, StageStatus, StoryText},
    };

    struct UnreachableSource;

    #[async_trait]
    impl StorySource for UnreachableSource {
        async fn fetch(&self, _url: Option<&str>) -> Result<StoryText, StageError> {
            Err(HttpError::Status {
                service: "story site",
                status: 404,
                body: "not found".into(),
            }
            .into())
        }
    }

    struct RejectingTranslator;

    #[async_trait]
    impl Translator for RejectingTranslator {
        async fn translate(&self, _text: &StoryText, _to: &str) -> Result<StoryText, StageError> {
            Err(HttpError::Status {
                service: "grok",
                status: 401,
                body: "bad key".into(),
            }
            .into())
        }
    }

    fn settings(out: &Path) -> Settings {
        Settings {
            output_dir: out.to_path_buf(),
            mock: true,
            ..Settings::default()
        }
    }

    fn seed_images(out: &Path) {
        let dir = crate::output::get_images_dir(out);
        std::fs::create_dir_all(&dir).unwrap();
        std::fs::write(dir.join("pot.png"), b"png").unwrap();
        std::fs::write(dir.join("crow.png"), b"png").unwrap();
    }

    fn deps(settings: &Settings, services: Services, publishers: &[RecordingPublisher]) -> PipelineDeps {
        PipelineDeps {
            services,
            publishers: publishers
                .iter()
                .cloned()
                .map(|p| Box::new(p) as Box<dyn Publisher>)
                .collect(),
            unavailable: Vec::new(),
            retries: settings.retry.clone(),
            progress: ProgressBar::hidden(),
        }
    }

    async fn run(settings: &Settings, deps: PipelineDeps) -> RunReport {
        run_story(JobSpec::new(settings, None), deps)
            .await
            .unwrap()
            .unwrap()
    }

    fn status(report: &RunReport, stage: Stage) -> &StageStatus {
        &report.stage(stage).unwrap().status
    }

    #[tokio::test]
    async fn mock_run_completes_every_stage() {
        let out = tempfile::tempdir().unwrap();
        seed_images(out.path());
        let settings = settings(out.path());
        let twitter = RecordingPublisher::new(PublisherKind::Twitter);
        let youtube = RecordingPublisher::new(PublisherKind::Youtube);

        let report = run(
            &settings,
            deps(
                &settings,
                Services::mock(&settings),
                &[twitter.clone(), youtube.clone()],
            ),
        )
        .await;

        assert_eq!(report.stages.len(), Stage::ALL.len());
        assert!(report.is_clean(), "{:?}", report.stages);
        assert_eq!(report.story.sceneries.len(), 4);
        assert_eq!(report.story.images.len(), 4);
        assert!(report.story.audio.as_ref().unwrap().is_file());
        assert!(report.story.video.as_ref().unwrap().is_file());

        assert!(report
            .publish
            .iter()
            .all(|o| o.status == PublishStatus::Published));
        assert!(twitter.posts()[0]
            .message
            .starts_with("प्यासा कौआ: It was a hot summer afternoon"));
        assert_eq!(youtube.posts().len(), 1);
    }

    #[tokio::test]
    async fn missing_images_degrade_instead_of_failing() {
        let out = tempfile::tempdir().unwrap();
        let settings = settings(out.path());
        let twitter = RecordingPublisher::new(PublisherKind::Twitter);
        let youtube = RecordingPublisher::new(PublisherKind::Youtube);

        let report = run(
            &settings,
            deps(
                &settings,
                Services::mock(&settings),
                &[twitter.clone(), youtube.clone()],
            ),
        )
        .await;

        assert!(matches!(status(&report, Stage::GenerateImages), StageStatus::Failed { .. }));
        assert!(matches!(status(&report, Stage::AssembleVideo), StageStatus::Skipped { .. }));
        assert_eq!(status(&report, Stage::GenerateAudio), &StageStatus::Completed);
        assert_eq!(status(&report, Stage::Publish), &StageStatus::Completed);

        let by_platform = |kind| report.publish.iter().find(|o| o.platform == kind).unwrap();
        assert_eq!(by_platform(PublisherKind::Twitter).status, PublishStatus::Published);
        assert_eq!(by_platform(PublisherKind::Youtube).status, PublishStatus::Skipped);
        assert!(youtube.posts().is_empty());
    }

    #[tokio::test]
    async fn image_limit_renders_only_the_first_sceneries() {
        let out = tempfile::tempdir().unwrap();
        seed_images(out.path());
        let settings = Settings {
            max_images: Some(2),
            ..settings(out.path())
        };

        let report = run(&settings, deps(&settings, Services::mock(&settings), &[])).await;

        assert_eq!(status(&report, Stage::GenerateImages), &StageStatus::Completed);
        assert_eq!(report.story.sceneries.len(), 4);
        let titles: Vec<&str> = report
            .story
            .images
            .iter()
            .map(|i| i.scenery_title.as_str())
            .collect();
        assert_eq!(titles, ["Scorching Summer Sky", "Garden Pot Under Tree"]);
        assert_eq!(status(&report, Stage::AssembleVideo), &StageStatus::Completed);
    }

    #[tokio::test]
    async fn failed_translation_falls_back_to_source_text() {
        let out = tempfile::tempdir().unwrap();
        seed_images(out.path());
        let settings = settings(out.path());
        let twitter = RecordingPublisher::new(PublisherKind::Twitter);

        let mut services = Services::mock(&settings);
        services.translator = Arc::new(RejectingTranslator);
        let report = run(&settings, deps(&settings, services, &[twitter.clone()])).await;

        let translate = report.stage(Stage::Translate).unwrap();
        assert!(matches!(translate.status, StageStatus::Failed { .. }));
        assert_eq!(translate.attempts, 1);
        assert!(matches!(status(&report, Stage::ExtractScenery), StageStatus::Degraded { .. }));
        assert!(report.story.translation.is_none());

        let posted = &twitter.posts()[0].message;
        let hindi_start: String = MOCK_TEXT_HINDI.chars().take(20).collect();
        assert!(posted.contains(&hindi_start));
    }

    #[tokio::test]
    async fn fetch_failure_ends_the_run() {
        let out = tempfile::tempdir().unwrap();
        let settings = settings(out.path());
        let mut services = Services::mock(&settings);
        services.source = Arc::new(UnreachableSource);

        let outcome = run_story(
            JobSpec::new(&settings, Some("https://example.com/story".into())),
            deps(&settings, services, &[]),
        )
        .await
        .unwrap();

        let failed = outcome.unwrap_err();
        assert_eq!(failed.stage, FetchStoryWorker::SUBSCRIBER_ID);
        assert!(failed.message.contains("404"));
    }

    #[tokio::test]
    async fn nothing_selected_skips_publish() {
        let out = tempfile::tempdir().unwrap();
        seed_images(out.path());
        let settings = settings(out.path());

        let report = run(&settings, deps(&settings, Services::mock(&settings), &[])).await;

        assert!(matches!(status(&report, Stage::Publish), StageStatus::Skipped { .. }));
        assert!(report.publish.is_empty());
    }
}
