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
    error::PublishError,
    publishers::{PublishContent, Publisher},
    types::{PublishOutcome, PublishStatus, RunReport, Stage, StageStatus},
    workers::{
        STAGE_QUEUE, finished,
        events::{StoryPublished, VideoAssembled},
        report_progress,
    },
};

/// Runs every selected publisher in turn and closes the run.
pub struct PublishStoryWorker {
    publishers: Vec<Box<dyn Publisher>>,
    /// Platforms that were selected but could not be constructed.
    unavailable: Vec<PublishOutcome>,
    policy: RetryPolicy,
}

impl PublishStoryWorker {
    pub fn new(
        publishers: Vec<Box<dyn Publisher>>,
        unavailable: Vec<PublishOutcome>,
        policy: RetryPolicy,
    ) -> Self {
        Self {
            publishers,
            unavailable,
            policy,
        }
    }
}

/// login, publish, logout for one platform. A failed login skips publish;
/// logout runs whenever login succeeded.
pub async fn publish_to(
    publisher: &dyn Publisher,
    content: &PublishContent,
    policy: &RetryPolicy,
) -> (PublishOutcome, u32) {
    let platform = publisher.kind();
    let outcome = |status, detail: String| PublishOutcome {
        platform,
        status,
        detail,
    };

    let login = retry(policy, Stage::Publish.name(), || publisher.login()).await;
    let mut attempts = login.attempts;
    if let Err(e) = login.result {
        warn!(%platform, error = %e, "login failed, skipping");
        return (
            outcome(PublishStatus::Failed, format!("login failed: {e}")),
            attempts,
        );
    }

    let published = retry(policy, Stage::Publish.name(), || publisher.publish(content)).await;
    attempts += published.attempts;
    let result = match published.result {
        Ok(id) => {
            info!(%platform, %id, "published");
            outcome(PublishStatus::Published, id)
        }
        Err(PublishError::NothingToPublish(reason)) => {
            info!(%platform, %reason, "nothing to publish");
            outcome(PublishStatus::Skipped, reason)
        }
        Err(e) => {
            warn!(%platform, error = %e, "publish failed");
            outcome(PublishStatus::Failed, e.to_string())
        }
    };

    if let Err(e) = publisher.logout().await {
        warn!(%platform, error = %e, "logout failed");
    }
    (result, attempts)
}

/// Stage status over all platform outcomes.
pub fn publish_status(outcomes: &[PublishOutcome]) -> StageStatus {
    let count = |status: PublishStatus| outcomes.iter().filter(|o| o.status == status).count();
    let published = count(PublishStatus::Published);
    let failed = count(PublishStatus::Failed);

    if outcomes.is_empty() {
        StageStatus::Skipped {
            reason: "no platforms selected".to_string(),
        }
    } else if failed == 0 && published == 0 {
        StageStatus::Skipped {
            reason: "nothing was published".to_string(),
        }
    } else if published == 0 {
        StageStatus::Failed {
            error: format!("all {failed} platforms failed"),
        }
    } else if failed > 0 {
        StageStatus::Degraded {
            reason: format!("{failed} of {} platforms failed", outcomes.len()),
        }
    } else {
        StageStatus::Completed
    }
}

#[async_trait]
impl Worker for PublishStoryWorker {
    const SUBSCRIBER_ID: &'static str = "story.publish";

    fn subscription() -> SubscriptionSpec {
        SubscriptionSpec {
            subscriber_id: Self::SUBSCRIBER_ID,
            inputs: vec![InputSpec::new(VideoAssembled::EVENT_TYPE, STAGE_QUEUE)],
        }
    }

    #[instrument(name = "publish", skip_all)]
    async fn handle(&mut self, event: Arc<EnrichedEvent>, bus: &EventBus) -> anyhow::Result<()> {
        let req = expect::<VideoAssembled>(&event.event, VideoAssembled::EVENT_TYPE)?;
        let parent = event.event.event_id();
        let mut run = req.run.clone();
        let started = Instant::now();

        let content = PublishContent::from_story(&run.story);
        let mut outcomes = self.unavailable.clone();
        let mut attempts = 0;

        for publisher in &self.publishers {
            report_progress(
                bus,
                parent,
                Some(run.story.id),
                Stage::Publish,
                format!("publishing to {}", publisher.kind()),
            );
            let (outcome, tries) = publish_to(publisher.as_ref(), &content, &self.policy).await;
            attempts += tries;
            outcomes.push(outcome);
        }

        let status = publish_status(&outcomes);
        run.record(finished(Stage::Publish, status, attempts, started));

        let report = RunReport {
            story: run.story,
            stages: run.stages,
            publish: outcomes,
        };
        bus.publish(Arc::new(StoryPublished::new(parent, report)));
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};

    use super::*;
    use crate::publishers::{PublisherKind, RecordingPublisher};

    #[derive(Default)]
    struct Flaky {
        fail_login: bool,
        fail_publish: bool,
        publish_calls: AtomicU32,
        logged_out: AtomicBool,
    }

    #[async_trait]
    impl Publisher for Flaky {
        fn kind(&self) -> PublisherKind {
            PublisherKind::Twitter
        }

        async fn login(&self) -> Result<(), PublishError> {
            if self.fail_login {
                Err(PublishError::MissingCredential {
                    platform: "Twitter",
                    env_var: "TWITTER_ACCESS_TOKEN",
                })
            } else {
                Ok(())
            }
        }

        async fn publish(&self, _content: &PublishContent) -> Result<String, PublishError> {
            self.publish_calls.fetch_add(1, Ordering::SeqCst);
            if self.fail_publish {
                Err(PublishError::NotConfigured {
                    platform: "Twitter",
                    reason: "rejected".into(),
                })
            } else {
                Ok("1".into())
            }
        }

        async fn logout(&self) -> Result<(), PublishError> {
            self.logged_out.store(true, Ordering::SeqCst);
            Ok(())
        }
    }

    fn content() -> PublishContent {
        PublishContent {
            title: "Crow".into(),
            source_text: "text".into(),
            ..PublishContent::default()
        }
    }

    #[tokio::test]
    async fn failed_login_skips_publish_and_logout() {
        let flaky = Flaky {
            fail_login: true,
            ..Flaky::default()
        };
        let (outcome, _) = publish_to(&flaky, &content(), &RetryPolicy::none()).await;

        assert_eq!(outcome.status, PublishStatus::Failed);
        assert!(outcome.detail.starts_with("login failed"));
        assert_eq!(flaky.publish_calls.load(Ordering::SeqCst), 0);
        assert!(!flaky.logged_out.load(Ordering::SeqCst));
    }

    #[tokio::test]
    async fn logout_runs_after_failed_publish() {
        let flaky = Flaky {
            fail_publish: true,
            ..Flaky::default()
        };
        let (outcome, attempts) = publish_to(&flaky, &content(), &RetryPolicy::none()).await;

        assert_eq!(outcome.status, PublishStatus::Failed);
        assert_eq!(attempts, 2);
        assert!(flaky.logged_out.load(Ordering::SeqCst));
    }

    #[tokio::test]
    async fn missing_video_is_a_skip() {
        let youtube = RecordingPublisher::new(PublisherKind::Youtube);
        let (outcome, _) = publish_to(&youtube, &content(), &RetryPolicy::none()).await;
        assert_eq!(outcome.status, PublishStatus::Skipped);
        assert!(youtube.posts().is_empty());
    }

    #[test]
    fn stage_status_over_outcomes() {
        let o = |status| PublishOutcome {
            platform: PublisherKind::Twitter,
            status,
            detail: String::new(),
        };
        assert!(matches!(publish_status(&[]), StageStatus::Skipped { .. }));
        assert_eq!(
            publish_status(&[o(PublishStatus::Published), o(PublishStatus::Skipped)]),
            StageStatus::Completed
        );
        assert!(matches!(
            publish_status(&[o(PublishStatus::Published), o(PublishStatus::Failed)]),
            StageStatus::Degraded { .. }
        ));
        assert!(matches!(
            publish_status(&[o(PublishStatus::Failed), o(PublishStatus::Skipped)]),
            StageStatus::Failed { .. }
        ));
        assert!(matches!(
            publish_status(&[o(PublishStatus::Skipped)]),
            StageStatus::Skipped { .. }
        ));
    }
}
