use std::sync::{Arc, Mutex, PoisonError};

use async_trait::async_trait;
use tracing::info;

use crate::{
    error::PublishError,
    publishers::{PublishContent, Publisher, PublisherKind, SessionSlot, compose},
};

/// A post captured instead of sent.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordedPost {
    pub platform: PublisherKind,
    pub message: String,
    pub attachments: usize,
}

/// Publisher used by mock and dry runs. Composes exactly what the live
/// client would and keeps it in memory.
#[derive(Clone)]
pub struct RecordingPublisher {
    kind: PublisherKind,
    posts: Arc<Mutex<Vec<RecordedPost>>>,
    session: Arc<SessionSlot<()>>,
}

impl RecordingPublisher {
    pub fn new(kind: PublisherKind) -> Self {
        Self {
            kind,
            posts: Arc::default(),
            session: Arc::new(SessionSlot::new()),
        }
    }

    pub fn posts(&self) -> Vec<RecordedPost> {
        self.posts
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

#[async_trait]
impl Publisher for RecordingPublisher {
    fn kind(&self) -> PublisherKind {
        self.kind
    }

    async fn login(&self) -> Result<(), PublishError> {
        self.session.set(());
        Ok(())
    }

    async fn publish(&self, content: &PublishContent) -> Result<String, PublishError> {
        self.session.get(self.kind.name())?;
        let message = compose(self.kind, content)?;
        let attachments = match self.kind {
            PublisherKind::Facebook | PublisherKind::Instagram => content.images.len().min(1),
            PublisherKind::Youtube => 1,
            PublisherKind::Twitter | PublisherKind::Threads => 0,
        };

        let mut posts = self.posts.lock().unwrap_or_else(PoisonError::into_inner);
        posts.push(RecordedPost {
            platform: self.kind,
            message,
            attachments,
        });
        let id = format!("dry-run-{}-{}", self.kind.name().to_lowercase(), posts.len());
        info!(platform = %self.kind, %id, "post recorded");
        Ok(id)
    }

    async fn logout(&self) -> Result<(), PublishError> {
        self.session.clear();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn records_composed_post() {
        let publisher = RecordingPublisher::new(PublisherKind::Twitter);
        publisher.login().await.unwrap();

        let content = PublishContent {
            title: "Crow".into(),
            source_text: "The crow".into(),
            ..PublishContent::default()
        };
        let id = publisher.publish(&content).await.unwrap();

        assert_eq!(id, "dry-run-twitter-1");
        assert_eq!(
            publisher.posts(),
            vec![RecordedPost {
                platform: PublisherKind::Twitter,
                message: "Crow: The crow".into(),
                attachments: 0,
            }]
        );
    }

    #[tokio::test]
    async fn requires_login() {
        let publisher = RecordingPublisher::new(PublisherKind::Facebook);
        assert!(matches!(
            publisher.publish(&PublishContent::default()).await,
            Err(PublishError::NotLoggedIn { .. })
        ));
    }
}
