use std::{fmt, path::PathBuf, time::Duration};

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::publishers::PublisherKind;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoryText {
    pub language: String,
    pub title: String,
    pub content: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Scenery {
    pub title: String,
    pub description: String,
    #[serde(default, alias = "adjectives")]
    pub sentiments: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GeneratedImage {
    pub scenery_title: String,
    pub path: PathBuf,
}

/// Everything produced for one story so far. Travels inside pipeline events.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Story {
    pub id: Uuid,
    pub date: String,
    pub url: Option<String>,
    pub name: String,
    pub source: Option<StoryText>,
    pub translation: Option<StoryText>,
    pub sceneries: Vec<Scenery>,
    pub images: Vec<GeneratedImage>,
    pub audio: Option<PathBuf>,
    pub video: Option<PathBuf>,
}

impl Story {
    pub fn new(url: Option<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            date: chrono::Local::now().format("%Y-%m-%d").to_string(),
            url,
            name: String::new(),
            source: None,
            translation: None,
            sceneries: Vec::new(),
            images: Vec::new(),
            audio: None,
            video: None,
        }
    }

    pub fn title(&self) -> &str {
        self.source.as_ref().map(|s| s.title.as_str()).unwrap_or("")
    }

    /// Text used downstream of translation: the translation when present.
    pub fn best_text(&self) -> Option<&StoryText> {
        self.translation.as_ref().or(self.source.as_ref())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    Fetch,
    Translate,
    ExtractScenery,
    GenerateImages,
    GenerateAudio,
    AssembleVideo,
    Publish,
}

impl Stage {
    pub const ALL: [Stage; 7] = [
        Stage::Fetch,
        Stage::Translate,
        Stage::ExtractScenery,
        Stage::GenerateImages,
        Stage::GenerateAudio,
        Stage::AssembleVideo,
        Stage::Publish,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            Stage::Fetch => "fetch",
            Stage::Translate => "translate",
            Stage::ExtractScenery => "extract-scenery",
            Stage::GenerateImages => "image-gen",
            Stage::GenerateAudio => "audio-gen",
            Stage::AssembleVideo => "video-gen",
            Stage::Publish => "publish",
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum StageStatus {
    Completed,
    Degraded { reason: String },
    Skipped { reason: String },
    Failed { error: String },
}

impl StageStatus {
    pub fn label(&self) -> &'static str {
        match self {
            StageStatus::Completed => "completed",
            StageStatus::Degraded { .. } => "degraded",
            StageStatus::Skipped { .. } => "skipped",
            StageStatus::Failed { .. } => "failed",
        }
    }

    pub fn detail(&self) -> Option<&str> {
        match self {
            StageStatus::Completed => None,
            StageStatus::Degraded { reason } | StageStatus::Skipped { reason } => Some(reason),
            StageStatus::Failed { error } => Some(error),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StageReport {
    pub stage: Stage,
    #[serde(flatten)]
    pub status: StageStatus,
    pub attempts: u32,
    pub elapsed: Duration,
}

impl StageReport {
    pub fn new(stage: Stage, status: StageStatus, attempts: u32, elapsed: Duration) -> Self {
        Self {
            stage,
            status,
            attempts,
            elapsed,
        }
    }

    pub fn skipped(stage: Stage, reason: impl Into<String>) -> Self {
        Self::new(
            stage,
            StageStatus::Skipped {
                reason: reason.into(),
            },
            0,
            Duration::ZERO,
        )
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PublishStatus {
    Published,
    Skipped,
    Failed,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PublishOutcome {
    pub platform: PublisherKind,
    pub status: PublishStatus,
    pub detail: String,
}

/// Final result of one pipeline run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunReport {
    pub story: Story,
    pub stages: Vec<StageReport>,
    pub publish: Vec<PublishOutcome>,
}

impl RunReport {
    pub fn stage(&self, stage: Stage) -> Option<&StageReport> {
        self.stages.iter().find(|r| r.stage == stage)
    }

    /// True when every stage completed without degradation.
    pub fn is_clean(&self) -> bool {
        self.stages
            .iter()
            .all(|r| matches!(r.status, StageStatus::Completed | StageStatus::Skipped { .. }))
    }
}
