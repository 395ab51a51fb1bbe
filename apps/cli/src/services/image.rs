use std::{
    path::{Path, PathBuf},
    time::Duration,
};

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::{
    config::{ImageSettings, require_env},
    error::{HttpError, StageError},
    http,
    output::get_image_path,
    services::ImageGenerator,
    types::Scenery,
};

const SERVICE: &str = "image service";
pub const API_KEY_ENV: &str = "AIHORDE_API_KEY";
/// Wait assumed when a check response carries no `wait_time`.
pub const DEFAULT_WAIT_SECS: u64 = 30;
pub const MIN_WAIT_SECS: u64 = 1;

/// Pause before the next check: the server's hint capped at `max_wait_secs`,
/// never shorter than a second.
pub fn poll_wait(hint_secs: u64, max_wait_secs: u64) -> Duration {
    Duration::from_secs(hint_secs.min(max_wait_secs).max(MIN_WAIT_SECS))
}

fn default_wait_time() -> u64 {
    DEFAULT_WAIT_SECS
}

pub fn build_prompt(scenery: &Scenery) -> String {
    let mut prompt = format!(
        "A hyper-realistic, cinematic illustration of: {}. Ultra-detailed, sharp focus.",
        scenery.description.trim()
    );
    if !scenery.sentiments.is_empty() {
        prompt.push_str(&format!(" Mood: {}.", scenery.sentiments.join(", ")));
    }
    prompt
}

#[derive(Serialize)]
struct SubmitRequest<'a> {
    prompt: &'a str,
    params: SubmitParams,
    r2: bool,
    nsfw: bool,
}

#[derive(Serialize)]
struct SubmitParams {
    width: u32,
    height: u32,
    steps: u32,
    n: u32,
}

#[derive(Deserialize)]
struct SubmitResponse {
    id: Option<String>,
}

#[derive(Deserialize)]
struct CheckResponse {
    #[serde(default)]
    done: bool,
    #[serde(default)]
    faulted: bool,
    #[serde(default = "default_wait_time")]
    wait_time: u64,
}

#[derive(Deserialize)]
struct StatusResponse {
    #[serde(default)]
    generations: Vec<Generation>,
}

#[derive(Deserialize)]
struct Generation {
    img: String,
}

/// Client for an AI Horde style diffusion API: submit a job, poll until it
/// is done, then download the first generation.
pub struct HordeImageGenerator {
    http: Client,
    settings: ImageSettings,
    api_key: Option<String>,
}

impl HordeImageGenerator {
    pub fn new(settings: ImageSettings) -> Self {
        Self {
            http: http::client(),
            settings,
            api_key: None,
        }
    }

    /// Uses `key` instead of reading the environment.
    pub fn with_api_key(mut self, key: impl Into<String>) -> Self {
        self.api_key = Some(key.into());
        self
    }

    fn api_key(&self) -> Result<String, StageError> {
        match &self.api_key {
            Some(key) => Ok(key.clone()),
            None => Ok(require_env(API_KEY_ENV)?),
        }
    }

    fn url(&self, tail: &str) -> String {
        format!("{}/{}", self.settings.base_url.trim_end_matches('/'), tail)
    }

    async fn submit(&self, prompt: &str, key: &str) -> Result<String, StageError> {
        let request = SubmitRequest {
            prompt,
            params: SubmitParams {
                width: self.settings.width,
                height: self.settings.height,
                steps: self.settings.steps,
                n: 1,
            },
            r2: true,
            nsfw: false,
        };

        let response: SubmitResponse = http::send_json(
            SERVICE,
            self.http
                .post(self.url("generate/async"))
                .header("apikey", key)
                .json(&request),
        )
        .await?;

        response
            .id
            .filter(|id| !id.is_empty())
            .ok_or_else(|| StageError::ImageJob {
                job_id: String::new(),
                reason: "submission returned no job id".to_string(),
            })
    }

    async fn wait_until_done(&self, job_id: &str) -> Result<(), StageError> {
        for poll in 1..=self.settings.max_polls {
            let check: CheckResponse = http::send_json(
                SERVICE,
                self.http.get(self.url(&format!("generate/check/{job_id}"))),
            )
            .await?;

            if check.faulted {
                return Err(StageError::ImageJob {
                    job_id: job_id.to_string(),
                    reason: "job faulted".to_string(),
                });
            }
            if check.done {
                debug!(job_id, poll, "image job done");
                return Ok(());
            }

            if poll == self.settings.max_polls {
                break;
            }
            let wait = poll_wait(check.wait_time, self.settings.max_wait_secs);
            debug!(job_id, poll, wait_secs = wait.as_secs(), "image job pending");
            tokio::time::sleep(wait).await;
        }

        Err(StageError::PollLimit {
            job_id: job_id.to_string(),
            polls: self.settings.max_polls,
        })
    }

    async fn fetch_result(&self, job_id: &str) -> Result<String, StageError> {
        let status: StatusResponse = http::send_json(
            SERVICE,
            self.http.get(self.url(&format!("generate/status/{job_id}"))),
        )
        .await?;

        status
            .generations
            .into_iter()
            .next()
            .map(|g| g.img)
            .filter(|img| !img.is_empty())
            .ok_or_else(|| StageError::ImageJob {
                job_id: job_id.to_string(),
                reason: "no generations returned".to_string(),
            })
    }
}

#[async_trait]
impl ImageGenerator for HordeImageGenerator {
    async fn generate(&self, scenery: &Scenery, output_dir: &Path) -> Result<PathBuf, StageError> {
        let key = self.api_key()?;
        let prompt = build_prompt(scenery);

        let job_id = self.submit(&prompt, &key).await?;
        info!(job_id = %job_id, scenery = %scenery.title, "image job submitted");

        self.wait_until_done(&job_id).await?;
        let img = self.fetch_result(&job_id).await?;

        if !(img.starts_with("http://") || img.starts_with("https://")) {
            return Err(HttpError::Decode {
                service: SERVICE,
                reason: "generation is not a downloadable URL".to_string(),
            }
            .into());
        }

        let bytes = http::bytes(SERVICE, self.http.get(&img)).await?;
        let path = get_image_path(output_dir, &scenery.title);
        if let Some(dir) = path.parent() {
            tokio::fs::create_dir_all(dir)
                .await
                .map_err(|e| StageError::io(dir, e))?;
        }
        tokio::fs::write(&path, &bytes)
            .await
            .map_err(|e| StageError::io(&path, e))?;

        info!(path = %path.display(), bytes = bytes.len(), "image saved");
        Ok(path)
    }
}
