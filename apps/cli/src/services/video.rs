use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tokio::process::Command;
use tracing::{debug, info, warn};

use crate::{error::StageError, services::VideoAssembler};

/// Seconds each image stays on screen when there is no narration.
pub const SILENT_SECONDS_PER_IMAGE: f64 = 3.0;
pub const MIN_SECONDS_PER_IMAGE: f64 = 1.0;
pub const FRAME_RATE: u32 = 24;

/// Seconds per image: narration split evenly, never under a second.
pub fn seconds_per_image(image_count: usize, audio_secs: Option<f64>) -> f64 {
    match audio_secs {
        Some(secs) if image_count > 0 => (secs / image_count as f64).max(MIN_SECONDS_PER_IMAGE),
        _ => SILENT_SECONDS_PER_IMAGE,
    }
}

/// Images from `images` that exist on disk.
pub fn existing_images(images: &[PathBuf]) -> Vec<PathBuf> {
    images.iter().filter(|p| p.is_file()).cloned().collect()
}

/// ffmpeg concat demuxer script. The last image is listed twice so its
/// duration is honoured.
pub fn render_manifest(images: &[PathBuf], seconds: f64) -> String {
    let mut manifest = String::from("ffconcat version 1.0\n");
    for image in images {
        manifest.push_str(&format!(
            "file '{}'\nduration {seconds:.3}\n",
            escape_path(image)
        ));
    }
    if let Some(last) = images.last() {
        manifest.push_str(&format!("file '{}'\n", escape_path(last)));
    }
    manifest
}

fn escape_path(path: &Path) -> String {
    let absolute = std::path::absolute(path).unwrap_or_else(|_| path.to_path_buf());
    absolute.to_string_lossy().replace('\'', r"'\''")
}

pub fn manifest_path(video_path: &Path) -> PathBuf {
    video_path.with_extension("ffconcat")
}

/// Narration length in seconds. WAV files are measured directly; anything
/// else goes through ffprobe.
pub async fn audio_duration(path: &Path) -> Result<f64, StageError> {
    let is_wav = path
        .extension()
        .is_some_and(|e| e.eq_ignore_ascii_case("wav"));

    if is_wav {
        let reader = hound::WavReader::open(path)?;
        let spec = reader.spec();
        return Ok(reader.duration() as f64 / spec.sample_rate as f64);
    }

    let output = Command::new("ffprobe")
        .args([
            "-v",
            "error",
            "-show_entries",
            "format=duration",
            "-of",
            "default=noprint_wrappers=1:nokey=1",
        ])
        .arg(path)
        .output()
        .await
        .map_err(|e| StageError::Process {
            tool: "ffprobe",
            reason: e.to_string(),
        })?;

    if !output.status.success() {
        return Err(StageError::Process {
            tool: "ffprobe",
            reason: String::from_utf8_lossy(&output.stderr).to_string(),
        });
    }

    String::from_utf8_lossy(&output.stdout)
        .trim()
        .parse::<f64>()
        .map_err(|e| StageError::Process {
            tool: "ffprobe",
            reason: format!("unreadable duration: {e}"),
        })
}

async fn write_manifest(
    images: &[PathBuf],
    audio: Option<&Path>,
    video_path: &Path,
) -> Result<(PathBuf, Vec<PathBuf>), StageError> {
    let images = existing_images(images);
    if images.is_empty() {
        return Err(StageError::MissingInput("no image files on disk".to_string()));
    }

    let audio_secs = match audio {
        Some(path) => match audio_duration(path).await {
            Ok(secs) => Some(secs),
            Err(e) => {
                warn!(error = %e, "could not measure narration, using fixed slide length");
                None
            }
        },
        None => None,
    };
    let seconds = seconds_per_image(images.len(), audio_secs);

    if let Some(dir) = video_path.parent() {
        tokio::fs::create_dir_all(dir)
            .await
            .map_err(|e| StageError::io(dir, e))?;
    }
    let manifest = manifest_path(video_path);
    tokio::fs::write(&manifest, render_manifest(&images, seconds))
        .await
        .map_err(|e| StageError::io(&manifest, e))?;

    debug!(images = images.len(), seconds, manifest = %manifest.display(), "slide manifest written");
    Ok((manifest, images))
}

/// Removes the slide manifest once ffmpeg is done with it. Returns whether
/// the file was removed.
async fn discard_manifest(manifest: &Path) -> bool {
    match tokio::fs::remove_file(manifest).await {
        Ok(()) => true,
        Err(e) => {
            debug!(error = %e, manifest = %manifest.display(), "could not remove slide manifest");
            false
        }
    }
}

/// Renders the slideshow with ffmpeg.
pub struct FfmpegVideoAssembler;

#[async_trait]
impl VideoAssembler for FfmpegVideoAssembler {
    async fn assemble(
        &self,
        images: &[PathBuf],
        audio: Option<&Path>,
        video_path: &Path,
    ) -> Result<PathBuf, StageError> {
        let (manifest, used) = write_manifest(images, audio, video_path).await?;
        info!(images = used.len(), narrated = audio.is_some(), "rendering video");

        let mut cmd = Command::new("ffmpeg");
        cmd.arg("-y")
            .args(["-f", "concat", "-safe", "0", "-i"])
            .arg(&manifest);
        if let Some(audio) = audio {
            cmd.arg("-i").arg(audio);
        }
        cmd.arg("-r")
            .arg(FRAME_RATE.to_string())
            .args(["-c:v", "libx264", "-pix_fmt", "yuv420p"]);
        if audio.is_some() {
            cmd.args(["-c:a", "aac", "-shortest"]);
        }
        cmd.arg(video_path);

        let output = cmd.output().await.map_err(|e| StageError::Process {
            tool: "ffmpeg",
            reason: e.to_string(),
        })?;

        if !output.status.success() {
            return Err(StageError::Process {
                tool: "ffmpeg",
                reason: String::from_utf8_lossy(&output.stderr).to_string(),
            });
        }

        discard_manifest(&manifest).await;
        Ok(video_path.to_path_buf())
    }
}

/// Stand-in assembler: stops after writing the slide manifest and returns
/// its path.
pub struct ManifestVideoAssembler;

#[async_trait]
impl VideoAssembler for ManifestVideoAssembler {
    async fn assemble(
        &self,
        images: &[PathBuf],
        audio: Option<&Path>,
        video_path: &Path,
    ) -> Result<PathBuf, StageError> {
        let (manifest, _) = write_manifest(images, audio, video_path).await?;
        Ok(manifest)
    }
}
