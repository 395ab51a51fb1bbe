use std::{
    path::{Path, PathBuf},
    process::Stdio,
    sync::Arc,
};

use async_trait::async_trait;
use reqwest::Client;
use tokio::{io::AsyncWriteExt, process::Command};
use tracing::{debug, info};

use crate::{
    config::AudioSettings,
    error::StageError,
    http,
    services::SpeechSynthesizer,
};

/// Google Translate TTS rejects longer inputs.
const GTTS_MAX_CHARS: usize = 100;

/// Builds the synthesizer for a configured engine name.
pub fn synthesizer_for(
    engine: &str,
    settings: &AudioSettings,
) -> Result<Arc<dyn SpeechSynthesizer>, StageError> {
    match engine.to_ascii_lowercase().as_str() {
        "gtts" => Ok(Arc::new(GttsSynthesizer::new(settings))),
        "espeak" => Ok(Arc::new(EspeakSynthesizer::new(&settings.voice_language))),
        _ => Err(StageError::UnknownEngine(engine.to_string())),
    }
}

async fn ensure_parent(path: &Path) -> Result<(), StageError> {
    if let Some(dir) = path.parent() {
        tokio::fs::create_dir_all(dir)
            .await
            .map_err(|e| StageError::io(dir, e))?;
    }
    Ok(())
}

/// Splits text into pieces of at most `max` characters, breaking at
/// whitespace and cutting words that are longer than `max`.
pub fn split_for_tts(text: &str, max: usize) -> Vec<String> {
    let mut pieces = Vec::new();
    let mut current = String::new();
    let mut current_len = 0;

    for word in text.split_whitespace() {
        let mut word = word;
        while word.chars().count() > max {
            if current_len > 0 {
                pieces.push(std::mem::take(&mut current));
                current_len = 0;
            }
            let cut = word.char_indices().nth(max).map(|(i, _)| i).unwrap_or(word.len());
            pieces.push(word[..cut].to_string());
            word = &word[cut..];
        }
        if word.is_empty() {
            continue;
        }

        let word_len = word.chars().count();
        let needed = if current_len == 0 { word_len } else { current_len + 1 + word_len };
        if needed > max {
            pieces.push(std::mem::take(&mut current));
            current_len = 0;
        }
        if current_len > 0 {
            current.push(' ');
            current_len += 1;
        }
        current.push_str(word);
        current_len += word_len;
    }
    if current_len > 0 {
        pieces.push(current);
    }
    pieces
}

/// Google Translate text-to-speech over HTTP. Produces mp3.
pub struct GttsSynthesizer {
    http: Client,
    url: String,
    language: String,
}

impl GttsSynthesizer {
    pub fn new(settings: &AudioSettings) -> Self {
        Self {
            http: http::client(),
            url: settings.gtts_url.clone(),
            language: settings.voice_language.clone(),
        }
    }
}

#[async_trait]
impl SpeechSynthesizer for GttsSynthesizer {
    fn engine(&self) -> &'static str {
        "gtts"
    }

    fn extension(&self) -> &'static str {
        "mp3"
    }

    async fn synthesize(&self, text: &str, path: &Path) -> Result<PathBuf, StageError> {
        let pieces = split_for_tts(text, GTTS_MAX_CHARS);
        if pieces.is_empty() {
            return Err(StageError::MissingInput("narration text".to_string()));
        }
        info!(pieces = pieces.len(), "synthesizing with gtts");

        let total = pieces.len().to_string();
        let mut audio = Vec::new();
        for (idx, piece) in pieces.iter().enumerate() {
            let idx = idx.to_string();
            let request = self.http.get(&self.url).query(&[
                ("ie", "UTF-8"),
                ("client", "tw-ob"),
                ("tl", self.language.as_str()),
                ("q", piece.as_str()),
                ("idx", idx.as_str()),
                ("total", total.as_str()),
            ]);
            audio.extend(http::bytes("tts", request).await?);
        }

        ensure_parent(path).await?;
        tokio::fs::write(path, &audio)
            .await
            .map_err(|e| StageError::io(path, e))?;
        debug!(path = %path.display(), bytes = audio.len(), "gtts audio written");
        Ok(path.to_path_buf())
    }
}

/// Local `espeak-ng` process. Produces wav.
pub struct EspeakSynthesizer {
    voice: String,
}

impl EspeakSynthesizer {
    pub fn new(voice: &str) -> Self {
        Self {
            voice: voice.to_string(),
        }
    }
}

#[async_trait]
impl SpeechSynthesizer for EspeakSynthesizer {
    fn engine(&self) -> &'static str {
        "espeak"
    }

    fn extension(&self) -> &'static str {
        "wav"
    }

    async fn synthesize(&self, text: &str, path: &Path) -> Result<PathBuf, StageError> {
        ensure_parent(path).await?;

        let mut child = Command::new("espeak-ng")
            .arg("-v")
            .arg(&self.voice)
            .arg("-w")
            .arg(path)
            .arg("--stdin")
            .stdin(Stdio::piped())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| StageError::Process {
                tool: "espeak-ng",
                reason: e.to_string(),
            })?;

        if let Some(mut stdin) = child.stdin.take() {
            stdin
                .write_all(text.as_bytes())
                .await
                .map_err(|e| StageError::io(path, e))?;
        }

        let output = child
            .wait_with_output()
            .await
            .map_err(|e| StageError::Process {
                tool: "espeak-ng",
                reason: e.to_string(),
            })?;

        if !output.status.success() {
            return Err(StageError::Process {
                tool: "espeak-ng",
                reason: String::from_utf8_lossy(&output.stderr).to_string(),
            });
        }
        Ok(path.to_path_buf())
    }
}

/// Stand-in synthesizer: writes silence whose length follows the script.
pub struct SilentSynthesizer;

impl SilentSynthesizer {
    pub const SAMPLE_RATE: u32 = 16_000;
    const CHARS_PER_SECOND: usize = 50;
    const MAX_SECONDS: usize = 120;

    pub fn duration_secs(text: &str) -> usize {
        (text.chars().count() / Self::CHARS_PER_SECOND).clamp(1, Self::MAX_SECONDS)
    }
}

#[async_trait]
impl SpeechSynthesizer for SilentSynthesizer {
    fn engine(&self) -> &'static str {
        "silent"
    }

    fn extension(&self) -> &'static str {
        "wav"
    }

    async fn synthesize(&self, text: &str, path: &Path) -> Result<PathBuf, StageError> {
        ensure_parent(path).await?;

        let seconds = Self::duration_secs(text);
        let target = path.to_path_buf();
        tokio::task::spawn_blocking(move || -> Result<(), StageError> {
            let spec = hound::WavSpec {
                channels: 1,
                sample_rate: SilentSynthesizer::SAMPLE_RATE,
                bits_per_sample: 16,
                sample_format: hound::SampleFormat::Int,
            };
            let mut writer = hound::WavWriter::create(&target, spec)?;
            for _ in 0..seconds * SilentSynthesizer::SAMPLE_RATE as usize {
                writer.write_sample(0i16)?;
            }
            writer.finalize()?;
            Ok(())
        })
        .await
        .map_err(|e| StageError::Process {
            tool: "wav writer",
            reason: e.to_string(),
        })??;

        debug!(path = %path.display(), seconds, "silent narration written");
        Ok(path.to_path_buf())
    }
}

/// Reported when the configured engine does not exist, so the audio stage
/// fails while the rest of the run goes on.
pub struct UnavailableSynthesizer {
    pub engine: String,
}

#[async_trait]
impl SpeechSynthesizer for UnavailableSynthesizer {
    fn engine(&self) -> &'static str {
        "unavailable"
    }

    fn extension(&self) -> &'static str {
        "none"
    }

    async fn synthesize(&self, _text: &str, _path: &Path) -> Result<PathBuf, StageError> {
        Err(StageError::UnknownEngine(self.engine.clone()))
    }
}
