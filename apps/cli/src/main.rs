use std::{path::PathBuf, process, time::Duration};

use anyhow::{Context, Result};
use clap::{Parser, ValueEnum};
use console::style;
use indicatif::{ProgressBar, ProgressStyle};
use tokio::time::Instant;
use tracing::info;
use tracing_subscriber::EnvFilter;

use crate::{
    config::{Settings, validate_url},
    format::{format_duration, format_report_readable},
    output::get_report_path,
    pipeline::{PipelineDeps, run_story},
    provider::Provider,
    publishers::{Publisher, PublisherKind, RecordingPublisher, create_publisher},
    services::Services,
    types::{PublishOutcome, PublishStatus, RunReport},
    workers::events::JobSpec,
};

mod config;
mod error;
mod format;
mod http;
mod output;
mod pipeline;
mod provider;
mod publishers;
mod services;
mod text;
mod types;
mod workers;

/// CLI wrapper for Provider enum (needed for clap ValueEnum)
#[derive(Clone, Copy, ValueEnum)]
enum CliProvider {
    Grok,
    Openai,
    Gemini,
}

impl From<CliProvider> for Provider {
    fn from(cli: CliProvider) -> Self {
        match cli {
            CliProvider::Grok => Provider::Grok,
            CliProvider::Openai => Provider::Openai,
            CliProvider::Gemini => Provider::Gemini,
        }
    }
}

#[derive(Parser)]
#[command(name = "kahani")]
#[command(
    about = "Turn a children's story page into translated text, illustrations, narration and a video, then publish it"
)]
struct Cli {
    /// Story page URL. Optional with --mock.
    url: Option<String>,

    /// Use offline stand-ins for every network service
    #[arg(long)]
    mock: bool,

    #[arg(long)]
    facebook: bool,

    #[arg(long)]
    instagram: bool,

    #[arg(long)]
    twitter: bool,

    #[arg(long)]
    threads: bool,

    #[arg(long)]
    youtube: bool,

    /// Publish to every platform
    #[arg(long)]
    all: bool,

    /// Render at most N sceneries
    #[arg(long, value_name = "N")]
    images: Option<usize>,

    /// Text-to-speech engine
    #[arg(long, value_parser = ["gtts", "espeak"])]
    tts: Option<String>,

    /// LLM provider for translation and scenery extraction
    #[arg(short, long)]
    provider: Option<CliProvider>,

    /// Output directory
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Run every stage but only record what would be posted
    #[arg(long)]
    dry_run: bool,

    /// Config file (default: ./kahani.toml, then the user config dir)
    #[arg(short, long)]
    config: Option<PathBuf>,
}

impl Cli {
    fn platforms(&self) -> Vec<PublisherKind> {
        if self.all {
            return PublisherKind::ALL.to_vec();
        }
        PublisherKind::ALL
            .into_iter()
            .filter(|kind| match kind {
                PublisherKind::Twitter => self.twitter,
                PublisherKind::Instagram => self.instagram,
                PublisherKind::Threads => self.threads,
                PublisherKind::Facebook => self.facebook,
                PublisherKind::Youtube => self.youtube,
            })
            .collect()
    }

    fn apply(&self, settings: &mut Settings) {
        settings.mock |= self.mock;
        settings.dry_run = self.dry_run;
        if let Some(n) = self.images {
            settings.max_images = Some(n);
        }
        if let Some(tts) = &self.tts {
            settings.tts = tts.clone();
        }
        if let Some(provider) = self.provider {
            settings.provider = provider.into();
        }
        if let Some(output) = &self.output {
            settings.output_dir = output.clone();
        }
    }
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn create_spinner(msg: &str) -> ProgressBar {
    let pb = ProgressBar::new_spinner();
    let spinner_style = ProgressStyle::default_spinner()
        .tick_chars("⠁⠂⠄⡀⢀⠠⠐⠈ ")
        .template("{spinner:.cyan} {msg}")
        .unwrap_or_else(|_| ProgressStyle::default_spinner());
    pb.set_style(spinner_style);
    pb.set_message(msg.to_string());
    pb.enable_steady_tick(Duration::from_millis(80));
    pb
}

/// Live publishers for the selected platforms. Mock and dry runs record
/// posts instead. Platforms that cannot be set up are reported, not fatal.
fn build_publishers(
    platforms: &[PublisherKind],
    settings: &Settings,
) -> (Vec<Box<dyn Publisher>>, Vec<PublishOutcome>) {
    let mut publishers: Vec<Box<dyn Publisher>> = Vec::new();
    let mut unavailable = Vec::new();

    for &kind in platforms {
        if settings.mock || settings.dry_run {
            publishers.push(Box::new(RecordingPublisher::new(kind)));
            continue;
        }
        match create_publisher(kind, &settings.publishers) {
            Ok(publisher) => publishers.push(publisher),
            Err(e) => unavailable.push(PublishOutcome {
                platform: kind,
                status: PublishStatus::Skipped,
                detail: format!("not configured: {e}"),
            }),
        }
    }
    (publishers, unavailable)
}

fn exit_with(err: impl std::fmt::Display) -> ! {
    eprintln!("{} {}", style("Error:").red().bold(), err);
    process::exit(1);
}

async fn save_report(report: &RunReport, settings: &Settings) -> Result<PathBuf> {
    let path = get_report_path(&settings.output_dir, &report.story.name);
    if let Some(dir) = path.parent() {
        tokio::fs::create_dir_all(dir).await?;
    }
    let json = serde_json::to_string_pretty(report)?;
    tokio::fs::write(&path, json)
        .await
        .with_context(|| format!("writing {}", path.display()))?;
    Ok(path)
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    init_tracing();
    let cli = Cli::parse();

    let mut settings = Settings::load(cli.config.as_deref()).unwrap_or_else(|e| exit_with(e));
    cli.apply(&mut settings);
    if let Err(e) = settings.validate() {
        exit_with(e);
    }
    let url = validate_url(cli.url.as_deref(), settings.mock).unwrap_or_else(|e| exit_with(e));

    // Validate API key early
    let services = if settings.mock {
        Services::mock(&settings)
    } else {
        Services::live(&settings).unwrap_or_else(|e| exit_with(e))
    };

    let (publishers, unavailable) = build_publishers(&cli.platforms(), &settings);

    println!(
        "\n{}  {}\n",
        style("kahani").cyan().bold(),
        style(if settings.mock {
            "Story Pipeline (mock)"
        } else {
            "Story Pipeline"
        })
        .dim()
    );
    println!("{}", style("─".repeat(60)).dim());

    let total_start = Instant::now();
    let spinner = create_spinner("Starting pipeline...");
    let deps = PipelineDeps {
        services,
        publishers,
        unavailable,
        retries: settings.retry.clone(),
        progress: spinner.clone(),
    };
    let job = JobSpec::new(&settings, url);
    info!(mock = job.mock, dry_run = job.dry_run, "running story pipeline");

    let outcome = run_story(job, deps).await?;
    spinner.finish_and_clear();

    let report = match outcome {
        Ok(report) => report,
        Err(failed) => exit_with(failed),
    };

    let report_path = save_report(&report, &settings).await?;

    println!(
        "\n{} {}\n",
        style("Total time:").dim(),
        style(format_duration(total_start.elapsed())).cyan().bold()
    );
    println!(
        "{} {}\n",
        style("Saved:").dim(),
        style(report_path.display()).cyan()
    );
    println!("{}", style("─".repeat(60)).dim());

    let readable = format_report_readable(&report);
    println!("{}", readable);

    if !report.is_clean() {
        println!("{}", style("Finished with degraded stages.").yellow());
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn all_selects_every_platform() {
        let cli = Cli::parse_from(["kahani", "--mock", "--all"]);
        assert_eq!(cli.platforms(), PublisherKind::ALL.to_vec());

        let cli = Cli::parse_from(["kahani", "--mock", "--twitter", "--youtube"]);
        assert_eq!(
            cli.platforms(),
            vec![PublisherKind::Twitter, PublisherKind::Youtube]
        );
    }

    #[test]
    fn flags_override_settings() {
        let cli = Cli::parse_from([
            "kahani",
            "https://example.com/s.html",
            "--images",
            "2",
            "--tts",
            "espeak",
            "--provider",
            "openai",
            "--output",
            "out",
            "--dry-run",
        ]);
        let mut settings = Settings::default();
        cli.apply(&mut settings);

        assert_eq!(settings.max_images, Some(2));
        assert_eq!(settings.tts, "espeak");
        assert_eq!(settings.provider, Provider::Openai);
        assert_eq!(settings.output_dir, PathBuf::from("out"));
        assert!(settings.dry_run && !settings.mock);
    }

    #[test]
    fn unknown_tts_engine_is_rejected() {
        assert!(Cli::try_parse_from(["kahani", "--tts", "festival"]).is_err());
    }

    #[test]
    fn dry_run_records_instead_of_posting() {
        let settings = Settings {
            dry_run: true,
            ..Settings::default()
        };
        let (publishers, unavailable) =
            build_publishers(&[PublisherKind::Facebook, PublisherKind::Youtube], &settings);
        assert_eq!(publishers.len(), 2);
        assert!(unavailable.is_empty());
    }

    #[test]
    fn unconfigured_platforms_are_reported() {
        let (publishers, unavailable) =
            build_publishers(&[PublisherKind::Facebook], &Settings::default());
        assert!(publishers.is_empty());
        assert_eq!(unavailable[0].status, PublishStatus::Skipped);
        assert!(unavailable[0].detail.starts_with("not configured"));
    }
}
