use std::time::Duration;

use crate::types::{PublishStatus, RunReport, StageStatus};

pub fn format_duration(d: Duration) -> String {
    let secs = d.as_secs_f64();
    if secs < 60.0 {
        format!("{:.1}s", secs)
    } else {
        format!("{:.0}m {:.0}s", (secs / 60.0).floor(), secs % 60.0)
    }
}

fn status_mark(status: &StageStatus) -> &'static str {
    match status {
        StageStatus::Completed => "✓",
        StageStatus::Degraded { .. } => "~",
        StageStatus::Skipped { .. } => "-",
        StageStatus::Failed { .. } => "✗",
    }
}

pub fn format_report_readable(report: &RunReport) -> String {
    let story = &report.story;
    let mut output = String::new();

    let title = match story.translation.as_ref() {
        Some(t) if !t.title.is_empty() => format!("{} ({})", story.title(), t.title),
        _ => story.title().to_string(),
    };
    output.push_str(&format!("# {}\n\n", title));
    output.push_str(&format!(
        "**Date:** {} | **Name:** {} | **Source:** {}\n\n",
        story.date,
        story.name,
        story.url.as_deref().unwrap_or("mock")
    ));

    output.push_str("## Stages\n\n");
    for stage in &report.stages {
        output.push_str(&format!(
            "{} {:<16} {:<9} {} attempt(s), {}",
            status_mark(&stage.status),
            stage.stage.name(),
            stage.status.label(),
            stage.attempts,
            format_duration(stage.elapsed)
        ));
        if let Some(detail) = stage.status.detail() {
            output.push_str(&format!("\n    {}", detail));
        }
        output.push('\n');
    }
    output.push('\n');

    output.push_str("## Outputs\n\n");
    output.push_str(&format!("• sceneries: {}\n", story.sceneries.len()));
    for image in &story.images {
        output.push_str(&format!(
            "• image: {} ({})\n",
            image.path.display(),
            image.scenery_title
        ));
    }
    if let Some(audio) = &story.audio {
        output.push_str(&format!("• audio: {}\n", audio.display()));
    }
    if let Some(video) = &story.video {
        output.push_str(&format!("• video: {}\n", video.display()));
    }
    output.push('\n');

    if !report.publish.is_empty() {
        output.push_str("## Publishing\n\n");
        for outcome in &report.publish {
            let status = match outcome.status {
                PublishStatus::Published => "published",
                PublishStatus::Skipped => "skipped",
                PublishStatus::Failed => "failed",
            };
            output.push_str(&format!(
                "• {:<10} {:<9} {}\n",
                outcome.platform.name(),
                status,
                outcome.detail
            ));
        }
        output.push('\n');
    }

    output
}

#[cfg(test)]
mod tests {
    use std::path::PathBuf;

    use super::*;
    use crate::{
        publishers::PublisherKind,
        types::{GeneratedImage, PublishOutcome, Stage, StageReport, Story, StoryText},
    };

    #[test]
    fn durations() {
        assert_eq!(format_duration(Duration::from_millis(2500)), "2.5s");
        assert_eq!(format_duration(Duration::from_secs(125)), "2m 5s");
    }

    #[test]
    fn report_lists_stages_outputs_and_platforms() {
        let mut story = Story::new(None);
        story.name = "प्यासाकौआ".into();
        story.source = Some(StoryText {
            language: "Hindi".into(),
            title: "प्यासा कौआ".into(),
            content: String::new(),
        });
        story.images.push(GeneratedImage {
            scenery_title: "Water Rising".into(),
            path: PathBuf::from("output/images/Water-Rising.png"),
        });

        let report = RunReport {
            story,
            stages: vec![
                StageReport::new(Stage::Fetch, StageStatus::Completed, 1, Duration::from_secs(1)),
                StageReport::skipped(Stage::AssembleVideo, "no images"),
            ],
            publish: vec![PublishOutcome {
                platform: PublisherKind::Youtube,
                status: PublishStatus::Skipped,
                detail: "no video".into(),
            }],
        };

        let text = format_report_readable(&report);
        assert!(text.starts_with("# प्यासा कौआ\n"));
        assert!(text.contains("**Source:** mock"));
        assert!(text.contains("✓ fetch"));
        assert!(text.contains("- video-gen"));
        assert!(text.contains("\n    no images\n"));
        assert!(text.contains("• image: output/images/Water-Rising.png (Water Rising)"));
        assert!(text.contains("YouTube"));
    }
}
