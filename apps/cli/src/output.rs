use std::path::{Path, PathBuf};

use crate::text::slugify;

const IMAGE_EXTENSIONS: [&str; 7] = ["png", "jpg", "jpeg", "gif", "bmp", "tiff", "webp"];

pub fn get_images_dir(output_dir: &Path) -> PathBuf {
    output_dir.join("images")
}

pub fn get_audios_dir(output_dir: &Path) -> PathBuf {
    output_dir.join("audios")
}

pub fn get_videos_dir(output_dir: &Path) -> PathBuf {
    output_dir.join("videos")
}

/// `{output}/images/{slug}.png`
pub fn get_image_path(output_dir: &Path, scenery_title: &str) -> PathBuf {
    let slug = slugify(scenery_title);
    let slug = if slug.is_empty() { "scenery".to_string() } else { slug };
    get_images_dir(output_dir).join(format!("{slug}.png"))
}

/// `{output}/audios/{engine}_{name}.{ext}`
pub fn get_audio_path(output_dir: &Path, engine: &str, story_name: &str, ext: &str) -> PathBuf {
    get_audios_dir(output_dir).join(format!("{engine}_{story_name}.{ext}"))
}

/// `{output}/videos/{name}.mp4`
pub fn get_video_path(output_dir: &Path, story_name: &str) -> PathBuf {
    get_videos_dir(output_dir).join(format!("{story_name}.mp4"))
}

pub fn get_report_path(output_dir: &Path, story_name: &str) -> PathBuf {
    output_dir.join(format!("{story_name}_report.json"))
}

pub fn is_image_file(path: &Path) -> bool {
    path.extension()
        .map(|ext| ext.to_string_lossy().to_lowercase())
        .is_some_and(|ext| IMAGE_EXTENSIONS.contains(&ext.as_str()))
}

/// Non-empty image files in `dir`, sorted by name.
pub fn find_images_in_dir(dir: &Path) -> Vec<PathBuf> {
    let Ok(entries) = std::fs::read_dir(dir) else {
        return Vec::new();
    };

    let mut images: Vec<PathBuf> = entries
        .flatten()
        .map(|entry| entry.path())
        .filter(|path| is_image_file(path))
        .filter(|path| std::fs::metadata(path).is_ok_and(|m| m.is_file() && m.len() > 0))
        .collect();
    images.sort();
    images
}
