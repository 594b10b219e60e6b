use super::types::{ConversionSettings, Job, OutputFormat};
use anyhow::Result;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

/// Input extensions the converter accepts
pub const VIDEO_EXTENSIONS: &[&str] = &["mp4", "mkv", "mov", "avi", "flv", "wmv", "webm"];

/// Suffix appended to converted file names
pub const OUTPUT_SUFFIX: &str = "_H264";

/// Check if a path has a video file extension
pub fn is_video_file(path: &Path) -> bool {
    if let Some(ext) = path.extension() {
        if let Some(ext_str) = ext.to_str() {
            return VIDEO_EXTENSIONS.contains(&ext_str.to_lowercase().as_str());
        }
    }
    false
}

/// `{output_dir}/{basename}_H264.{ext}`
pub fn derive_output_path(input: &Path, output_dir: &Path, format: OutputFormat) -> PathBuf {
    let basename = input
        .file_stem()
        .map(|s| s.to_string_lossy().to_string())
        .unwrap_or_else(|| "output".to_string());
    output_dir.join(format!("{}{}.{}", basename, OUTPUT_SUFFIX, format.extension()))
}

/// Scan a directory recursively for video files and invoke a callback for each file found
pub fn scan_streaming<F>(root: &Path, mut on_file: F) -> Result<()>
where
    F: FnMut(PathBuf),
{
    for entry in WalkDir::new(root)
        .follow_links(false)
        .sort_by_file_name()
        .into_iter()
        .filter_map(|e| e.ok())
    {
        let path = entry.path();
        if path.is_file() && is_video_file(path) {
            on_file(path.to_path_buf());
        }
    }

    Ok(())
}

/// Scan a directory recursively for video files
pub fn scan(root: &Path) -> Result<Vec<PathBuf>> {
    let mut files = Vec::new();
    scan_streaming(root, |path| files.push(path))?;
    Ok(files)
}

/// Expand a mix of files and directories into video inputs, keeping order
pub fn collect_inputs(paths: &[PathBuf]) -> Result<Vec<PathBuf>> {
    let mut inputs = Vec::new();
    for path in paths {
        if path.is_dir() {
            scan_streaming(path, |p| inputs.push(p))?;
        } else if is_video_file(path) {
            inputs.push(path.clone());
        }
    }
    Ok(inputs)
}

/// Build pending jobs with output paths derived from the settings
pub fn build_jobs(inputs: Vec<PathBuf>, settings: &ConversionSettings) -> Vec<Job> {
    inputs
        .into_iter()
        .map(|input| Job::for_input(input, settings))
        .collect()
}
