// Input probing using ffprobe

use serde::{Deserialize, Serialize};
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tracing::warn;

use crate::engine::core::{Tool, ToolRunner};
use crate::engine::error::EngineError;

/// Bounded wait so corrupt inputs can't stall a batch
pub const PROBE_TIMEOUT: Duration = Duration::from_secs(30);

/// Stream attributes of the first video stream.
///
/// A zero-valued `MediaInfo` (bit depth 0) means the probe failed; callers treat
/// it as an 8-bit source.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MediaInfo {
    pub width: u32,
    pub height: u32,
    pub pix_fmt: String,
    pub bit_depth: u8,
    pub codec: String,
    pub duration: Option<f64>,
}

impl MediaInfo {
    /// Bit depth with the 8-bit assumption applied to unknown sources
    pub fn effective_bit_depth(&self) -> u8 {
        if self.bit_depth == 0 { 8 } else { self.bit_depth }
    }

    pub fn is_ten_bit(&self) -> bool {
        self.bit_depth == 10 || self.pix_fmt.contains("10")
    }
}

#[derive(Debug, Deserialize)]
struct FfprobeStream {
    codec_name: Option<String>,
    width: Option<u32>,
    height: Option<u32>,
    pix_fmt: Option<String>,
    bits_per_raw_sample: Option<String>,
    duration: Option<String>,
}

#[derive(Debug, Deserialize)]
struct FfprobeFormat {
    duration: Option<String>,
}

#[derive(Debug, Deserialize)]
struct FfprobeOutput {
    #[serde(default)]
    streams: Vec<FfprobeStream>,
    format: Option<FfprobeFormat>,
}

/// Reads stream attributes through ffprobe
#[derive(Clone)]
pub struct MediaProbe {
    tools: Arc<dyn ToolRunner>,
    timeout: Duration,
}

impl MediaProbe {
    pub fn new(tools: Arc<dyn ToolRunner>) -> Self {
        Self {
            tools,
            timeout: PROBE_TIMEOUT,
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Probe `path`, returning a zero-valued `MediaInfo` on any failure
    pub fn probe(&self, path: &Path) -> MediaInfo {
        match self.try_probe(path) {
            Ok(info) => info,
            Err(e) => {
                warn!("{}", e);
                MediaInfo::default()
            }
        }
    }

    /// Probe `path`, reporting why it failed
    pub fn try_probe(&self, path: &Path) -> Result<MediaInfo, EngineError> {
        let output = self
            .tools
            .output(Tool::Ffprobe, &probe_args(path), self.timeout)?;

        if !output.success() {
            return Err(probe_failure(
                path,
                format!("ffprobe exited with {:?}: {}", output.code, output.stderr.trim()),
            ));
        }

        parse_ffprobe_output(&output.stdout).map_err(|reason| probe_failure(path, reason))
    }
}

fn probe_failure(path: &Path, reason: String) -> EngineError {
    EngineError::ProbeFailure {
        path: path.display().to_string(),
        reason,
    }
}

/// ffprobe arguments for the first video stream as JSON
pub fn probe_args(path: &Path) -> Vec<String> {
    let mut args: Vec<String> = [
        "-v",
        "quiet",
        "-print_format",
        "json",
        "-show_format",
        "-show_streams",
        "-select_streams",
        "v:0", // First video stream only
    ]
    .iter()
    .map(|s| s.to_string())
    .collect();
    args.push(path.to_string_lossy().to_string());
    args
}

/// Parse ffprobe JSON into `MediaInfo`
pub fn parse_ffprobe_output(json: &str) -> Result<MediaInfo, String> {
    let probe: FfprobeOutput =
        serde_json::from_str(json).map_err(|e| format!("Failed to parse ffprobe JSON: {}", e))?;

    let stream = probe
        .streams
        .into_iter()
        .next()
        .ok_or("No video stream found")?;

    let pix_fmt = stream.pix_fmt.unwrap_or_default();
    let bit_depth = stream
        .bits_per_raw_sample
        .as_deref()
        .and_then(|s| s.parse::<u8>().ok())
        .filter(|&bits| bits > 0)
        .unwrap_or_else(|| bit_depth_from_pix_fmt(&pix_fmt));

    // Matroska keeps the duration on the container, not the stream
    let duration = stream
        .duration
        .or_else(|| probe.format.and_then(|f| f.duration))
        .and_then(|s| s.parse::<f64>().ok());

    Ok(MediaInfo {
        width: stream.width.unwrap_or(0),
        height: stream.height.unwrap_or(0),
        pix_fmt,
        bit_depth,
        codec: stream.codec_name.unwrap_or_default(),
        duration,
    })
}

/// Infer bit depth from pixel format names like `yuv420p10le` or `p010le`
pub fn bit_depth_from_pix_fmt(pix_fmt: &str) -> u8 {
    // nv12 is an 8-bit layout, so match the depth markers rather than any "12"
    let has = |markers: &[&str]| markers.iter().any(|m| pix_fmt.contains(m));
    if has(&["p12", "12le", "12be"]) {
        12
    } else if has(&["p10", "p010", "10le", "10be"]) {
        10
    } else {
        8
    }
}
