use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;
use uuid::Uuid;

use crate::engine::error::EngineError;

/// Settings enums travel through config files as their display strings
macro_rules! serde_via_str {
    ($($ty:ty),* $(,)?) => {$(
        impl TryFrom<String> for $ty {
            type Error = EngineError;

            fn try_from(value: String) -> Result<Self, Self::Error> {
                value.parse()
            }
        }

        impl From<$ty> for String {
            fn from(value: $ty) -> Self {
                value.to_string()
            }
        }
    )*};
}

serde_via_str!(
    Encoder,
    SpeedPreset,
    H264Profile,
    ThreadOption,
    OutputFormat,
    ColorDepthPolicy,
);

// ============================================================================
// Encoders
// ============================================================================

/// GPU vendor behind a hardware encoder
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum GpuVendor {
    Nvidia,
    Amd,
    Intel,
}

impl fmt::Display for GpuVendor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Nvidia => "NVIDIA",
            Self::Amd => "AMD",
            Self::Intel => "Intel",
        })
    }
}

/// H.264 encoders the engine knows how to drive
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum Encoder {
    Software, // libx264
    Nvenc,    // NVIDIA NVENC
    Amf,      // AMD AMF
    Qsv,      // Intel Quick Sync
}

impl Encoder {
    pub const ALL: [Encoder; 4] = [Self::Software, Self::Nvenc, Self::Amf, Self::Qsv];

    /// Get the FFmpeg encoder name
    pub fn ffmpeg_name(self) -> &'static str {
        match self {
            Self::Software => "libx264",
            Self::Nvenc => "h264_nvenc",
            Self::Amf => "h264_amf",
            Self::Qsv => "h264_qsv",
        }
    }

    /// Get user-friendly display name
    pub fn display_name(self) -> &'static str {
        match self {
            Self::Software => "Software Encoder (x264)",
            Self::Nvenc => "NVIDIA GPU Encoder",
            Self::Amf => "AMD GPU Encoder",
            Self::Qsv => "Intel Quick Sync",
        }
    }

    pub fn is_hardware(self) -> bool {
        self.vendor().is_some()
    }

    pub fn vendor(self) -> Option<GpuVendor> {
        match self {
            Self::Software => None,
            Self::Nvenc => Some(GpuVendor::Nvidia),
            Self::Amf => Some(GpuVendor::Amd),
            Self::Qsv => Some(GpuVendor::Intel),
        }
    }
}

impl fmt::Display for Encoder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.ffmpeg_name())
    }
}

impl FromStr for Encoder {
    type Err = EngineError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "libx264" | "x264" | "software" => Ok(Self::Software),
            "h264_nvenc" | "nvenc" | "nvidia" => Ok(Self::Nvenc),
            "h264_amf" | "amf" | "amd" => Ok(Self::Amf),
            "h264_qsv" | "qsv" | "intel" => Ok(Self::Qsv),
            _ => Err(EngineError::invalid("encoder", s)),
        }
    }
}

// ============================================================================
// Speed presets
// ============================================================================

/// x264's nine named speed/efficiency presets
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum SpeedPreset {
    Ultrafast,
    Superfast,
    Veryfast,
    Faster,
    Fast,
    Medium,
    Slow,
    Slower,
    Veryslow,
}

/// Coarse speed class used by hardware encoders with fewer presets
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SpeedBucket {
    Slow,
    Medium,
    Fast,
}

impl SpeedPreset {
    pub const ALL: [SpeedPreset; 9] = [
        Self::Ultrafast,
        Self::Superfast,
        Self::Veryfast,
        Self::Faster,
        Self::Fast,
        Self::Medium,
        Self::Slow,
        Self::Slower,
        Self::Veryslow,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Ultrafast => "ultrafast",
            Self::Superfast => "superfast",
            Self::Veryfast => "veryfast",
            Self::Faster => "faster",
            Self::Fast => "fast",
            Self::Medium => "medium",
            Self::Slow => "slow",
            Self::Slower => "slower",
            Self::Veryslow => "veryslow",
        }
    }

    /// Note that `fast` itself lands in the medium bucket.
    pub fn bucket(self) -> SpeedBucket {
        match self {
            Self::Slow | Self::Slower | Self::Veryslow => SpeedBucket::Slow,
            Self::Faster | Self::Veryfast | Self::Superfast | Self::Ultrafast => SpeedBucket::Fast,
            Self::Fast | Self::Medium => SpeedBucket::Medium,
        }
    }
}

impl fmt::Display for SpeedPreset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SpeedPreset {
    type Err = EngineError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim().to_ascii_lowercase();
        Self::ALL
            .into_iter()
            .find(|p| p.as_str() == wanted)
            .ok_or_else(|| EngineError::invalid("preset", s))
    }
}

// ============================================================================
// Profiles and color depth
// ============================================================================

/// H.264 conformance profiles offered for output
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum H264Profile {
    Baseline,
    Main,
    High,
    High10,
    High422,
    High444,
}

impl H264Profile {
    pub const ALL: [H264Profile; 6] = [
        Self::Baseline,
        Self::Main,
        Self::High,
        Self::High10,
        Self::High422,
        Self::High444,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Baseline => "baseline",
            Self::Main => "main",
            Self::High => "high",
            Self::High10 => "high10",
            Self::High422 => "high422",
            Self::High444 => "high444",
        }
    }

    /// Profiles limited to 8-bit 4:2:0 output (safe for every player)
    pub fn is_eight_bit(self) -> bool {
        matches!(self, Self::Baseline | Self::Main | Self::High)
    }

    /// Profiles that can carry 10-bit samples
    pub fn supports_ten_bit(self) -> bool {
        !self.is_eight_bit()
    }
}

impl fmt::Display for H264Profile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for H264Profile {
    type Err = EngineError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim().to_ascii_lowercase();
        Self::ALL
            .into_iter()
            .find(|p| p.as_str() == wanted)
            .ok_or_else(|| EngineError::invalid("profile", s))
    }
}

/// How the requested profile reacts to the source's bit depth
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum ColorDepthPolicy {
    /// Upgrade 8-bit profiles to high10 when the source is 10-bit
    #[default]
    Auto,
    /// Always produce 8-bit output (QuickTime and older players)
    Compatibility,
    /// Preserve 10-bit sources whenever possible
    Quality,
}

impl fmt::Display for ColorDepthPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Auto => "auto",
            Self::Compatibility => "compatibility",
            Self::Quality => "quality",
        })
    }
}

impl FromStr for ColorDepthPolicy {
    type Err = EngineError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "auto" => Ok(Self::Auto),
            "compatibility" | "compat" | "8bit" => Ok(Self::Compatibility),
            "quality" | "10bit" => Ok(Self::Quality),
            _ => Err(EngineError::invalid("color depth policy", s)),
        }
    }
}

// ============================================================================
// Threads and containers
// ============================================================================

/// Encoder thread directive
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum ThreadOption {
    /// Let the encoder decide (no flag emitted)
    #[default]
    Auto,
    /// Use all available cores (`-threads 0`)
    Max,
    Count(u32),
}

impl fmt::Display for ThreadOption {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Auto => f.write_str("Auto"),
            Self::Max => f.write_str("Max"),
            Self::Count(n) => write!(f, "{}", n),
        }
    }
}

impl FromStr for ThreadOption {
    type Err = EngineError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "auto" => Ok(Self::Auto),
            "max" | "0" => Ok(Self::Max),
            n => n
                .parse::<u32>()
                .map(Self::Count)
                .map_err(|_| EngineError::invalid("thread option", s)),
        }
    }
}

/// Output container
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum OutputFormat {
    #[default]
    Mp4,
    Mkv,
    Mov,
    Avi,
    Flv,
}

impl OutputFormat {
    pub const ALL: [OutputFormat; 5] = [Self::Mp4, Self::Mkv, Self::Mov, Self::Avi, Self::Flv];

    /// File extension used for derived output paths
    pub fn extension(self) -> &'static str {
        match self {
            Self::Mp4 => "mp4",
            Self::Mkv => "mkv",
            Self::Mov => "mov",
            Self::Avi => "avi",
            Self::Flv => "flv",
        }
    }
}

impl fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.extension().to_ascii_uppercase())
    }
}

impl FromStr for OutputFormat {
    type Err = EngineError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim().trim_start_matches('.').to_ascii_lowercase();
        Self::ALL
            .into_iter()
            .find(|f| f.extension() == wanted)
            .ok_or_else(|| EngineError::invalid("output format", s))
    }
}

// ============================================================================
// Settings snapshot
// ============================================================================

/// Size thresholds that switch on the large-file handling
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LargeFilePolicy {
    /// Add the muxing-queue safety flag to large inputs
    pub auto_optimize: bool,
    pub optimize_threshold_mb: u64,

    /// Report inputs that would qualify for splitting (never split)
    pub split_large_files: bool,
    pub split_threshold_gb: f64,
}

impl Default for LargeFilePolicy {
    fn default() -> Self {
        Self {
            auto_optimize: true,
            optimize_threshold_mb: 500,
            split_large_files: true,
            split_threshold_gb: 1.0,
        }
    }
}

impl LargeFilePolicy {
    pub fn should_optimize(&self, size_bytes: u64) -> bool {
        self.auto_optimize && bytes_to_mb(size_bytes) > self.optimize_threshold_mb as f64
    }

    pub fn should_split(&self, size_bytes: u64) -> bool {
        self.split_large_files && bytes_to_mb(size_bytes) / 1024.0 > self.split_threshold_gb
    }
}

pub fn bytes_to_mb(size_bytes: u64) -> f64 {
    size_bytes as f64 / (1024.0 * 1024.0)
}

/// Immutable settings snapshot for one batch
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConversionSettings {
    pub encoder: Encoder,
    /// 0-51: CRF for libx264, QP for hardware encoders
    pub quality: u8,
    pub preset: SpeedPreset,
    pub output_format: OutputFormat,
    pub profile: H264Profile,
    pub threads: ThreadOption,
    pub output_dir: PathBuf,
    pub overwrite: bool,
    pub color_depth: ColorDepthPolicy,
    pub large_files: LargeFilePolicy,
}

impl Default for ConversionSettings {
    fn default() -> Self {
        Self {
            encoder: Encoder::Software,
            quality: 23,
            preset: SpeedPreset::Medium,
            output_format: OutputFormat::Mp4,
            profile: H264Profile::High,
            threads: ThreadOption::Auto,
            output_dir: PathBuf::from("."),
            overwrite: false,
            color_depth: ColorDepthPolicy::Auto,
            large_files: LargeFilePolicy::default(),
        }
    }
}

// ============================================================================
// Jobs and results
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum JobOutcome {
    Pending,
    Succeeded,
    Failed,
    Skipped,
}

/// One input file within a batch
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Job {
    pub id: Uuid,
    pub input_path: PathBuf,
    pub output_path: PathBuf,
    pub outcome: JobOutcome,
}

impl Job {
    /// Create a new pending job
    pub fn new(input_path: PathBuf, output_path: PathBuf) -> Self {
        Self {
            id: Uuid::new_v4(),
            input_path,
            output_path,
            outcome: JobOutcome::Pending,
        }
    }

    /// Create a pending job whose output path follows the settings
    pub fn for_input(input_path: PathBuf, settings: &ConversionSettings) -> Self {
        let output_path = super::scan::derive_output_path(
            &input_path,
            &settings.output_dir,
            settings.output_format,
        );
        Self::new(input_path, output_path)
    }

    pub fn file_name(&self) -> String {
        self.input_path
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_else(|| self.input_path.display().to_string())
    }
}

/// Aggregate of one finished batch
#[derive(Debug, Clone, Default)]
pub struct BatchResult {
    /// Jobs the batch got to, stopped batches leave the rest out
    pub total: usize,
    pub succeeded: usize,
    pub jobs: Vec<Job>,
}

impl BatchResult {
    pub fn record(&mut self, job: Job) {
        self.total += 1;
        if job.outcome == JobOutcome::Succeeded {
            self.succeeded += 1;
        }
        self.jobs.push(job);
    }

    pub fn failed(&self) -> usize {
        self.count(JobOutcome::Failed)
    }

    pub fn skipped(&self) -> usize {
        self.count(JobOutcome::Skipped)
    }

    fn count(&self, outcome: JobOutcome) -> usize {
        self.jobs.iter().filter(|j| j.outcome == outcome).count()
    }
}
