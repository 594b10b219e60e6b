use avcbatch::engine::{
    ColorDepthPolicy, ConversionSettings, Encoder, H264Profile, OutputFormat, SpeedPreset,
    ThreadOption,
};
use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "avcbatch")]
#[command(about = "Batch H.264 converter with hardware encoder detection", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Debug-level logging (RUST_LOG takes precedence)
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Append failures to avcbatch.log in the current directory
    #[arg(long, global = true)]
    pub debug_log: bool,

    #[command(flatten)]
    pub overrides: SettingsOverrides,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Check if ffmpeg and ffprobe are installed
    CheckFfmpeg,

    /// List the encoders that actually work on this machine
    Encoders,

    /// Probe a video file and show the profile that would be used
    Probe {
        /// Path to the video file
        file: PathBuf,
    },

    /// Show ffmpeg commands without executing (dry run)
    DryRun {
        /// Video files or directories to scan
        #[arg(required = true)]
        paths: Vec<PathBuf>,
    },

    /// Convert files to H.264 (type `q` and Enter to stop after the current file)
    Convert {
        /// Video files or directories to scan
        #[arg(required = true)]
        paths: Vec<PathBuf>,
    },

    /// Create a config file with default settings if none exists
    InitConfig,

    /// Replace the config file with default settings
    ResetConfig,
}

/// Per-run overrides of config values
#[derive(Args, Debug, Default)]
pub struct SettingsOverrides {
    /// libx264, h264_nvenc, h264_amf or h264_qsv
    #[arg(long, global = true)]
    pub encoder: Option<Encoder>,

    /// CRF/QP value (0-51)
    #[arg(long, global = true, value_parser = clap::value_parser!(u8).range(0..=51))]
    pub quality: Option<u8>,

    /// x264 speed preset (ultrafast .. veryslow)
    #[arg(long, global = true)]
    pub preset: Option<SpeedPreset>,

    /// baseline, main, high, high10, high422 or high444
    #[arg(long, global = true)]
    pub profile: Option<H264Profile>,

    /// Output container (mp4, mkv, mov, avi, flv)
    #[arg(long, global = true)]
    pub format: Option<OutputFormat>,

    /// Auto, Max or a thread count
    #[arg(long, global = true)]
    pub threads: Option<ThreadOption>,

    #[arg(long, global = true)]
    pub output_dir: Option<PathBuf>,

    /// Overwrite existing output files instead of skipping them
    #[arg(long, global = true)]
    pub overwrite: bool,

    /// auto, compatibility (always 8-bit) or quality (keep 10-bit)
    #[arg(long, global = true)]
    pub color_depth: Option<ColorDepthPolicy>,
}

impl SettingsOverrides {
    pub fn apply(&self, settings: &mut ConversionSettings) {
        if let Some(encoder) = self.encoder {
            settings.encoder = encoder;
        }
        if let Some(quality) = self.quality {
            settings.quality = quality;
        }
        if let Some(preset) = self.preset {
            settings.preset = preset;
        }
        if let Some(profile) = self.profile {
            settings.profile = profile;
        }
        if let Some(format) = self.format {
            settings.output_format = format;
        }
        if let Some(threads) = self.threads {
            settings.threads = threads;
        }
        if let Some(ref dir) = self.output_dir {
            settings.output_dir = dir.clone();
        }
        if self.overwrite {
            settings.overwrite = true;
        }
        if let Some(policy) = self.color_depth {
            settings.color_depth = policy;
        }
    }
}
