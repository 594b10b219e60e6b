// Global configuration management

use anyhow::{Context, Result, bail};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

use crate::engine::{
    ColorDepthPolicy, ConversionSettings, Encoder, H264Profile, LargeFilePolicy, MAX_QP,
    OutputFormat, SpeedPreset, ThreadOption,
};

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub defaults: DefaultsConfig,

    #[serde(default)]
    pub large_files: LargeFilesConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DefaultsConfig {
    /// Where converted files are written
    #[serde(default = "default_output_directory")]
    pub output_directory: PathBuf,

    #[serde(default = "default_encoder")]
    pub encoder: Encoder,

    /// CRF for libx264, QP for hardware encoders (0-51)
    #[serde(default = "default_quality")]
    pub quality: u8,

    #[serde(default = "default_preset")]
    pub preset: SpeedPreset,

    #[serde(default)]
    pub output_format: OutputFormat,

    #[serde(default = "default_profile")]
    pub profile: H264Profile,

    /// "Auto", "Max" or a thread count
    #[serde(default)]
    pub threads: ThreadOption,

    /// Overwrite existing output files instead of skipping them
    #[serde(default)]
    pub overwrite: bool,

    #[serde(default)]
    pub color_depth: ColorDepthPolicy,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LargeFilesConfig {
    #[serde(default = "default_true_config")]
    pub auto_optimize_large_files: bool,

    /// Only reported; files are never actually split
    #[serde(default = "default_true_config")]
    pub split_large_files: bool,

    #[serde(default = "default_large_file_threshold_mb")]
    pub large_file_threshold_mb: u64,

    #[serde(default = "default_extra_large_file_threshold_gb")]
    pub extra_large_file_threshold_gb: f64,
}

fn default_output_directory() -> PathBuf {
    dirs::home_dir()
        .map(|home| home.join("Videos").join("Converted"))
        .unwrap_or_else(|| PathBuf::from("Converted"))
}

fn default_encoder() -> Encoder {
    Encoder::Software
}

fn default_quality() -> u8 {
    23
}

fn default_preset() -> SpeedPreset {
    SpeedPreset::Medium
}

fn default_profile() -> H264Profile {
    H264Profile::High
}

fn default_true_config() -> bool {
    true
}

fn default_large_file_threshold_mb() -> u64 {
    500
}

fn default_extra_large_file_threshold_gb() -> f64 {
    1.0
}

impl Default for DefaultsConfig {
    fn default() -> Self {
        Self {
            output_directory: default_output_directory(),
            encoder: default_encoder(),
            quality: default_quality(),
            preset: default_preset(),
            output_format: OutputFormat::Mp4,
            profile: default_profile(),
            threads: ThreadOption::Auto,
            overwrite: false,
            color_depth: ColorDepthPolicy::Auto,
        }
    }
}

impl Default for LargeFilesConfig {
    fn default() -> Self {
        Self {
            auto_optimize_large_files: true,
            split_large_files: true,
            large_file_threshold_mb: default_large_file_threshold_mb(),
            extra_large_file_threshold_gb: default_extra_large_file_threshold_gb(),
        }
    }
}

impl Config {
    /// Get the path to the config file
    pub fn config_path() -> Result<PathBuf> {
        let config_dir = if cfg!(target_os = "macos") {
            dirs::home_dir()
                .context("Could not determine home directory")?
                .join(".config")
                .join("avcbatch")
        } else {
            dirs::config_dir()
                .context("Could not determine config directory")?
                .join("avcbatch")
        };

        Ok(config_dir.join("config.toml"))
    }

    /// Load config from disk, or create default if it doesn't exist
    pub fn load() -> Result<Self> {
        let config_path = Self::config_path()?;

        if config_path.exists() {
            Self::load_from(&config_path)
        } else {
            let config = Config::default();

            // A read-only config directory shouldn't stop a conversion
            if let Err(e) = config.save() {
                tracing::warn!("Could not create default config file: {:#}", e);
                tracing::warn!(
                    "Using built-in defaults. Run 'avcbatch init-config' to create a config file."
                );
            }

            Ok(config)
        }
    }

    pub fn load_from(path: &Path) -> Result<Self> {
        let contents = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        toml::from_str(&contents)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))
    }

    /// Save config to disk
    pub fn save(&self) -> Result<()> {
        self.save_to(&Self::config_path()?)
    }

    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).with_context(|| {
                format!("Failed to create config directory: {}", parent.display())
            })?;
        }

        let contents = toml::to_string_pretty(self).context("Failed to serialize config")?;

        fs::write(path, contents)
            .with_context(|| format!("Failed to write config file: {}", path.display()))?;

        Ok(())
    }

    /// Check if config file exists
    pub fn exists() -> bool {
        Self::config_path().map(|p| p.exists()).unwrap_or(false)
    }

    /// Create a default config file if it doesn't exist
    pub fn ensure_default() -> Result<()> {
        if !Self::exists() {
            Config::default().save()?;
        }
        Ok(())
    }

    /// Overwrite the config file with defaults
    pub fn reset() -> Result<Self> {
        let config = Config::default();
        config.save()?;
        Ok(config)
    }

    /// Validated settings snapshot for one batch
    pub fn to_settings(&self) -> Result<ConversionSettings> {
        let d = &self.defaults;
        let l = &self.large_files;

        if d.quality > MAX_QP {
            bail!("quality must be between 0 and {}, got {}", MAX_QP, d.quality);
        }
        let split_gb = l.extra_large_file_threshold_gb;
        if split_gb.is_nan() || split_gb <= 0.0 {
            bail!(
                "extra_large_file_threshold_gb must be positive, got {}",
                split_gb
            );
        }

        Ok(ConversionSettings {
            encoder: d.encoder,
            quality: d.quality,
            preset: d.preset,
            output_format: d.output_format,
            profile: d.profile,
            threads: d.threads,
            output_dir: d.output_directory.clone(),
            overwrite: d.overwrite,
            color_depth: d.color_depth,
            large_files: LargeFilePolicy {
                auto_optimize: l.auto_optimize_large_files,
                optimize_threshold_mb: l.large_file_threshold_mb,
                split_large_files: l.split_large_files,
                split_threshold_gb: split_gb,
            },
        })
    }
}
