//! Running a single conversion job, including the one-shot software fallback.

use std::fs;
use std::sync::Arc;
use tracing::{debug, warn};

use crate::engine::core::{
    ConversionSettings, EncodeRequest, Encoder, ExitReport, H264Profile, Job, JobOutcome,
    LogSink, ProgressSink, Tool, ToolRunner, build_ffmpeg_args, bytes_to_mb, format_command,
    select_profile, write_debug_log,
};
use crate::engine::error::EngineError;
use crate::engine::probe::MediaProbe;

/// Diagnostics that mean the hardware encoder could not be brought up
pub const HARDWARE_FAILURE_MARKERS: [&str; 2] = ["cannot load", "error while opening encoder"];

/// Prefix for progress lines emitted by the software retry
pub const FALLBACK_PREFIX: &str = "[software fallback] ";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RunnerState {
    #[default]
    Idle,
    Running,
    Succeeded,
    /// Hardware attempt failed; the software retry is in flight
    FailedFallbackAttempted,
    Failed,
}

/// Encode command for one job, after probing
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncodePlan {
    pub args: Vec<String>,
    /// Effective profile after bit-depth selection
    pub profile: H264Profile,
    pub optimize_large_file: bool,
}

/// Exit status of one encode and whether its stderr named a hardware failure
struct Attempt {
    exit: ExitReport,
    hardware_marker: bool,
}

pub struct JobRunner {
    tools: Arc<dyn ToolRunner>,
    log: Arc<dyn LogSink>,
    progress: Arc<dyn ProgressSink>,
    probe: MediaProbe,
    debug_log: bool,
    state: RunnerState,
    fell_back: bool,
}

impl JobRunner {
    pub fn new(
        tools: Arc<dyn ToolRunner>,
        log: Arc<dyn LogSink>,
        progress: Arc<dyn ProgressSink>,
    ) -> Self {
        Self {
            probe: MediaProbe::new(tools.clone()),
            tools,
            log,
            progress,
            debug_log: false,
            state: RunnerState::Idle,
            fell_back: false,
        }
    }

    /// Also append failures to avcbatch.log
    pub fn with_debug_log(mut self, enabled: bool) -> Self {
        self.debug_log = enabled;
        self
    }

    pub fn state(&self) -> RunnerState {
        self.state
    }

    /// Whether the last job needed the software retry
    pub fn fell_back(&self) -> bool {
        self.fell_back
    }

    /// Convert one file. The outcome is also stored on `job`.
    pub fn run(&mut self, job: &mut Job, settings: &ConversionSettings) -> JobOutcome {
        self.state = RunnerState::Running;
        self.fell_back = false;
        // A file already at the destination belongs to the user, never to this attempt
        let preexisting = job.output_path.exists();
        let outcome = self.convert(job, settings);

        if outcome == JobOutcome::Failed && !preexisting {
            self.discard_partial_output(job);
        }
        self.state = match outcome {
            JobOutcome::Failed => RunnerState::Failed,
            _ => RunnerState::Succeeded,
        };

        job.outcome = outcome;
        outcome
    }

    fn convert(&mut self, job: &Job, settings: &ConversionSettings) -> JobOutcome {
        self.log.log(&format!("Converting: {}", job.file_name()));

        if let Some(dir) = job.output_path.parent().filter(|d| !d.as_os_str().is_empty()) {
            if let Err(e) = fs::create_dir_all(dir) {
                self.fail(job, &format!("Cannot create {}: {}", dir.display(), e));
                return JobOutcome::Failed;
            }
        }

        let plan = self.plan(job, settings);
        self.log
            .log(&format!("Command: {}", format_command("ffmpeg", &plan.args)));

        let attempt = match self.attempt(&plan.args, "") {
            Ok(attempt) => attempt,
            Err(e) => {
                self.fail(job, &format!("Error converting {}: {}", job.file_name(), e));
                return JobOutcome::Failed;
            }
        };

        if attempt.exit.success() {
            self.succeed(job);
            return JobOutcome::Succeeded;
        }

        match classify_failure(settings.encoder, attempt.hardware_marker, attempt.exit.code) {
            err @ EngineError::HardwareEncoderFailure { .. } => {
                self.log.log(&format!("{}, retrying with software encoder", err));
                self.state = RunnerState::FailedFallbackAttempted;
                self.fell_back = true;
                self.fallback(job, settings, plan.optimize_large_file)
            }
            err => {
                self.fail(job, &format!("Conversion of {} failed: {}", job.file_name(), err));
                JobOutcome::Failed
            }
        }
    }

    /// Probe the input and work out the exact encode command
    pub fn plan(&self, job: &Job, settings: &ConversionSettings) -> EncodePlan {
        let media = self.probe.probe(&job.input_path);
        let choice = select_profile(&media, settings.profile, settings.color_depth);
        if let Some(message) = choice.describe(settings.profile, &media) {
            self.log.log(&message);
        }

        let optimize = self.evaluate_size(job, settings);

        let request = EncodeRequest {
            input: &job.input_path,
            output: &job.output_path,
            encoder: settings.encoder,
            quality: settings.quality,
            preset: settings.preset,
            profile: choice.profile,
            threads: settings.threads,
            optimize_large_file: optimize,
        };
        self.log.log(&format!(
            "Parameters: encoder={}, quality={}, preset={}, profile={}, threads={}",
            request.encoder, request.quality, request.preset, request.profile, request.threads
        ));

        EncodePlan {
            args: build_ffmpeg_args(&request),
            profile: choice.profile,
            optimize_large_file: optimize,
        }
    }

    /// Re-run with libx264 and the profile the caller originally asked for
    fn fallback(&self, job: &Job, settings: &ConversionSettings, optimize: bool) -> JobOutcome {
        let request = EncodeRequest {
            input: &job.input_path,
            output: &job.output_path,
            encoder: Encoder::Software,
            quality: settings.quality,
            preset: settings.preset,
            profile: fallback_profile(settings),
            threads: settings.threads,
            optimize_large_file: optimize,
        };
        let args = build_ffmpeg_args(&request);
        self.log
            .log(&format!("Fallback command: {}", format_command("ffmpeg", &args)));

        match self.attempt(&args, FALLBACK_PREFIX) {
            Ok(attempt) if attempt.exit.success() => {
                self.succeed(job);
                JobOutcome::Succeeded
            }
            Ok(attempt) => {
                let err = EngineError::EncodeFailure {
                    code: attempt.exit.code,
                };
                self.fail(
                    job,
                    &format!("Software fallback for {} failed: {}", job.file_name(), err),
                );
                JobOutcome::Failed
            }
            Err(e) => {
                self.fail(
                    job,
                    &format!("Software fallback for {} failed: {}", job.file_name(), e),
                );
                JobOutcome::Failed
            }
        }
    }

    /// Returns whether the muxing-queue optimization applies
    fn evaluate_size(&self, job: &Job, settings: &ConversionSettings) -> bool {
        let size = match fs::metadata(&job.input_path) {
            Ok(meta) => meta.len(),
            Err(e) => {
                debug!(path = %job.input_path.display(), "cannot stat input: {}", e);
                return false;
            }
        };

        let policy = &settings.large_files;
        if policy.should_split(size) {
            self.log.log(&format!(
                "Large file ({:.1} GB) exceeds the {} GB split threshold; converting as one file",
                bytes_to_mb(size) / 1024.0,
                policy.split_threshold_gb
            ));
        }

        let optimize = policy.should_optimize(size);
        if optimize {
            self.log.log(&format!(
                "Large file ({:.0} MB): enabling muxing queue optimization",
                bytes_to_mb(size)
            ));
        }
        optimize
    }

    /// Stream one encode, forwarding every non-frame diagnostic line
    fn attempt(&self, args: &[String], prefix: &str) -> Result<Attempt, EngineError> {
        let mut hardware_marker = false;
        let progress = &self.progress;

        let exit = self.tools.stream(Tool::Ffmpeg, args, &mut |line: &str| {
            let line = line.trim_end();
            if line.trim().is_empty() || line.trim_start().starts_with("frame=") {
                return;
            }
            progress.progress(&format!("{}{}", prefix, line));
            hardware_marker = hardware_marker || line_has_marker(line);
        })?;

        Ok(Attempt {
            exit,
            hardware_marker,
        })
    }

    fn succeed(&self, job: &Job) {
        self.log
            .log(&format!("Conversion successful: {}", job.output_path.display()));
    }

    fn fail(&self, job: &Job, message: &str) {
        self.log.log(message);
        if self.debug_log {
            if let Err(e) = write_debug_log(&format!("[{}] {}", job.id, message)) {
                warn!("could not write debug log: {}", e);
            }
        }
    }

    fn discard_partial_output(&self, job: &Job) {
        if job.output_path.is_file() {
            if let Err(e) = fs::remove_file(&job.output_path) {
                debug!(path = %job.output_path.display(), "could not remove partial output: {}", e);
            }
        }
    }
}

/// Decide what a non-zero exit means. Only a hardware encoder whose diagnostics
/// carried a driver marker is eligible for the software retry.
pub fn classify_failure(encoder: Encoder, hardware_marker: bool, code: Option<i32>) -> EngineError {
    if encoder.is_hardware() && hardware_marker {
        EngineError::HardwareEncoderFailure {
            encoder: encoder.ffmpeg_name(),
            code,
        }
    } else {
        EngineError::EncodeFailure { code }
    }
}

pub fn line_has_marker(line: &str) -> bool {
    let line = line.to_ascii_lowercase();
    HARDWARE_FAILURE_MARKERS.iter().any(|m| line.contains(m))
}

pub fn has_hardware_marker(diagnostics: &[String]) -> bool {
    diagnostics.iter().any(|line| line_has_marker(line))
}

/// Profile the software retry encodes with: the requested one, not the
/// bit-depth adjusted one
pub fn fallback_profile(settings: &ConversionSettings) -> H264Profile {
    settings.profile
}
