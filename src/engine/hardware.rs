//! Hardware H.264 encoder detection.
//!
//! A hardware encoder compiled into ffmpeg is not necessarily usable: the GPU or
//! its driver may be missing. Each registered candidate is confirmed with a
//! one-second synthetic encode before it is offered.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

use crate::engine::core::{Encoder, GpuVendor, LogSink, Tool, ToolRunner};
use crate::engine::error::EngineError;

/// Bounded wait for `ffmpeg -encoders`
pub const REGISTRY_TIMEOUT: Duration = Duration::from_secs(10);

/// Bounded wait for each synthetic test encode
pub const TEST_ENCODE_TIMEOUT: Duration = Duration::from_secs(30);

/// lavfi source for the synthetic test encode
const TEST_SOURCE: &str = "testsrc=duration=1:size=320x240:rate=1";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CapabilityClass {
    Software,
    Hardware(GpuVendor),
}

/// An encoder the caller may pick
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EncoderDescriptor {
    pub encoder: Encoder,
    pub label: &'static str,
    pub class: CapabilityClass,
}

impl EncoderDescriptor {
    /// Always present, never probed
    pub const SOFTWARE: EncoderDescriptor = EncoderDescriptor {
        encoder: Encoder::Software,
        label: "Software Encoder (x264)",
        class: CapabilityClass::Software,
    };

    pub fn for_encoder(encoder: Encoder) -> Self {
        Self {
            encoder,
            label: encoder.display_name(),
            class: match encoder.vendor() {
                Some(vendor) => CapabilityClass::Hardware(vendor),
                None => CapabilityClass::Software,
            },
        }
    }

    pub fn id(&self) -> &'static str {
        self.encoder.ffmpeg_name()
    }
}

impl fmt::Display for EncoderDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.id(), self.label)
    }
}

/// What a test encode revealed about one candidate
#[derive(Debug)]
pub enum ProbeVerdict {
    /// Test encode exited 0
    Usable,
    /// Registered, but the test encode failed (usually a driver problem)
    NotFunctional(Option<i32>),
    /// The test could not be carried out
    Error(EngineError),
}

/// Finds which encoders actually work on this machine
pub struct EncoderCapabilityProber {
    tools: Arc<dyn ToolRunner>,
    log: Arc<dyn LogSink>,
    registry_timeout: Duration,
    test_timeout: Duration,
}

impl EncoderCapabilityProber {
    pub fn new(tools: Arc<dyn ToolRunner>, log: Arc<dyn LogSink>) -> Self {
        Self {
            tools,
            log,
            registry_timeout: REGISTRY_TIMEOUT,
            test_timeout: TEST_ENCODE_TIMEOUT,
        }
    }

    pub fn with_timeouts(mut self, registry: Duration, test_encode: Duration) -> Self {
        self.registry_timeout = registry;
        self.test_timeout = test_encode;
        self
    }

    /// Usable encoders, software first.
    ///
    /// Probe order is AMD, Intel, NVIDIA. A working AMD encoder skips the
    /// NVIDIA probe; Intel is always probed on its own.
    pub fn probe(&self) -> Vec<EncoderDescriptor> {
        let mut available = vec![EncoderDescriptor::SOFTWARE];

        let registered = match self.registered_encoders() {
            Ok(registered) => registered,
            Err(e) => {
                self.log
                    .log(&format!("Could not list ffmpeg encoders: {}", e));
                return available;
            }
        };

        let mut amd_usable = false;
        for encoder in [Encoder::Amf, Encoder::Qsv, Encoder::Nvenc] {
            if !registered.contains(&encoder) {
                debug!(encoder = encoder.ffmpeg_name(), "not compiled into ffmpeg");
                continue;
            }

            if encoder == Encoder::Nvenc && amd_usable {
                self.log
                    .log("AMD system detected, skipping NVIDIA NVENC probe");
                continue;
            }

            let descriptor = EncoderDescriptor::for_encoder(encoder);
            match self.test_encoder(encoder) {
                ProbeVerdict::Usable => {
                    self.log
                        .log(&format!("{}: available and functional", descriptor.label));
                    if encoder == Encoder::Amf {
                        amd_usable = true;
                    }
                    available.push(descriptor);
                }
                ProbeVerdict::NotFunctional(code) => {
                    self.log.log(&format!(
                        "{}: registered but not functional (test encode exit code {:?}, driver problem?)",
                        descriptor.label, code
                    ));
                }
                ProbeVerdict::Error(e) => {
                    self.log
                        .log(&format!("Error testing {}: {}", descriptor.label, e));
                }
            }
        }

        available
    }

    /// Hardware encoders listed by `ffmpeg -encoders`
    pub fn registered_encoders(&self) -> Result<Vec<Encoder>, EngineError> {
        let args = vec!["-hide_banner".to_string(), "-encoders".to_string()];
        let output = self
            .tools
            .output(Tool::Ffmpeg, &args, self.registry_timeout)?;
        Ok(parse_registry(&output.stdout))
    }

    /// Run the synthetic test encode for one encoder
    pub fn test_encoder(&self, encoder: Encoder) -> ProbeVerdict {
        match self
            .tools
            .output(Tool::Ffmpeg, &test_encode_args(encoder), self.test_timeout)
        {
            Ok(output) if output.success() => ProbeVerdict::Usable,
            Ok(output) => {
                debug!(
                    encoder = encoder.ffmpeg_name(),
                    stderr = %output.stderr.trim(),
                    "test encode failed"
                );
                ProbeVerdict::NotFunctional(output.code)
            }
            Err(e) => ProbeVerdict::Error(e),
        }
    }
}

/// Hardware encoders whose names appear in `ffmpeg -encoders` output
pub fn parse_registry(encoders_output: &str) -> Vec<Encoder> {
    Encoder::ALL
        .into_iter()
        .filter(|e| e.is_hardware())
        .filter(|e| encoders_output.contains(e.ffmpeg_name()))
        .collect()
}

fn null_output_target() -> &'static str {
    if cfg!(windows) { "NUL" } else { "/dev/null" }
}

/// Arguments for a one-second synthetic encode whose output is discarded
pub fn test_encode_args(encoder: Encoder) -> Vec<String> {
    [
        "-hide_banner",
        "-f",
        "lavfi",
        "-i",
        TEST_SOURCE,
        "-c:v",
        encoder.ffmpeg_name(),
        "-t",
        "1",
        "-y",
        "-f",
        "null",
        null_output_target(),
    ]
    .iter()
    .map(|s| s.to_string())
    .collect()
}
