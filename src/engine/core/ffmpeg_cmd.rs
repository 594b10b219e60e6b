//! Argument vectors for the encoding tool.
//!
//! Everything here is pure: the same request always yields the same arguments.

use std::path::Path;

use super::types::{Encoder, H264Profile, SpeedBucket, SpeedPreset, ThreadOption};

/// Highest quantizer H.264 accepts
pub const MAX_QP: u8 = 51;

/// AMF runs constant-QP with this quantizer on I, P and B frames
pub const AMF_FIXED_QP: u8 = 23;

/// Interleaving buffer for large multi-stream inputs
pub const MAX_MUXING_QUEUE_SIZE: u32 = 1024;

/// Everything that shapes one encode command
#[derive(Debug, Clone, Copy)]
pub struct EncodeRequest<'a> {
    pub input: &'a Path,
    pub output: &'a Path,
    pub encoder: Encoder,
    pub quality: u8,
    pub preset: SpeedPreset,
    pub profile: H264Profile,
    pub threads: ThreadOption,
    /// Input exceeded the large-file threshold
    pub optimize_large_file: bool,
}

/// Build the ffmpeg argument vector (program name excluded)
pub fn build_ffmpeg_args(req: &EncodeRequest<'_>) -> Vec<String> {
    let mut args = vec![
        "-i".to_string(),
        req.input.to_string_lossy().to_string(),
        "-y".to_string(),
        "-c:v".to_string(),
        req.encoder.ffmpeg_name().to_string(),
    ];

    args.extend(speed_args(req.encoder, req.preset));
    args.extend(quality_args(req.encoder, req.quality));

    args.push("-profile:v".to_string());
    args.push(req.profile.as_str().to_string());

    args.extend(thread_args(req.threads));

    // Audio is passed through untouched
    args.push("-c:a".to_string());
    args.push("copy".to_string());

    if req.optimize_large_file {
        args.push("-max_muxing_queue_size".to_string());
        args.push(MAX_MUXING_QUEUE_SIZE.to_string());
    }

    args.push(req.output.to_string_lossy().to_string());
    args
}

/// Speed control flag and value for an encoder
pub fn speed_args(encoder: Encoder, preset: SpeedPreset) -> [String; 2] {
    match encoder {
        Encoder::Software => ["-preset".to_string(), preset.as_str().to_string()],
        Encoder::Nvenc | Encoder::Qsv => {
            ["-preset".to_string(), bucket_preset_name(preset.bucket()).to_string()]
        }
        Encoder::Amf => ["-quality".to_string(), amf_quality_name(preset.bucket()).to_string()],
    }
}

/// NVENC and QSV only understand three presets
pub fn bucket_preset_name(bucket: SpeedBucket) -> &'static str {
    match bucket {
        SpeedBucket::Slow => "slow",
        SpeedBucket::Medium => "medium",
        SpeedBucket::Fast => "fast",
    }
}

/// AMF expresses speed through its `-quality` usage mode
pub fn amf_quality_name(bucket: SpeedBucket) -> &'static str {
    match bucket {
        SpeedBucket::Slow => "quality",
        SpeedBucket::Medium => "balanced",
        SpeedBucket::Fast => "speed",
    }
}

/// Rate-control arguments. CRF for libx264, QP for hardware encoders.
/// AMF ignores `quality` and always runs fixed constant-QP.
pub fn quality_args(encoder: Encoder, quality: u8) -> Vec<String> {
    match encoder {
        Encoder::Software => vec!["-crf".to_string(), quality.to_string()],
        Encoder::Nvenc | Encoder::Qsv => {
            vec!["-qp".to_string(), quality.min(MAX_QP).to_string()]
        }
        Encoder::Amf => {
            let qp = AMF_FIXED_QP.to_string();
            vec![
                "-rc".to_string(),
                "cqp".to_string(),
                "-qp_i".to_string(),
                qp.clone(),
                "-qp_p".to_string(),
                qp.clone(),
                "-qp_b".to_string(),
                qp,
            ]
        }
    }
}

pub fn thread_args(threads: ThreadOption) -> Vec<String> {
    match threads {
        ThreadOption::Auto => Vec::new(),
        // 0 = all available threads
        ThreadOption::Max => vec!["-threads".to_string(), "0".to_string()],
        ThreadOption::Count(n) => vec!["-threads".to_string(), n.to_string()],
    }
}

/// Format a command as a shell-safe string for display
pub fn format_command(program: &str, args: &[String]) -> String {
    std::iter::once(program)
        .chain(args.iter().map(String::as_str))
        .map(|arg| match shlex::try_quote(arg) {
            Ok(quoted) => quoted.into_owned(),
            Err(_) => format!("\"{}\"", arg),
        })
        .collect::<Vec<_>>()
        .join(" ")
}
