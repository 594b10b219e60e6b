mod ffmpeg_cmd;
mod ffmpeg_info;
mod log;
mod profile;
mod scan;
mod types;

pub use ffmpeg_cmd::{
    AMF_FIXED_QP, EncodeRequest, MAX_MUXING_QUEUE_SIZE, MAX_QP, amf_quality_name,
    bucket_preset_name, build_ffmpeg_args, format_command, quality_args, speed_args, thread_args,
};
pub use ffmpeg_info::{
    ExitReport, SystemTools, Tool, ToolOutput, ToolRunner, VERSION_TIMEOUT, ffmpeg_available,
    ffmpeg_version, ffprobe_version,
};
pub use log::{LogSink, NullSink, ProgressSink, TracingSink, write_debug_log};
pub use profile::{AdjustReason, ProfileChoice, select_profile};
pub use scan::{
    OUTPUT_SUFFIX, VIDEO_EXTENSIONS, build_jobs, collect_inputs, derive_output_path,
    is_video_file, scan, scan_streaming,
};
pub use types::{
    BatchResult, ColorDepthPolicy, ConversionSettings, Encoder, GpuVendor, H264Profile, Job,
    JobOutcome, LargeFilePolicy, OutputFormat, SpeedBucket, SpeedPreset, ThreadOption,
    bytes_to_mb,
};
