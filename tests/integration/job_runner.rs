// JobRunner against a scripted ffmpeg

use avcbatch::engine::{
    ColorDepthPolicy, ConversionSettings, Encoder, H264Profile, JobOutcome, JobRunner,
    LargeFilePolicy, RunnerState,
};
use std::fs;
use std::sync::Arc;
use tempfile::TempDir;

use crate::common::fake_tools::{FakeTools, ScriptedEncode, value_after};
use crate::common::helpers::*;

const AMF_INIT_FAILURE: &[&str] = &[
    "[h264_amf @ 0x5581] DLL amfrt64.dll failed to open",
    "Error while opening encoder for output stream #0:0 - maybe incorrect parameters such as bit_rate, rate, width or height",
];

fn runner_with(tools: &Arc<FakeTools>, sink: &Arc<RecordingSink>) -> JobRunner {
    JobRunner::new(tools.clone(), sink.clone(), sink.clone())
}

fn single_job(dir: &TempDir, settings: &ConversionSettings) -> avcbatch::engine::Job {
    make_jobs(dir.path(), &["clip.mkv"], settings).remove(0)
}

#[test]
fn test_success_forwards_diagnostics_without_frame_lines() {
    let dir = TempDir::new().unwrap();
    let settings = settings_in(&dir.path().join("out"));
    let mut job = single_job(&dir, &settings);

    let tools = Arc::new(FakeTools::new().with_probe_json(EIGHT_BIT_PROBE));
    let sink = Arc::new(RecordingSink::default());
    let mut runner = runner_with(&tools, &sink);

    assert_eq!(runner.run(&mut job, &settings), JobOutcome::Succeeded);
    assert_eq!(job.outcome, JobOutcome::Succeeded);
    assert_eq!(runner.state(), RunnerState::Succeeded);

    let progress = sink.progress_lines();
    assert!(progress.iter().any(|l| l.starts_with("Input #0")));
    assert!(progress.iter().any(|l| l.starts_with("video:120kB")));
    assert!(progress.iter().all(|l| !l.starts_with("frame=") && !l.trim().is_empty()));

    assert!(sink.logged("Converting: clip.mkv"));
    assert!(sink.logged("Conversion successful"));
    assert_eq!(tools.launch_count(), 1);
    assert!(dir.path().join("out").is_dir());
}

#[test]
fn test_ten_bit_source_gets_high10_under_auto() {
    let dir = TempDir::new().unwrap();
    let settings = settings_in(dir.path());
    let mut job = single_job(&dir, &settings);

    let tools = Arc::new(FakeTools::new().with_probe_json(TEN_BIT_PROBE));
    let sink = Arc::new(RecordingSink::default());
    runner_with(&tools, &sink).run(&mut job, &settings);

    let launches = tools.launches();
    assert_eq!(value_after(&launches[0], "-profile:v"), Some("high10"));
    assert!(sink.logged("10-bit source detected"));
}

#[test]
fn test_compatibility_keeps_eight_bit_profile() {
    let dir = TempDir::new().unwrap();
    let settings = ConversionSettings {
        color_depth: ColorDepthPolicy::Compatibility,
        ..settings_in(dir.path())
    };
    let mut job = single_job(&dir, &settings);

    let tools = Arc::new(FakeTools::new().with_probe_json(TEN_BIT_PROBE));
    let sink = Arc::new(RecordingSink::default());
    runner_with(&tools, &sink).run(&mut job, &settings);

    assert_eq!(value_after(&tools.launches()[0], "-profile:v"), Some("high"));
    assert!(!sink.logged("10-bit source detected"));
}

#[test]
fn test_failed_probe_assumes_eight_bit() {
    let dir = TempDir::new().unwrap();
    let settings = settings_in(dir.path());
    let mut job = single_job(&dir, &settings);

    // No probe JSON scripted: ffprobe exits 1
    let tools = Arc::new(FakeTools::new());
    let sink = Arc::new(RecordingSink::default());
    let outcome = runner_with(&tools, &sink).run(&mut job, &settings);

    assert_eq!(outcome, JobOutcome::Succeeded);
    assert_eq!(value_after(&tools.launches()[0], "-profile:v"), Some("high"));
}

#[test]
fn test_hardware_failure_retries_with_software() {
    let dir = TempDir::new().unwrap();
    let settings = ConversionSettings {
        encoder: Encoder::Amf,
        profile: H264Profile::High,
        ..settings_in(dir.path())
    };
    let mut job = single_job(&dir, &settings);

    let tools = Arc::new(
        FakeTools::new()
            .with_probe_json(TEN_BIT_PROBE)
            .with_encodes(vec![
                ScriptedEncode::exit(1, AMF_INIT_FAILURE),
                ScriptedEncode::exit(0, &["encoded 10 frames"]),
            ]),
    );
    let sink = Arc::new(RecordingSink::default());
    let mut runner = runner_with(&tools, &sink);

    assert_eq!(runner.run(&mut job, &settings), JobOutcome::Succeeded);
    assert_eq!(runner.state(), RunnerState::Succeeded);
    assert!(runner.fell_back());

    let launches = tools.launches();
    assert_eq!(launches.len(), 2);
    assert_eq!(value_after(&launches[0], "-c:v"), Some("h264_amf"));
    assert_eq!(value_after(&launches[0], "-profile:v"), Some("high10"));
    // Retry uses the requested profile, not the 10-bit adjusted one
    assert_eq!(value_after(&launches[1], "-c:v"), Some("libx264"));
    assert_eq!(value_after(&launches[1], "-profile:v"), Some("high"));

    assert!(
        sink.progress_lines()
            .contains(&"[software fallback] encoded 10 frames".to_string())
    );
    assert!(sink.logged("retrying with software encoder"));
}

#[test]
fn test_failed_fallback_fails_the_job() {
    let dir = TempDir::new().unwrap();
    let settings = ConversionSettings {
        encoder: Encoder::Nvenc,
        ..settings_in(dir.path())
    };
    let mut job = single_job(&dir, &settings);

    let tools = Arc::new(FakeTools::new().with_encodes(vec![
        ScriptedEncode::exit(1, &["[h264_nvenc @ 0x1] Cannot load libnvidia-encode.so.1"]),
        ScriptedEncode::exit(1, &["Conversion failed!"]),
    ]));
    let sink = Arc::new(RecordingSink::default());
    let mut runner = runner_with(&tools, &sink);

    assert_eq!(runner.run(&mut job, &settings), JobOutcome::Failed);
    assert_eq!(runner.state(), RunnerState::Failed);
    assert!(runner.fell_back());
    assert_eq!(tools.launch_count(), 2);
    assert!(sink.logged("Software fallback for clip.mkv failed"));
}

#[test]
fn test_software_encoder_marker_does_not_retry() {
    let dir = TempDir::new().unwrap();
    let settings = settings_in(dir.path());
    let mut job = single_job(&dir, &settings);

    let tools = Arc::new(FakeTools::new().with_encodes(vec![ScriptedEncode::exit(
        1,
        &["Error while opening encoder for output stream #0:0"],
    )]));
    let sink = Arc::new(RecordingSink::default());
    let mut runner = runner_with(&tools, &sink);

    assert_eq!(runner.run(&mut job, &settings), JobOutcome::Failed);
    assert_eq!(runner.state(), RunnerState::Failed);
    assert!(!runner.fell_back());
    assert_eq!(tools.launch_count(), 1);
}

#[test]
fn test_hardware_failure_without_marker_does_not_retry() {
    let dir = TempDir::new().unwrap();
    let settings = ConversionSettings {
        encoder: Encoder::Qsv,
        ..settings_in(dir.path())
    };
    let mut job = single_job(&dir, &settings);

    let tools = Arc::new(FakeTools::new().with_encodes(vec![ScriptedEncode::exit(
        1,
        &["Invalid data found when processing input"],
    )]));
    let sink = Arc::new(RecordingSink::default());

    assert_eq!(
        runner_with(&tools, &sink).run(&mut job, &settings),
        JobOutcome::Failed
    );
    assert_eq!(tools.launch_count(), 1);
    assert!(sink.logged("exit code 1"));
}

#[test]
fn test_missing_ffmpeg_fails_job() {
    let dir = TempDir::new().unwrap();
    let settings = settings_in(dir.path());
    let mut job = single_job(&dir, &settings);

    let tools = Arc::new(FakeTools::new().missing());
    let sink = Arc::new(RecordingSink::default());

    assert_eq!(
        runner_with(&tools, &sink).run(&mut job, &settings),
        JobOutcome::Failed
    );
    assert!(sink.logged("could not be started"));
}

#[test]
fn test_failed_encode_removes_partial_output() {
    let dir = TempDir::new().unwrap();
    let settings = settings_in(&dir.path().join("out"));
    let mut job = single_job(&dir, &settings);

    let partial = job.output_path.clone();
    let tools = Arc::new(FakeTools::new().with_encodes(vec![
        ScriptedEncode::exit(1, &["Conversion failed!"]).with_hook(move || {
            fs::write(&partial, b"half a file").unwrap();
        }),
    ]));
    let sink = Arc::new(RecordingSink::default());

    assert_eq!(
        runner_with(&tools, &sink).run(&mut job, &settings),
        JobOutcome::Failed
    );
    assert!(!job.output_path.exists());
}

#[test]
fn test_failed_launch_keeps_existing_output() {
    let dir = TempDir::new().unwrap();
    let settings = ConversionSettings {
        overwrite: true,
        ..settings_in(dir.path())
    };
    let mut job = single_job(&dir, &settings);
    fs::write(&job.output_path, b"previous good conversion").unwrap();

    let tools = Arc::new(FakeTools::new().missing());
    let sink = Arc::new(RecordingSink::default());

    assert_eq!(
        runner_with(&tools, &sink).run(&mut job, &settings),
        JobOutcome::Failed
    );
    assert_eq!(
        fs::read(&job.output_path).unwrap(),
        b"previous good conversion"
    );
}

#[test]
fn test_failed_encode_over_existing_output_leaves_it_in_place() {
    let dir = TempDir::new().unwrap();
    let settings = ConversionSettings {
        overwrite: true,
        ..settings_in(dir.path())
    };
    let mut job = single_job(&dir, &settings);
    fs::write(&job.output_path, b"previous good conversion").unwrap();

    let tools = Arc::new(FakeTools::new().with_encodes(vec![ScriptedEncode::exit(
        1,
        &["Invalid data found when processing input"],
    )]));
    let sink = Arc::new(RecordingSink::default());

    assert_eq!(
        runner_with(&tools, &sink).run(&mut job, &settings),
        JobOutcome::Failed
    );
    assert!(job.output_path.is_file());
}

#[test]
fn test_long_warning_stream_still_detects_marker() {
    let dir = TempDir::new().unwrap();
    let settings = ConversionSettings {
        encoder: Encoder::Nvenc,
        ..settings_in(dir.path())
    };
    let mut job = single_job(&dir, &settings);

    let mut lines = vec!["[h264_nvenc @ 0x1] Cannot load libnvidia-encode.so.1"];
    lines.extend(std::iter::repeat_n("[mp4 @ 0x2] Non-monotonous DTS in output stream 0:1", 5000));
    let tools = Arc::new(FakeTools::new().with_encodes(vec![
        ScriptedEncode::exit(1, &lines),
        ScriptedEncode::success(),
    ]));
    let sink = Arc::new(RecordingSink::default());
    let mut runner = runner_with(&tools, &sink);

    assert_eq!(runner.run(&mut job, &settings), JobOutcome::Succeeded);
    assert!(runner.fell_back());
    assert_eq!(tools.launch_count(), 2);
}

#[test]
fn test_large_input_gets_muxing_queue_flag() {
    let dir = TempDir::new().unwrap();
    let settings = ConversionSettings {
        large_files: LargeFilePolicy {
            optimize_threshold_mb: 0,
            split_threshold_gb: 1e-9,
            ..LargeFilePolicy::default()
        },
        ..settings_in(dir.path())
    };
    let mut job = single_job(&dir, &settings);

    let tools = Arc::new(FakeTools::new());
    let sink = Arc::new(RecordingSink::default());
    runner_with(&tools, &sink).run(&mut job, &settings);

    assert_eq!(
        value_after(&tools.launches()[0], "-max_muxing_queue_size"),
        Some("1024")
    );
    assert!(sink.logged("enabling muxing queue optimization"));
    assert!(sink.logged("split threshold"));
}

#[test]
fn test_small_input_has_no_muxing_queue_flag() {
    let dir = TempDir::new().unwrap();
    let settings = settings_in(dir.path());
    let job = single_job(&dir, &settings);

    let tools = Arc::new(FakeTools::new());
    let sink = Arc::new(RecordingSink::default());
    let plan = runner_with(&tools, &sink).plan(&job, &settings);

    assert!(!plan.optimize_large_file);
    assert!(!plan.args.contains(&"-max_muxing_queue_size".to_string()));
    assert_eq!(plan.profile, H264Profile::High);
    // Planning never launches an encode
    assert_eq!(tools.launch_count(), 0);
}
