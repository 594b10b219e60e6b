// BatchScheduler ordering, skipping, cancellation and fault handling

use avcbatch::engine::{
    BatchScheduler, BatchState, ConversionSettings, Encoder, JobOutcome,
};
use std::fs;
use std::sync::Arc;
use tempfile::TempDir;

use crate::common::fake_tools::{FakeTools, ScriptedEncode, value_after};
use crate::common::helpers::*;

const AMF_OPEN_FAILURE: &[&str] = &["Error while opening encoder for output stream #0:0"];

fn scheduler(tools: &Arc<FakeTools>, sink: &Arc<RecordingSink>) -> BatchScheduler {
    BatchScheduler::new(tools.clone(), sink.clone(), sink.clone())
}

fn amf_settings(dir: &TempDir) -> ConversionSettings {
    ConversionSettings {
        encoder: Encoder::Amf,
        ..settings_in(&dir.path().join("out"))
    }
}

fn outcomes(result: &avcbatch::engine::BatchResult) -> Vec<JobOutcome> {
    result.jobs.iter().map(|j| j.outcome).collect()
}

#[test]
fn test_three_files_with_successful_fallback() {
    let dir = TempDir::new().unwrap();
    let settings = amf_settings(&dir);
    let jobs = make_jobs(dir.path(), &["a.mkv", "b.mkv", "c.mkv"], &settings);

    let tools = Arc::new(FakeTools::new().with_encodes(vec![
        ScriptedEncode::success(),
        ScriptedEncode::exit(1, AMF_OPEN_FAILURE),
        ScriptedEncode::success(),
        ScriptedEncode::success(),
    ]));
    let sink = Arc::new(RecordingSink::default());
    let result = scheduler(&tools, &sink).run(jobs, &settings);

    assert_eq!(outcomes(&result), vec![JobOutcome::Succeeded; 3]);
    assert_eq!((result.total, result.succeeded), (3, 3));

    let codecs: Vec<_> = tools
        .launches()
        .iter()
        .map(|a| value_after(a, "-c:v").unwrap_or_default().to_string())
        .collect();
    assert_eq!(codecs, ["h264_amf", "h264_amf", "libx264", "h264_amf"]);

    let progress: Vec<_> = sink
        .progress_lines()
        .into_iter()
        .filter(|l| l.starts_with("Progress:"))
        .collect();
    assert_eq!(
        progress,
        [
            "Progress: 33.3% (1/3)",
            "Progress: 66.7% (2/3)",
            "Progress: 100.0% (3/3)"
        ]
    );
    assert!(sink.logged("Conversion finished: 3/3 succeeded"));
}

#[test]
fn test_three_files_with_failed_fallback() {
    let dir = TempDir::new().unwrap();
    let settings = amf_settings(&dir);
    let jobs = make_jobs(dir.path(), &["a.mkv", "b.mkv", "c.mkv"], &settings);

    let tools = Arc::new(FakeTools::new().with_encodes(vec![
        ScriptedEncode::success(),
        ScriptedEncode::exit(1, AMF_OPEN_FAILURE),
        ScriptedEncode::exit(1, &["Conversion failed!"]),
        ScriptedEncode::success(),
    ]));
    let sink = Arc::new(RecordingSink::default());
    let result = scheduler(&tools, &sink).run(jobs, &settings);

    assert_eq!(
        outcomes(&result),
        [JobOutcome::Succeeded, JobOutcome::Failed, JobOutcome::Succeeded]
    );
    assert_eq!(result.failed(), 1);
    assert_eq!(tools.launch_count(), 4);
    assert!(sink.logged("Conversion finished: 2/3 succeeded"));
}

#[test]
fn test_existing_output_is_skipped_without_launch() {
    let dir = TempDir::new().unwrap();
    let settings = settings_in(dir.path());
    let jobs = make_jobs(dir.path(), &["done.mp4"], &settings);
    fs::write(&jobs[0].output_path, b"converted earlier").unwrap();

    let tools = Arc::new(FakeTools::new());
    let sink = Arc::new(RecordingSink::default());
    let result = scheduler(&tools, &sink).run(jobs, &settings);

    assert_eq!(outcomes(&result), [JobOutcome::Skipped]);
    assert_eq!(tools.launch_count(), 0);
    assert!(sink.logged("already exists"));
    assert!(
        sink.progress_lines()
            .contains(&"Progress: 100.0% (1/1)".to_string())
    );
    assert!(sink.logged("Conversion finished: 0/1 succeeded"));
}

#[test]
fn test_overwrite_reconverts_existing_output() {
    let dir = TempDir::new().unwrap();
    let settings = ConversionSettings {
        overwrite: true,
        ..settings_in(dir.path())
    };
    let jobs = make_jobs(dir.path(), &["done.mp4"], &settings);
    fs::write(&jobs[0].output_path, b"converted earlier").unwrap();

    let tools = Arc::new(FakeTools::new());
    let sink = Arc::new(RecordingSink::default());
    let result = scheduler(&tools, &sink).run(jobs, &settings);

    assert_eq!(outcomes(&result), [JobOutcome::Succeeded]);
    assert_eq!(tools.launch_count(), 1);
}

#[test]
fn test_stop_between_jobs_keeps_only_finished_work() {
    let dir = TempDir::new().unwrap();
    let settings = settings_in(dir.path());
    let jobs = make_jobs(dir.path(), &["a.mkv", "b.mkv", "c.mkv"], &settings);

    let state = Arc::new(BatchState::new());
    let stopper = state.clone();
    let tools = Arc::new(FakeTools::new().with_encodes(vec![
        ScriptedEncode::success().with_hook(move || stopper.request_stop()),
    ]));
    let sink = Arc::new(RecordingSink::default());
    let scheduler = BatchScheduler::with_state(tools.clone(), sink.clone(), sink.clone(), state);

    let result = scheduler.run(jobs, &settings);

    assert_eq!(result.jobs.len(), 1);
    assert_eq!((result.total, result.succeeded), (1, 1));
    assert_eq!(tools.launch_count(), 1);
    assert!(sink.logged("stopped"));
    assert!(sink.logged("Conversion finished: 1/1 succeeded"));
    assert!(!scheduler.is_running());
}

#[test]
fn test_second_batch_is_rejected_while_running() {
    let dir = TempDir::new().unwrap();
    let settings = settings_in(dir.path());
    let jobs = make_jobs(dir.path(), &["a.mkv"], &settings);

    let state = Arc::new(BatchState::new());
    assert!(state.try_start());

    let tools = Arc::new(FakeTools::new());
    let sink = Arc::new(RecordingSink::default());
    let scheduler =
        BatchScheduler::with_state(tools.clone(), sink.clone(), sink.clone(), state.clone());
    let result = scheduler.run(jobs, &settings);

    assert_eq!(result.total, 0);
    assert!(result.jobs.is_empty());
    assert_eq!(tools.launch_count(), 0);
    assert!(sink.logged("already running"));
    // The rejected call must not release the other batch's slot
    assert!(state.is_running());
}

#[test]
fn test_panicking_job_ends_batch_early() {
    let dir = TempDir::new().unwrap();
    let settings = settings_in(dir.path());
    let jobs = make_jobs(dir.path(), &["a.mkv", "b.mkv", "c.mkv"], &settings);

    let tools = Arc::new(FakeTools::new().with_encodes(vec![
        ScriptedEncode::success(),
        ScriptedEncode::success().with_hook(|| panic!("encoder exploded")),
    ]));
    let sink = Arc::new(RecordingSink::default());
    let scheduler = scheduler(&tools, &sink);
    let result = scheduler.run(jobs, &settings);

    assert_eq!(outcomes(&result), [JobOutcome::Succeeded, JobOutcome::Failed]);
    assert!(sink.logged("encoder exploded"));
    assert!(sink.logged("Conversion finished: 1/2 succeeded"));
    assert!(!scheduler.is_running());
}

#[test]
fn test_spawned_batch_runs_on_worker_thread() {
    let dir = TempDir::new().unwrap();
    let settings = settings_in(dir.path());
    let jobs = make_jobs(dir.path(), &["a.mkv", "b.mkv"], &settings);

    let tools = Arc::new(FakeTools::new());
    let sink = Arc::new(RecordingSink::default());
    let scheduler = Arc::new(scheduler(&tools, &sink));

    let handle = scheduler.spawn(jobs, settings).unwrap();
    assert_eq!(handle.thread().name(), Some("avcbatch-worker"));

    let result = handle.join().unwrap();
    assert_eq!((result.total, result.succeeded), (2, 2));
    assert!(!scheduler.is_running());
}

#[cfg(unix)]
#[test]
fn test_unreadable_output_path_does_not_end_batch() {
    let dir = TempDir::new().unwrap();
    let settings = settings_in(dir.path());
    let mut jobs = make_jobs(dir.path(), &["a.mkv", "b.mkv"], &settings);
    // An interior NUL makes the existence check itself fail
    jobs[0].output_path = dir.path().join("bad\0name_H264.mp4");

    let tools = Arc::new(FakeTools::new());
    let sink = Arc::new(RecordingSink::default());
    let result = scheduler(&tools, &sink).run(jobs, &settings);

    assert_eq!(result.jobs.len(), 2);
    assert_eq!(tools.launch_count(), 2);
    assert!(!sink.logged("Conversion aborted"));
    assert!(sink.logged("Conversion finished: 2/2 succeeded"));
}
