// Batch scheduling: one batch at a time, jobs strictly in order

use std::any::Any;
use std::io;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread::{self, JoinHandle};
use tracing::{error, info, warn};

use super::core::{
    BatchResult, ConversionSettings, Job, JobOutcome, LogSink, ProgressSink, ToolRunner,
};
use super::error::EngineError;
use super::runner::JobRunner;

/// Batch-active and stop flags shared between the worker and its controllers
#[derive(Debug, Default)]
pub struct BatchState {
    running: AtomicBool,
    stop: AtomicBool,
}

impl BatchState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Claim the batch slot. Returns false if a batch is already running.
    /// A successful claim clears any stale stop request.
    pub fn try_start(&self) -> bool {
        let claimed = self
            .running
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_ok();
        if claimed {
            self.stop.store(false, Ordering::SeqCst);
        }
        claimed
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    /// Ask the running batch to stop before its next job
    pub fn request_stop(&self) {
        self.stop.store(true, Ordering::SeqCst);
    }

    pub fn stop_requested(&self) -> bool {
        self.stop.load(Ordering::SeqCst)
    }

    pub fn finish(&self) {
        self.running.store(false, Ordering::SeqCst);
    }
}

/// Releases the batch slot however the loop exits
struct ActiveBatch<'a>(&'a BatchState);

impl Drop for ActiveBatch<'_> {
    fn drop(&mut self) {
        self.0.finish();
    }
}

/// Runs batches of jobs sequentially
pub struct BatchScheduler {
    tools: Arc<dyn ToolRunner>,
    log: Arc<dyn LogSink>,
    progress: Arc<dyn ProgressSink>,
    state: Arc<BatchState>,
    debug_log: bool,
}

impl BatchScheduler {
    pub fn new(
        tools: Arc<dyn ToolRunner>,
        log: Arc<dyn LogSink>,
        progress: Arc<dyn ProgressSink>,
    ) -> Self {
        Self::with_state(tools, log, progress, Arc::new(BatchState::new()))
    }

    /// Share an existing state, e.g. with a stop button living elsewhere
    pub fn with_state(
        tools: Arc<dyn ToolRunner>,
        log: Arc<dyn LogSink>,
        progress: Arc<dyn ProgressSink>,
        state: Arc<BatchState>,
    ) -> Self {
        Self {
            tools,
            log,
            progress,
            state,
            debug_log: false,
        }
    }

    pub fn with_debug_log(mut self, enabled: bool) -> Self {
        self.debug_log = enabled;
        self
    }

    pub fn state(&self) -> Arc<BatchState> {
        self.state.clone()
    }

    pub fn request_stop(&self) {
        self.state.request_stop();
    }

    pub fn is_running(&self) -> bool {
        self.state.is_running()
    }

    /// Run `jobs` in order on the calling thread.
    ///
    /// Returns an empty result without doing anything if another batch holds
    /// the same state.
    pub fn run(&self, jobs: Vec<Job>, settings: &ConversionSettings) -> BatchResult {
        if !self.state.try_start() {
            self.log
                .log("A conversion is already running, request ignored");
            return BatchResult::default();
        }
        let _active = ActiveBatch(&self.state);

        let mut result = BatchResult::default();
        if let Err(e) = self.run_jobs(jobs, settings, &mut result) {
            error!("{}", e);
            self.log.log(&format!("Conversion aborted: {}", e));
        }

        self.log.log(&format!(
            "Conversion finished: {}/{} succeeded",
            result.succeeded, result.total
        ));
        result
    }

    /// Run a batch on a dedicated worker thread
    pub fn spawn(
        self: &Arc<Self>,
        jobs: Vec<Job>,
        settings: ConversionSettings,
    ) -> io::Result<JoinHandle<BatchResult>> {
        let scheduler = Arc::clone(self);
        thread::Builder::new()
            .name("avcbatch-worker".to_string())
            .spawn(move || scheduler.run(jobs, &settings))
    }

    fn run_jobs(
        &self,
        jobs: Vec<Job>,
        settings: &ConversionSettings,
        result: &mut BatchResult,
    ) -> Result<(), EngineError> {
        let total = jobs.len();
        let mut runner = JobRunner::new(self.tools.clone(), self.log.clone(), self.progress.clone())
            .with_debug_log(self.debug_log);

        info!(total, encoder = %settings.encoder, "starting batch");
        self.log.log(&format!("Starting conversion of {} file(s)", total));

        for (index, mut job) in jobs.into_iter().enumerate() {
            if self.state.stop_requested() {
                self.log.log("Conversion stopped by user");
                break;
            }

            let exists = job.output_path.try_exists().unwrap_or_else(|e| {
                warn!(path = %job.output_path.display(), "cannot check output: {}", e);
                false
            });

            if exists && !settings.overwrite {
                self.log.log(&format!(
                    "Skipping {}: {} already exists",
                    job.file_name(),
                    job.output_path.display()
                ));
                job.outcome = JobOutcome::Skipped;
            } else if let Err(payload) =
                panic::catch_unwind(AssertUnwindSafe(|| runner.run(&mut job, settings)))
            {
                job.outcome = JobOutcome::Failed;
                let message =
                    format!("job {} panicked: {}", job.file_name(), panic_message(&*payload));
                result.record(job);
                return Err(EngineError::BatchLoopFault(message));
            }

            result.record(job);
            self.progress.progress(&format!(
                "Progress: {:.1}% ({}/{})",
                (index + 1) as f64 / total as f64 * 100.0,
                index + 1,
                total
            ));
        }

        Ok(())
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}
