//! Launching ffmpeg/ffprobe.
//!
//! Every external process goes through [`ToolRunner`]. [`SystemTools`] is the
//! real implementation; tests script their own.

use std::io::{BufRead, BufReader, Read};
use std::path::PathBuf;
use std::process::{Child, Command, Stdio};
use std::sync::mpsc;
use std::thread;
use std::time::{Duration, Instant};
use tracing::debug;

use crate::engine::error::EngineError;

/// Bounded wait for `-version` style queries
pub const VERSION_TIMEOUT: Duration = Duration::from_secs(10);

/// Lines buffered between the stderr reader thread and the consumer
const LINE_BUFFER: usize = 256;

const POLL_INTERVAL: Duration = Duration::from_millis(50);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Tool {
    Ffmpeg,
    Ffprobe,
}

impl Tool {
    pub fn name(self) -> &'static str {
        match self {
            Self::Ffmpeg => "ffmpeg",
            Self::Ffprobe => "ffprobe",
        }
    }
}

/// Captured result of a short-lived tool invocation
#[derive(Debug, Clone, Default)]
pub struct ToolOutput {
    pub code: Option<i32>,
    pub stdout: String,
    pub stderr: String,
}

impl ToolOutput {
    pub fn success(&self) -> bool {
        self.code == Some(0)
    }
}

/// How a streamed process ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExitReport {
    /// `None` when the process was terminated by a signal
    pub code: Option<i32>,
}

impl ExitReport {
    pub fn success(&self) -> bool {
        self.code == Some(0)
    }
}

pub trait ToolRunner: Send + Sync {
    /// Run to completion, killing the process if it outlives `timeout`
    fn output(&self, tool: Tool, args: &[String], timeout: Duration)
    -> Result<ToolOutput, EngineError>;

    /// Run while handing each stderr line to `on_line` as it arrives.
    /// Blocks until the process exits.
    fn stream(
        &self,
        tool: Tool,
        args: &[String],
        on_line: &mut dyn FnMut(&str),
    ) -> Result<ExitReport, EngineError>;
}

/// ffmpeg and ffprobe from PATH (or explicit locations)
#[derive(Debug, Clone)]
pub struct SystemTools {
    pub ffmpeg: PathBuf,
    pub ffprobe: PathBuf,
}

impl Default for SystemTools {
    fn default() -> Self {
        Self {
            ffmpeg: PathBuf::from("ffmpeg"),
            ffprobe: PathBuf::from("ffprobe"),
        }
    }
}

impl SystemTools {
    fn command(&self, tool: Tool, args: &[String]) -> Command {
        let program = match tool {
            Tool::Ffmpeg => &self.ffmpeg,
            Tool::Ffprobe => &self.ffprobe,
        };
        let mut cmd = Command::new(program);
        cmd.args(args);
        cmd.stdin(Stdio::null());
        cmd
    }

    fn spawn(&self, tool: Tool, mut cmd: Command) -> Result<Child, EngineError> {
        cmd.spawn().map_err(|source| EngineError::ToolUnavailable {
            tool: tool.name(),
            source,
        })
    }
}

impl ToolRunner for SystemTools {
    fn output(
        &self,
        tool: Tool,
        args: &[String],
        timeout: Duration,
    ) -> Result<ToolOutput, EngineError> {
        let mut cmd = self.command(tool, args);
        cmd.stdout(Stdio::piped());
        cmd.stderr(Stdio::piped());

        debug!(tool = tool.name(), ?args, "running tool");
        let mut child = self.spawn(tool, cmd)?;

        // Drain both pipes off-thread so a chatty process can't fill them and stall
        let stdout_handle = child.stdout.take().map(drain_pipe);
        let stderr_handle = child.stderr.take().map(drain_pipe);

        let started = Instant::now();
        let status = loop {
            match child.try_wait() {
                Ok(Some(status)) => break status,
                Ok(None) if started.elapsed() >= timeout => {
                    let _ = child.kill();
                    let _ = child.wait();
                    return Err(EngineError::Timeout {
                        tool: tool.name(),
                        timeout,
                    });
                }
                Ok(None) => thread::sleep(POLL_INTERVAL),
                Err(e) => {
                    let _ = child.kill();
                    return Err(EngineError::Io(e));
                }
            }
        };

        let collect = |handle: Option<thread::JoinHandle<Vec<u8>>>| {
            handle
                .and_then(|h| h.join().ok())
                .map(|buf| String::from_utf8_lossy(&buf).to_string())
                .unwrap_or_default()
        };

        Ok(ToolOutput {
            code: status.code(),
            stdout: collect(stdout_handle),
            stderr: collect(stderr_handle),
        })
    }

    fn stream(
        &self,
        tool: Tool,
        args: &[String],
        on_line: &mut dyn FnMut(&str),
    ) -> Result<ExitReport, EngineError> {
        let mut cmd = self.command(tool, args);
        cmd.stdout(Stdio::null());
        cmd.stderr(Stdio::piped());

        let mut child = self.spawn(tool, cmd)?;
        let stderr = child.stderr.take().ok_or_else(|| {
            EngineError::Io(std::io::Error::other("failed to capture stderr"))
        })?;

        // Bounded channel: the reader blocks when the consumer falls behind
        let (tx, rx) = mpsc::sync_channel::<String>(LINE_BUFFER);
        let reader = thread::spawn(move || {
            let reader = BufReader::new(stderr);
            for chunk in reader.split(b'\n').map_while(Result::ok) {
                let text = String::from_utf8_lossy(&chunk);
                // ffmpeg rewrites its stats line in place with carriage returns
                for line in text.split('\r') {
                    if tx.send(line.to_string()).is_err() {
                        return;
                    }
                }
            }
        });

        for line in rx {
            on_line(&line);
        }

        let _ = reader.join();
        let status = child.wait()?;
        Ok(ExitReport {
            code: status.code(),
        })
    }
}

fn drain_pipe<R: Read + Send + 'static>(mut pipe: R) -> thread::JoinHandle<Vec<u8>> {
    thread::spawn(move || {
        let mut buf = Vec::new();
        let _ = pipe.read_to_end(&mut buf);
        buf
    })
}

/// Check if ffmpeg is available and return its version line
pub fn ffmpeg_version(tools: &dyn ToolRunner) -> Result<String, EngineError> {
    tool_version(tools, Tool::Ffmpeg)
}

/// Check if ffprobe is available and return its version line
pub fn ffprobe_version(tools: &dyn ToolRunner) -> Result<String, EngineError> {
    tool_version(tools, Tool::Ffprobe)
}

/// `true` when `ffmpeg -version` runs and exits cleanly
pub fn ffmpeg_available(tools: &dyn ToolRunner) -> bool {
    ffmpeg_version(tools).is_ok()
}

fn tool_version(tools: &dyn ToolRunner, tool: Tool) -> Result<String, EngineError> {
    let output = tools.output(tool, &["-version".to_string()], VERSION_TIMEOUT)?;

    if !output.success() {
        return Err(EngineError::ToolUnavailable {
            tool: tool.name(),
            source: std::io::Error::other(format!(
                "-version exited with {:?}",
                output.code
            )),
        });
    }

    let first_line = output.stdout.lines().next().unwrap_or("Unknown version");
    Ok(first_line.to_string())
}
