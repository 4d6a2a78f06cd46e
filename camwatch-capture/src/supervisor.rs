//
// Supervisor for one external capture process per recording session.
//
// The capture binary (ffmpeg in production) writes the container file itself;
// a partial file on disk is a normal state while recording is live. Our job is
// spawn, graceful stop, bounded escalation to a kill, and exit accounting.

use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;

use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::process::{Child, Command};
use tokio::time::Instant;

#[derive(Debug, thiserror::Error)]
pub enum CaptureError {
    #[error("failed to spawn capture process `{binary}`: {source}")]
    Spawn {
        binary: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed waiting for capture process: {0}")]
    Wait(#[from] std::io::Error),

    #[error("failed to signal capture process: {0}")]
    Signal(std::io::Error),
}

/// How a capture process ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExitOutcome {
    /// Exited within the graceful window (on its own or after the stop signal).
    Graceful,
    /// Killed outright, no graceful window offered.
    Forced,
    /// Ignored the stop signal past the timeout and was then killed.
    TimedOutThenForced,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProcessExit {
    pub outcome: ExitOutcome,
    pub exit_code: Option<i32>,
    pub waited: Duration,
}

/// Builds and launches capture commands.
#[derive(Debug, Clone)]
pub struct ProcessSupervisor {
    binary: String,
    segment_seconds: u32,
}

impl ProcessSupervisor {
    pub fn new(binary: impl Into<String>, segment_seconds: u32) -> Self {
        Self {
            binary: binary.into(),
            segment_seconds,
        }
    }

    /// Argument set for one capture run.
    ///
    /// The output is a faststart-flagged mp4 so the file stays playable even
    /// when the recorder is torn down mid-segment.
    pub fn command(&self, source_uri: &str, output_path: &Path) -> Command {
        let mut cmd = Command::new(&self.binary);
        cmd.arg("-i")
            .arg(source_uri)
            .args(["-c:v", "libx264", "-c:a", "aac", "-preset", "ultrafast"])
            .args(["-movflags", "+faststart"])
            .arg("-segment_time")
            .arg(self.segment_seconds.to_string())
            .args(["-f", "mp4"])
            .arg(output_path);

        cmd.stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        cmd
    }

    pub fn spawn(
        &self,
        source_uri: &str,
        output_path: &Path,
    ) -> Result<CaptureProcess, CaptureError> {
        CaptureProcess::spawn_from(self.command(source_uri, output_path), &self.binary, output_path)
    }
}

/// One live capture child. Present on a session only while it is recording or
/// stopping.
#[derive(Debug)]
pub struct CaptureProcess {
    child: Child,
    output_path: PathBuf,
    stop_requested: bool,
    stderr_task: Option<tokio::task::JoinHandle<()>>,
}

impl CaptureProcess {
    /// Spawn from an already-built command.
    ///
    /// Tests use this to supervise scripted children instead of a real capture
    /// binary.
    pub fn spawn_from(
        mut cmd: Command,
        binary: &str,
        output_path: &Path,
    ) -> Result<Self, CaptureError> {
        let mut child = cmd.spawn().map_err(|source| CaptureError::Spawn {
            binary: binary.to_string(),
            source,
        })?;

        // The capture binary narrates onto stderr. Drain it so the pipe never
        // fills, and keep the lines visible at debug level.
        let stderr_task = child.stderr.take().map(|stderr| {
            tokio::spawn(async move {
                let mut lines = BufReader::new(stderr).lines();
                while let Ok(Some(line)) = lines.next_line().await {
                    log::debug!("capture: {line}");
                }
            })
        });

        log::info!(
            "capture process started (pid {:?}) -> {}",
            child.id(),
            output_path.display()
        );

        Ok(Self {
            child,
            output_path: output_path.to_path_buf(),
            stop_requested: false,
            stderr_task,
        })
    }

    pub fn output_path(&self) -> &Path {
        &self.output_path
    }

    pub fn pid(&self) -> Option<u32> {
        self.child.id()
    }

    /// Ask the process to wind down. Side effect only; pair with `await_exit`.
    #[cfg(unix)]
    pub fn request_stop(&mut self) -> Result<(), CaptureError> {
        self.stop_requested = true;

        let Some(pid) = self.child.id() else {
            // Already reaped; nothing to signal.
            return Ok(());
        };

        // SIGTERM lets the container get its trailer written.
        let rc = unsafe { libc::kill(pid as libc::pid_t, libc::SIGTERM) };
        if rc != 0 {
            return Err(CaptureError::Signal(std::io::Error::last_os_error()));
        }
        Ok(())
    }

    #[cfg(not(unix))]
    pub fn request_stop(&mut self) -> Result<(), CaptureError> {
        // No TERM-equivalent on this platform; go straight to a kill.
        self.stop_requested = true;
        self.child.start_kill().map_err(CaptureError::Signal)
    }

    /// Wait for the process to exit, escalating to a kill once `timeout`
    /// elapses. The post-kill wait is unbounded: SIGKILL cannot be ignored.
    pub async fn await_exit(&mut self, timeout: Duration) -> Result<ProcessExit, CaptureError> {
        let started = Instant::now();

        match tokio::time::timeout(timeout, self.child.wait()).await {
            Ok(status) => {
                let status = status?;
                self.drain_logs().await;
                Ok(ProcessExit {
                    outcome: ExitOutcome::Graceful,
                    exit_code: status.code(),
                    waited: started.elapsed(),
                })
            }
            Err(_) => {
                log::warn!(
                    "capture process (pid {:?}) ignored stop for {timeout:?}; killing",
                    self.child.id()
                );
                self.child.start_kill().map_err(CaptureError::Signal)?;
                let status = self.child.wait().await?;
                self.drain_logs().await;
                Ok(ProcessExit {
                    outcome: ExitOutcome::TimedOutThenForced,
                    exit_code: status.code(),
                    waited: started.elapsed(),
                })
            }
        }
    }

    /// Graceful stop with bounded escalation.
    pub async fn stop(&mut self, timeout: Duration) -> Result<ProcessExit, CaptureError> {
        self.request_stop()?;
        self.await_exit(timeout).await
    }

    /// Kill outright, no graceful window.
    pub async fn force_stop(&mut self) -> Result<ProcessExit, CaptureError> {
        let started = Instant::now();
        self.child.start_kill().map_err(CaptureError::Signal)?;
        let status = self.child.wait().await?;
        self.drain_logs().await;
        Ok(ProcessExit {
            outcome: ExitOutcome::Forced,
            exit_code: status.code(),
            waited: started.elapsed(),
        })
    }

    async fn drain_logs(&mut self) {
        if let Some(task) = self.stderr_task.take() {
            let _ = task.await;
        }
    }
}
