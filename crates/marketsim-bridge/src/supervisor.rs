//! Lifecycle control for the single simulation process.
//!
//! The [`Supervisor`] exclusively owns the one process slot. Every start
//! first terminates whatever occupies the slot, under the same lock, so
//! two simulations never run at once.
//!
//! Termination is best effort: the process is asked to exit with
//! `SIGTERM`, the supervisor waits a bounded time, and then the slot is
//! treated as free whether or not the process actually exited. A process
//! that ignores the signal is abandoned to the OS.
//!
//! The settle interval after spawn is a heuristic for the process's own
//! startup time. There is no readiness handshake, so a slow process can
//! still miss the first command.

use std::collections::BTreeMap;
use std::process::Stdio;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::process::{Child, Command};
use tokio::sync::{watch, Mutex};
use tracing::{debug, info, warn};

use crate::config::{BinarySpec, SupervisorConfig};
use crate::error::BridgeError;

/// Lifecycle state of the simulation slot.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ProcessState {
    /// No process occupies the slot.
    #[default]
    NotRunning,
    /// A process was spawned and has not been stopped.
    Running,
    /// A termination is in progress.
    Terminating,
}

/// Point-in-time view of the slot, safe to read from any task.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ProcessStatus {
    /// Current lifecycle state.
    pub state: ProcessState,
    /// Mode of the active process.
    pub mode: Option<String>,
    /// OS process id of the active process.
    pub pid: Option<u32>,
    /// When the active process was spawned.
    pub started_at: Option<DateTime<Utc>>,
}

#[derive(Debug)]
struct SimulationProcess {
    child: Child,
    mode: String,
    pid: Option<u32>,
}

/// Owner of the simulation process slot.
#[derive(Debug)]
pub struct Supervisor {
    binaries: BTreeMap<String, BinarySpec>,
    default_mode: String,
    settle_interval: Duration,
    terminate_timeout: Duration,
    slot: Mutex<Option<SimulationProcess>>,
    status: watch::Sender<ProcessStatus>,
}

impl Supervisor {
    /// Create a supervisor with an empty slot.
    pub fn new(config: &SupervisorConfig) -> Self {
        let (status, _) = watch::channel(ProcessStatus::default());
        Self {
            binaries: config.binaries.clone(),
            default_mode: config.default_mode.clone(),
            settle_interval: config.settle_interval(),
            terminate_timeout: config.terminate_timeout(),
            slot: Mutex::new(None),
            status,
        }
    }

    /// Map a mode to an executable that exists on disk.
    ///
    /// `None` selects the configured default mode.
    ///
    /// # Errors
    ///
    /// Returns [`BridgeError::BinaryNotFound`] if the mode has no entry or
    /// its path does not exist.
    pub async fn resolve(&self, mode: Option<&str>) -> Result<(String, BinarySpec), BridgeError> {
        let mode = mode.unwrap_or(&self.default_mode).to_owned();
        let Some(spec) = self.binaries.get(&mode) else {
            return Err(BridgeError::BinaryNotFound {
                path: mode.clone(),
                mode,
            });
        };
        if !tokio::fs::try_exists(&spec.path).await.unwrap_or(false) {
            return Err(BridgeError::BinaryNotFound {
                path: spec.path.display().to_string(),
                mode,
            });
        }
        Ok((mode, spec.clone()))
    }

    /// Launch a simulation, replacing any running one.
    ///
    /// The mode is resolved before anything is touched, so an unknown mode
    /// leaves a running simulation in place. Otherwise the existing
    /// process is terminated, the new one is spawned, and the call returns
    /// only after the settle interval has elapsed.
    ///
    /// # Errors
    ///
    /// Returns [`BridgeError::BinaryNotFound`] for an unknown or missing
    /// executable, or [`BridgeError::Spawn`] if process creation fails
    /// (the slot is then empty).
    pub async fn start(&self, mode: Option<&str>) -> Result<ProcessStatus, BridgeError> {
        let (mode, spec) = self.resolve(mode).await?;

        let mut slot = self.slot.lock().await;
        if let Some(previous) = slot.take() {
            self.terminate(previous).await;
        }

        info!(mode = %mode, path = %spec.path.display(), "launching simulation");
        let mut command = Command::new(&spec.path);
        command.args(&spec.args).stdin(Stdio::null());
        let child = command
            .spawn()
            .map_err(|source| BridgeError::Spawn {
                mode: mode.clone(),
                source,
            })?;

        let pid = child.id();
        let status = ProcessStatus {
            state: ProcessState::Running,
            mode: Some(mode.clone()),
            pid,
            started_at: Some(Utc::now()),
        };
        self.status.send_replace(status.clone());
        *slot = Some(SimulationProcess { child, mode, pid });
        info!(pid, "simulation spawned");

        tokio::time::sleep(self.settle_interval).await;
        Ok(status)
    }

    /// Terminate the active simulation, if any.
    ///
    /// Stopping an empty slot is a no-op.
    pub async fn stop(&self) {
        let mut slot = self.slot.lock().await;
        match slot.take() {
            Some(process) => self.terminate(process).await,
            None => debug!("stop requested with no active simulation"),
        }
    }

    /// Current status, without touching the slot.
    pub fn status(&self) -> ProcessStatus {
        self.status.borrow().clone()
    }

    /// Current status after checking whether the process exited on its own.
    ///
    /// If a lifecycle operation holds the slot, the last published status
    /// is returned as-is.
    pub fn refresh(&self) -> ProcessStatus {
        if let Ok(mut slot) = self.slot.try_lock() {
            let exited = match slot.as_mut().map(|p| p.child.try_wait()) {
                Some(Ok(Some(exit))) => Some(exit),
                Some(Err(e)) => {
                    warn!(error = %e, "failed to poll simulation process");
                    None
                }
                Some(Ok(None)) | None => None,
            };
            if let Some(exit) = exited {
                info!(status = %exit, "simulation exited on its own");
                *slot = None;
                self.status.send_replace(ProcessStatus::default());
            }
        }
        self.status()
    }

    /// Subscribe to status changes.
    pub fn subscribe(&self) -> watch::Receiver<ProcessStatus> {
        self.status.subscribe()
    }

    /// Signal, wait a bounded time, then release the slot regardless.
    async fn terminate(&self, mut process: SimulationProcess) {
        self.status
            .send_modify(|status| status.state = ProcessState::Terminating);
        info!(mode = %process.mode, pid = process.pid, "terminating simulation");

        if let Err(e) = request_termination(&mut process.child) {
            debug!(error = %e, "termination signal not delivered");
        }

        match tokio::time::timeout(self.terminate_timeout, process.child.wait()).await {
            Ok(Ok(exit)) => info!(status = %exit, "simulation exited"),
            Ok(Err(e)) => warn!(error = %e, "failed to wait for simulation exit"),
            Err(_elapsed) => warn!(
                pid = process.pid,
                timeout_ms = u64::try_from(self.terminate_timeout.as_millis()).unwrap_or(u64::MAX),
                "simulation did not exit in time, abandoning it"
            ),
        }

        self.status.send_replace(ProcessStatus::default());
    }
}

/// Ask the child to exit gracefully.
#[cfg(unix)]
fn request_termination(child: &mut Child) -> std::io::Result<()> {
    use nix::sys::signal::{kill, Signal};
    use nix::unistd::Pid;

    // Already reaped.
    let Some(pid) = child.id() else {
        return Ok(());
    };
    let raw = i32::try_from(pid)
        .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidInput, e))?;
    kill(Pid::from_raw(raw), Signal::SIGTERM)?;
    Ok(())
}

/// Ask the child to exit. Without POSIX signals this is a hard kill.
#[cfg(not(unix))]
fn request_termination(child: &mut Child) -> std::io::Result<()> {
    child.start_kill()
}
