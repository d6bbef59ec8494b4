//! Priority-ordered process supervision.
//!
//! A node is a handful of long-running processes (the compute VMM, the BMC
//! simulator, the serial-over-LAN bridge) that must come up and go down in
//! a fixed order and whose liveness we can only observe through a pid file
//! plus a `/proc/<pid>` probe — there is no IPC channel back from these
//! processes, matching the original's supervision model.

mod bmc;
mod compute;
mod pidfile;
mod serial;

pub use bmc::BmcTask;
pub use compute::ComputeTask;
pub use serial::SerialBridgeTask;

use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use infra_errors::{Error, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskStatus {
    Running(u32),
    Stopped,
}

/// How long `run` polls for a pid file written by a process it didn't spawn
/// itself (the compute task's `run_mask`, see `ComputeTask`).
const EXTERNAL_PID_WAIT: Duration = Duration::from_secs(5);
const EXTERNAL_PID_POLL_INTERVAL: Duration = Duration::from_millis(200);

/// Settle window between sending SIGTERM and deleting the pid file, giving
/// the signaled process a chance to exit on its own before its liveness
/// marker disappears.
const SPAWN_SETTLE: Duration = Duration::from_secs(1);

/// Common lifecycle shared by every supervised process. `run`, `terminate`
/// and `status` are idempotent: starting an already-running task or
/// stopping an already-stopped one is a no-op, not an error.
pub trait Task {
    fn name(&self) -> &str;

    /// Ascending on start, descending on stop: serial=0, bmc=1, compute=2.
    fn priority(&self) -> u8;

    fn workspace(&self) -> &Path;

    fn precheck(&self) -> Result<()>;

    /// Command line to spawn, or `None` if this task never spawns its own
    /// child and instead expects another process to write the pid file
    /// (only `ComputeTask` does this: the BMC's `startcmd` script forks the
    /// actual VMM, the compute task just waits for the result).
    fn command(&self) -> Result<Option<String>>;

    fn pid_file(&self) -> PathBuf {
        pidfile::path(self.workspace(), self.name())
    }

    fn status(&self) -> Result<TaskStatus> {
        match pidfile::read(self.workspace(), self.name()) {
            Some(pid) if infra_cmd::is_alive(pid) => Ok(TaskStatus::Running(pid)),
            Some(_) => {
                pidfile::remove(self.workspace(), self.name())?;
                Ok(TaskStatus::Stopped)
            }
            None => Ok(TaskStatus::Stopped),
        }
    }

    fn run(&self) -> Result<()> {
        if matches!(self.status()?, TaskStatus::Running(_)) {
            tracing::info!(task = self.name(), "already running, skipping start");
            return Ok(());
        }

        self.precheck()?;

        let pid = match self.command()? {
            Some(cmd) => infra_cmd::spawn_detached(&cmd, None)?,
            None => self.wait_for_external_pid()?,
        };

        pidfile::write(self.workspace(), self.name(), pid)?;
        tracing::info!(task = self.name(), pid, "task started");
        Ok(())
    }

    fn wait_for_external_pid(&self) -> Result<u32> {
        let deadline = Instant::now() + EXTERNAL_PID_WAIT;
        loop {
            if let Some(pid) = pidfile::read(self.workspace(), self.name()) {
                if infra_cmd::is_alive(pid) {
                    return Ok(pid);
                }
            }
            if Instant::now() >= deadline {
                return Err(Error::CommandFailed(format!(
                    "[task:{}] no pid file appeared within {:?}",
                    self.name(),
                    EXTERNAL_PID_WAIT
                )));
            }
            std::thread::sleep(EXTERNAL_PID_POLL_INTERVAL);
        }
    }

    fn terminate(&self) -> Result<()> {
        match self.status()? {
            TaskStatus::Stopped => {
                tracing::info!(task = self.name(), "already stopped, skipping terminate");
                Ok(())
            }
            TaskStatus::Running(pid) => {
                nix::sys::signal::kill(
                    nix::unistd::Pid::from_raw(pid as i32),
                    nix::sys::signal::Signal::SIGTERM,
                )
                .map_err(|e| Error::CommandFailed(format!("failed to signal pid {pid}: {e}")))?;
                std::thread::sleep(SPAWN_SETTLE);
                pidfile::remove(self.workspace(), self.name())?;
                tracing::info!(task = self.name(), pid, "task terminated");
                Ok(())
            }
        }
    }
}
