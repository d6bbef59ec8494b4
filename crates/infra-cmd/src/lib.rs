//! Process-spawning and liveness primitives.
//!
//! Two flavors are needed by the supervisors in `infra-task`: a detached,
//! long-running child whose early failures we want to observe without
//! blocking forever (`spawn_detached`), and a short synchronous command
//! whose stdout we need (`run`). Both tokenize their command string with
//! POSIX shell word-splitting rules and exec without an intervening shell,
//! mirroring the original's `shlex.split(command)` + `subprocess.Popen(...,
//! shell=False)`.

use std::fs;
use std::io::Read;
use std::os::unix::io::{AsRawFd, FromRawFd};
use std::path::Path;
use std::process::{Command, Stdio};
use std::time::Duration;

use infra_errors::{Error, Result};

/// How long we wait after fork+exec before deciding a detached child is
/// alive. The original sleeps 1s while draining `stderr` non-blocking.
const SPAWN_SETTLE: Duration = Duration::from_secs(1);

/// Returns true iff `/proc/<pid>` exists, i.e. the kernel still has a task
/// with this pid. This is the sole liveness oracle used across the crate
/// (see `infra-task`); it intentionally does not distinguish zombies from
/// live processes, matching `os.path.isdir("/proc/{}".format(pid))`.
pub fn is_alive(pid: u32) -> bool {
    Path::new(&format!("/proc/{pid}")).exists()
}

/// Spawns `cmd` detached from this process, tokenizing it with POSIX shell
/// rules (no shell is actually invoked). After a short settle period, any
/// stderr the child has already produced is drained to `log_path` (or
/// logged via `tracing::error!` if no path is given), and the child's
/// liveness is confirmed via `/proc/<pid>`.
///
/// Returns `Error::CommandFailed` if the child is not alive after the
/// settle period.
pub fn spawn_detached(cmd: &str, log_path: Option<&Path>) -> Result<u32> {
    let args = shell_words::split(cmd)
        .map_err(|e| Error::ArgsIncorrect(format!("cannot tokenize command `{cmd}`: {e}")))?;
    let (program, rest) = args
        .split_first()
        .ok_or_else(|| Error::ArgsIncorrect("empty command".to_string()))?;

    let child = Command::new(program)
        .args(rest)
        .stdin(Stdio::null())
        .stdout(Stdio::null())
        .stderr(Stdio::piped())
        .spawn()
        .map_err(|e| Error::CommandFailed(format!("failed to spawn `{cmd}`: {e}")))?;

    let pid = child.id();
    let mut stderr = child.stderr;

    std::thread::sleep(SPAWN_SETTLE);

    if let Some(mut pipe) = stderr.take() {
        set_nonblocking(pipe.as_raw_fd());
        let mut buf = String::new();
        let _ = pipe.read_to_string(&mut buf);
        if !buf.is_empty() {
            match log_path {
                Some(path) => {
                    let _ = fs::write(path, &buf);
                }
                None => tracing::error!(%buf, "early stderr from spawned child"),
            }
        }
    }

    if !is_alive(pid) {
        return Err(Error::CommandFailed(format!(
            "child for `{cmd}` did not stay alive (pid {pid})"
        )));
    }

    Ok(pid)
}

fn set_nonblocking(fd: std::os::unix::io::RawFd) {
    use nix::fcntl::{fcntl, FcntlArg, OFlag};
    if let Ok(flags) = fcntl(fd, FcntlArg::F_GETFL) {
        let flags = OFlag::from_bits_truncate(flags) | OFlag::O_NONBLOCK;
        let _ = fcntl(fd, FcntlArg::F_SETFL(flags));
    }
}

/// Runs `cmd` synchronously and returns its stdout as a `String`. A
/// non-zero exit status propagates as `Error::CommandFailed`.
pub fn run(cmd: &str) -> Result<String> {
    let args = shell_words::split(cmd)
        .map_err(|e| Error::ArgsIncorrect(format!("cannot tokenize command `{cmd}`: {e}")))?;
    let (program, rest) = args
        .split_first()
        .ok_or_else(|| Error::ArgsIncorrect("empty command".to_string()))?;

    let output = Command::new(program)
        .args(rest)
        .output()
        .map_err(|e| Error::CommandFailed(format!("failed to run `{cmd}`: {e}")))?;

    if !output.status.success() {
        return Err(Error::CommandFailed(format!(
            "`{cmd}` exited with {}: {}",
            output.status,
            String::from_utf8_lossy(&output.stderr)
        )));
    }

    Ok(String::from_utf8_lossy(&output.stdout).into_owned())
}

/// Returns the absolute path to `program` if it is found on `PATH`,
/// equivalent to the original's `which <bin>` precheck.
pub fn which(program: &str) -> Result<String> {
    if program.starts_with('/') {
        return if Path::new(program).exists() {
            Ok(program.to_string())
        } else {
            Err(Error::CommandNotFound(program.to_string()))
        };
    }

    let path = std::env::var_os("PATH").unwrap_or_default();
    for dir in std::env::split_paths(&path) {
        let candidate = dir.join(program);
        if candidate.is_file() {
            return Ok(candidate.to_string_lossy().into_owned());
        }
    }

    Err(Error::CommandNotFound(program.to_string()))
}
