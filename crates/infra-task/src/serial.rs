use std::path::{Path, PathBuf};

use infra_errors::{Error, Result};

use crate::Task;

/// Serial-over-LAN bridge: a `socat`-style relay between the VMM's SOL
/// pty and a UDP port the BMC simulator listens on, matching the
/// original's `CSocat` task.
pub struct SerialBridgeTask {
    workspace: PathBuf,
    relay_binary: String,
    sol_device: String,
    serial_port: u16,
}

impl SerialBridgeTask {
    pub fn init(workspace: &Path, relay_binary: &str, sol_device: &str, serial_port: u16) -> Self {
        Self {
            workspace: workspace.to_path_buf(),
            relay_binary: relay_binary.to_string(),
            sol_device: sol_device.to_string(),
            serial_port,
        }
    }
}

impl Task for SerialBridgeTask {
    fn name(&self) -> &str {
        "socat"
    }

    fn priority(&self) -> u8 {
        0
    }

    fn workspace(&self) -> &Path {
        &self.workspace
    }

    fn precheck(&self) -> Result<()> {
        infra_cmd::which(&self.relay_binary)?;
        if self.sol_device.is_empty() {
            return Err(Error::ArgsIncorrect(
                "[task:socat] sol_device is not defined".to_string(),
            ));
        }
        Ok(())
    }

    fn command(&self) -> Result<Option<String>> {
        Ok(Some(format!(
            "{} pty,link={},waitslave udp-listen:{},reuseaddr",
            self.relay_binary, self.sol_device, self.serial_port
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn command_matches_original_fragment_shape() {
        let task = SerialBridgeTask::init(Path::new("/tmp"), "socat", "/tmp/node-0/sol", 9003);
        let cmd = task.command().unwrap().unwrap();
        assert_eq!(cmd, "socat pty,link=/tmp/node-0/sol,waitslave udp-listen:9003,reuseaddr");
    }

    #[test]
    fn precheck_rejects_empty_sol_device() {
        let task = SerialBridgeTask::init(Path::new("/tmp"), "sh", "", 9003);
        assert!(matches!(task.precheck(), Err(Error::ArgsIncorrect(_))));
    }
}
