use std::path::{Path, PathBuf};

use infra_errors::{Error, Result};
use infra_model::BmcDescriptor;

use crate::Task;

/// The IPMI simulator (`ipmi_sim`) process. Its config, emu and script
/// files are staged by the node orchestrator before this task's `run` is
/// called; `precheck` only verifies they exist and that the integer
/// fields the original validates (`poweroff_wait`, `kill_wait`,
/// `ipmi_over_lan_port`, `historyfru`) are non-negative.
pub struct BmcTask {
    workspace: PathBuf,
    sim_binary: String,
    config_file: PathBuf,
    emu_file: PathBuf,
    startcmd_script: PathBuf,
    chassiscontrol_script: PathBuf,
    lancontrol_script: PathBuf,
    address: u32,
    channel: u32,
    ipmi_over_lan_port: u16,
    poweroff_wait: i64,
    kill_wait: i64,
    historyfru: i64,
}

impl BmcTask {
    #[allow(clippy::too_many_arguments)]
    pub fn init(
        descriptor: &BmcDescriptor,
        workspace: &Path,
        sim_binary: &str,
        config_file: PathBuf,
        emu_file: PathBuf,
        startcmd_script: PathBuf,
        chassiscontrol_script: PathBuf,
        lancontrol_script: PathBuf,
    ) -> Self {
        Self {
            workspace: workspace.to_path_buf(),
            sim_binary: sim_binary.to_string(),
            config_file,
            emu_file,
            startcmd_script,
            chassiscontrol_script,
            lancontrol_script,
            address: descriptor.address.unwrap_or(0x20),
            channel: descriptor.channel.unwrap_or(1),
            ipmi_over_lan_port: descriptor.ipmi_over_lan_port.unwrap_or(623),
            poweroff_wait: descriptor.poweroff_wait.unwrap_or(5),
            kill_wait: descriptor.kill_wait.unwrap_or(5),
            historyfru: descriptor.historyfru.unwrap_or(0),
        }
    }
}

impl Task for BmcTask {
    fn name(&self) -> &str {
        "bmc"
    }

    fn priority(&self) -> u8 {
        1
    }

    fn workspace(&self) -> &Path {
        &self.workspace
    }

    fn precheck(&self) -> Result<()> {
        infra_cmd::which(&self.sim_binary)?;

        for (label, path) in [
            ("config file", &self.config_file),
            ("emu file", &self.emu_file),
            ("startcmd script", &self.startcmd_script),
            ("chassiscontrol script", &self.chassiscontrol_script),
            ("lancontrol script", &self.lancontrol_script),
        ] {
            if !path.exists() {
                return Err(Error::ArgsIncorrect(format!(
                    "[task:bmc] {label} not found: {}",
                    path.display()
                )));
            }
        }

        for (label, value) in [
            ("poweroff_wait", self.poweroff_wait),
            ("kill_wait", self.kill_wait),
            ("ipmi_over_lan_port", self.ipmi_over_lan_port as i64),
            ("historyfru", self.historyfru),
        ] {
            if value < 0 {
                return Err(Error::ArgsIncorrect(format!(
                    "[task:bmc] {label} must be a non-negative integer, got {value}"
                )));
            }
        }

        Ok(())
    }

    fn command(&self) -> Result<Option<String>> {
        Ok(Some(format!(
            "{} -c {} -f {} -n -s /var/tmp",
            self.sim_binary,
            self.config_file.display(),
            self.emu_file.display()
        )))
    }
}

impl BmcTask {
    pub fn address(&self) -> u32 {
        self.address
    }

    pub fn channel(&self) -> u32 {
        self.channel
    }

    pub fn ipmi_over_lan_port(&self) -> u16 {
        self.ipmi_over_lan_port
    }

    pub fn poweroff_wait(&self) -> i64 {
        self.poweroff_wait
    }

    pub fn kill_wait(&self) -> i64 {
        self.kill_wait
    }

    pub fn historyfru(&self) -> i64 {
        self.historyfru
    }
}
