//! Node orchestrator.
//!
//! Wires the element tree and task supervisors together for one simulated
//! node: materializes its workspace (config, scripts, default disk
//! images), then starts/stops/queries its three tasks in priority order
//! (serial bridge, BMC, compute — ascending on start, descending on stop).

mod assets;
mod config;

pub use assets::AssetPaths;

use std::fs;
use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};

use askama::Template;
use infra_errors::{Error, Result};
use infra_model::NodeDescriptor;
use infra_numa::NumaCtl;
use infra_task::{BmcTask, ComputeTask, SerialBridgeTask, Task, TaskStatus};

const DEFAULT_MONITOR_PORT: u16 = 2345;
const DEFAULT_BMC_CONNECTION_PORT: u16 = 9002;
const DEFAULT_SERIAL_PORT: u16 = 9003;
const DEFAULT_IPMI_CONSOLE_PORT: u16 = 9000;

pub struct Node {
    name: String,
    workspace: PathBuf,
    descriptor: NodeDescriptor,
    lan_interface: String,
    bmc_connection_port: u16,
    emu_source: PathBuf,
    emu_dest_name: String,
    lancontrol_source: PathBuf,
    smbios_source: Option<PathBuf>,
    smbios_dest: PathBuf,
    config_file_override: Option<PathBuf>,
    serial: SerialBridgeTask,
    bmc: BmcTask,
    compute: ComputeTask,
}

impl Node {
    pub fn from_descriptor(descriptor: &NodeDescriptor, workspace_root: &Path, assets: &AssetPaths) -> Result<Self> {
        let workspace = workspace_root.join(&descriptor.name);
        let data_dir = workspace.join("data");
        let script_dir = workspace.join("script");

        let bmc_descriptor = descriptor.bmc.clone().unwrap_or_default();
        let bmc_connection_port = descriptor.bmc_connection_port.unwrap_or(DEFAULT_BMC_CONNECTION_PORT);
        let serial_port = descriptor.serial_port.unwrap_or(DEFAULT_SERIAL_PORT);
        let sol_device = descriptor
            .sol_device
            .clone()
            .unwrap_or_else(|| data_dir.join("sol").to_string_lossy().into_owned());
        let lan_interface = match bmc_descriptor.interface.clone() {
            Some(interface) => interface,
            None => default_lan_interface()?,
        };

        let mut numa = if descriptor.compute.numa_control && NumaCtl::available() {
            NumaCtl::discover()?
        } else {
            NumaCtl::default()
        };

        // Resolution order (spec.md §4.6): explicit `compute.smbios`, else
        // `<workspace>/data/<type>_smbios.bin`, else the vendor-scoped
        // packaged default. The second tier is populated by
        // `materialize_workspace` (staged from the third tier) whenever no
        // override is given, so it's always present by the time the VMM
        // command line is actually executed.
        let smbios_dest = data_dir.join(format!("{}_smbios.bin", descriptor.node_type));
        let smbios_path = descriptor.compute.smbios.clone().unwrap_or_else(|| smbios_dest.clone());
        let smbios_source = if descriptor.compute.smbios.is_none() {
            Some(assets.default_smbios_file.clone())
        } else {
            None
        };

        let compute = ComputeTask::init(
            &descriptor.compute,
            &descriptor.name,
            &workspace,
            &assets.vmm_binary,
            smbios_path,
            DEFAULT_MONITOR_PORT,
            serial_port,
            Some(bmc_connection_port),
            &mut numa,
        )?;

        let config_file_override = bmc_descriptor.config_file.clone().map(PathBuf::from);
        let config_file = data_dir.join("vbmc.conf");
        let emu_dest_name = format!("{}.emu", descriptor.node_type);
        let emu_source = assets.resolve_emu_file(bmc_descriptor.emu_file.as_deref());
        let lancontrol_source = assets.resolve_lancontrol_script(bmc_descriptor.lancontrol.as_deref());

        let bmc = BmcTask::init(
            &bmc_descriptor,
            &workspace,
            &assets.bmc_sim_binary,
            config_file,
            data_dir.join(&emu_dest_name),
            script_dir.join("startcmd"),
            script_dir.join("chassiscontrol"),
            script_dir.join("lancontrol"),
        );

        let serial = SerialBridgeTask::init(&workspace, &assets.serial_relay_binary, &sol_device, serial_port);

        Ok(Self {
            name: descriptor.name.clone(),
            workspace,
            descriptor: descriptor.clone(),
            lan_interface,
            bmc_connection_port,
            emu_source,
            emu_dest_name,
            lancontrol_source,
            smbios_source,
            smbios_dest,
            config_file_override,
            serial,
            bmc,
            compute,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn workspace(&self) -> &Path {
        &self.workspace
    }

    /// Creates the workspace layout (`data/`, `script/`, the per-node log
    /// directory) and writes the BMC config, control scripts and the
    /// `infrasim.yml` descriptor snapshot. Idempotent: a workspace that
    /// already carries `data/infrasim.yml` is left untouched — this is
    /// the only on-disk marker that materialization has already run.
    pub fn materialize_workspace(&self) -> Result<()> {
        let data_dir = self.workspace.join("data");
        let script_dir = self.workspace.join("script");
        let snapshot_path = data_dir.join("infrasim.yml");

        if snapshot_path.exists() {
            return Ok(());
        }

        fs::create_dir_all(&data_dir)?;
        fs::create_dir_all(&script_dir)?;
        fs::create_dir_all(log_dir(&self.name))?;

        let start_script = script_dir.join("startcmd");
        let stop_script = script_dir.join("stopcmd");
        let reset_script = script_dir.join("resetcmd");
        let chassis_script = script_dir.join("chassiscontrol");
        let config_path = data_dir.join("vbmc.conf");
        let pid_file = self.compute.pid_file();

        let vmm_command = self.compute.render_command_line()?;

        if let Some(override_path) = &self.config_file_override {
            // A user-supplied `bmc.config_file` is copied in verbatim; the
            // templated scripts are still rendered below since `BmcTask`'s
            // own precheck requires them to exist regardless of where the
            // ipmi_sim config came from (see DESIGN.md's Open Question note).
            fs::copy(override_path, &config_path)?;
        }

        write_executable(
            &start_script,
            &config::StartCmdScript {
                vmm_command: &vmm_command,
                pid_file: &pid_file.to_string_lossy(),
            }
            .render()
            .map_err(|e| Error::Internal(format!("failed to render startcmd: {e}")))?,
        )?;

        write_executable(
            &stop_script,
            &config::StopCmdScript {
                pid_file: &pid_file.to_string_lossy(),
            }
            .render()
            .map_err(|e| Error::Internal(format!("failed to render stopcmd: {e}")))?,
        )?;

        write_executable(
            &reset_script,
            &config::ResetCmdScript {
                stop_script: &stop_script.to_string_lossy(),
                start_script: &start_script.to_string_lossy(),
            }
            .render()
            .map_err(|e| Error::Internal(format!("failed to render resetcmd: {e}")))?,
        )?;

        write_executable(
            &chassis_script,
            &config::ChassisControlScript {
                stop_script: &stop_script.to_string_lossy(),
                start_script: &start_script.to_string_lossy(),
                reset_script: &reset_script.to_string_lossy(),
            }
            .render()
            .map_err(|e| Error::Internal(format!("failed to render chassiscontrol: {e}")))?,
        )?;

        let bmc_descriptor = self.descriptor.bmc.clone().unwrap_or_default();

        // Stage the SMBIOS blob into the second resolution tier only when no
        // explicit override was given — an override is referenced directly
        // from its own path and never copied (spec.md §4.6, §4.9).
        if let Some(source) = &self.smbios_source {
            if source.exists() {
                fs::copy(source, &self.smbios_dest)?;
            }
        }
        fs::copy(&self.emu_source, data_dir.join(&self.emu_dest_name))?;
        symlink_or_copy(&self.lancontrol_source, &script_dir.join("lancontrol"))?;

        if self.config_file_override.is_none() {
            let vbmc_config = config::VbmcConfig {
                node_name: &self.name,
                bmc_address_hex: format!("0x{:x}", self.bmc.address()),
                channel: self.bmc.channel(),
                lan_channel_name: "1",
                lan_interface: &self.lan_interface,
                lan_control_script: &script_dir.join("lancontrol").to_string_lossy(),
                start_cmd: &start_script.to_string_lossy(),
                startnow: if bmc_descriptor.startnow.unwrap_or(true) { "true" } else { "false" },
                poweroff_wait: self.bmc.poweroff_wait(),
                kill_wait: self.bmc.kill_wait(),
                chassis_control_cmd: &chassis_script.to_string_lossy(),
                username: &bmc_descriptor.username.clone().unwrap_or_else(|| "admin".to_string()),
                password: &bmc_descriptor.password.clone().unwrap_or_else(|| "admin".to_string()),
                port_ipmi_console: self.descriptor.ipmi_console_port.unwrap_or(DEFAULT_IPMI_CONSOLE_PORT),
                port_qemu_ipmi: self.bmc_connection_port,
                port_iol: self.bmc.ipmi_over_lan_port(),
                historyfru: self.bmc.historyfru(),
                sol_device: &self
                    .descriptor
                    .sol_device
                    .clone()
                    .unwrap_or_else(|| data_dir.join("sol").to_string_lossy().into_owned()),
            }
            .render()
            .map_err(|e| Error::Internal(format!("failed to render vbmc.conf: {e}")))?;

            fs::write(&config_path, vbmc_config)?;
        }

        let snapshot = self
            .descriptor
            .to_yaml()
            .map_err(|e| Error::Internal(format!("failed to render infrasim.yml: {e}")))?;
        fs::write(&snapshot_path, snapshot)?;

        tracing::info!(node = %self.name, workspace = %self.workspace.display(), "workspace materialized");
        Ok(())
    }

    pub fn terminate_workspace(&self) -> Result<()> {
        if self.workspace.exists() {
            fs::remove_dir_all(&self.workspace)?;
        }
        Ok(())
    }

    fn tasks_ascending(&self) -> [&dyn Task; 3] {
        [&self.serial, &self.bmc, &self.compute]
    }

    /// Starts tasks in ascending priority order (serial, then bmc, then
    /// compute) so each dependency is up before the next task needs it.
    pub fn start(&self) -> Result<()> {
        for task in self.tasks_ascending() {
            task.run()?;
        }
        Ok(())
    }

    /// Stops tasks in descending priority order, the reverse of `start`.
    pub fn stop(&self) -> Result<()> {
        for task in self.tasks_ascending().iter().rev() {
            task.terminate()?;
        }
        Ok(())
    }

    pub fn status(&self) -> Result<Vec<(String, TaskStatus)>> {
        Ok(vec![
            (self.serial.name().to_string(), self.serial.status()?),
            (self.bmc.name().to_string(), self.bmc.status()?),
            (self.compute.name().to_string(), self.compute.status()?),
        ])
    }
}

/// Renders a control script with owner-only execute permissions (mode
/// `0700`, spec.md §4.9), matching the original's scripts, which are never
/// meant to be invoked by anyone but the orchestrator and `ipmi_sim` itself.
fn write_executable(path: &Path, contents: &str) -> Result<()> {
    fs::write(path, contents)?;
    let mut perms = fs::metadata(path)?.permissions();
    perms.set_mode(0o700);
    fs::set_permissions(path, perms)?;
    Ok(())
}

/// Picks the first network interface whose name contains `'e'` (matching
/// the original's `filter(lambda x: 'e' in x, netifaces.interfaces())[0]`),
/// used as the BMC's `lan_interface` when a descriptor doesn't name one.
fn default_lan_interface() -> Result<String> {
    let mut names = Vec::new();
    for addr in nix::ifaddrs::getifaddrs().map_err(|e| Error::ArgsIncorrect(format!("[model:bmc] failed to enumerate network interfaces: {e}")))? {
        if !names.contains(&addr.interface_name) {
            names.push(addr.interface_name);
        }
    }
    names
        .into_iter()
        .find(|name| name.contains('e'))
        .ok_or_else(|| Error::ArgsIncorrect("[model:bmc] no network interface whose name contains 'e' was found".to_string()))
}

/// Per-node log directory the control scripts redirect output into.
fn log_dir(node_name: &str) -> PathBuf {
    Path::new("/var/log/infrasim").join(node_name)
}

/// Symlinks `target` to `link`, falling back to a plain copy when the
/// source lives on a filesystem that doesn't support symlinks.
fn symlink_or_copy(target: &Path, link: &Path) -> Result<()> {
    if link.exists() || link.symlink_metadata().is_ok() {
        fs::remove_file(link)?;
    }
    match std::os::unix::fs::symlink(target, link) {
        Ok(()) => Ok(()),
        Err(_) => {
            fs::copy(target, link)?;
            Ok(())
        }
    }
}
