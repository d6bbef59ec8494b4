use std::path::PathBuf;

/// External binaries and default asset locations the orchestrator needs
/// but does not ship itself (the VMM, the BMC simulator, the SOL relay).
/// Resolved once at startup, typically from a type-keyed asset directory
/// such as `/usr/local/etc/infrasim/<node_type>/`.
#[derive(Debug, Clone)]
pub struct AssetPaths {
    pub vmm_binary: String,
    pub bmc_sim_binary: String,
    pub serial_relay_binary: String,
    pub default_emu_file: PathBuf,
    pub default_lancontrol_script: PathBuf,
    /// Packaged SMBIOS blob for a node's vendor type, e.g.
    /// `/usr/local/etc/infrasim/<type>/<type>_smbios.bin` (spec.md §4.6's
    /// last-resort tier of the SMBIOS resolution order).
    pub default_smbios_file: PathBuf,
}

impl AssetPaths {
    pub fn new(
        vmm_binary: impl Into<String>,
        bmc_sim_binary: impl Into<String>,
        serial_relay_binary: impl Into<String>,
        default_emu_file: PathBuf,
        default_lancontrol_script: PathBuf,
        default_smbios_file: PathBuf,
    ) -> Self {
        Self {
            vmm_binary: vmm_binary.into(),
            bmc_sim_binary: bmc_sim_binary.into(),
            serial_relay_binary: serial_relay_binary.into(),
            default_emu_file,
            default_lancontrol_script,
            default_smbios_file,
        }
    }

    /// A BMC descriptor's `emu_file` wins when set; otherwise we fall back
    /// to the type's default emulation data, matching the original's
    /// `self.get_config('emu_file') or default`.
    pub fn resolve_emu_file(&self, descriptor_value: Option<&str>) -> PathBuf {
        descriptor_value.map(PathBuf::from).unwrap_or_else(|| self.default_emu_file.clone())
    }

    /// Same fallback rule as `resolve_emu_file`, for the `lancontrol` script.
    pub fn resolve_lancontrol_script(&self, descriptor_value: Option<&str>) -> PathBuf {
        descriptor_value
            .map(PathBuf::from)
            .unwrap_or_else(|| self.default_lancontrol_script.clone())
    }
}
