//! Declarative descriptors for a simulated server node.
//!
//! These mirror the dict-shaped config the original Python model reads
//! ad hoc (`if 'x' in self.__compute: ...`); here the same fallback
//! behavior is expressed as `#[serde(default)]` plus `Default` impls, and
//! deserialization comes from `serde_yaml` rather than `yaml.load`.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

fn default_node_name() -> String {
    "node-0".to_string()
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NodeDescriptor {
    #[serde(default = "default_node_name")]
    pub name: String,

    /// Vendor tag selecting firmware/emulation assets. Required.
    #[serde(rename = "type")]
    pub node_type: String,

    pub compute: ComputeDescriptor,

    #[serde(default)]
    pub bmc: Option<BmcDescriptor>,

    #[serde(default)]
    pub sol_device: Option<String>,

    #[serde(default)]
    pub serial_port: Option<u16>,

    #[serde(default)]
    pub ipmi_console_port: Option<u16>,

    #[serde(default)]
    pub bmc_connection_port: Option<u16>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ComputeDescriptor {
    #[serde(default)]
    pub kvm_enabled: Option<bool>,

    #[serde(default)]
    pub smbios: Option<PathBuf>,

    #[serde(default)]
    pub bios: Option<PathBuf>,

    #[serde(default)]
    pub boot_order: Option<String>,

    #[serde(default)]
    pub cdrom: Option<PathBuf>,

    #[serde(default)]
    pub numa_control: bool,

    pub cpu: CpuDescriptor,
    pub memory: MemoryDescriptor,

    #[serde(default)]
    pub storage_backend: Vec<ControllerDescriptor>,

    #[serde(default)]
    pub networks: Vec<NetworkDescriptor>,

    #[serde(default)]
    pub ipmi: Option<IpmiDescriptor>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct IpmiDescriptor {
    #[serde(default)]
    pub interface: Option<String>,
    #[serde(default)]
    pub host: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CpuDescriptor {
    #[serde(default)]
    pub r#type: Option<String>,
    #[serde(default)]
    pub quantities: Option<u32>,
    #[serde(default)]
    pub features: Option<String>,
    /// Not named in the distilled spec's compute.cpu table, but required by
    /// the `quantities mod sockets == 0` invariant; defaults to 2.
    #[serde(default)]
    pub sockets: Option<u32>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MemoryDescriptor {
    /// Size in MiB. Required — there is no sensible default.
    pub size: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ControllerDescriptor {
    pub controller: ControllerInner,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ControllerInner {
    #[serde(rename = "type")]
    pub controller_type: String,
    pub max_drive_per_controller: u32,
    #[serde(default)]
    pub use_jbod: Option<bool>,
    #[serde(default)]
    pub drives: Vec<DriveDescriptor>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DriveDescriptor {
    #[serde(default)]
    pub file: Option<String>,
    #[serde(default)]
    pub format: Option<String>,
    #[serde(default)]
    pub size: Option<u32>,
    #[serde(default)]
    pub cache: Option<String>,
    #[serde(default)]
    pub aio: Option<String>,
    #[serde(default)]
    pub bootindex: Option<u32>,
    #[serde(default)]
    pub serial: Option<String>,
    #[serde(default)]
    pub vendor: Option<String>,
    #[serde(default)]
    pub model: Option<String>,
    #[serde(default)]
    pub product: Option<String>,
    #[serde(default)]
    pub version: Option<String>,
    #[serde(default)]
    pub rotation: Option<u32>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct NetworkDescriptor {
    #[serde(default)]
    pub network_mode: Option<String>,
    #[serde(default)]
    pub network_name: Option<String>,
    #[serde(default)]
    pub device: Option<String>,
    #[serde(default)]
    pub mac: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BmcDescriptor {
    #[serde(default)]
    pub address: Option<u32>,
    #[serde(default)]
    pub channel: Option<u32>,
    #[serde(default)]
    pub interface: Option<String>,
    #[serde(default)]
    pub lancontrol: Option<String>,
    #[serde(default)]
    pub chassiscontrol: Option<String>,
    #[serde(default)]
    pub startcmd: Option<String>,
    #[serde(default)]
    pub startnow: Option<bool>,
    #[serde(default)]
    pub poweroff_wait: Option<i64>,
    #[serde(default)]
    pub kill_wait: Option<i64>,
    #[serde(default)]
    pub username: Option<String>,
    #[serde(default)]
    pub password: Option<String>,
    #[serde(default)]
    pub ipmi_over_lan_port: Option<u16>,
    #[serde(default)]
    pub historyfru: Option<i64>,
    #[serde(default)]
    pub emu_file: Option<String>,
    #[serde(default)]
    pub config_file: Option<String>,
    #[serde(default)]
    pub sol_device: Option<String>,
}

impl NodeDescriptor {
    pub fn from_yaml(text: &str) -> serde_yaml::Result<Self> {
        serde_yaml::from_str(text)
    }

    pub fn to_yaml(&self) -> serde_yaml::Result<String> {
        serde_yaml::to_string(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_minimal_node_document() {
        let yaml = r#"
type: dell_c6320
compute:
  cpu:
    quantities: 8
  memory:
    size: 1536
"#;
        let node = NodeDescriptor::from_yaml(yaml).unwrap();
        assert_eq!(node.name, "node-0");
        assert_eq!(node.node_type, "dell_c6320");
        assert_eq!(node.compute.cpu.quantities, Some(8));
        assert_eq!(node.compute.memory.size, 1536);
        assert!(node.bmc.is_none());
    }

    #[test]
    fn parses_storage_backend_controller() {
        let yaml = r#"
type: dell_c6320
compute:
  cpu:
    quantities: 2
  memory:
    size: 1024
  storage_backend:
    - controller:
        type: ahci
        max_drive_per_controller: 6
        drives:
          - size: 8
          - size: 8
"#;
        let node = NodeDescriptor::from_yaml(yaml).unwrap();
        assert_eq!(node.compute.storage_backend.len(), 1);
        let ctrl = &node.compute.storage_backend[0].controller;
        assert_eq!(ctrl.controller_type, "ahci");
        assert_eq!(ctrl.drives.len(), 2);
    }

    #[test]
    fn round_trips_through_yaml() {
        let yaml = r#"
name: test
type: dell_c6320
compute:
  cpu:
    quantities: 4
  memory:
    size: 2048
"#;
        let node = NodeDescriptor::from_yaml(yaml).unwrap();
        let dumped = node.to_yaml().unwrap();
        let reparsed = NodeDescriptor::from_yaml(&dumped).unwrap();
        assert_eq!(reparsed.name, "test");
        assert_eq!(reparsed.compute.cpu.quantities, Some(4));
    }
}
