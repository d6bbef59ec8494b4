use std::path::{Path, PathBuf};

use infra_element::{BackendNetworkElement, BackendStorageElement, CpuElement, IpmiElement, MemoryElement};
use infra_errors::{Error, Result};
use infra_model::ComputeDescriptor;
use infra_numa::NumaCtl;
use infra_optbuilder::OptionBuilder;
use uuid::Uuid;

use crate::Task;

/// The VM process itself. It never forks its own child: the BMC's
/// `startcmd` script is what actually execs the VMM binary with the
/// command line this task renders, and this task's `run` only polls for
/// the pid file that script writes. This mirrors the original's
/// `run_mask` behavior, where `CCompute.task_run()` is a no-op beyond
/// waiting up to 5 seconds for `.compute` to appear.
pub struct ComputeTask {
    workspace: PathBuf,
    vmm_binary: String,
    node_name: String,
    kvm_enabled: bool,
    smbios: PathBuf,
    bios: Option<PathBuf>,
    boot_order: Option<String>,
    cdrom: Option<PathBuf>,
    monitor_port: u16,
    serial_port: u16,
    uuid: Uuid,
    numa: Option<Vec<u32>>,
    cpu: CpuElement,
    memory: MemoryElement,
    storage: BackendStorageElement,
    network: BackendNetworkElement,
    ipmi: Option<IpmiElement>,
}

impl ComputeTask {
    /// `smbios` is the already-resolved path the `-smbios file=...` fragment
    /// should reference. Resolution order (spec.md §4.6) — explicit
    /// `compute.smbios`, else `<workspace>/data/<type>_smbios.bin`, else the
    /// vendor-scoped packaged default — is the orchestrator's job
    /// (`infra-node`'s `Node::from_descriptor`), not this task's: unlike
    /// `bios`/`cdrom`, SMBIOS is never simply absent from the command line.
    #[allow(clippy::too_many_arguments)]
    pub fn init(
        descriptor: &ComputeDescriptor,
        node_name: &str,
        workspace: &Path,
        vmm_binary: &str,
        smbios: PathBuf,
        monitor_port: u16,
        serial_port: u16,
        bmc_connection_port: Option<u16>,
        numactl: &mut NumaCtl,
    ) -> Result<Self> {
        let cpu = CpuElement::init(&descriptor.cpu);
        let memory = MemoryElement::init(&descriptor.memory);
        let storage = BackendStorageElement::init(&descriptor.storage_backend, workspace)?;
        let network = BackendNetworkElement::init(&descriptor.networks);
        let ipmi = bmc_connection_port.map(|port| IpmiElement::init(descriptor.ipmi.as_ref(), port));

        let numa = if descriptor.numa_control {
            Some(numactl.take(cpu.quantities() as usize))
        } else {
            None
        };

        let kvm_requested = descriptor.kvm_enabled.unwrap_or(true);
        let kvm_enabled = kvm_requested && Path::new("/dev/kvm").exists();
        if kvm_requested && !kvm_enabled {
            tracing::warn!(node = %node_name, "/dev/kvm not present, disabling kvm acceleration");
        }

        Ok(Self {
            workspace: workspace.to_path_buf(),
            vmm_binary: vmm_binary.to_string(),
            node_name: node_name.to_string(),
            kvm_enabled,
            smbios,
            bios: descriptor.bios.clone(),
            boot_order: descriptor.boot_order.clone(),
            cdrom: descriptor.cdrom.clone(),
            monitor_port,
            serial_port,
            uuid: Uuid::new_v4(),
            numa,
            cpu,
            memory,
            storage,
            network,
            ipmi,
        })
    }

    /// Full command line for the VMM process, rendered for the BMC's
    /// `startcmd` script rather than executed directly by this task.
    pub fn render_command_line(&self) -> Result<String> {
        let mut out = OptionBuilder::new();

        out.add(format!("-name {}", self.node_name));
        out.add(format!("-uuid {}", self.uuid));
        out.add("-machine q35,usb=off,vmport=off".to_string());
        out.add(format!(
            "-chardev socket,id=mon,host=127.0.0.1,port={},server,nowait",
            self.monitor_port
        ));
        out.add("-mon chardev=mon,id=monitor".to_string());
        out.add(format!(
            "-serial mon:udp:127.0.0.1:{},nowait",
            self.serial_port
        ));
        out.add("-vnc :1".to_string());
        out.add("-device sga".to_string());

        if self.kvm_enabled {
            out.add("--enable-kvm".to_string());
        }
        out.add(format!("-smbios file={}", self.smbios.display()));
        if let Some(bios) = &self.bios {
            out.add(format!("-bios {}", bios.display()));
        }
        if let Some(boot_order) = &self.boot_order {
            out.add(format!("-boot {boot_order}"));
        }
        if let Some(cdrom) = &self.cdrom {
            out.add(format!("-cdrom {}", cdrom.display()));
        }

        self.cpu.render(&mut out);
        self.memory.render(&mut out);
        self.storage.render(&mut out);
        self.network.render(&mut out);
        if let Some(ipmi) = &self.ipmi {
            ipmi.render(&mut out);
        }

        let rendered = out.render()?;
        let full = format!("{} {rendered}", self.vmm_binary);

        Ok(match &self.numa {
            Some(cpus) if !cpus.is_empty() => {
                let list = cpus.iter().map(|c| c.to_string()).collect::<Vec<_>>().join(",");
                format!("numactl --physcpubind={list} --localalloc {full}")
            }
            _ => full,
        })
    }
}

impl Task for ComputeTask {
    fn name(&self) -> &str {
        "compute"
    }

    fn priority(&self) -> u8 {
        2
    }

    fn workspace(&self) -> &Path {
        &self.workspace
    }

    fn precheck(&self) -> Result<()> {
        self.cpu.precheck()?;
        self.memory.precheck()?;
        self.storage.precheck()?;
        self.network.precheck()?;
        if let Some(ipmi) = &self.ipmi {
            ipmi.precheck()?;
        }
        if self.vmm_binary.is_empty() {
            return Err(Error::ArgsIncorrect(
                "[task:compute] vmm binary path is empty".to_string(),
            ));
        }
        Ok(())
    }

    fn command(&self) -> Result<Option<String>> {
        Ok(None)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use infra_model::{CpuDescriptor, MemoryDescriptor};

    fn descriptor() -> ComputeDescriptor {
        ComputeDescriptor {
            kvm_enabled: None,
            smbios: None,
            bios: None,
            boot_order: None,
            cdrom: None,
            numa_control: false,
            cpu: CpuDescriptor {
                r#type: None,
                quantities: Some(4),
                features: None,
                sockets: None,
            },
            memory: MemoryDescriptor { size: 2048 },
            storage_backend: vec![],
            networks: vec![],
            ipmi: None,
        }
    }

    #[test]
    fn renders_base_fragments_in_order() {
        let dir = tempfile::tempdir().unwrap();
        let mut numa = NumaCtl::default();
        let task = ComputeTask::init(
            &descriptor(),
            "node-0",
            dir.path(),
            "qemu-system-x86_64",
            dir.path().join("data").join("dell_c6320_smbios.bin"),
            2345,
            9103,
            None,
            &mut numa,
        )
        .unwrap();

        let rendered = task.render_command_line().unwrap();
        assert!(rendered.starts_with("qemu-system-x86_64 -name node-0"));
        assert!(rendered.contains("-machine q35,usb=off,vmport=off"));
        assert!(rendered.contains("-chardev socket,id=mon,host=127.0.0.1,port=2345,server,nowait"));
        assert!(rendered.contains("-mon chardev=mon,id=monitor"));
        assert!(rendered.contains("-serial mon:udp:127.0.0.1:9103,nowait"));
        assert!(rendered.contains("-vnc :1"));
        assert!(rendered.contains("-device sga"));
        assert!(rendered.contains("-m 2048"));
        assert!(rendered.contains("-smbios file="));
        assert!(rendered.contains("dell_c6320_smbios.bin"));
    }

    #[test]
    fn kvm_flag_follows_dev_kvm_presence() {
        let dir = tempfile::tempdir().unwrap();
        let mut numa = NumaCtl::default();
        let task = ComputeTask::init(
            &descriptor(),
            "node-0",
            dir.path(),
            "qemu-system-x86_64",
            dir.path().join("data").join("dell_c6320_smbios.bin"),
            2345,
            9103,
            None,
            &mut numa,
        )
        .unwrap();
        let rendered = task.render_command_line().unwrap();
        assert_eq!(rendered.contains("--enable-kvm"), Path::new("/dev/kvm").exists());
    }

    #[test]
    fn kvm_requested_but_absent_is_downgraded_to_off() {
        let dir = tempfile::tempdir().unwrap();
        let mut numa = NumaCtl::default();
        let mut d = descriptor();
        d.kvm_enabled = Some(true);
        let task = ComputeTask::init(
            &d,
            "node-0",
            dir.path(),
            "qemu-system-x86_64",
            dir.path().join("data").join("dell_c6320_smbios.bin"),
            2345,
            9103,
            None,
            &mut numa,
        )
        .unwrap();
        let rendered = task.render_command_line().unwrap();
        if !Path::new("/dev/kvm").exists() {
            assert!(!rendered.contains("--enable-kvm"));
        }
    }

    #[test]
    fn sol_device_and_ports_scenario_renders_serial_fragment() {
        let dir = tempfile::tempdir().unwrap();
        let mut numa = NumaCtl::default();
        let task = ComputeTask::init(
            &descriptor(),
            "node-0",
            dir.path(),
            "qemu-system-x86_64",
            dir.path().join("data").join("dell_c6320_smbios.bin"),
            2345,
            9103,
            None,
            &mut numa,
        )
        .unwrap();
        let rendered = task.render_command_line().unwrap();
        assert!(rendered.contains("-serial mon:udp:127.0.0.1:9103,nowait"));
    }

    #[test]
    fn never_spawns_its_own_child() {
        let dir = tempfile::tempdir().unwrap();
        let mut numa = NumaCtl::default();
        let task = ComputeTask::init(
            &descriptor(),
            "node-0",
            dir.path(),
            "qemu-system-x86_64",
            dir.path().join("data").join("dell_c6320_smbios.bin"),
            2345,
            9103,
            None,
            &mut numa,
        )
        .unwrap();
        assert!(task.command().unwrap().is_none());
    }
}
