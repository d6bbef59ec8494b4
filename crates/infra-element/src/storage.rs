use std::path::Path;

use infra_errors::{Error, Result};
use infra_model::ControllerDescriptor;
use infra_optbuilder::OptionBuilder;

use crate::drive::DriveElement;

/// One physical controller instance (`ahci`, `megasas`, `megasas-gen2`,
/// `lsi`, ...) and the slice of a descriptor's drives wired to it.
#[derive(Debug, Clone)]
struct ControllerInstance {
    controller_index: u32,
    drives: Vec<DriveElement>,
}

/// A controller descriptor's drives, split across as many physical
/// controller instances as `max_drive_per_controller` demands — matching
/// the original's `int(ceil(len(drives) / max_drive_per_controller))`
/// controller count. Each instance gets its own globally-unique bus
/// index so addresses stay stable across descriptors in the same node.
#[derive(Debug, Clone)]
pub struct StorageControllerElement {
    controller_type: String,
    use_jbod: bool,
    instances: Vec<ControllerInstance>,
}

impl StorageControllerElement {
    pub fn init(
        descriptor: &ControllerDescriptor,
        next_index: &mut u32,
        home_dir: &Path,
    ) -> Result<Self> {
        let inner = &descriptor.controller;
        if inner.max_drive_per_controller == 0 {
            return Err(Error::ArgsIncorrect(
                "[model:storage] max_drive_per_controller must be positive".to_string(),
            ));
        }

        let max = inner.max_drive_per_controller;
        let controller_count = inner.drives.len().div_ceil(max as usize).max(1);
        let mut instances = Vec::with_capacity(controller_count);

        for chunk_index in 0..controller_count {
            let controller_index = *next_index;
            *next_index += 1;

            let start = chunk_index * max as usize;
            let end = (start + max as usize).min(inner.drives.len());
            let mut drives = Vec::with_capacity(end - start);
            for (slot, drive_descriptor) in inner.drives[start..end].iter().enumerate() {
                let bus_address = bus_address(&inner.controller_type, controller_index, slot as u32);
                drives.push(DriveElement::init(
                    drive_descriptor,
                    (start + slot) as u32,
                    bus_address,
                    &inner.controller_type,
                    home_dir,
                )?);
            }
            instances.push(ControllerInstance { controller_index, drives });
        }

        Ok(Self {
            controller_type: inner.controller_type.clone(),
            use_jbod: inner.use_jbod.unwrap_or(false),
            instances,
        })
    }

    pub fn precheck(&self) -> Result<()> {
        for instance in &self.instances {
            for drive in &instance.drives {
                drive.precheck()?;
            }
        }
        Ok(())
    }

    pub fn render(&self, out: &mut OptionBuilder) {
        for instance in &self.instances {
            out.add(controller_fragment(
                &self.controller_type,
                instance.controller_index,
                self.use_jbod,
            ));
            for drive in &instance.drives {
                drive.render(out);
            }
        }
    }
}

fn bus_name(controller_type: &str, controller_index: u32) -> String {
    if controller_type.starts_with("megasas") || controller_type.starts_with("lsi") {
        format!("scsi{controller_index}")
    } else {
        format!("sata{controller_index}")
    }
}

fn bus_address(controller_type: &str, controller_index: u32, slot: u32) -> String {
    // Only ahci addresses each drive by its own unit; megasas/lsi drives all
    // sit on unit 0 of their controller's single scsi bus.
    let unit = if controller_type.starts_with("megasas") || controller_type.starts_with("lsi") {
        0
    } else {
        slot
    };
    format!("{}.{}", bus_name(controller_type, controller_index), unit)
}

fn controller_fragment(controller_type: &str, controller_index: u32, use_jbod: bool) -> String {
    let id = bus_name(controller_type, controller_index);
    if controller_type.starts_with("megasas") || controller_type.starts_with("lsi") {
        let mut fragment = format!("-device {controller_type},id={id}");
        if use_jbod {
            fragment.push_str(",use_jbod=on");
        }
        fragment
    } else {
        format!("-device ahci,id={id}")
    }
}

/// Ordered collection of storage controllers, rendered in declaration order
/// to keep bus addresses stable across re-renders of the same node.
#[derive(Debug, Clone, Default)]
pub struct BackendStorageElement {
    controllers: Vec<StorageControllerElement>,
}

impl BackendStorageElement {
    pub fn init(descriptors: &[ControllerDescriptor], home_dir: &Path) -> Result<Self> {
        let mut controllers = Vec::with_capacity(descriptors.len());
        let mut next_index = 0u32;
        for descriptor in descriptors {
            controllers.push(StorageControllerElement::init(descriptor, &mut next_index, home_dir)?);
        }
        Ok(Self { controllers })
    }

    pub fn precheck(&self) -> Result<()> {
        for controller in &self.controllers {
            controller.precheck()?;
        }
        Ok(())
    }

    pub fn render(&self, out: &mut OptionBuilder) {
        for controller in &self.controllers {
            controller.render(out);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use infra_model::{ControllerInner, DriveDescriptor};

    fn descriptor(controller_type: &str, max: u32, drive_count: usize) -> ControllerDescriptor {
        ControllerDescriptor {
            controller: ControllerInner {
                controller_type: controller_type.to_string(),
                max_drive_per_controller: max,
                use_jbod: None,
                drives: (0..drive_count)
                    .map(|_| DriveDescriptor {
                        file: Some("/dev/null".to_string()),
                        ..Default::default()
                    })
                    .collect(),
            },
        }
    }

    #[test]
    fn ahci_two_drive_scenario() {
        let descriptor = descriptor("ahci", 6, 2);
        let mut next_index = 0;
        let controller = StorageControllerElement::init(&descriptor, &mut next_index, Path::new("/tmp")).unwrap();
        let mut b = OptionBuilder::new();
        controller.render(&mut b);
        let rendered = b.render().unwrap();
        assert!(rendered.contains("-device ahci,id=sata0"));
        assert!(rendered.contains("bus=sata0.0"));
        assert!(rendered.contains("bus=sata0.1"));
        assert_eq!(next_index, 1);
    }

    #[test]
    fn megasas_drive_uses_scsi_bus_naming() {
        let descriptor = descriptor("megasas", 8, 1);
        let mut next_index = 0;
        let controller = StorageControllerElement::init(&descriptor, &mut next_index, Path::new("/tmp")).unwrap();
        let mut b = OptionBuilder::new();
        controller.render(&mut b);
        let rendered = b.render().unwrap();
        assert!(rendered.contains("-device megasas,id=scsi0"));
        assert!(rendered.contains("bus=scsi0.0"));
    }

    #[test]
    fn megasas_multi_drive_scenario_keeps_all_drives_on_unit_zero() {
        let descriptor = descriptor("megasas", 8, 3);
        let mut next_index = 0;
        let controller = StorageControllerElement::init(&descriptor, &mut next_index, Path::new("/tmp")).unwrap();
        let mut b = OptionBuilder::new();
        controller.render(&mut b);
        let rendered = b.render().unwrap();
        assert!(rendered.contains("bus=scsi0.0"));
        assert!(!rendered.contains("bus=scsi0.1"));
        assert!(!rendered.contains("bus=scsi0.2"));
    }

    #[test]
    fn use_jbod_emits_bare_flag() {
        let mut descriptor = descriptor("megasas", 8, 1);
        descriptor.controller.use_jbod = Some(true);
        let mut next_index = 0;
        let controller = StorageControllerElement::init(&descriptor, &mut next_index, Path::new("/tmp")).unwrap();
        let mut b = OptionBuilder::new();
        controller.render(&mut b);
        let rendered = b.render().unwrap();
        assert!(rendered.contains("-device megasas,id=scsi0,use_jbod=on"));
        assert!(!rendered.contains("sas_address"));
    }

    #[test]
    fn rejects_zero_max_drive_per_controller() {
        let descriptor = descriptor("ahci", 0, 1);
        let mut next_index = 0;
        assert!(matches!(
            StorageControllerElement::init(&descriptor, &mut next_index, Path::new("/tmp")),
            Err(Error::ArgsIncorrect(_))
        ));
    }

    #[test]
    fn drive_count_exceeding_max_splits_into_multiple_controllers() {
        let descriptor = descriptor("ahci", 2, 3);
        let mut next_index = 0;
        let controller = StorageControllerElement::init(&descriptor, &mut next_index, Path::new("/tmp")).unwrap();
        let mut b = OptionBuilder::new();
        controller.render(&mut b);
        let rendered = b.render().unwrap();
        assert!(rendered.contains("-device ahci,id=sata0"));
        assert!(rendered.contains("-device ahci,id=sata1"));
        assert!(rendered.contains("bus=sata0.0"));
        assert!(rendered.contains("bus=sata0.1"));
        assert!(rendered.contains("bus=sata1.0"));
        assert_eq!(next_index, 2);
    }

    #[test]
    fn backend_storage_renders_multiple_controllers_in_order() {
        let descriptors = vec![descriptor("ahci", 6, 1), descriptor("megasas", 8, 1)];
        let backend = BackendStorageElement::init(&descriptors, Path::new("/tmp")).unwrap();
        let mut b = OptionBuilder::new();
        backend.render(&mut b);
        let rendered = b.render().unwrap();
        let sata_pos = rendered.find("sata0").unwrap();
        let scsi_pos = rendered.find("scsi1").unwrap();
        assert!(sata_pos < scsi_pos);
    }

    #[test]
    fn backend_storage_keeps_indices_unique_across_descriptors() {
        let descriptors = vec![descriptor("ahci", 2, 3), descriptor("ahci", 6, 1)];
        let backend = BackendStorageElement::init(&descriptors, Path::new("/tmp")).unwrap();
        let mut b = OptionBuilder::new();
        backend.render(&mut b);
        let rendered = b.render().unwrap();
        assert!(rendered.contains("-device ahci,id=sata0"));
        assert!(rendered.contains("-device ahci,id=sata1"));
        assert!(rendered.contains("-device ahci,id=sata2"));
    }
}
