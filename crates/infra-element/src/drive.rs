use std::path::{Path, PathBuf};

use infra_errors::Result;
use infra_model::DriveDescriptor;
use infra_optbuilder::OptionBuilder;

/// A single `-drive .. -device ..` pair. Indexing, bus address and
/// controller type are assigned by the owning `StorageController`
/// during its own `init`, matching the original's `CDrive.set_index` /
/// `set_bus` / `set_controller_type` calls made before `CDrive.init()`.
#[derive(Debug, Clone)]
pub struct DriveElement {
    index: u32,
    bus_address: String,
    controller_type: String,
    file: String,
    format: String,
    cache: Option<String>,
    aio: Option<String>,
    vendor: Option<String>,
    model: Option<String>,
    product: Option<String>,
    serial: Option<String>,
    version: Option<String>,
    bootindex: Option<u32>,
    rotation: Option<u32>,
}

/// Letter suffix for the default image file name: drive N gets `sd<letter>`
/// where `letter = 'a' + N`. Wraps modulo 26 past `z`, which the original
/// never needed to handle (no node has that many drives) but this keeps
/// the computation total rather than panicking.
fn drive_letter(index: u32) -> char {
    (b'a' + (index % 26) as u8) as char
}

impl DriveElement {
    /// `home_dir` is the directory under which auto-created images live
    /// (`<HOME>/.infrasim`), matching the original's `os.environ['HOME'] +
    /// '/.infrasim/'`.
    pub fn init(
        descriptor: &DriveDescriptor,
        index: u32,
        bus_address: String,
        controller_type: &str,
        home_dir: &Path,
    ) -> Result<Self> {
        let mut format = descriptor.format.clone().unwrap_or_else(|| "qcow2".to_string());

        let (vendor, model) = match controller_type {
            "ahci" => (None, descriptor.model.clone()),
            t if t.starts_with("megasas") => (descriptor.vendor.clone(), None),
            _ => (None, None),
        };
        // `model` is documented on both ahci and megasas*; only ahci gets it
        // from this branch, megasas* falls through to the generic field
        // below so an explicit `model` in the descriptor still applies.
        let model = model.or_else(|| {
            if controller_type.starts_with("megasas") || controller_type.starts_with("lsi") {
                descriptor.model.clone()
            } else {
                None
            }
        });

        let file = match &descriptor.file {
            Some(f) => {
                if f.starts_with("/dev/") {
                    format = "raw".to_string();
                }
                f.clone()
            }
            None => {
                let size = descriptor.size.unwrap_or(8);
                let letter = drive_letter(index);
                let disk_file = home_dir.join(format!("sd{letter}.img"));
                if !disk_file.exists() {
                    let cmd = format!(
                        "qemu-img create -f qcow2 {} {}G",
                        disk_file.display(),
                        size
                    );
                    infra_cmd::run(&cmd)?;
                }
                disk_file.to_string_lossy().into_owned()
            }
        };

        Ok(Self {
            index,
            bus_address,
            controller_type: controller_type.to_string(),
            file,
            format,
            cache: Some(descriptor.cache.clone().unwrap_or_else(|| "writeback".to_string())),
            aio: descriptor.aio.clone(),
            vendor,
            model,
            product: descriptor.product.clone(),
            serial: descriptor.serial.clone(),
            version: descriptor.version.clone(),
            bootindex: descriptor.bootindex,
            rotation: descriptor.rotation,
        })
    }

    pub fn precheck(&self) -> Result<()> {
        Ok(())
    }

    pub fn file_path(&self) -> PathBuf {
        PathBuf::from(&self.file)
    }

    pub fn render(&self, out: &mut OptionBuilder) {
        let mut host_option = format!("file={},format={},if=none,id=drive{}", self.file, self.format, self.index);

        if let Some(cache) = &self.cache {
            host_option.push_str(&format!(",cache={cache}"));
        }

        // aio is only meaningful (and only emitted) when cache=none; the
        // original silently drops it otherwise.
        if let (Some(aio), Some(cache)) = (&self.aio, &self.cache) {
            if cache == "none" {
                host_option.push_str(&format!(",aio={aio}"));
            }
        }

        let mut device_option = match self.controller_type.as_str() {
            "ahci" => "ide-hd".to_string(),
            t if t.starts_with("megasas") || t.starts_with("lsi") => "scsi-hd".to_string(),
            _ => "ide-hd".to_string(),
        };

        if let Some(vendor) = &self.vendor {
            device_option.push_str(&format!(",vendor={vendor}"));
        }
        if let Some(model) = &self.model {
            device_option.push_str(&format!(",model={model}"));
        }
        if let Some(product) = &self.product {
            device_option.push_str(&format!(",product={product}"));
        }
        if let Some(serial) = &self.serial {
            device_option.push_str(&format!(",serial={serial}"));
        }
        if let Some(version) = &self.version {
            device_option.push_str(&format!(",ver={version}"));
        }
        if let Some(bootindex) = self.bootindex {
            device_option.push_str(&format!(",bootindex={bootindex}"));
        }
        if let Some(rotation) = self.rotation {
            device_option.push_str(&format!(",rotation={rotation}"));
        }
        device_option.push_str(&format!(",bus={}", self.bus_address));
        device_option.push_str(&format!(",drive=drive{}", self.index));

        out.add(format!("-drive {host_option} -device {device_option}"));
    }
}
