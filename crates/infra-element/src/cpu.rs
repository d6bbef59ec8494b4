use infra_errors::{Error, Result};
use infra_model::CpuDescriptor;
use infra_optbuilder::OptionBuilder;

/// `-cpu`/`-smp` fragment source. Defaults mirror the original: `type=host`,
/// `features=+vmx`, `quantities=2`, `sockets=2`.
#[derive(Debug, Clone)]
pub struct CpuElement {
    cpu_type: String,
    features: Option<String>,
    quantities: u32,
    sockets: u32,
}

impl CpuElement {
    pub fn init(descriptor: &CpuDescriptor) -> Self {
        Self {
            cpu_type: descriptor.r#type.clone().unwrap_or_else(|| "host".to_string()),
            features: Some(descriptor.features.clone().unwrap_or_else(|| "+vmx".to_string())),
            quantities: descriptor.quantities.unwrap_or(2),
            sockets: descriptor.sockets.unwrap_or(2),
        }
    }

    /// Needed by the compute task to size the NUMA CPU pinning request.
    pub fn quantities(&self) -> u32 {
        self.quantities
    }

    pub fn precheck(&self) -> Result<()> {
        if self.quantities == 0 {
            return Err(Error::ArgsIncorrect(format!(
                "[model:cpu] quantities invalid: {}, should be positive",
                self.quantities
            )));
        }

        if self.quantities % self.sockets != 0 {
            return Err(Error::ArgsIncorrect(format!(
                "[model:cpu] quantities: {} is not divided by socket: {}",
                self.quantities, self.sockets
            )));
        }

        Ok(())
    }

    pub fn render(&self, out: &mut OptionBuilder) {
        let cpu_option = match &self.features {
            Some(features) if !features.is_empty() => {
                format!("-cpu {},{}", self.cpu_type, features)
            }
            _ => format!("-cpu {}", self.cpu_type),
        };
        out.add(cpu_option);

        let cores = self.quantities / self.sockets;
        out.add(format!(
            "-smp {},sockets={},cores={},threads=1",
            self.quantities, self.sockets, cores
        ));
    }
}
