use infra_errors::Result;
use infra_model::MemoryDescriptor;
use infra_optbuilder::OptionBuilder;

/// `-m` fragment source. `size` is in MiB and required.
#[derive(Debug, Clone)]
pub struct MemoryElement {
    size_mib: u32,
}

impl MemoryElement {
    pub fn init(descriptor: &MemoryDescriptor) -> Self {
        Self {
            size_mib: descriptor.size,
        }
    }

    pub fn precheck(&self) -> Result<()> {
        Ok(())
    }

    pub fn render(&self, out: &mut OptionBuilder) {
        out.add(format!("-m {}", self.size_mib));
    }
}
