use infra_model::IpmiDescriptor;
use infra_optbuilder::OptionBuilder;

/// KCS-style IPMI device wiring, emitted as three fragments matching the
/// original's `chardev` / `ipmi-bmc-extern` / `isa-ipmi-kcs` triple: a
/// host-side socket chardev, the BMC-simulator-facing device, and the
/// management controller's own bus address. The in-band channel is always
/// KCS; IPMI semantics themselves are delegated to the external simulator.
#[derive(Debug, Clone)]
pub struct IpmiElement {
    host: String,
    bmc_connection_port: u16,
}

impl IpmiElement {
    pub fn init(descriptor: Option<&IpmiDescriptor>, bmc_connection_port: u16) -> Self {
        let descriptor = descriptor.cloned().unwrap_or_default();
        Self {
            host: descriptor.host.unwrap_or_else(|| "127.0.0.1".to_string()),
            bmc_connection_port,
        }
    }

    pub fn precheck(&self) -> infra_errors::Result<()> {
        Ok(())
    }

    pub fn render(&self, out: &mut OptionBuilder) {
        out.add(format!(
            "-chardev socket,id=ipmi0,host={},port={},reconnect=10",
            self.host, self.bmc_connection_port
        ));
        out.add("-device ipmi-bmc-extern,chardev=ipmi0,id=bmc0".to_string());
        out.add("-device isa-ipmi-kcs,bmc=bmc0".to_string());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn render(ipmi: &IpmiElement) -> String {
        let mut b = OptionBuilder::new();
        ipmi.render(&mut b);
        b.render().unwrap()
    }

    #[test]
    fn renders_kcs_wiring() {
        let ipmi = IpmiElement::init(None, 9002);
        let rendered = render(&ipmi);
        assert!(rendered.contains("port=9002"));
        assert!(rendered.contains("-device ipmi-bmc-extern,chardev=ipmi0,id=bmc0"));
        assert!(rendered.contains("-device isa-ipmi-kcs,bmc=bmc0"));
    }

    #[test]
    fn interface_override_does_not_change_kcs_wiring() {
        let descriptor = IpmiDescriptor {
            interface: Some("bt".to_string()),
            host: None,
        };
        let ipmi = IpmiElement::init(Some(&descriptor), 9002);
        let rendered = render(&ipmi);
        assert!(rendered.contains("isa-ipmi-kcs"));
        assert!(!rendered.contains("isa-ipmi-bt"));
    }
}
