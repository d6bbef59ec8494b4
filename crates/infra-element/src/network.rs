use infra_errors::{Error, Result};
use infra_model::NetworkDescriptor;
use infra_optbuilder::OptionBuilder;
use uuid::Uuid;

const DEFAULT_BRIDGE_NAME: &str = "br0";

/// OUI reserved by QEMU for auto-generated MAC addresses, extended here
/// with a third octet borrowed from the original's `52:54:BE` prefix so
/// addresses can't collide with a real vendor allocation.
const MAC_OUI: &str = "52:54:BE";

fn generate_mac() -> String {
    let id = Uuid::new_v4();
    let bytes = id.as_bytes();
    format!(
        "{MAC_OUI}:{:02x}:{:02x}:{:02x}",
        bytes[0], bytes[1], bytes[2]
    )
}

/// One `-netdev`/`-device` pair. `network_mode` is `nat` or `bridge`;
/// `network_name` names the bridge/tap when mode is `bridge`.
#[derive(Debug, Clone)]
pub struct NetworkElement {
    index: u32,
    mode: String,
    network_name: Option<String>,
    device: String,
    mac: String,
}

impl NetworkElement {
    pub fn init(descriptor: &NetworkDescriptor, index: u32) -> Self {
        Self {
            index,
            mode: descriptor.network_mode.clone().unwrap_or_else(|| "nat".to_string()),
            network_name: descriptor.network_name.clone(),
            device: descriptor.device.clone().unwrap_or_else(|| "virtio-net-pci".to_string()),
            mac: descriptor.mac.clone().unwrap_or_else(generate_mac),
        }
    }

    pub fn precheck(&self) -> Result<()> {
        match self.mode.as_str() {
            "nat" | "bridge" => Ok(()),
            other => Err(Error::Unsupported(format!(
                "[model:network] unsupported network_mode {other:?} on network {}",
                self.index
            ))),
        }
    }

    pub fn render(&self, out: &mut OptionBuilder) {
        if self.mode != "bridge" {
            out.add("-net user -net nic".to_string());
            return;
        }

        let netdev_id = format!("netdev{}", self.index);
        let bridge = self.network_name.as_deref().unwrap_or(DEFAULT_BRIDGE_NAME);
        out.add(format!(
            "-netdev bridge,id={netdev_id},br={bridge},helper=/usr/libexec/qemu-bridge-helper"
        ));
        out.add(format!(
            "-device {},netdev={},mac={}",
            self.device, netdev_id, self.mac
        ));
    }
}

/// Ordered collection of network interfaces, rendered in declaration order.
#[derive(Debug, Clone, Default)]
pub struct BackendNetworkElement {
    networks: Vec<NetworkElement>,
}

impl BackendNetworkElement {
    pub fn init(descriptors: &[NetworkDescriptor]) -> Self {
        let networks = descriptors
            .iter()
            .enumerate()
            .map(|(i, d)| NetworkElement::init(d, i as u32))
            .collect();
        Self { networks }
    }

    pub fn precheck(&self) -> Result<()> {
        for network in &self.networks {
            network.precheck()?;
        }
        Ok(())
    }

    pub fn render(&self, out: &mut OptionBuilder) {
        for network in &self.networks {
            network.render(out);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn render(net: &NetworkElement) -> String {
        let mut b = OptionBuilder::new();
        net.render(&mut b);
        b.render().unwrap()
    }

    #[test]
    fn nat_mode_default() {
        let net = NetworkElement::init(&NetworkDescriptor::default(), 0);
        assert_eq!(render(&net), "-net user -net nic");
    }

    #[test]
    fn unsupported_mode_is_rejected_at_precheck() {
        let descriptor = NetworkDescriptor {
            network_mode: Some("host".to_string()),
            ..Default::default()
        };
        let net = NetworkElement::init(&descriptor, 0);
        assert!(matches!(net.precheck(), Err(Error::Unsupported(_))));
    }

    #[test]
    fn bridge_mode_without_name_defaults_to_br0() {
        let descriptor = NetworkDescriptor {
            network_mode: Some("bridge".to_string()),
            ..Default::default()
        };
        let net = NetworkElement::init(&descriptor, 0);
        assert!(net.precheck().is_ok());
        assert!(render(&net).contains("br=br0"));
    }

    #[test]
    fn bridge_mode_with_name_renders_br_option_and_helper() {
        let descriptor = NetworkDescriptor {
            network_mode: Some("bridge".to_string()),
            network_name: Some("br1".to_string()),
            ..Default::default()
        };
        let net = NetworkElement::init(&descriptor, 1);
        assert!(net.precheck().is_ok());
        let rendered = render(&net);
        assert!(rendered.contains("bridge,id=netdev1,br=br1,helper=/usr/libexec/qemu-bridge-helper"));
        assert!(rendered.contains("virtio-net-pci"));
        assert!(rendered.contains("mac=52:54:BE:"));
    }

    #[test]
    fn explicit_mac_is_preserved_in_bridge_mode() {
        let descriptor = NetworkDescriptor {
            network_mode: Some("bridge".to_string()),
            mac: Some("00:11:22:33:44:55".to_string()),
            ..Default::default()
        };
        let net = NetworkElement::init(&descriptor, 0);
        assert!(render(&net).contains("mac=00:11:22:33:44:55"));
    }

    #[test]
    fn generated_macs_are_unique() {
        let a = NetworkElement::init(&NetworkDescriptor::default(), 0);
        let b = NetworkElement::init(&NetworkDescriptor::default(), 1);
        assert_ne!(a.mac, b.mac);
        assert!(a.mac.starts_with(MAC_OUI));
    }
}
