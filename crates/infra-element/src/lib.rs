//! Hardware element tree for a simulated compute node.
//!
//! Each element follows the same three-phase lifecycle: `init` builds it
//! from a descriptor (and may shell out, e.g. to create a missing disk
//! image), `precheck` validates invariants that span more than one field,
//! and `render` appends its command-line fragment(s) to a shared
//! [`infra_optbuilder::OptionBuilder`]. There is no dynamic-dispatch
//! element tree; the compute task composes these concretely in a fixed
//! order (CPU, memory, storage, network, IPMI).

mod cpu;
mod drive;
mod ipmi;
mod memory;
mod network;
mod storage;

pub use cpu::CpuElement;
pub use drive::DriveElement;
pub use ipmi::IpmiElement;
pub use memory::MemoryElement;
pub use network::{BackendNetworkElement, NetworkElement};
pub use storage::{BackendStorageElement, StorageControllerElement};
