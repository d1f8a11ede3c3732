//! Shell command synthesis for both ends of a tunnel
//!
//! Pure apart from the allocator: given the same allocator state the output
//! is byte-identical. Each side's command names the *other* side's address
//! as its encapsulation peer, so a tunnel only works once both commands ran.

use std::net::IpAddr;
use std::sync::Arc;

use crate::allocator::{InterfaceAllocator, RandomAllocator};
use crate::model::TunnelType;

pub const GRE_TTL: u8 = 255;
pub const GRE_PREFIX_LEN: u8 = 30;
pub const VXLAN_DST_PORT: u16 = 4789;
pub const VXLAN_PREFIX_LEN: u8 = 24;

/// Linux IFNAMSIZ minus the terminating NUL
const MAX_INTERFACE_NAME: usize = 15;

/// One side of a tunnel as the synthesizer sees it
#[derive(Debug, Clone, Copy)]
pub struct Endpoint<'a> {
    /// Underlay address the host is reachable on
    pub address: &'a str,
    /// Address to assign to the tunnel interface on this host
    pub overlay_ip: IpAddr,
}

/// Commands for both endpoints plus what teardown needs to find them again
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandPair {
    pub local: String,
    pub remote: String,
    pub interface: String,
    /// VXLAN network identifier; `None` for GRE
    pub vni: Option<u32>,
}

/// Builds [`CommandPair`]s using a pluggable allocator
#[derive(Clone)]
pub struct CommandSynthesizer {
    allocator: Arc<dyn InterfaceAllocator>,
}

impl CommandSynthesizer {
    pub fn new(allocator: Arc<dyn InterfaceAllocator>) -> Self {
        Self { allocator }
    }

    pub fn synthesize(
        &self,
        tunnel_type: TunnelType,
        local: Endpoint<'_>,
        remote: Endpoint<'_>,
    ) -> CommandPair {
        let interface = self.allocator.interface_name(tunnel_type);

        match tunnel_type {
            TunnelType::Gre => CommandPair {
                local: gre_command(&interface, local, remote),
                remote: gre_command(&interface, remote, local),
                interface,
                vni: None,
            },
            TunnelType::Vxlan => {
                let vni = self.allocator.vxlan_id();
                CommandPair {
                    local: vxlan_command(&interface, vni, local, remote),
                    remote: vxlan_command(&interface, vni, remote, local),
                    interface,
                    vni: Some(vni),
                }
            }
        }
    }
}

impl Default for CommandSynthesizer {
    fn default() -> Self {
        Self::new(Arc::new(RandomAllocator::new()))
    }
}

fn gre_command(name: &str, own: Endpoint<'_>, peer: Endpoint<'_>) -> String {
    format!(
        "ip tunnel add {name} mode gre remote {peer} local {own} ttl {ttl} && \
         ip link set {name} up && \
         ip addr add {overlay}/{prefix} dev {name}",
        peer = peer.address,
        own = own.address,
        ttl = GRE_TTL,
        overlay = own.overlay_ip,
        prefix = GRE_PREFIX_LEN,
    )
}

fn vxlan_command(name: &str, vni: u32, own: Endpoint<'_>, peer: Endpoint<'_>) -> String {
    format!(
        "ip link add {name} type vxlan id {vni} remote {peer} local {own} dstport {port} && \
         ip link set {name} up && \
         ip addr add {overlay}/{prefix} dev {name}",
        peer = peer.address,
        own = own.address,
        port = VXLAN_DST_PORT,
        overlay = own.overlay_ip,
        prefix = VXLAN_PREFIX_LEN,
    )
}

/// Removes the interface from one host
pub fn teardown_command(interface: &str) -> String {
    format!("ip link delete {}", interface)
}

/// Whether `name` looks like an interface this system generated
///
/// Tunnels renamed by the operator fail this check and are only removed
/// from the registry, never touched remotely. The character check also
/// keeps the name safe to splice into a shell command.
pub fn is_managed_interface(name: &str) -> bool {
    let has_prefix = TunnelType::ALL
        .iter()
        .any(|t| name.starts_with(t.as_str()));

    has_prefix
        && name.len() <= MAX_INTERFACE_NAME
        && name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.'))
}
