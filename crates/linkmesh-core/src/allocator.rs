//! Interface name and VXLAN network identifier allocation
//!
//! Names are `{type}t{n}` with `n` drawn from [`NAME_SUFFIX_RANGE`]; network
//! identifiers are drawn from [`VNI_RANGE`]. Neither is checked against what
//! already exists on the hosts, so collisions are possible. Implement
//! [`InterfaceAllocator`] to add uniqueness tracking without touching callers.

use std::ops::Range;
use std::sync::Mutex;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::model::TunnelType;

pub const NAME_SUFFIX_RANGE: Range<u32> = 0..1000;
pub const VNI_RANGE: Range<u32> = 100..10100;

/// Source of interface names and protocol identifiers for new tunnels
pub trait InterfaceAllocator: Send + Sync {
    /// Interface name used on both endpoints
    fn interface_name(&self, tunnel_type: TunnelType) -> String;

    /// VXLAN network identifier shared by both endpoints
    fn vxlan_id(&self) -> u32;
}

/// Uniform random allocator; seedable for reproducible command pairs
pub struct RandomAllocator {
    rng: Mutex<StdRng>,
}

impl RandomAllocator {
    pub fn new() -> Self {
        Self {
            rng: Mutex::new(StdRng::from_entropy()),
        }
    }

    pub fn seeded(seed: u64) -> Self {
        Self {
            rng: Mutex::new(StdRng::seed_from_u64(seed)),
        }
    }

    fn draw(&self, range: Range<u32>) -> u32 {
        // A poisoned lock only means another draw panicked; the RNG state is
        // still usable
        let mut rng = self.rng.lock().unwrap_or_else(|e| e.into_inner());
        rng.gen_range(range)
    }
}

impl Default for RandomAllocator {
    fn default() -> Self {
        Self::new()
    }
}

impl InterfaceAllocator for RandomAllocator {
    fn interface_name(&self, tunnel_type: TunnelType) -> String {
        format!("{}t{}", tunnel_type.as_str(), self.draw(NAME_SUFFIX_RANGE))
    }

    fn vxlan_id(&self) -> u32 {
        self.draw(VNI_RANGE)
    }
}
