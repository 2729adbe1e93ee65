//! Warm-boot reconciliation against hardware discovered at startup.
//!
//! After a warm restart the ASIC still holds the host entries, egress objects
//! and ECMP groups the previous process programmed. The host table queries a
//! [`WarmBootHostCache`] before every hardware write: a matching discovered
//! object is claimed (acknowledged) and reused instead of being rewritten.
//! Whatever is still unclaimed once the table has been rebuilt is stale and
//! can be purged.

mod cache;

pub use cache::WarmBootCache;

use hosttable_sai::{DiscoveredEcmp, DiscoveredEgress, EgressOid, HwDump, L3HostEntry};
use hosttable_types::VrfId;
use std::net::IpAddr;

/// Query/acknowledge interface over discovered hardware state.
///
/// `find_*` never changes state; `acknowledge_*` claims an object so it is
/// neither returned again nor reported as unclaimed.
pub trait WarmBootHostCache: Send {
    fn find_host(&self, vrf: VrfId, ip: IpAddr) -> Option<L3HostEntry>;

    fn acknowledge_host(&mut self, vrf: VrfId, ip: IpAddr);

    /// Discovered single egress created for neighbor (vrf, ip).
    fn find_egress(&self, vrf: VrfId, ip: IpAddr) -> Option<DiscoveredEgress>;

    fn acknowledge_egress(&mut self, id: EgressOid);

    /// Discovered ECMP group for a group over `paths`.
    ///
    /// Members compare in any order. A group that lost members to link-down
    /// before the restart matches too, as long as what is left is a non-empty
    /// subset of `paths`; an exact match wins over a partial one.
    fn find_ecmp(&self, paths: &[EgressOid]) -> Option<DiscoveredEcmp>;

    fn acknowledge_ecmp(&mut self, id: EgressOid);

    /// Number of objects claimed so far.
    fn claimed(&self) -> usize;

    /// Discovered objects nobody has claimed.
    fn unclaimed(&self) -> HwDump;
}

/// Cache used on cold boot: nothing was discovered, so every write goes to hardware.
#[derive(Debug, Clone, Copy, Default)]
pub struct ColdBoot;

impl WarmBootHostCache for ColdBoot {
    fn find_host(&self, _vrf: VrfId, _ip: IpAddr) -> Option<L3HostEntry> {
        None
    }

    fn acknowledge_host(&mut self, _vrf: VrfId, _ip: IpAddr) {}

    fn find_egress(&self, _vrf: VrfId, _ip: IpAddr) -> Option<DiscoveredEgress> {
        None
    }

    fn acknowledge_egress(&mut self, _id: EgressOid) {}

    fn find_ecmp(&self, _paths: &[EgressOid]) -> Option<DiscoveredEcmp> {
        None
    }

    fn acknowledge_ecmp(&mut self, _id: EgressOid) {}

    fn claimed(&self) -> usize {
        0
    }

    fn unclaimed(&self) -> HwDump {
        HwDump::default()
    }
}

/// Result of finishing warm-boot reconciliation.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WarmBootSummary {
    pub claimed: usize,
    /// Discovered objects that no table entry claimed.
    pub orphans: HwDump,
    /// How many orphans were removed from hardware.
    pub purged: usize,
}
