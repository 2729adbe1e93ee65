//! L3 host table entries.

use crate::error::SaiResult;
use crate::types::EgressOid;
use hosttable_types::VrfId;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::net::IpAddr;

/// One L3 host entry: an exact-match (vrf, ip) pointing at an egress object.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct L3HostEntry {
    pub vrf: VrfId,
    pub ip: IpAddr,
    pub egress: EgressOid,
    /// Set when `egress` is an ECMP group rather than a single egress.
    pub multipath: bool,
}

impl L3HostEntry {
    pub fn new(vrf: VrfId, ip: IpAddr, egress: EgressOid, multipath: bool) -> Self {
        Self {
            vrf,
            ip,
            egress,
            multipath,
        }
    }

    pub fn is_ipv6(&self) -> bool {
        self.ip.is_ipv6()
    }

    /// Compares the attributes the ASIC keys behaviour on: address family,
    /// multipath flag, VRF and egress reference.
    pub fn matches(&self, other: &L3HostEntry) -> bool {
        self.is_ipv6() == other.is_ipv6()
            && self.multipath == other.multipath
            && self.vrf == other.vrf
            && self.egress == other.egress
    }
}

impl fmt::Display for L3HostEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}/{} -> egress {}{}",
            self.vrf,
            self.ip,
            self.egress,
            if self.multipath { " (multipath)" } else { "" }
        )
    }
}

/// Hardware capability for L3 host entries.
pub trait HostApi: Send + Sync {
    /// Installs a host entry; fails with `AlreadyExists` if (vrf, ip) is present.
    fn add_host(&self, entry: &L3HostEntry) -> SaiResult<()>;

    /// Removes the host entry for (vrf, ip).
    fn remove_host(&self, entry: &L3HostEntry) -> SaiResult<()>;
}
