//! Keys, configuration, statistics and errors for the host table.

use hosttable_sai::{SaiError, SaiStatus};
use hosttable_types::{InterfaceId, NextHopSet, VrfId};
use std::fmt;
use std::net::IpAddr;
use thiserror::Error;

/// Key of a host entry: one exact-match address in one VRF.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct HostKey {
    pub vrf: VrfId,
    pub ip: IpAddr,
}

impl HostKey {
    pub fn new(vrf: VrfId, ip: IpAddr) -> Self {
        Self { vrf, ip }
    }
}

impl fmt::Display for HostKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.vrf, self.ip)
    }
}

/// Key of an ECMP host: a VRF and the canonical set of next hops.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct EcmpHostKey {
    pub vrf: VrfId,
    pub nexthops: NextHopSet,
}

impl EcmpHostKey {
    pub fn new(vrf: VrfId, nexthops: NextHopSet) -> Self {
        Self { vrf, nexthops }
    }
}

impl fmt::Display for EcmpHostKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.vrf, self.nexthops)
    }
}

/// What an unresolved host does with traffic until a MAC is known.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ForwardAction {
    Drop,
    ToCpu,
}

#[derive(Debug, Clone, Error)]
pub enum HostTableError {
    #[error("Host not found: {0}")]
    HostNotFound(HostKey),

    #[error("ECMP host not found: {0}")]
    EcmpHostNotFound(EcmpHostKey),

    #[error("Router interface not found for {0}")]
    InterfaceNotFound(InterfaceId),

    #[error("ECMP host in {0} has no next hops")]
    EmptyNextHopSet(VrfId),

    #[error("ECMP width {width} exceeds the configured maximum of {max}")]
    EcmpWidthExceeded { width: usize, max: usize },

    /// A hardware call failed; `context` names the operation and key.
    #[error("{context}: {source}")]
    Hardware { context: String, source: SaiError },
}

impl HostTableError {
    pub(crate) fn hardware(context: impl Into<String>, source: SaiError) -> Self {
        HostTableError::Hardware {
            context: context.into(),
            source,
        }
    }

    /// Driver status for hardware failures.
    pub fn hw_status(&self) -> Option<SaiStatus> {
        match self {
            HostTableError::Hardware { source, .. } => Some(source.status()),
            _ => None,
        }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(
            self,
            HostTableError::HostNotFound(_)
                | HostTableError::EcmpHostNotFound(_)
                | HostTableError::InterfaceNotFound(_)
        )
    }
}

pub type Result<T> = std::result::Result<T, HostTableError>;

#[derive(Debug, Clone)]
pub struct HostTableConfig {
    /// Widest ECMP group the table will build.
    pub max_ecmp_width: usize,
}

impl Default for HostTableConfig {
    fn default() -> Self {
        Self { max_ecmp_width: 64 }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HostTableStats {
    pub hosts_created: u64,
    pub hosts_destroyed: u64,
    pub ecmp_hosts_created: u64,
    pub ecmp_hosts_destroyed: u64,
    pub egresses_created: u64,
    pub egresses_destroyed: u64,
    /// ECMP host constructions undone after a member failed.
    pub rollbacks: u64,
    /// Group member add/remove calls issued by link-state changes.
    pub link_state_updates: u64,
    /// Discovered hardware objects reused during warm boot instead of rewritten.
    pub warm_boot_claims: u64,
}

#[cfg(test)]
mod tests {
    use super::*;
    use hosttable_types::NextHop;

    #[test]
    fn test_key_display() {
        let key = HostKey::new(VrfId::new(1), "10.0.0.1".parse().unwrap());
        assert_eq!(key.to_string(), "vrf1/10.0.0.1");

        let nexthops: NextHopSet = ["10.0.0.2@5", "10.0.0.1@5"]
            .iter()
            .map(|s| s.parse::<NextHop>().unwrap())
            .collect();
        let key = EcmpHostKey::new(VrfId::DEFAULT, nexthops);
        assert_eq!(key.to_string(), "vrf0/[10.0.0.1@5, 10.0.0.2@5]");
    }

    #[test]
    fn test_error_classification() {
        let err = HostTableError::hardware("failed to add L3 host vrf0/10.0.0.1", SaiError::from_status(SaiStatus::TableFull));
        assert_eq!(err.hw_status(), Some(SaiStatus::TableFull));
        assert!(!err.is_not_found());
        assert_eq!(err.to_string(), "failed to add L3 host vrf0/10.0.0.1: hardware table full");

        let err = HostTableError::InterfaceNotFound(InterfaceId::new(9));
        assert!(err.is_not_found());
        assert_eq!(err.hw_status(), None);
    }
}
