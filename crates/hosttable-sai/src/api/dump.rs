//! Read-back of hardware contents, used to seed warm-boot reconciliation.

use super::egress::EgressConfig;
use super::host::L3HostEntry;
use crate::types::EgressOid;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiscoveredEgress {
    pub id: EgressOid,
    pub config: EgressConfig,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiscoveredEcmp {
    pub id: EgressOid,
    /// Members currently installed in the group, in hardware order.
    pub members: Vec<EgressOid>,
}

/// Everything found in the forwarding tables, sorted by key.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct HwDump {
    #[serde(default)]
    pub hosts: Vec<L3HostEntry>,
    #[serde(default)]
    pub egresses: Vec<DiscoveredEgress>,
    #[serde(default)]
    pub ecmps: Vec<DiscoveredEcmp>,
}

impl HwDump {
    pub fn is_empty(&self) -> bool {
        self.hosts.is_empty() && self.egresses.is_empty() && self.ecmps.is_empty()
    }

    pub fn object_count(&self) -> usize {
        self.hosts.len() + self.egresses.len() + self.ecmps.len()
    }
}
