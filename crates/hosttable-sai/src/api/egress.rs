//! Egress objects: the forwarding action a host or route resolves to.

use crate::error::SaiResult;
use crate::types::{EgressOid, RouterIntfOid};
use hosttable_types::{MacAddress, PortId, VrfId};
use serde::{Deserialize, Serialize};
use std::net::IpAddr;

/// What the ASIC does with a packet that hits this egress.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum EgressAction {
    /// Rewrite the destination MAC and send out of `port`.
    Forward { mac: MacAddress, port: PortId },
    Drop,
    /// Punt to the CPU so the control plane can resolve the neighbor.
    ToCpu,
}

impl EgressAction {
    pub fn port(&self) -> PortId {
        match self {
            EgressAction::Forward { port, .. } => *port,
            EgressAction::Drop | EgressAction::ToCpu => PortId::NONE,
        }
    }
}

/// Full programming for a single (non-ECMP) egress object.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct EgressConfig {
    pub vrf: VrfId,
    /// Neighbor address this egress was created for.
    pub ip: IpAddr,
    /// Router interface the packet leaves through.
    pub intf: RouterIntfOid,
    pub action: EgressAction,
}

impl EgressConfig {
    pub fn forward(vrf: VrfId, ip: IpAddr, intf: RouterIntfOid, mac: MacAddress, port: PortId) -> Self {
        Self {
            vrf,
            ip,
            intf,
            action: EgressAction::Forward { mac, port },
        }
    }

    pub fn drop(vrf: VrfId, ip: IpAddr, intf: RouterIntfOid) -> Self {
        Self {
            vrf,
            ip,
            intf,
            action: EgressAction::Drop,
        }
    }

    pub fn to_cpu(vrf: VrfId, ip: IpAddr, intf: RouterIntfOid) -> Self {
        Self {
            vrf,
            ip,
            intf,
            action: EgressAction::ToCpu,
        }
    }
}

/// Hardware capability for single egress objects.
pub trait EgressApi: Send + Sync {
    /// Allocates and programs a new egress object.
    fn create_egress(&self, config: &EgressConfig) -> SaiResult<EgressOid>;

    /// Reprograms an existing egress object in place; its id is unchanged.
    fn set_egress(&self, id: EgressOid, config: &EgressConfig) -> SaiResult<()>;

    /// Frees an egress object. Fails with `ObjectInUse` while anything references it.
    fn remove_egress(&self, id: EgressOid) -> SaiResult<()>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_action_port() {
        let mac: MacAddress = "02:00:00:00:00:01".parse().unwrap();
        let fwd = EgressAction::Forward {
            mac,
            port: PortId::new(3),
        };
        assert_eq!(fwd.port(), PortId::new(3));
        assert!(EgressAction::ToCpu.port().is_none());
        assert!(EgressAction::Drop.port().is_none());
    }

    #[test]
    fn test_action_serialization() {
        let json = serde_json::to_value(EgressAction::ToCpu).unwrap();
        assert_eq!(json, serde_json::json!({ "type": "to_cpu" }));

        let fwd = EgressAction::Forward {
            mac: "02:00:00:00:00:01".parse().unwrap(),
            port: PortId::new(3),
        };
        let json = serde_json::to_value(fwd).unwrap();
        assert_eq!(
            json,
            serde_json::json!({ "type": "forward", "mac": "02:00:00:00:00:01", "port": 3 })
        );
    }
}
