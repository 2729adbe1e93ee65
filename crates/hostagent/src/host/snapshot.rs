//! Exported state of the host table.
//!
//! Field names follow the agent's state dump format (`egressId`,
//! `ecmpEgress`, ...) so existing tooling can read it.

use super::egress::{EcmpEgress, Egress};
use hosttable_sai::{EgressConfig, EgressOid};
use hosttable_types::{NextHopSet, PortId, VrfId};
use serde::{Deserialize, Serialize};
use std::net::IpAddr;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct HostTableSnapshot {
    #[serde(rename = "host", default)]
    pub hosts: Vec<HostSnapshot>,
    #[serde(rename = "ecmpHosts", default)]
    pub ecmp_hosts: Vec<EcmpHostSnapshot>,
}

impl HostTableSnapshot {
    pub fn to_json_pretty(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }

    pub fn from_json(json: &str) -> serde_json::Result<Self> {
        serde_json::from_str(json)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HostSnapshot {
    pub vrf: VrfId,
    pub ip: IpAddr,
    pub port: PortId,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub egress_id: Option<EgressOid>,
    /// Omitted while unassigned and for the drop egress.
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub egress: Option<EgressSnapshot>,
    /// Set instead of `egress` when the host points at an ECMP group.
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub ecmp_egress: Option<EcmpEgressSnapshot>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EcmpHostSnapshot {
    pub vrf: VrfId,
    pub nexthops: NextHopSet,
    pub egress_id: EgressOid,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub ecmp_egress_id: Option<EgressOid>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub ecmp_egress: Option<EcmpEgressSnapshot>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EgressSnapshot {
    pub id: EgressOid,
    pub config: EgressConfig,
}

impl From<&Egress> for EgressSnapshot {
    fn from(egress: &Egress) -> Self {
        Self {
            id: egress.id(),
            config: *egress.config(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EcmpEgressSnapshot {
    pub id: EgressOid,
    pub paths: Vec<EgressOid>,
    /// Paths currently installed in the group.
    pub active: Vec<EgressOid>,
}

impl From<&EcmpEgress> for EcmpEgressSnapshot {
    fn from(group: &EcmpEgress) -> Self {
        Self {
            id: group.id(),
            paths: group.paths().to_vec(),
            active: group.active_paths(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use hosttable_sai::RouterIntfOid;
    use pretty_assertions::assert_eq;

    fn sample() -> HostTableSnapshot {
        let egress = EgressOid::from_raw_unchecked(100_001);
        HostTableSnapshot {
            hosts: vec![
                HostSnapshot {
                    vrf: VrfId::DEFAULT,
                    ip: "10.0.0.1".parse().unwrap(),
                    port: PortId::new(3),
                    egress_id: Some(egress),
                    egress: Some(EgressSnapshot {
                        id: egress,
                        config: EgressConfig::forward(
                            VrfId::DEFAULT,
                            "10.0.0.1".parse().unwrap(),
                            RouterIntfOid::from_raw_unchecked(4001),
                            "02:00:00:00:00:01".parse().unwrap(),
                            PortId::new(3),
                        ),
                    }),
                    ecmp_egress: None,
                },
                HostSnapshot {
                    vrf: VrfId::DEFAULT,
                    ip: "10.0.0.9".parse().unwrap(),
                    port: PortId::NONE,
                    egress_id: None,
                    egress: None,
                    ecmp_egress: None,
                },
            ],
            ecmp_hosts: vec![],
        }
    }

    #[test]
    fn test_field_names() {
        let value = serde_json::to_value(sample()).unwrap();
        assert!(value.get("host").is_some());
        assert!(value.get("ecmpHosts").is_some());

        let host = &value["host"][0];
        assert_eq!(host["egressId"], serde_json::json!(100_001));
        assert_eq!(host["egress"]["id"], serde_json::json!(100_001));
        assert_eq!(host["egress"]["config"]["action"]["type"], serde_json::json!("forward"));
        assert!(value["host"][1].get("egressId").is_none());
        assert!(value["host"][1].get("egress").is_none());
    }

    #[test]
    fn test_json_round_trip() {
        let json = sample().to_json_pretty().unwrap();
        assert_eq!(HostTableSnapshot::from_json(&json).unwrap(), sample());
    }
}
