//! Warm-boot cache seeded from a hardware dump.

use super::WarmBootHostCache;
use hosttable_sai::{DiscoveredEcmp, DiscoveredEgress, EgressOid, HwDump, L3HostEntry};
use hosttable_types::VrfId;
use log::{debug, info, warn};
use std::collections::{BTreeMap, BTreeSet};
use std::net::IpAddr;

/// Discovered hardware objects indexed the way the host table looks them up.
#[derive(Debug, Default)]
pub struct WarmBootCache {
    hosts: BTreeMap<(VrfId, IpAddr), L3HostEntry>,
    egresses: BTreeMap<(VrfId, IpAddr), DiscoveredEgress>,
    /// Egresses sharing a (vrf, ip) with one already indexed; never claimable.
    shadowed_egresses: Vec<DiscoveredEgress>,
    ecmps: BTreeMap<EgressOid, DiscoveredEcmp>,
    claimed: usize,
}

impl WarmBootCache {
    pub fn from_dump(dump: HwDump) -> Self {
        let mut cache = Self::default();
        for host in dump.hosts {
            cache.hosts.insert((host.vrf, host.ip), host);
        }
        for egress in dump.egresses {
            let key = (egress.config.vrf, egress.config.ip);
            if cache.egresses.contains_key(&key) {
                warn!(
                    "warm boot: duplicate egress {} for {}/{}, leaving it unclaimed",
                    egress.id, key.0, key.1
                );
                cache.shadowed_egresses.push(egress);
            } else {
                cache.egresses.insert(key, egress);
            }
        }
        for ecmp in dump.ecmps {
            cache.ecmps.insert(ecmp.id, ecmp);
        }
        info!(
            "warm boot: discovered {} hosts, {} egresses, {} ECMP groups",
            cache.hosts.len(),
            cache.egresses.len() + cache.shadowed_egresses.len(),
            cache.ecmps.len()
        );
        cache
    }

    pub fn is_empty(&self) -> bool {
        self.hosts.is_empty()
            && self.egresses.is_empty()
            && self.ecmps.is_empty()
            && self.shadowed_egresses.is_empty()
    }
}

impl WarmBootHostCache for WarmBootCache {
    fn find_host(&self, vrf: VrfId, ip: IpAddr) -> Option<L3HostEntry> {
        self.hosts.get(&(vrf, ip)).copied()
    }

    fn acknowledge_host(&mut self, vrf: VrfId, ip: IpAddr) {
        if self.hosts.remove(&(vrf, ip)).is_some() {
            debug!("warm boot: claimed host {}/{}", vrf, ip);
            self.claimed += 1;
        }
    }

    fn find_egress(&self, vrf: VrfId, ip: IpAddr) -> Option<DiscoveredEgress> {
        self.egresses.get(&(vrf, ip)).cloned()
    }

    fn acknowledge_egress(&mut self, id: EgressOid) {
        let key = self
            .egresses
            .iter()
            .find(|(_, egress)| egress.id == id)
            .map(|(key, _)| *key);
        if let Some(key) = key {
            self.egresses.remove(&key);
            debug!("warm boot: claimed egress {}", id);
            self.claimed += 1;
        }
    }

    fn find_ecmp(&self, paths: &[EgressOid]) -> Option<DiscoveredEcmp> {
        let wanted: BTreeSet<EgressOid> = paths.iter().copied().collect();
        // Largest partial match so far; ties keep the lower group id.
        let mut partial: Option<(usize, &DiscoveredEcmp)> = None;
        for group in self.ecmps.values() {
            let members: BTreeSet<EgressOid> = group.members.iter().copied().collect();
            if members.is_empty() || !members.is_subset(&wanted) {
                continue;
            }
            if members.len() == wanted.len() {
                return Some(group.clone());
            }
            if partial.map_or(true, |(best, _)| members.len() > best) {
                partial = Some((members.len(), group));
            }
        }
        partial.map(|(_, group)| group.clone())
    }

    fn acknowledge_ecmp(&mut self, id: EgressOid) {
        if self.ecmps.remove(&id).is_some() {
            debug!("warm boot: claimed ECMP group {}", id);
            self.claimed += 1;
        }
    }

    fn claimed(&self) -> usize {
        self.claimed
    }

    fn unclaimed(&self) -> HwDump {
        let mut egresses: Vec<DiscoveredEgress> = self
            .egresses
            .values()
            .cloned()
            .chain(self.shadowed_egresses.iter().cloned())
            .collect();
        egresses.sort_by_key(|e| e.id);

        HwDump {
            hosts: self.hosts.values().copied().collect(),
            egresses,
            ecmps: self.ecmps.values().cloned().collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use hosttable_sai::{EgressConfig, RouterIntfOid};
    use pretty_assertions::assert_eq;

    fn ip(s: &str) -> IpAddr {
        s.parse().unwrap()
    }

    fn oid(raw: u64) -> EgressOid {
        EgressOid::from_raw_unchecked(raw)
    }

    fn dump() -> HwDump {
        let intf = RouterIntfOid::from_raw_unchecked(4001);
        HwDump {
            hosts: vec![
                L3HostEntry::new(VrfId::DEFAULT, ip("10.0.0.1"), oid(100_001), false),
                L3HostEntry::new(VrfId::DEFAULT, ip("10.0.0.2"), oid(100_002), false),
            ],
            egresses: vec![
                DiscoveredEgress {
                    id: oid(100_001),
                    config: EgressConfig::to_cpu(VrfId::DEFAULT, ip("10.0.0.1"), intf),
                },
                DiscoveredEgress {
                    id: oid(100_002),
                    config: EgressConfig::to_cpu(VrfId::DEFAULT, ip("10.0.0.2"), intf),
                },
            ],
            ecmps: vec![DiscoveredEcmp {
                id: oid(200_000),
                members: vec![oid(100_001), oid(100_002)],
            }],
        }
    }

    #[test]
    fn test_find_does_not_claim() {
        let cache = WarmBootCache::from_dump(dump());
        assert!(cache.find_host(VrfId::DEFAULT, ip("10.0.0.1")).is_some());
        assert!(cache.find_host(VrfId::DEFAULT, ip("10.0.0.1")).is_some());
        assert!(cache.find_host(VrfId::new(1), ip("10.0.0.1")).is_none());
        assert_eq!(cache.claimed(), 0);
        assert_eq!(cache.unclaimed(), dump());
    }

    #[test]
    fn test_acknowledge_claims_once() {
        let mut cache = WarmBootCache::from_dump(dump());
        cache.acknowledge_host(VrfId::DEFAULT, ip("10.0.0.1"));
        cache.acknowledge_host(VrfId::DEFAULT, ip("10.0.0.1"));
        assert_eq!(cache.claimed(), 1);
        assert!(cache.find_host(VrfId::DEFAULT, ip("10.0.0.1")).is_none());
    }

    #[test]
    fn test_egress_and_ecmp_lookup() {
        let mut cache = WarmBootCache::from_dump(dump());
        let egress = cache.find_egress(VrfId::DEFAULT, ip("10.0.0.2")).unwrap();
        assert_eq!(egress.id, oid(100_002));
        let found = |paths: &[EgressOid]| cache.find_ecmp(paths).map(|group| group.id);
        assert_eq!(found(&[oid(100_001), oid(100_002)]), Some(oid(200_000)));
        assert_eq!(found(&[oid(100_002), oid(100_001)]), Some(oid(200_000)));
        assert_eq!(found(&[oid(100_001)]), None);

        cache.acknowledge_egress(oid(100_002));
        cache.acknowledge_ecmp(oid(200_000));
        assert!(cache.find_egress(VrfId::DEFAULT, ip("10.0.0.2")).is_none());
        assert!(cache.find_ecmp(&[oid(100_001), oid(100_002)]).is_none());
        assert_eq!(cache.claimed(), 2);
    }

    #[test]
    fn test_shrunken_group_matches_its_full_path_list() {
        let mut input = dump();
        input.ecmps = vec![
            DiscoveredEcmp {
                id: oid(200_000),
                members: vec![],
            },
            DiscoveredEcmp {
                id: oid(200_001),
                members: vec![oid(100_002)],
            },
            DiscoveredEcmp {
                id: oid(200_002),
                members: vec![oid(100_002), oid(100_003)],
            },
        ];
        let mut cache = WarmBootCache::from_dump(input);

        let group = cache.find_ecmp(&[oid(100_001), oid(100_002), oid(100_003)]).unwrap();
        assert_eq!(group.id, oid(200_002));
        assert_eq!(group.members, vec![oid(100_002), oid(100_003)]);

        let group = cache.find_ecmp(&[oid(100_001), oid(100_002)]).unwrap();
        assert_eq!(group.id, oid(200_001));

        cache.acknowledge_ecmp(oid(200_001));
        assert_eq!(cache.find_ecmp(&[oid(100_001), oid(100_002)]), None);
        assert_eq!(cache.find_ecmp(&[oid(100_004)]), None);
    }

    #[test]
    fn test_exact_group_wins_over_partial_one() {
        let mut input = dump();
        input.ecmps.insert(
            0,
            DiscoveredEcmp {
                id: oid(199_999),
                members: vec![oid(100_001)],
            },
        );
        let cache = WarmBootCache::from_dump(input);
        let group = cache.find_ecmp(&[oid(100_002), oid(100_001)]).unwrap();
        assert_eq!(group.id, oid(200_000));
    }

    #[test]
    fn test_unclaimed_lists_leftovers() {
        let mut cache = WarmBootCache::from_dump(dump());
        cache.acknowledge_host(VrfId::DEFAULT, ip("10.0.0.1"));
        cache.acknowledge_egress(oid(100_001));

        let left = cache.unclaimed();
        assert_eq!(left.hosts.len(), 1);
        assert_eq!(left.hosts[0].ip, ip("10.0.0.2"));
        assert_eq!(left.egresses.len(), 1);
        assert_eq!(left.egresses[0].id, oid(100_002));
        assert_eq!(left.ecmps.len(), 1);
    }

    #[test]
    fn test_duplicate_egress_is_never_claimable() {
        let mut input = dump();
        let mut dup = input.egresses[0].clone();
        dup.id = oid(100_009);
        input.egresses.push(dup);

        let cache = WarmBootCache::from_dump(input);
        assert_eq!(cache.find_egress(VrfId::DEFAULT, ip("10.0.0.1")).unwrap().id, oid(100_001));
        let left = cache.unclaimed();
        assert_eq!(left.egresses.len(), 3);
        assert_eq!(left.egresses[2].id, oid(100_009));
    }
}
