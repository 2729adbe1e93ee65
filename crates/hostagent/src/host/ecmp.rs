//! Multi-path hosts: one visible egress over a set of next hops.

use super::table::HostTable;
use super::types::{EcmpHostKey, ForwardAction, HostKey, HostTableError, Result};
use crate::fatal;
use hosttable_sai::EgressOid;
use hosttable_types::{NextHopSet, PortId, VrfId};
use log::{debug, warn};

/// The egress a multi-path route points at.
///
/// With a single distinct path the route uses that member's egress directly
/// and no group exists. Otherwise `ecmp_egress_id` is the group, which holds
/// one reference on every member egress.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EcmpHost {
    key: EcmpHostKey,
    egress_id: EgressOid,
    ecmp_egress_id: Option<EgressOid>,
    /// One entry per acquired member host, in next-hop order.
    members: Vec<HostKey>,
}

impl EcmpHost {
    /// Acquires a host entry per next hop and builds the group.
    ///
    /// All-or-nothing: if any step fails, every member acquired so far is
    /// released before the error is returned.
    pub(crate) fn create(table: &mut HostTable, key: EcmpHostKey) -> Result<Self> {
        if key.nexthops.is_empty() {
            return Err(HostTableError::EmptyNextHopSet(key.vrf));
        }
        let max = table.config().max_ecmp_width;
        if key.nexthops.len() > max {
            return Err(HostTableError::EcmpWidthExceeded {
                width: key.nexthops.len(),
                max,
            });
        }

        let mut acquired = Vec::with_capacity(key.nexthops.len());
        match Self::build(table, &key, &mut acquired) {
            Ok((egress_id, ecmp_egress_id)) => Ok(Self {
                key,
                egress_id,
                ecmp_egress_id,
                members: acquired,
            }),
            Err(e) => {
                warn!("rolling back ECMP host {}: {}", key, e);
                for member in acquired.iter().rev() {
                    table.release_host(member.vrf, member.ip);
                }
                table.record_rollback();
                Err(e)
            }
        }
    }

    fn build(
        table: &mut HostTable,
        key: &EcmpHostKey,
        acquired: &mut Vec<HostKey>,
    ) -> Result<(EgressOid, Option<EgressOid>)> {
        let mut paths: Vec<EgressOid> = Vec::with_capacity(key.nexthops.len());
        for nexthop in key.nexthops.iter() {
            let programmed = table.acquire_host(key.vrf, nexthop.ip).is_programmed();
            acquired.push(HostKey::new(key.vrf, nexthop.ip));
            if !programmed {
                table.program_host(
                    key.vrf,
                    nexthop.ip,
                    nexthop.intf,
                    None,
                    PortId::NONE,
                    ForwardAction::ToCpu,
                )?;
            }
            let Some(path) = table.get_host_if(key.vrf, nexthop.ip).and_then(|h| h.egress_id())
            else {
                fatal!("member host {}/{} has no egress after programming", key.vrf, nexthop.ip);
            };
            if !paths.contains(&path) {
                paths.push(path);
            }
        }

        if let &[single] = paths.as_slice() {
            debug!("ECMP host {} resolves to single egress {}", key, single);
            return Ok((single, None));
        }
        let group = table.create_ecmp_egress(paths)?;
        Ok((group, Some(group)))
    }

    /// Releases the group first, then every member host.
    pub(crate) fn teardown(self, table: &mut HostTable) {
        if let Some(group) = self.ecmp_egress_id {
            table.deref_egress(group);
        }
        for member in &self.members {
            table.release_host(member.vrf, member.ip);
        }
    }

    pub fn key(&self) -> &EcmpHostKey {
        &self.key
    }

    pub fn vrf(&self) -> VrfId {
        self.key.vrf
    }

    pub fn nexthops(&self) -> &NextHopSet {
        &self.key.nexthops
    }

    /// Egress routes should point at: the group, or the only member's egress.
    pub fn egress_id(&self) -> EgressOid {
        self.egress_id
    }

    pub fn ecmp_egress_id(&self) -> Option<EgressOid> {
        self.ecmp_egress_id
    }

    pub fn members(&self) -> &[HostKey] {
        &self.members
    }
}
