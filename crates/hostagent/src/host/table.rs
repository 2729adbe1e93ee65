//! The host table: sole owner of host entries, ECMP hosts and egress objects.

use super::ecmp::EcmpHost;
use super::egress::{EcmpEgress, EgressObject};
use super::egress_table::EgressTable;
use super::entry::{HostEntry, HwContext};
use super::interface::InterfaceResolver;
use super::snapshot::{EcmpEgressSnapshot, EcmpHostSnapshot, EgressSnapshot, HostSnapshot, HostTableSnapshot};
use super::types::{
    EcmpHostKey, ForwardAction, HostKey, HostTableConfig, HostTableError, HostTableStats, Result,
};
use crate::audit::{AuditCategory, AuditOutcome, AuditRecord};
use crate::warm_boot::{ColdBoot, WarmBootHostCache, WarmBootSummary};
use crate::{audit_log, fatal};
use hosttable_common::{RefMap, Release};
use hosttable_sai::{EgressOid, SwitchHw};
use hosttable_types::{InterfaceId, MacAddress, NextHopSet, PortId, VrfId};
use log::{debug, info, warn};
use std::collections::BTreeSet;
use std::net::IpAddr;
use std::sync::Arc;

/// Refcounted registries of everything the control plane has programmed into
/// the L3 host and egress tables.
///
/// All mutation goes through `&mut self` on one control-plane thread. Callers
/// hold keys and egress ids, never the objects themselves; every
/// `acquire_*` must be paired with one `release_*`.
pub struct HostTable {
    config: HostTableConfig,
    stats: HostTableStats,
    hw: Arc<dyn SwitchHw>,
    interfaces: Arc<dyn InterfaceResolver>,
    warm_boot: Box<dyn WarmBootHostCache>,
    hosts: RefMap<HostKey, HostEntry>,
    ecmp_hosts: RefMap<EcmpHostKey, EcmpHost>,
    egresses: EgressTable,
}

impl HostTable {
    pub fn new(
        config: HostTableConfig,
        hw: Arc<dyn SwitchHw>,
        interfaces: Arc<dyn InterfaceResolver>,
    ) -> Self {
        let drop_id = hw.drop_egress_id();
        Self {
            config,
            stats: HostTableStats::default(),
            hw,
            interfaces,
            warm_boot: Box::new(ColdBoot),
            hosts: RefMap::new(),
            ecmp_hosts: RefMap::new(),
            egresses: EgressTable::new(drop_id),
        }
    }

    /// Reconciles every hardware write against `cache` until
    /// [`complete_warm_boot`](Self::complete_warm_boot) is called.
    pub fn with_warm_boot_cache(mut self, cache: Box<dyn WarmBootHostCache>) -> Self {
        self.warm_boot = cache;
        self
    }

    pub fn config(&self) -> &HostTableConfig {
        &self.config
    }

    pub fn stats(&self) -> HostTableStats {
        HostTableStats {
            egresses_created: self.egresses.created(),
            egresses_destroyed: self.egresses.destroyed(),
            warm_boot_claims: self.stats.warm_boot_claims + self.warm_boot.claimed() as u64,
            ..self.stats.clone()
        }
    }

    pub fn host_count(&self) -> usize {
        self.hosts.len()
    }

    pub fn ecmp_host_count(&self) -> usize {
        self.ecmp_hosts.len()
    }

    pub fn egress_count(&self) -> usize {
        self.egresses.len()
    }

    pub fn drop_egress_id(&self) -> EgressOid {
        self.egresses.drop_id()
    }

    // ---- host entries ----

    /// Returns the host for (vrf, ip) with one more reference, creating an
    /// unprogrammed entry if none exists.
    pub fn acquire_host(&mut self, vrf: VrfId, ip: IpAddr) -> &HostEntry {
        let key = HostKey::new(vrf, ip);
        if self.hosts.increment_ref(&key).is_err() {
            if self.hosts.insert_new(key, HostEntry::new(key)).is_err() {
                fatal!("host {} registered twice", key);
            }
            self.stats.hosts_created += 1;
            debug!("created host {}", key);
        }
        match self.hosts.get(&key) {
            Some(host) => host,
            None => fatal!("host {} vanished after acquire", key),
        }
    }

    /// Like [`acquire_host`](Self::acquire_host), but a new entry is bound to
    /// `egress` and added to hardware right away.
    ///
    /// The new entry takes its own reference on `egress`; it is multipath iff
    /// `egress` is an ECMP group. An existing entry is shared as is. On
    /// failure nothing is registered and the egress reference is returned.
    pub fn acquire_host_with_egress(
        &mut self,
        vrf: VrfId,
        ip: IpAddr,
        egress: EgressOid,
    ) -> Result<&HostEntry> {
        let key = HostKey::new(vrf, ip);
        if self.hosts.increment_ref(&key).is_err() {
            let multipath = match self.egresses.get(egress) {
                Some(object) => object.is_ecmp(),
                None if egress == self.egresses.drop_id() => false,
                None => fatal!("host {} bound to unregistered egress {}", key, egress),
            };
            self.egresses.inc_ref(egress);

            let mut ctx = HwContext {
                hw: &*self.hw,
                warm_boot: &mut *self.warm_boot,
                egresses: &mut self.egresses,
            };
            let entry = match HostEntry::with_egress(&mut ctx, key, egress, multipath) {
                Ok(entry) => entry,
                Err(e) => {
                    self.egresses.deref(&*self.hw, egress);
                    return Err(e);
                }
            };
            if self.hosts.insert_new(key, entry).is_err() {
                fatal!("host {} registered twice", key);
            }
            self.stats.hosts_created += 1;
        }
        match self.hosts.get(&key) {
            Some(host) => Ok(host),
            None => fatal!("host {} vanished after acquire", key),
        }
    }

    /// Drops one reference; the last one removes the entry from hardware and
    /// releases its egress. Returns the entry if it is still live.
    ///
    /// Releasing a host that is not registered is fatal.
    pub fn release_host(&mut self, vrf: VrfId, ip: IpAddr) -> Option<&HostEntry> {
        let key = HostKey::new(vrf, ip);
        match self.hosts.decrement_ref(&key) {
            Err(_) => fatal!("release of unregistered host {}", key),
            Ok(Release::Retained(_)) => self.hosts.get(&key),
            Ok(Release::Released(entry)) => {
                entry.teardown(&*self.hw, &mut self.egresses);
                self.stats.hosts_destroyed += 1;
                debug!("destroyed host {}", key);
                None
            }
        }
    }

    /// Programs a registered host.
    ///
    /// With `mac` the host forwards out of `port` through the router interface
    /// of `intf`; without, it drops or punts per `action`. An unregistered
    /// host is reported before an unknown interface.
    pub fn program_host(
        &mut self,
        vrf: VrfId,
        ip: IpAddr,
        intf: InterfaceId,
        mac: Option<MacAddress>,
        port: PortId,
        action: ForwardAction,
    ) -> Result<()> {
        let key = HostKey::new(vrf, ip);
        let Some(host) = self.hosts.get_mut(&key) else {
            return Err(HostTableError::HostNotFound(key));
        };
        let rif = self
            .interfaces
            .router_interface(intf)
            .ok_or(HostTableError::InterfaceNotFound(intf))?;
        let mut ctx = HwContext {
            hw: &*self.hw,
            warm_boot: &mut *self.warm_boot,
            egresses: &mut self.egresses,
        };
        host.program(&mut ctx, rif, mac, port, action)
    }

    pub fn get_host_if(&self, vrf: VrfId, ip: IpAddr) -> Option<&HostEntry> {
        self.hosts.get(&HostKey::new(vrf, ip))
    }

    pub fn get_host(&self, vrf: VrfId, ip: IpAddr) -> Result<&HostEntry> {
        let key = HostKey::new(vrf, ip);
        self.hosts.get(&key).ok_or(HostTableError::HostNotFound(key))
    }

    pub fn host_ref_count(&self, vrf: VrfId, ip: IpAddr) -> Option<u32> {
        self.hosts.ref_count(&HostKey::new(vrf, ip))
    }

    pub fn hosts(&self) -> impl Iterator<Item = &HostEntry> {
        self.hosts.values()
    }

    // ---- ECMP hosts ----

    /// Returns the ECMP host for (vrf, nexthops) with one more reference,
    /// building it if none exists. A failed build leaves no trace.
    pub fn acquire_ecmp_host(&mut self, vrf: VrfId, nexthops: &NextHopSet) -> Result<&EcmpHost> {
        let key = EcmpHostKey::new(vrf, nexthops.clone());
        if self.ecmp_hosts.increment_ref(&key).is_err() {
            let ecmp = EcmpHost::create(self, key.clone())?;
            if self.ecmp_hosts.insert_new(key.clone(), ecmp).is_err() {
                fatal!("ECMP host {} registered twice", key);
            }
            self.stats.ecmp_hosts_created += 1;
            debug!("created ECMP host {}", key);
        }
        match self.ecmp_hosts.get(&key) {
            Some(ecmp) => Ok(ecmp),
            None => fatal!("ECMP host {} vanished after acquire", key),
        }
    }

    /// Drops one reference; the last one releases the group and then the
    /// member hosts. Releasing an unregistered ECMP host is fatal.
    pub fn release_ecmp_host(&mut self, vrf: VrfId, nexthops: &NextHopSet) -> Option<&EcmpHost> {
        let key = EcmpHostKey::new(vrf, nexthops.clone());
        match self.ecmp_hosts.decrement_ref(&key) {
            Err(_) => fatal!("release of unregistered ECMP host {}", key),
            Ok(Release::Retained(_)) => self.ecmp_hosts.get(&key),
            Ok(Release::Released(ecmp)) => {
                ecmp.teardown(self);
                self.stats.ecmp_hosts_destroyed += 1;
                debug!("destroyed ECMP host {}", key);
                None
            }
        }
    }

    pub fn get_ecmp_host_if(&self, vrf: VrfId, nexthops: &NextHopSet) -> Option<&EcmpHost> {
        self.ecmp_hosts.get(&EcmpHostKey::new(vrf, nexthops.clone()))
    }

    pub fn get_ecmp_host(&self, vrf: VrfId, nexthops: &NextHopSet) -> Result<&EcmpHost> {
        let key = EcmpHostKey::new(vrf, nexthops.clone());
        match self.ecmp_hosts.get(&key) {
            Some(ecmp) => Ok(ecmp),
            None => Err(HostTableError::EcmpHostNotFound(key)),
        }
    }

    pub fn ecmp_host_ref_count(&self, vrf: VrfId, nexthops: &NextHopSet) -> Option<u32> {
        self.ecmp_hosts.ref_count(&EcmpHostKey::new(vrf, nexthops.clone()))
    }

    pub fn ecmp_hosts(&self) -> impl Iterator<Item = &EcmpHost> {
        self.ecmp_hosts.values()
    }

    pub(crate) fn record_rollback(&mut self) {
        self.stats.rollbacks += 1;
    }

    /// Creates (or on warm boot reclaims) a group over `paths` and registers it.
    pub(crate) fn create_ecmp_egress(&mut self, paths: Vec<EgressOid>) -> Result<EgressOid> {
        let group = EcmpEgress::create(&*self.hw, &mut *self.warm_boot, paths)?;
        let id = group.id();
        self.egresses.insert(EgressObject::Ecmp(group));
        Ok(id)
    }

    // ---- egress registry ----

    /// Registers an egress programmed outside the table with one reference.
    ///
    /// Registering an id twice is fatal.
    pub fn insert_egress(&mut self, object: EgressObject) {
        self.egresses.insert(object);
    }

    /// Adds a reference. `None` for the drop egress; an unregistered id is fatal.
    pub fn inc_egress_reference(&mut self, id: EgressOid) -> Option<&EgressObject> {
        self.egresses.inc_ref(id)
    }

    /// Drops a reference, removing the egress from hardware on the last one.
    pub fn deref_egress(&mut self, id: EgressOid) -> Option<&EgressObject> {
        self.egresses.deref(&*self.hw, id)
    }

    pub fn get_egress_object_if(&self, id: EgressOid) -> Option<&EgressObject> {
        self.egresses.get(id)
    }

    pub fn egress_ref_count(&self, id: EgressOid) -> Option<u32> {
        self.egresses.ref_count(id)
    }

    pub fn update_port_egress_mapping(&mut self, id: EgressOid, old_port: PortId, new_port: PortId) {
        self.egresses.update_port_mapping(id, old_port, new_port);
    }

    pub fn egress_ids_for_port(&self, port: PortId) -> Vec<EgressOid> {
        self.egresses.ids_for_port(port)
    }

    // ---- link state ----

    /// Adds or removes the egresses behind `port` in every ECMP group.
    ///
    /// Every group is updated even if one fails; the first hardware error is
    /// returned.
    pub fn link_state_changed(&mut self, port: PortId, up: bool) -> Result<()> {
        let affected = self.egresses.ids_for_port(port);
        if affected.is_empty() {
            debug!("link {} on {}: no egress to update", if up { "up" } else { "down" }, port);
            return Ok(());
        }

        let groups: BTreeSet<EgressOid> = self
            .ecmp_hosts
            .values()
            .filter_map(|ecmp| ecmp.ecmp_egress_id())
            .collect();

        let hw = &*self.hw;
        let mut first_error = None;
        for group_id in groups {
            let Some(object) = self.egresses.get_mut(group_id) else {
                fatal!("ECMP group {} is not registered", group_id);
            };
            let Some(group) = object.as_ecmp_mut() else {
                fatal!("egress {} is not an ECMP group", group_id);
            };
            for path in &affected {
                let result = if up {
                    group.path_reachable(hw, *path)
                } else {
                    group.path_unreachable(hw, *path)
                };
                match result {
                    Ok(true) => self.stats.link_state_updates += 1,
                    Ok(false) => {}
                    Err(e) => {
                        warn!("failed to update ECMP group {} path {} for {}: {}", group_id, path, port, e);
                        if first_error.is_none() {
                            first_error = Some(HostTableError::hardware(
                                format!("failed to update ECMP group {} for {}", group_id, port),
                                e,
                            ));
                        }
                    }
                }
            }
        }
        info!("link {} on {}: {} egress(es) affected", if up { "up" } else { "down" }, port, affected.len());
        first_error.map_or(Ok(()), Err)
    }

    // ---- export ----

    /// Structured view of every host and ECMP host.
    pub fn snapshot(&self) -> HostTableSnapshot {
        let drop_id = self.egresses.drop_id();
        let hosts = self
            .hosts
            .values()
            .map(|host| {
                let object = host
                    .egress_id()
                    .filter(|id| *id != drop_id)
                    .and_then(|id| self.egresses.get(id));
                HostSnapshot {
                    vrf: host.vrf(),
                    ip: host.ip(),
                    port: host.port(),
                    egress_id: host.egress_id(),
                    egress: object.and_then(|o| o.as_simple()).map(EgressSnapshot::from),
                    ecmp_egress: object.and_then(|o| o.as_ecmp()).map(EcmpEgressSnapshot::from),
                }
            })
            .collect();
        let ecmp_hosts = self
            .ecmp_hosts
            .values()
            .map(|ecmp| EcmpHostSnapshot {
                vrf: ecmp.vrf(),
                nexthops: ecmp.nexthops().clone(),
                egress_id: ecmp.egress_id(),
                ecmp_egress_id: ecmp.ecmp_egress_id(),
                ecmp_egress: ecmp
                    .ecmp_egress_id()
                    .and_then(|id| self.egresses.get(id))
                    .and_then(|o| o.as_ecmp())
                    .map(EcmpEgressSnapshot::from),
            })
            .collect();
        HostTableSnapshot { hosts, ecmp_hosts }
    }

    // ---- warm boot ----

    /// Ends warm-boot reconciliation and reports what no entry claimed.
    ///
    /// With `purge`, unclaimed hosts, then groups, then egresses are removed
    /// from hardware. Later writes are no longer reconciled.
    pub fn complete_warm_boot(&mut self, purge: bool) -> Result<WarmBootSummary> {
        let cache = std::mem::replace(&mut self.warm_boot, Box::new(ColdBoot));
        let claimed = cache.claimed();
        let orphans = cache.unclaimed();
        self.stats.warm_boot_claims += claimed as u64;

        let mut purged = 0;
        if purge {
            for host in &orphans.hosts {
                self.hw.remove_host(host).map_err(|e| {
                    HostTableError::hardware(format!("failed to purge L3 host {}/{}", host.vrf, host.ip), e)
                })?;
                purged += 1;
            }
            for ecmp in &orphans.ecmps {
                self.hw.remove_ecmp(ecmp.id).map_err(|e| {
                    HostTableError::hardware(format!("failed to purge ECMP group {}", ecmp.id), e)
                })?;
                purged += 1;
            }
            for egress in &orphans.egresses {
                self.hw.remove_egress(egress.id).map_err(|e| {
                    HostTableError::hardware(format!("failed to purge egress {}", egress.id), e)
                })?;
                purged += 1;
            }
        }

        info!(
            "warm boot complete: {} claimed, {} unclaimed, {} purged",
            claimed,
            orphans.object_count(),
            purged
        );
        audit_log!(AuditRecord::new(AuditCategory::WarmRestart, "HostTable", "complete_warm_boot")
            .with_outcome(AuditOutcome::Success)
            .with_details(serde_json::json!({
                "claimed": claimed,
                "unclaimed": orphans.object_count(),
                "purged": purged,
            })));

        Ok(WarmBootSummary {
            claimed,
            orphans,
            purged,
        })
    }
}
