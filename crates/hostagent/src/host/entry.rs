//! L3 host entries.

use super::egress::{Egress, EgressObject};
use super::egress_table::EgressTable;
use super::types::{ForwardAction, HostKey, HostTableError, Result};
use crate::audit::{AuditCategory, AuditOutcome, AuditRecord};
use crate::warm_boot::WarmBootHostCache;
use crate::{audit_log, fatal};
use hosttable_sai::{EgressConfig, EgressOid, L3HostEntry, RouterIntfOid, SwitchHw};
use hosttable_types::{MacAddress, PortId, VrfId};
use log::debug;
use std::net::IpAddr;

/// The pieces of the table a host entry needs while it programs hardware.
pub(crate) struct HwContext<'a> {
    pub hw: &'a dyn SwitchHw,
    pub warm_boot: &'a mut dyn WarmBootHostCache,
    pub egresses: &'a mut EgressTable,
}

/// One exact-match (vrf, ip) entry in the ASIC's L3 host table.
///
/// The entry owns one reference on its egress from the moment the egress is
/// assigned. It is resident in hardware iff `is_programmed()`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HostEntry {
    key: HostKey,
    egress_id: Option<EgressOid>,
    port: PortId,
    programmed: bool,
    multipath: bool,
}

impl HostEntry {
    pub(crate) fn new(key: HostKey) -> Self {
        Self {
            key,
            egress_id: None,
            port: PortId::NONE,
            programmed: false,
            multipath: false,
        }
    }

    /// Binds a new entry to an egress the caller already holds a reference on
    /// and adds it to hardware.
    pub(crate) fn with_egress(
        ctx: &mut HwContext<'_>,
        key: HostKey,
        egress_id: EgressOid,
        multipath: bool,
    ) -> Result<Self> {
        let mut entry = Self::new(key);
        entry.egress_id = Some(egress_id);
        entry.add_to_hw(ctx, multipath)?;
        Ok(entry)
    }

    pub fn key(&self) -> HostKey {
        self.key
    }

    pub fn vrf(&self) -> VrfId {
        self.key.vrf
    }

    pub fn ip(&self) -> IpAddr {
        self.key.ip
    }

    pub fn egress_id(&self) -> Option<EgressOid> {
        self.egress_id
    }

    /// Physical port of the last forward programming, `PortId::NONE` otherwise.
    pub fn port(&self) -> PortId {
        self.port
    }

    pub fn is_programmed(&self) -> bool {
        self.programmed
    }

    pub fn is_multipath(&self) -> bool {
        self.multipath
    }

    /// Points the entry at a rewrite-and-forward egress when `mac` is known,
    /// otherwise at a drop or punt egress per `action`.
    ///
    /// The first call creates the egress and adds the host to hardware; later
    /// calls reprogram the same egress in place. If the hardware add fails,
    /// an egress created by the same call is released again.
    pub(crate) fn program(
        &mut self,
        ctx: &mut HwContext<'_>,
        intf: RouterIntfOid,
        mac: Option<MacAddress>,
        port: PortId,
        action: ForwardAction,
    ) -> Result<()> {
        let (vrf, ip) = (self.key.vrf, self.key.ip);
        let config = match (mac, action) {
            (Some(mac), _) => EgressConfig::forward(vrf, ip, intf, mac, port),
            (None, ForwardAction::Drop) => EgressConfig::drop(vrf, ip, intf),
            (None, ForwardAction::ToCpu) => EgressConfig::to_cpu(vrf, ip, intf),
        };

        let (egress_id, created) = match self.egress_id {
            None => {
                let egress = Egress::create(ctx.hw, &mut *ctx.warm_boot, config)?;
                let id = egress.id();
                ctx.egresses.insert(EgressObject::Simple(egress));
                self.egress_id = Some(id);
                (id, true)
            }
            Some(id) => {
                let Some(object) = ctx.egresses.get_mut(id) else {
                    fatal!("host {} refers to unregistered egress {}", self.key, id);
                };
                let Some(egress) = object.as_simple_mut() else {
                    fatal!("host {} egress {} is not a simple egress", self.key, id);
                };
                egress.program(ctx.hw, config)?;
                (id, false)
            }
        };

        if !self.programmed {
            if let Err(e) = self.add_to_hw(ctx, false) {
                // An egress created by this call must not outlive the failed add.
                if created {
                    self.egress_id = None;
                    ctx.egresses.deref(ctx.hw, egress_id);
                }
                return Err(e);
            }
        }

        ctx.egresses.update_port_mapping(egress_id, self.port, port);
        self.port = port;
        Ok(())
    }

    /// Adds the host to hardware, or claims the entry warm boot left behind.
    fn add_to_hw(&mut self, ctx: &mut HwContext<'_>, multipath: bool) -> Result<()> {
        if self.programmed {
            return Ok(());
        }
        let Some(egress_id) = self.egress_id else {
            fatal!("host {} added to hardware without an egress", self.key);
        };
        let (vrf, ip) = (self.key.vrf, self.key.ip);
        let entry = L3HostEntry::new(vrf, ip, egress_id, multipath);

        match ctx.warm_boot.find_host(vrf, ip) {
            Some(existing) if existing.matches(&entry) => {
                debug!("warm boot: host {} already programmed", entry);
                ctx.warm_boot.acknowledge_host(vrf, ip);
            }
            Some(existing) => {
                fatal!("warm boot: host {} found as [{}], expected [{}]", self.key, existing, entry);
            }
            None => {
                ctx.hw.add_host(&entry).map_err(|e| {
                    audit_log!(AuditRecord::new(AuditCategory::ResourceCreate, "HostTable", "add_host")
                        .with_object_id(self.key.to_string())
                        .with_object_type("l3_host")
                        .with_error(e.to_string()));
                    HostTableError::hardware(format!("failed to add L3 host {}", self.key), e)
                })?;
                debug!("added host {}", entry);
                audit_log!(AuditRecord::new(AuditCategory::ResourceCreate, "HostTable", "add_host")
                    .with_outcome(AuditOutcome::Success)
                    .with_object_id(self.key.to_string())
                    .with_object_type("l3_host")
                    .with_details(serde_json::json!({
                        "egress": egress_id.as_raw(),
                        "multipath": multipath,
                    })));
            }
        }

        self.programmed = true;
        self.multipath = multipath;
        Ok(())
    }

    /// Removes the entry from hardware and releases its egress reference.
    ///
    /// A hardware failure here is fatal.
    pub(crate) fn teardown(self, hw: &dyn SwitchHw, egresses: &mut EgressTable) {
        if self.programmed {
            if let Some(egress_id) = self.egress_id {
                let entry = L3HostEntry::new(self.key.vrf, self.key.ip, egress_id, self.multipath);
                if let Err(e) = hw.remove_host(&entry) {
                    fatal!("failed to remove L3 host {}: {}", self.key, e);
                }
                debug!("removed host {}", entry);
                audit_log!(AuditRecord::new(AuditCategory::ResourceDelete, "HostTable", "remove_host")
                    .with_outcome(AuditOutcome::Success)
                    .with_object_id(self.key.to_string())
                    .with_object_type("l3_host"));
            }
        }
        if let Some(egress_id) = self.egress_id {
            egresses.deref(hw, egress_id);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::warm_boot::{ColdBoot, WarmBootCache};
    use hosttable_sai::{HwDump, HwOp, SaiStatus, SimSwitch};
    use pretty_assertions::assert_eq;

    fn key(addr: &str) -> HostKey {
        HostKey::new(VrfId::DEFAULT, addr.parse().unwrap())
    }

    fn rif() -> RouterIntfOid {
        RouterIntfOid::from_raw_unchecked(4001)
    }

    fn mac() -> MacAddress {
        "02:00:00:00:00:01".parse().unwrap()
    }

    #[test]
    fn test_first_program_adds_host_once() {
        let hw = SimSwitch::new();
        let mut egresses = EgressTable::new(hw.drop_egress_id());
        let mut warm_boot = ColdBoot;
        let mut ctx = HwContext {
            hw: &hw,
            warm_boot: &mut warm_boot,
            egresses: &mut egresses,
        };

        let mut host = HostEntry::new(key("10.0.0.1"));
        host.program(&mut ctx, rif(), None, PortId::NONE, ForwardAction::ToCpu).unwrap();
        assert!(host.is_programmed());
        let egress_id = host.egress_id().unwrap();

        host.program(&mut ctx, rif(), Some(mac()), PortId::new(3), ForwardAction::ToCpu)
            .unwrap();
        assert_eq!(host.egress_id(), Some(egress_id));
        assert_eq!(host.port(), PortId::new(3));

        let adds = hw
            .journal()
            .into_iter()
            .filter(|op| matches!(op, HwOp::AddHost(_)))
            .count();
        assert_eq!(adds, 1);
        assert_eq!(ctx.egresses.ids_for_port(PortId::new(3)), vec![egress_id]);
    }

    #[test]
    fn test_add_failure_releases_new_egress_and_skips_index() {
        let hw = SimSwitch::new();
        hw.fail_host_add("10.0.0.1".parse().unwrap(), SaiStatus::TableFull);
        let mut egresses = EgressTable::new(hw.drop_egress_id());
        let mut warm_boot = ColdBoot;
        let mut ctx = HwContext {
            hw: &hw,
            warm_boot: &mut warm_boot,
            egresses: &mut egresses,
        };

        let mut host = HostEntry::new(key("10.0.0.1"));
        let err = host
            .program(&mut ctx, rif(), Some(mac()), PortId::new(1), ForwardAction::ToCpu)
            .unwrap_err();
        assert_eq!(err.hw_status(), Some(SaiStatus::TableFull));
        assert!(err.to_string().contains("10.0.0.1"));
        assert!(!host.is_programmed());
        assert_eq!(host.egress_id(), None);
        assert!(ctx.egresses.ids_for_port(PortId::new(1)).is_empty());
        assert!(ctx.egresses.is_empty());
        assert_eq!(hw.egress_count(), 0);

        hw.clear_faults();
        host.program(&mut ctx, rif(), Some(mac()), PortId::new(1), ForwardAction::ToCpu)
            .unwrap();
        assert!(host.is_programmed());
        assert_eq!(hw.egress_count(), 1);

        host.teardown(&hw, &mut egresses);
        assert!(egresses.is_empty());
        assert_eq!(hw.egress_count(), 0);
    }

    #[test]
    fn test_teardown_removes_host_before_egress() {
        let hw = SimSwitch::new();
        let mut egresses = EgressTable::new(hw.drop_egress_id());
        let mut warm_boot = ColdBoot;
        let mut host = HostEntry::new(key("10.0.0.1"));
        host.program(
            &mut HwContext {
                hw: &hw,
                warm_boot: &mut warm_boot,
                egresses: &mut egresses,
            },
            rif(),
            Some(mac()),
            PortId::new(1),
            ForwardAction::ToCpu,
        )
        .unwrap();
        let egress_id = host.egress_id().unwrap();
        hw.clear_journal();

        host.teardown(&hw, &mut egresses);
        let journal = hw.journal();
        assert_eq!(journal.len(), 2);
        assert!(matches!(journal[0], HwOp::RemoveHost(_)));
        assert_eq!(journal[1], HwOp::RemoveEgress(egress_id));
        assert!(egresses.ids_for_port(PortId::new(1)).is_empty());
    }

    #[test]
    fn test_warm_boot_match_is_claimed_without_write() {
        let hw = SimSwitch::new();
        let mut cold = ColdBoot;
        let mut egresses = EgressTable::new(hw.drop_egress_id());
        let mut host = HostEntry::new(key("10.0.0.1"));
        host.program(
            &mut HwContext {
                hw: &hw,
                warm_boot: &mut cold,
                egresses: &mut egresses,
            },
            rif(),
            None,
            PortId::NONE,
            ForwardAction::ToCpu,
        )
        .unwrap();

        let restarted = SimSwitch::restore(hw.snapshot());
        let mut cache = WarmBootCache::from_dump(restarted.dump());
        let mut egresses = EgressTable::new(restarted.drop_egress_id());
        let mut host = HostEntry::new(key("10.0.0.1"));
        host.program(
            &mut HwContext {
                hw: &restarted,
                warm_boot: &mut cache,
                egresses: &mut egresses,
            },
            rif(),
            None,
            PortId::NONE,
            ForwardAction::ToCpu,
        )
        .unwrap();

        assert!(host.is_programmed());
        assert_eq!(restarted.write_count(), 0);
        assert_eq!(cache.claimed(), 2);
        assert!(cache.unclaimed().is_empty());
    }

    #[test]
    #[should_panic(expected = "warm boot: host vrf0/10.0.0.1 found as")]
    fn test_warm_boot_mismatch_is_fatal() {
        let hw = SimSwitch::new();
        let stale = EgressOid::from_raw_unchecked(100_077);
        let mut cache = WarmBootCache::from_dump(HwDump {
            hosts: vec![L3HostEntry::new(VrfId::DEFAULT, "10.0.0.1".parse().unwrap(), stale, false)],
            ..HwDump::default()
        });
        let mut egresses = EgressTable::new(hw.drop_egress_id());
        let mut host = HostEntry::new(key("10.0.0.1"));
        let _ = host.program(
            &mut HwContext {
                hw: &hw,
                warm_boot: &mut cache,
                egresses: &mut egresses,
            },
            rif(),
            None,
            PortId::NONE,
            ForwardAction::Drop,
        );
    }
}
