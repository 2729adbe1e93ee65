//! Reference-counted egress registry and the port -> egress reverse index.

use super::egress::EgressObject;
use crate::audit::{AuditCategory, AuditOutcome, AuditRecord};
use crate::{audit_log, fatal};
use hosttable_common::{RefMap, Release};
use hosttable_sai::{EgressOid, SwitchHw};
use hosttable_types::PortId;
use log::debug;
use std::collections::{BTreeMap, BTreeSet};

/// Registry of every egress object the host table has programmed.
///
/// An ECMP group holds one reference on each of its member egresses for as
/// long as it is registered. The switch-wide drop egress is never registered:
/// references to it are accepted and ignored.
#[derive(Debug)]
pub struct EgressTable {
    drop_id: EgressOid,
    objects: RefMap<EgressOid, EgressObject>,
    port_index: BTreeMap<PortId, BTreeSet<EgressOid>>,
    created: u64,
    destroyed: u64,
}

impl EgressTable {
    pub fn new(drop_id: EgressOid) -> Self {
        Self {
            drop_id,
            objects: RefMap::new(),
            port_index: BTreeMap::new(),
            created: 0,
            destroyed: 0,
        }
    }

    pub fn drop_id(&self) -> EgressOid {
        self.drop_id
    }

    pub fn len(&self) -> usize {
        self.objects.len()
    }

    pub fn is_empty(&self) -> bool {
        self.objects.is_empty()
    }

    pub fn created(&self) -> u64 {
        self.created
    }

    pub fn destroyed(&self) -> u64 {
        self.destroyed
    }

    pub fn get(&self, id: EgressOid) -> Option<&EgressObject> {
        self.objects.get(&id)
    }

    pub fn get_mut(&mut self, id: EgressOid) -> Option<&mut EgressObject> {
        self.objects.get_mut(&id)
    }

    pub fn ref_count(&self, id: EgressOid) -> Option<u32> {
        self.objects.ref_count(&id)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&EgressOid, &EgressObject)> {
        self.objects.iter()
    }

    /// Registers a freshly programmed egress with one reference.
    ///
    /// Registering an id twice is fatal.
    pub fn insert(&mut self, object: EgressObject) {
        let id = object.id();
        if id == self.drop_id || self.objects.contains_key(&id) {
            fatal!("egress {} registered twice", id);
        }
        if let EgressObject::Ecmp(group) = &object {
            for path in group.paths() {
                self.inc_ref(*path);
            }
            audit_log!(AuditRecord::new(AuditCategory::ResourceCreate, "HostTable", "create_ecmp_group")
                .with_outcome(AuditOutcome::Success)
                .with_object_id(id.to_string())
                .with_object_type("ecmp_group")
                .with_details(serde_json::json!({
                    "paths": group.paths().iter().map(|p| p.as_raw()).collect::<Vec<_>>(),
                })));
        }
        debug!("registered {} {}", object.kind(), id);
        if self.objects.insert_new(id, object).is_err() {
            fatal!("egress {} registered twice", id);
        }
        self.created += 1;
    }

    /// Adds a reference to a registered egress.
    ///
    /// Returns `None` for the drop egress. An unregistered id is fatal.
    pub fn inc_ref(&mut self, id: EgressOid) -> Option<&EgressObject> {
        if id == self.drop_id {
            return None;
        }
        if self.objects.increment_ref(&id).is_err() {
            fatal!("reference to unregistered egress {}", id);
        }
        self.objects.get(&id)
    }

    /// Drops a reference, destroying the egress in hardware on the last one.
    ///
    /// Returns the egress if it is still live. An unregistered id is fatal, as
    /// is a hardware failure while destroying.
    pub fn deref(&mut self, hw: &dyn SwitchHw, id: EgressOid) -> Option<&EgressObject> {
        if id == self.drop_id {
            return None;
        }
        match self.objects.decrement_ref(&id) {
            Err(_) => fatal!("dereference of unregistered egress {}", id),
            Ok(Release::Retained(_)) => self.objects.get(&id),
            Ok(Release::Released(object)) => {
                self.destroy(hw, object);
                None
            }
        }
    }

    fn destroy(&mut self, hw: &dyn SwitchHw, object: EgressObject) {
        let id = object.id();
        for ids in self.port_index.values_mut() {
            ids.remove(&id);
        }
        self.port_index.retain(|_, ids| !ids.is_empty());

        match object {
            EgressObject::Simple(egress) => {
                if let Err(e) = hw.remove_egress(id) {
                    fatal!("failed to remove egress {}: {}", id, e);
                }
                debug!("removed egress {} ({:?})", id, egress.config().action);
            }
            EgressObject::Ecmp(group) => {
                if let Err(e) = hw.remove_ecmp(id) {
                    fatal!("failed to remove ECMP group {}: {}", id, e);
                }
                audit_log!(AuditRecord::new(AuditCategory::ResourceDelete, "HostTable", "remove_ecmp_group")
                    .with_outcome(AuditOutcome::Success)
                    .with_object_id(id.to_string())
                    .with_object_type("ecmp_group"));
                for path in group.paths() {
                    self.deref(hw, *path);
                }
            }
        }
        self.destroyed += 1;
    }

    /// Moves `id` from `old_port` to `new_port` in the reverse index.
    ///
    /// `PortId::NONE` is never indexed.
    pub fn update_port_mapping(&mut self, id: EgressOid, old_port: PortId, new_port: PortId) {
        if !old_port.is_none() {
            if let Some(ids) = self.port_index.get_mut(&old_port) {
                ids.remove(&id);
                if ids.is_empty() {
                    self.port_index.remove(&old_port);
                }
            }
        }
        if !new_port.is_none() {
            if !self.objects.contains_key(&id) {
                fatal!("indexing unregistered egress {} on {}", id, new_port);
            }
            self.port_index.entry(new_port).or_default().insert(id);
        }
        debug!("egress {}: port {} -> {}", id, old_port, new_port);
    }

    /// Egress ids currently indexed under `port`, ascending.
    pub fn ids_for_port(&self, port: PortId) -> Vec<EgressOid> {
        self.port_index
            .get(&port)
            .map(|ids| ids.iter().copied().collect())
            .unwrap_or_default()
    }

    pub fn indexed_ports(&self) -> impl Iterator<Item = &PortId> {
        self.port_index.keys()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::host::egress::{EcmpEgress, Egress};
    use hosttable_sai::{EgressApi, EgressConfig, EcmpApi, HwOp, RouterIntfOid, SimSwitch};
    use hosttable_types::VrfId;
    use pretty_assertions::assert_eq;

    fn create(hw: &SimSwitch, addr: &str) -> EgressObject {
        let config = EgressConfig::to_cpu(
            VrfId::DEFAULT,
            addr.parse().unwrap(),
            RouterIntfOid::from_raw_unchecked(4001),
        );
        let id = hw.create_egress(&config).unwrap();
        EgressObject::Simple(Egress::new(id, config))
    }

    #[test]
    fn test_refcount_and_hardware_removal() {
        let hw = SimSwitch::new();
        let mut table = EgressTable::new(hw.drop_egress_id());
        let obj = create(&hw, "10.0.0.1");
        let id = obj.id();
        table.insert(obj);

        assert!(table.inc_ref(id).is_some());
        assert_eq!(table.ref_count(id), Some(2));
        assert!(table.deref(&hw, id).is_some());
        assert_eq!(hw.egress_count(), 1);

        assert!(table.deref(&hw, id).is_none());
        assert!(table.get(id).is_none());
        assert_eq!(hw.egress_count(), 0);
        assert_eq!((table.created(), table.destroyed()), (1, 1));
    }

    #[test]
    fn test_group_holds_member_references() {
        let hw = SimSwitch::new();
        let mut table = EgressTable::new(hw.drop_egress_id());
        let a = create(&hw, "10.0.0.1");
        let b = create(&hw, "10.0.0.2");
        let (a_id, b_id) = (a.id(), b.id());
        table.insert(a);
        table.insert(b);

        let group_id = hw.create_ecmp(&[a_id, b_id]).unwrap();
        table.insert(EgressObject::Ecmp(EcmpEgress::new(group_id, vec![a_id, b_id])));
        assert_eq!(table.ref_count(a_id), Some(2));
        assert_eq!(table.ref_count(b_id), Some(2));

        hw.clear_journal();
        table.deref(&hw, group_id);
        assert_eq!(hw.journal(), vec![HwOp::RemoveEcmp(group_id)]);
        assert_eq!(table.ref_count(a_id), Some(1));
        assert_eq!(table.ref_count(b_id), Some(1));
    }

    #[test]
    fn test_drop_egress_is_not_counted() {
        let hw = SimSwitch::new();
        let mut table = EgressTable::new(hw.drop_egress_id());
        let drop = table.drop_id();
        assert!(table.inc_ref(drop).is_none());
        assert!(table.deref(&hw, drop).is_none());
        assert!(table.is_empty());
        assert_eq!(hw.write_count(), 0);
    }

    #[test]
    fn test_port_index_moves_and_ignores_none() {
        let hw = SimSwitch::new();
        let mut table = EgressTable::new(hw.drop_egress_id());
        let obj = create(&hw, "10.0.0.1");
        let id = obj.id();
        table.insert(obj);

        table.update_port_mapping(id, PortId::NONE, PortId::new(1));
        assert_eq!(table.ids_for_port(PortId::new(1)), vec![id]);

        table.update_port_mapping(id, PortId::new(1), PortId::new(2));
        assert!(table.ids_for_port(PortId::new(1)).is_empty());
        assert_eq!(table.ids_for_port(PortId::new(2)), vec![id]);

        table.update_port_mapping(id, PortId::new(2), PortId::NONE);
        assert_eq!(table.indexed_ports().count(), 0);
        assert!(table.ids_for_port(PortId::NONE).is_empty());
    }

    #[test]
    fn test_destroy_purges_port_index() {
        let hw = SimSwitch::new();
        let mut table = EgressTable::new(hw.drop_egress_id());
        let obj = create(&hw, "10.0.0.1");
        let id = obj.id();
        table.insert(obj);
        table.update_port_mapping(id, PortId::NONE, PortId::new(5));

        table.deref(&hw, id);
        assert!(table.ids_for_port(PortId::new(5)).is_empty());
    }

    #[test]
    #[should_panic(expected = "registered twice")]
    fn test_duplicate_insert_is_fatal() {
        let hw = SimSwitch::new();
        let mut table = EgressTable::new(hw.drop_egress_id());
        let obj = create(&hw, "10.0.0.1");
        table.insert(obj.clone());
        table.insert(obj);
    }

    #[test]
    #[should_panic(expected = "unregistered egress")]
    fn test_deref_unknown_is_fatal() {
        let hw = SimSwitch::new();
        let mut table = EgressTable::new(hw.drop_egress_id());
        table.deref(&hw, EgressOid::from_raw_unchecked(123));
    }
}
