//! Resolution of software L3 interfaces to hardware router interfaces.

use hosttable_sai::RouterIntfOid;
use hosttable_types::InterfaceId;
use parking_lot::RwLock;
use std::collections::BTreeMap;

/// Looks up the router interface programmed for an L3 interface.
pub trait InterfaceResolver: Send + Sync {
    fn router_interface(&self, intf: InterfaceId) -> Option<RouterIntfOid>;
}

/// Interface table maintained by whoever programs router interfaces.
#[derive(Debug, Default)]
pub struct StaticInterfaceMap {
    interfaces: RwLock<BTreeMap<InterfaceId, RouterIntfOid>>,
}

impl StaticInterfaceMap {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, intf: InterfaceId, rif: RouterIntfOid) -> Option<RouterIntfOid> {
        self.interfaces.write().insert(intf, rif)
    }

    pub fn remove(&self, intf: InterfaceId) -> Option<RouterIntfOid> {
        self.interfaces.write().remove(&intf)
    }

    pub fn len(&self) -> usize {
        self.interfaces.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.interfaces.read().is_empty()
    }
}

impl FromIterator<(InterfaceId, RouterIntfOid)> for StaticInterfaceMap {
    fn from_iter<I: IntoIterator<Item = (InterfaceId, RouterIntfOid)>>(iter: I) -> Self {
        Self {
            interfaces: RwLock::new(iter.into_iter().collect()),
        }
    }
}

impl InterfaceResolver for StaticInterfaceMap {
    fn router_interface(&self, intf: InterfaceId) -> Option<RouterIntfOid> {
        self.interfaces.read().get(&intf).copied()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lookup() {
        let map: StaticInterfaceMap = [(InterfaceId::new(10), RouterIntfOid::from_raw_unchecked(4010))]
            .into_iter()
            .collect();
        assert_eq!(
            map.router_interface(InterfaceId::new(10)),
            Some(RouterIntfOid::from_raw_unchecked(4010))
        );
        assert_eq!(map.router_interface(InterfaceId::new(11)), None);

        map.insert(InterfaceId::new(11), RouterIntfOid::from_raw_unchecked(4011));
        assert_eq!(map.len(), 2);
        map.remove(InterfaceId::new(10));
        assert_eq!(map.router_interface(InterfaceId::new(10)), None);
    }
}
