//! In-memory ASIC model implementing [`SwitchHw`].
//!
//! Enforces the same referential rules a real forwarding pipeline does: a host
//! entry can only point at an existing egress, an egress cannot be freed while
//! a host or group still points at it, and a group cannot be freed while a
//! host points at it. Every successful write is appended to a journal so
//! callers can assert on exact hardware activity, and individual operations
//! can be made to fail for fault-injection tests.

use crate::api::{
    DiscoveredEcmp, DiscoveredEgress, EcmpApi, EgressApi, EgressConfig, HostApi, HwDump,
    L3HostEntry, SwitchHw,
};
use crate::error::{SaiError, SaiResult, SaiStatus};
use crate::types::{EgressOid, RawSaiObjectId};
use hosttable_types::VrfId;
use log::debug;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::net::IpAddr;

/// Raw id of the switch-wide drop egress.
pub const DROP_EGRESS_RAW: RawSaiObjectId = 100_000;
const FIRST_EGRESS_RAW: RawSaiObjectId = 100_001;
const FIRST_ECMP_RAW: RawSaiObjectId = 200_000;

/// One successful hardware write.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HwOp {
    AddHost(L3HostEntry),
    RemoveHost(L3HostEntry),
    CreateEgress { id: EgressOid, config: EgressConfig },
    SetEgress { id: EgressOid, config: EgressConfig },
    RemoveEgress(EgressOid),
    CreateEcmp { id: EgressOid, members: Vec<EgressOid> },
    AddEcmpMember { ecmp: EgressOid, member: EgressOid },
    RemoveEcmpMember { ecmp: EgressOid, member: EgressOid },
    RemoveEcmp(EgressOid),
}

#[derive(Debug)]
struct Tables {
    hosts: BTreeMap<(VrfId, IpAddr), L3HostEntry>,
    egresses: BTreeMap<EgressOid, EgressConfig>,
    ecmps: BTreeMap<EgressOid, Vec<EgressOid>>,
    next_egress: RawSaiObjectId,
    next_ecmp: RawSaiObjectId,
}

impl Default for Tables {
    fn default() -> Self {
        Self {
            hosts: BTreeMap::new(),
            egresses: BTreeMap::new(),
            ecmps: BTreeMap::new(),
            next_egress: FIRST_EGRESS_RAW,
            next_ecmp: FIRST_ECMP_RAW,
        }
    }
}

impl Tables {
    fn egress_exists(&self, id: EgressOid) -> bool {
        id.as_raw() == DROP_EGRESS_RAW || self.egresses.contains_key(&id) || self.ecmps.contains_key(&id)
    }

    fn referenced_by_host(&self, id: EgressOid) -> bool {
        self.hosts.values().any(|h| h.egress == id)
    }

    fn referenced_by_group(&self, id: EgressOid) -> bool {
        self.ecmps.values().any(|members| members.contains(&id))
    }
}

#[derive(Debug, Default)]
struct Faults {
    egress_create: HashMap<IpAddr, SaiStatus>,
    host_add: HashMap<IpAddr, SaiStatus>,
    host_remove: HashMap<IpAddr, SaiStatus>,
    ecmp_create: Option<SaiStatus>,
}

/// Persistable image of the model: table contents plus allocator positions.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SimSnapshot {
    pub dump: HwDump,
    pub next_egress: RawSaiObjectId,
    pub next_ecmp: RawSaiObjectId,
}

/// In-memory forwarding ASIC.
#[derive(Debug, Default)]
pub struct SimSwitch {
    tables: Mutex<Tables>,
    journal: Mutex<Vec<HwOp>>,
    faults: Mutex<Faults>,
    egress_capacity: Option<usize>,
}

impl SimSwitch {
    pub fn new() -> Self {
        Self::default()
    }

    /// Limits the number of single egress objects; creation beyond it fails with `TableFull`.
    pub fn with_egress_capacity(mut self, capacity: usize) -> Self {
        self.egress_capacity = Some(capacity);
        self
    }

    /// Rebuilds a switch whose tables already hold `snapshot`, as after a warm restart.
    pub fn restore(snapshot: SimSnapshot) -> Self {
        let mut tables = Tables {
            next_egress: snapshot.next_egress.max(FIRST_EGRESS_RAW),
            next_ecmp: snapshot.next_ecmp.max(FIRST_ECMP_RAW),
            ..Tables::default()
        };
        for host in snapshot.dump.hosts {
            tables.hosts.insert((host.vrf, host.ip), host);
        }
        for egress in snapshot.dump.egresses {
            tables.egresses.insert(egress.id, egress.config);
        }
        for ecmp in snapshot.dump.ecmps {
            tables.ecmps.insert(ecmp.id, ecmp.members);
        }
        Self {
            tables: Mutex::new(tables),
            ..Self::default()
        }
    }

    pub fn snapshot(&self) -> SimSnapshot {
        let tables = self.tables.lock();
        SimSnapshot {
            dump: Self::dump_tables(&tables),
            next_egress: tables.next_egress,
            next_ecmp: tables.next_ecmp,
        }
    }

    /// Every successful write since creation or the last [`clear_journal`](Self::clear_journal).
    pub fn journal(&self) -> Vec<HwOp> {
        self.journal.lock().clone()
    }

    pub fn clear_journal(&self) {
        self.journal.lock().clear();
    }

    pub fn write_count(&self) -> usize {
        self.journal.lock().len()
    }

    pub fn host(&self, vrf: VrfId, ip: IpAddr) -> Option<L3HostEntry> {
        self.tables.lock().hosts.get(&(vrf, ip)).copied()
    }

    pub fn egress(&self, id: EgressOid) -> Option<EgressConfig> {
        self.tables.lock().egresses.get(&id).copied()
    }

    pub fn ecmp_members(&self, id: EgressOid) -> Option<Vec<EgressOid>> {
        self.tables.lock().ecmps.get(&id).cloned()
    }

    pub fn host_count(&self) -> usize {
        self.tables.lock().hosts.len()
    }

    pub fn egress_count(&self) -> usize {
        self.tables.lock().egresses.len()
    }

    pub fn ecmp_count(&self) -> usize {
        self.tables.lock().ecmps.len()
    }

    pub fn fail_egress_create(&self, ip: IpAddr, status: SaiStatus) {
        self.faults.lock().egress_create.insert(ip, status);
    }

    pub fn fail_host_add(&self, ip: IpAddr, status: SaiStatus) {
        self.faults.lock().host_add.insert(ip, status);
    }

    pub fn fail_host_remove(&self, ip: IpAddr, status: SaiStatus) {
        self.faults.lock().host_remove.insert(ip, status);
    }

    pub fn fail_ecmp_create(&self, status: SaiStatus) {
        self.faults.lock().ecmp_create = Some(status);
    }

    pub fn clear_faults(&self) {
        *self.faults.lock() = Faults::default();
    }

    fn injected(&self, pick: impl FnOnce(&Faults) -> Option<SaiStatus>) -> SaiResult<()> {
        match pick(&*self.faults.lock()) {
            Some(status) => Err(SaiError::from_status(status)),
            None => Ok(()),
        }
    }

    fn record(&self, op: HwOp) {
        debug!("sim: {:?}", op);
        self.journal.lock().push(op);
    }

    fn dump_tables(tables: &Tables) -> HwDump {
        HwDump {
            hosts: tables.hosts.values().copied().collect(),
            egresses: tables
                .egresses
                .iter()
                .map(|(id, config)| DiscoveredEgress {
                    id: *id,
                    config: *config,
                })
                .collect(),
            ecmps: tables
                .ecmps
                .iter()
                .map(|(id, members)| DiscoveredEcmp {
                    id: *id,
                    members: members.clone(),
                })
                .collect(),
        }
    }
}

impl HostApi for SimSwitch {
    fn add_host(&self, entry: &L3HostEntry) -> SaiResult<()> {
        self.injected(|f| f.host_add.get(&entry.ip).copied())?;
        {
            let mut tables = self.tables.lock();
            if tables.hosts.contains_key(&(entry.vrf, entry.ip)) {
                return Err(SaiError::already_exists(format!("host {}/{}", entry.vrf, entry.ip)));
            }
            if !tables.egress_exists(entry.egress) {
                return Err(SaiError::invalid_parameter(format!(
                    "host {} references unknown egress {}",
                    entry.ip, entry.egress
                )));
            }
            if entry.multipath != tables.ecmps.contains_key(&entry.egress) {
                return Err(SaiError::invalid_parameter(format!(
                    "host {} multipath flag does not match egress {}",
                    entry.ip, entry.egress
                )));
            }
            tables.hosts.insert((entry.vrf, entry.ip), *entry);
        }
        self.record(HwOp::AddHost(*entry));
        Ok(())
    }

    fn remove_host(&self, entry: &L3HostEntry) -> SaiResult<()> {
        self.injected(|f| f.host_remove.get(&entry.ip).copied())?;
        let removed = self
            .tables
            .lock()
            .hosts
            .remove(&(entry.vrf, entry.ip))
            .ok_or_else(|| SaiError::not_found(format!("host {}/{}", entry.vrf, entry.ip)))?;
        self.record(HwOp::RemoveHost(removed));
        Ok(())
    }
}

impl EgressApi for SimSwitch {
    fn create_egress(&self, config: &EgressConfig) -> SaiResult<EgressOid> {
        self.injected(|f| f.egress_create.get(&config.ip).copied())?;
        let id = {
            let mut tables = self.tables.lock();
            if let Some(capacity) = self.egress_capacity {
                if tables.egresses.len() >= capacity {
                    return Err(SaiError::table_full("egress"));
                }
            }
            let id = EgressOid::from_raw_unchecked(tables.next_egress);
            tables.next_egress += 1;
            tables.egresses.insert(id, *config);
            id
        };
        self.record(HwOp::CreateEgress { id, config: *config });
        Ok(id)
    }

    fn set_egress(&self, id: EgressOid, config: &EgressConfig) -> SaiResult<()> {
        {
            let mut tables = self.tables.lock();
            let slot = tables
                .egresses
                .get_mut(&id)
                .ok_or_else(|| SaiError::not_found(format!("egress {}", id)))?;
            *slot = *config;
        }
        self.record(HwOp::SetEgress { id, config: *config });
        Ok(())
    }

    fn remove_egress(&self, id: EgressOid) -> SaiResult<()> {
        {
            let mut tables = self.tables.lock();
            if !tables.egresses.contains_key(&id) {
                return Err(SaiError::not_found(format!("egress {}", id)));
            }
            if tables.referenced_by_host(id) || tables.referenced_by_group(id) {
                return Err(SaiError::object_in_use(format!("egress {}", id)));
            }
            tables.egresses.remove(&id);
        }
        self.record(HwOp::RemoveEgress(id));
        Ok(())
    }
}

impl EcmpApi for SimSwitch {
    fn create_ecmp(&self, members: &[EgressOid]) -> SaiResult<EgressOid> {
        self.injected(|f| f.ecmp_create)?;
        let id = {
            let mut tables = self.tables.lock();
            if members.is_empty() {
                return Err(SaiError::invalid_parameter("ECMP group with no members"));
            }
            if let Some(missing) = members.iter().find(|m| !tables.egresses.contains_key(*m)) {
                return Err(SaiError::invalid_parameter(format!(
                    "ECMP member {} is not an egress object",
                    missing
                )));
            }
            let id = EgressOid::from_raw_unchecked(tables.next_ecmp);
            tables.next_ecmp += 1;
            tables.ecmps.insert(id, members.to_vec());
            id
        };
        self.record(HwOp::CreateEcmp {
            id,
            members: members.to_vec(),
        });
        Ok(id)
    }

    fn add_ecmp_member(&self, ecmp: EgressOid, member: EgressOid) -> SaiResult<()> {
        {
            let mut tables = self.tables.lock();
            if !tables.egresses.contains_key(&member) {
                return Err(SaiError::invalid_parameter(format!(
                    "ECMP member {} is not an egress object",
                    member
                )));
            }
            let members = tables
                .ecmps
                .get_mut(&ecmp)
                .ok_or_else(|| SaiError::not_found(format!("ecmp {}", ecmp)))?;
            if members.contains(&member) {
                return Err(SaiError::already_exists(format!("member {} of ecmp {}", member, ecmp)));
            }
            members.push(member);
        }
        self.record(HwOp::AddEcmpMember { ecmp, member });
        Ok(())
    }

    fn remove_ecmp_member(&self, ecmp: EgressOid, member: EgressOid) -> SaiResult<()> {
        {
            let mut tables = self.tables.lock();
            let members = tables
                .ecmps
                .get_mut(&ecmp)
                .ok_or_else(|| SaiError::not_found(format!("ecmp {}", ecmp)))?;
            let pos = members
                .iter()
                .position(|m| *m == member)
                .ok_or_else(|| SaiError::not_found(format!("member {} of ecmp {}", member, ecmp)))?;
            members.remove(pos);
        }
        self.record(HwOp::RemoveEcmpMember { ecmp, member });
        Ok(())
    }

    fn remove_ecmp(&self, ecmp: EgressOid) -> SaiResult<()> {
        {
            let mut tables = self.tables.lock();
            if !tables.ecmps.contains_key(&ecmp) {
                return Err(SaiError::not_found(format!("ecmp {}", ecmp)));
            }
            if tables.referenced_by_host(ecmp) {
                return Err(SaiError::object_in_use(format!("ecmp {}", ecmp)));
            }
            tables.ecmps.remove(&ecmp);
        }
        self.record(HwOp::RemoveEcmp(ecmp));
        Ok(())
    }
}

impl SwitchHw for SimSwitch {
    fn drop_egress_id(&self) -> EgressOid {
        EgressOid::from_raw_unchecked(DROP_EGRESS_RAW)
    }

    fn dump(&self) -> HwDump {
        Self::dump_tables(&self.tables.lock())
    }
}
