//! Egress objects owned by the host table.

use super::types::{HostTableError, Result};
use crate::warm_boot::WarmBootHostCache;
use hosttable_sai::{EgressConfig, EgressOid, SaiResult, SwitchHw};
use hosttable_types::PortId;
use log::{debug, info};
use std::collections::BTreeSet;

/// A single egress: rewrite-and-forward, drop or punt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Egress {
    id: EgressOid,
    config: EgressConfig,
}

impl Egress {
    /// Wraps an egress that already exists in hardware.
    pub fn new(id: EgressOid, config: EgressConfig) -> Self {
        Self { id, config }
    }

    /// Creates the egress in hardware, reusing a discovered one on warm boot.
    ///
    /// A discovered egress for the same neighbor keeps its id; it is only
    /// rewritten if its programming differs from `config`.
    pub(crate) fn create(
        hw: &dyn SwitchHw,
        warm_boot: &mut dyn WarmBootHostCache,
        config: EgressConfig,
    ) -> Result<Self> {
        if let Some(found) = warm_boot.find_egress(config.vrf, config.ip) {
            if found.config != config {
                hw.set_egress(found.id, &config).map_err(|e| {
                    HostTableError::hardware(format!("failed to reprogram egress {}", found.id), e)
                })?;
                info!("warm boot: reprogrammed egress {} for {}", found.id, config.ip);
            } else {
                debug!("warm boot: reusing egress {} for {}", found.id, config.ip);
            }
            warm_boot.acknowledge_egress(found.id);
            return Ok(Self::new(found.id, config));
        }

        let id = hw.create_egress(&config).map_err(|e| {
            HostTableError::hardware(format!("failed to create egress for {}/{}", config.vrf, config.ip), e)
        })?;
        debug!("created egress {} for {}/{}: {:?}", id, config.vrf, config.ip, config.action);
        Ok(Self::new(id, config))
    }

    /// Reprograms in place. Identical programming issues no hardware write.
    pub(crate) fn program(&mut self, hw: &dyn SwitchHw, config: EgressConfig) -> Result<()> {
        if self.config == config {
            return Ok(());
        }
        hw.set_egress(self.id, &config).map_err(|e| {
            HostTableError::hardware(format!("failed to reprogram egress {}", self.id), e)
        })?;
        debug!("reprogrammed egress {}: {:?}", self.id, config.action);
        self.config = config;
        Ok(())
    }

    pub fn id(&self) -> EgressOid {
        self.id
    }

    pub fn config(&self) -> &EgressConfig {
        &self.config
    }

    pub fn port(&self) -> PortId {
        self.config.action.port()
    }
}

/// An ECMP group over member egresses.
///
/// `paths` is the full ordered member list; `active` is the subset currently
/// installed in hardware. Members whose port is down stay in `paths` so they
/// can be restored when the link comes back.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EcmpEgress {
    id: EgressOid,
    paths: Vec<EgressOid>,
    active: BTreeSet<EgressOid>,
}

impl EcmpEgress {
    pub fn new(id: EgressOid, paths: Vec<EgressOid>) -> Self {
        let active = paths.iter().copied().collect();
        Self { id, paths, active }
    }

    /// Creates the group in hardware, reusing a discovered group on warm boot.
    ///
    /// A reused group keeps the members hardware still has installed; paths
    /// it lost to link-down before the restart start out inactive.
    pub(crate) fn create(
        hw: &dyn SwitchHw,
        warm_boot: &mut dyn WarmBootHostCache,
        paths: Vec<EgressOid>,
    ) -> Result<Self> {
        if let Some(found) = warm_boot.find_ecmp(&paths) {
            let active: BTreeSet<EgressOid> = found.members.iter().copied().collect();
            if active.len() < paths.len() {
                info!(
                    "warm boot: reusing ECMP group {} with {} of {} paths active",
                    found.id,
                    active.len(),
                    paths.len()
                );
            } else {
                debug!("warm boot: reusing ECMP group {} over {:?}", found.id, paths);
            }
            warm_boot.acknowledge_ecmp(found.id);
            return Ok(Self {
                id: found.id,
                paths,
                active,
            });
        }
        let id = hw.create_ecmp(&paths).map_err(|e| {
            HostTableError::hardware(format!("failed to create ECMP group over {:?}", paths), e)
        })?;
        debug!("created ECMP group {} over {:?}", id, paths);
        Ok(Self::new(id, paths))
    }

    pub fn id(&self) -> EgressOid {
        self.id
    }

    pub fn paths(&self) -> &[EgressOid] {
        &self.paths
    }

    pub fn is_active(&self, path: EgressOid) -> bool {
        self.active.contains(&path)
    }

    /// Active members in `paths` order.
    pub fn active_paths(&self) -> Vec<EgressOid> {
        self.paths.iter().copied().filter(|p| self.active.contains(p)).collect()
    }

    /// Puts `path` back into the group. Returns whether hardware changed.
    pub fn path_reachable(&mut self, hw: &dyn SwitchHw, path: EgressOid) -> SaiResult<bool> {
        if !self.paths.contains(&path) || self.active.contains(&path) {
            return Ok(false);
        }
        hw.add_ecmp_member(self.id, path)?;
        self.active.insert(path);
        debug!("ECMP group {}: path {} reachable", self.id, path);
        Ok(true)
    }

    /// Takes `path` out of the group. Returns whether hardware changed.
    ///
    /// A group whose paths are all unreachable stays programmed with no
    /// members until one comes back.
    pub fn path_unreachable(&mut self, hw: &dyn SwitchHw, path: EgressOid) -> SaiResult<bool> {
        if !self.active.contains(&path) {
            return Ok(false);
        }
        hw.remove_ecmp_member(self.id, path)?;
        self.active.remove(&path);
        debug!("ECMP group {}: path {} unreachable", self.id, path);
        Ok(true)
    }
}

/// Tagged egress variant stored in the table's egress registry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EgressObject {
    Simple(Egress),
    Ecmp(EcmpEgress),
}

impl EgressObject {
    pub fn id(&self) -> EgressOid {
        match self {
            EgressObject::Simple(e) => e.id(),
            EgressObject::Ecmp(g) => g.id(),
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            EgressObject::Simple(_) => "egress",
            EgressObject::Ecmp(_) => "ecmp_group",
        }
    }

    pub fn is_ecmp(&self) -> bool {
        matches!(self, EgressObject::Ecmp(_))
    }

    pub fn as_simple(&self) -> Option<&Egress> {
        match self {
            EgressObject::Simple(e) => Some(e),
            EgressObject::Ecmp(_) => None,
        }
    }

    pub fn as_simple_mut(&mut self) -> Option<&mut Egress> {
        match self {
            EgressObject::Simple(e) => Some(e),
            EgressObject::Ecmp(_) => None,
        }
    }

    pub fn as_ecmp(&self) -> Option<&EcmpEgress> {
        match self {
            EgressObject::Ecmp(g) => Some(g),
            EgressObject::Simple(_) => None,
        }
    }

    pub fn as_ecmp_mut(&mut self) -> Option<&mut EcmpEgress> {
        match self {
            EgressObject::Ecmp(g) => Some(g),
            EgressObject::Simple(_) => None,
        }
    }
}
