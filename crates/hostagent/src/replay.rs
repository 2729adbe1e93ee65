//! Scenario replay against a host table.
//!
//! A scenario is a JSON document listing router interfaces and an ordered
//! list of steps (neighbor programming, ECMP routes, host routes, link
//! events, withdrawals). The replayer owns one reference for every neighbor
//! and route it has added, so withdrawing releases exactly what the scenario
//! acquired.

use crate::host::{EcmpHostKey, ForwardAction, HostKey, HostTable, HostTableError, StaticInterfaceMap};
use hosttable_sai::{RouterIntfOid, SimSnapshot};
use hosttable_types::{InterfaceId, MacAddress, NextHopSet, PortId, VrfId};
use log::{debug, info};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fs;
use std::net::IpAddr;
use std::path::Path;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ReplayError {
    #[error("IO error on {path}: {source}")]
    Io {
        path: String,
        source: std::io::Error,
    },

    #[error("Invalid JSON in {path}: {source}")]
    Json {
        path: String,
        source: serde_json::Error,
    },

    #[error("Step {step}: {source}")]
    Table {
        step: usize,
        source: HostTableError,
    },

    #[error("Step {step}: {message}")]
    InvalidStep { step: usize, message: String },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InterfaceBinding {
    pub intf: InterfaceId,
    pub router_interface: RouterIntfOid,
}

fn default_action() -> ForwardActionName {
    ForwardActionName::ToCpu
}

/// Serialized form of [`ForwardAction`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ForwardActionName {
    Drop,
    ToCpu,
}

impl From<ForwardActionName> for ForwardAction {
    fn from(name: ForwardActionName) -> Self {
        match name {
            ForwardActionName::Drop => ForwardAction::Drop,
            ForwardActionName::ToCpu => ForwardAction::ToCpu,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum Step {
    /// Resolve (or re-resolve) a neighbor.
    Neighbor {
        #[serde(default)]
        vrf: VrfId,
        ip: IpAddr,
        intf: InterfaceId,
        #[serde(default)]
        mac: Option<MacAddress>,
        #[serde(default)]
        port: PortId,
        #[serde(default = "default_action")]
        action: ForwardActionName,
    },
    /// Add a multi-path route over `nexthops`.
    Route {
        #[serde(default)]
        vrf: VrfId,
        nexthops: NextHopSet,
    },
    /// Add a host route for `ip` pointing at the egress of `nexthops`.
    HostRoute {
        #[serde(default)]
        vrf: VrfId,
        ip: IpAddr,
        nexthops: NextHopSet,
    },
    Link { port: PortId, up: bool },
    WithdrawNeighbor {
        #[serde(default)]
        vrf: VrfId,
        ip: IpAddr,
    },
    WithdrawRoute {
        #[serde(default)]
        vrf: VrfId,
        nexthops: NextHopSet,
    },
    WithdrawHostRoute {
        #[serde(default)]
        vrf: VrfId,
        ip: IpAddr,
    },
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Scenario {
    #[serde(default)]
    pub interfaces: Vec<InterfaceBinding>,
    #[serde(default)]
    pub steps: Vec<Step>,
}

impl Scenario {
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ReplayError> {
        let path = path.as_ref();
        let content = fs::read_to_string(path).map_err(|source| ReplayError::Io {
            path: path.display().to_string(),
            source,
        })?;
        serde_json::from_str(&content).map_err(|source| ReplayError::Json {
            path: path.display().to_string(),
            source,
        })
    }

    pub fn interface_map(&self) -> StaticInterfaceMap {
        self.interfaces
            .iter()
            .map(|b| (b.intf, b.router_interface))
            .collect()
    }
}

/// Applies scenario steps and tracks the references they hold.
#[derive(Debug, Default)]
pub struct Replayer {
    neighbors: BTreeSet<HostKey>,
    routes: BTreeSet<EcmpHostKey>,
    host_routes: BTreeMap<HostKey, EcmpHostKey>,
    applied: usize,
}

impl Replayer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn applied(&self) -> usize {
        self.applied
    }

    pub fn run(&mut self, table: &mut HostTable, steps: &[Step]) -> Result<(), ReplayError> {
        for (index, step) in steps.iter().enumerate() {
            self.apply(table, index, step)?;
        }
        info!("replayed {} steps", steps.len());
        Ok(())
    }

    pub fn apply(&mut self, table: &mut HostTable, index: usize, step: &Step) -> Result<(), ReplayError> {
        let table_err = |source| ReplayError::Table { step: index, source };
        debug!("step {}: {:?}", index, step);

        match step {
            Step::Neighbor {
                vrf,
                ip,
                intf,
                mac,
                port,
                action,
            } => {
                let key = HostKey::new(*vrf, *ip);
                let newly_held = self.neighbors.insert(key);
                if newly_held {
                    table.acquire_host(*vrf, *ip);
                }
                if let Err(e) = table.program_host(*vrf, *ip, *intf, *mac, *port, (*action).into()) {
                    if newly_held {
                        self.neighbors.remove(&key);
                        table.release_host(*vrf, *ip);
                    }
                    return Err(table_err(e));
                }
            }
            Step::Route { vrf, nexthops } => {
                let key = EcmpHostKey::new(*vrf, nexthops.clone());
                if self.routes.contains(&key) {
                    return Err(ReplayError::InvalidStep {
                        step: index,
                        message: format!("route {} already added", key),
                    });
                }
                table.acquire_ecmp_host(*vrf, nexthops).map_err(table_err)?;
                self.routes.insert(key);
            }
            Step::HostRoute { vrf, ip, nexthops } => {
                let key = HostKey::new(*vrf, *ip);
                if self.host_routes.contains_key(&key) || self.neighbors.contains(&key) {
                    return Err(ReplayError::InvalidStep {
                        step: index,
                        message: format!("host {} already in use", key),
                    });
                }
                let egress = table.acquire_ecmp_host(*vrf, nexthops).map_err(table_err)?.egress_id();
                if let Err(e) = table.acquire_host_with_egress(*vrf, *ip, egress) {
                    table.release_ecmp_host(*vrf, nexthops);
                    return Err(table_err(e));
                }
                self.host_routes
                    .insert(key, EcmpHostKey::new(*vrf, nexthops.clone()));
            }
            Step::Link { port, up } => {
                table.link_state_changed(*port, *up).map_err(table_err)?;
            }
            Step::WithdrawNeighbor { vrf, ip } => {
                if !self.neighbors.remove(&HostKey::new(*vrf, *ip)) {
                    return Err(not_held(index, "neighbor", HostKey::new(*vrf, *ip)));
                }
                table.release_host(*vrf, *ip);
            }
            Step::WithdrawRoute { vrf, nexthops } => {
                let key = EcmpHostKey::new(*vrf, nexthops.clone());
                if !self.routes.remove(&key) {
                    return Err(not_held(index, "route", key));
                }
                table.release_ecmp_host(*vrf, nexthops);
            }
            Step::WithdrawHostRoute { vrf, ip } => {
                let key = HostKey::new(*vrf, *ip);
                let Some(route) = self.host_routes.remove(&key) else {
                    return Err(not_held(index, "host route", key));
                };
                table.release_host(*vrf, *ip);
                table.release_ecmp_host(route.vrf, &route.nexthops);
            }
        }
        self.applied += 1;
        Ok(())
    }
}

fn not_held(step: usize, what: &str, key: impl std::fmt::Display) -> ReplayError {
    ReplayError::InvalidStep {
        step,
        message: format!("{} {} was never added", what, key),
    }
}

/// Reads a saved hardware image; `None` if the file does not exist.
pub fn load_hw_state(path: impl AsRef<Path>) -> Result<Option<SimSnapshot>, ReplayError> {
    let path = path.as_ref();
    let content = match fs::read_to_string(path) {
        Ok(content) => content,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
        Err(source) => {
            return Err(ReplayError::Io {
                path: path.display().to_string(),
                source,
            })
        }
    };
    serde_json::from_str(&content)
        .map(Some)
        .map_err(|source| ReplayError::Json {
            path: path.display().to_string(),
            source,
        })
}

pub fn save_hw_state(path: impl AsRef<Path>, state: &SimSnapshot) -> Result<(), ReplayError> {
    let path = path.as_ref();
    let io_err = |source| ReplayError::Io {
        path: path.display().to_string(),
        source,
    };
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent).map_err(io_err)?;
    }
    let json = serde_json::to_string_pretty(state).map_err(|source| ReplayError::Json {
        path: path.display().to_string(),
        source,
    })?;
    fs::write(path, json).map_err(io_err)
}
