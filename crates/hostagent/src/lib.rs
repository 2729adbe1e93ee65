//! L3 host table agent.
//!
//! Manages the ASIC forwarding-table resources behind next hops and
//! multi-path routes: L3 host entries, egress objects and ECMP groups.
//!
//! # Architecture
//!
//! - [`host`]: the refcounted [`HostTable`] and the objects it owns
//! - [`warm_boot`]: reconciliation against hardware discovered at startup
//! - [`audit`]: structured audit records for resource changes
//! - [`config`]: TOML configuration for the `hostagentd` daemon
//! - [`replay`]: JSON scenario replay used by the daemon and tests
//!
//! # Example
//!
//! ```
//! use hostagent::host::{HostTable, HostTableConfig, StaticInterfaceMap};
//! use hosttable_sai::{RouterIntfOid, SimSwitch};
//! use hosttable_types::{InterfaceId, NextHopSet, VrfId};
//! use std::sync::Arc;
//!
//! let hw = Arc::new(SimSwitch::new());
//! let interfaces: StaticInterfaceMap =
//!     [(InterfaceId::new(1), RouterIntfOid::from_raw_unchecked(4001))].into_iter().collect();
//! let mut table = HostTable::new(HostTableConfig::default(), hw.clone(), Arc::new(interfaces));
//!
//! let nexthops: NextHopSet = ["10.0.0.1@1", "10.0.0.2@1"]
//!     .iter()
//!     .map(|s| s.parse().unwrap())
//!     .collect();
//! let group = table.acquire_ecmp_host(VrfId::DEFAULT, &nexthops).unwrap().ecmp_egress_id();
//! assert!(group.is_some());
//! assert_eq!(hw.ecmp_count(), 1);
//! ```

pub mod audit;
pub mod config;
pub mod host;
pub mod replay;
pub mod warm_boot;

pub use config::{ConfigError, HostAgentConfig};
pub use host::{HostTable, HostTableConfig, HostTableError, HostTableSnapshot};
pub use replay::{ReplayError, Replayer, Scenario, Step};
pub use warm_boot::{ColdBoot, WarmBootCache, WarmBootHostCache, WarmBootSummary};
