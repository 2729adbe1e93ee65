//! Typed hardware interface for the L3 host table.
//!
//! # Architecture
//!
//! - [`types`]: typed object ids ([`EgressOid`], [`RouterIntfOid`])
//! - [`error`]: driver status codes and [`SaiError`]
//! - [`api`]: one capability trait per object kind ([`HostApi`], [`EgressApi`],
//!   [`EcmpApi`]) bundled as [`SwitchHw`]
//! - [`sim`]: [`SimSwitch`], an in-memory ASIC used by the replay daemon and tests
//!
//! # Example
//!
//! ```
//! use hosttable_sai::{EgressApi, EgressConfig, RouterIntfOid, SimSwitch};
//! use hosttable_types::VrfId;
//!
//! let hw = SimSwitch::new();
//! let intf = RouterIntfOid::from_raw(4001).unwrap();
//! let id = hw
//!     .create_egress(&EgressConfig::to_cpu(VrfId::DEFAULT, "10.0.0.1".parse().unwrap(), intf))
//!     .unwrap();
//! assert_eq!(hw.egress_count(), 1);
//! # let _ = id;
//! ```

pub mod api;
pub mod error;
pub mod sim;
pub mod types;

pub use api::{
    DiscoveredEcmp, DiscoveredEgress, EcmpApi, EgressAction, EgressApi, EgressConfig, HostApi,
    HwDump, L3HostEntry, SwitchHw,
};
pub use error::{SaiError, SaiResult, SaiStatus};
pub use sim::{HwOp, SimSnapshot, SimSwitch};
pub use types::{EgressOid, RawSaiObjectId, RouterIntfOid, SaiObjectId, SaiObjectKind};
