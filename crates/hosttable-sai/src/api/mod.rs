//! Per-kind hardware capability interfaces.
//!
//! Each object kind the host table manages gets its own trait so that the
//! table's dependencies on the ASIC are explicit and individually mockable.
//! [`SwitchHw`] bundles them into the single handle injected into the table.

mod dump;
mod ecmp;
mod egress;
mod host;

pub use dump::{DiscoveredEcmp, DiscoveredEgress, HwDump};
pub use ecmp::EcmpApi;
pub use egress::{EgressAction, EgressApi, EgressConfig};
pub use host::{HostApi, L3HostEntry};

use crate::types::EgressOid;

/// The complete hardware handle used by the host table.
pub trait SwitchHw: HostApi + EgressApi + EcmpApi {
    /// Reserved egress that drops everything. Owned by the switch and never freed.
    fn drop_egress_id(&self) -> EgressOid;

    /// Reads back every host, egress and ECMP object currently programmed.
    fn dump(&self) -> HwDump;
}
