//! L3 host table.
//!
//! Maps next hops and multi-path routes onto the ASIC's host entries, egress
//! objects and ECMP groups:
//!
//! - [`HostEntry`]: one (vrf, ip) host entry and the egress it resolves to
//! - [`EcmpHost`]: a (vrf, next-hop set) and the group over its members
//! - [`EgressTable`]: refcounted egress objects plus the port reverse index
//! - [`HostTable`]: the registries above; the only place objects are created
//!   and destroyed
//!
//! Every object is reference counted. Hardware is written when the first
//! reference is taken and cleaned up when the last is dropped, in dependency
//! order (host before egress, group before members).

mod ecmp;
mod egress;
mod egress_table;
mod entry;
mod interface;
mod snapshot;
mod table;
mod types;

pub use ecmp::EcmpHost;
pub use egress::{EcmpEgress, Egress, EgressObject};
pub use egress_table::EgressTable;
pub use entry::HostEntry;
pub use interface::{InterfaceResolver, StaticInterfaceMap};
pub use snapshot::{EcmpEgressSnapshot, EcmpHostSnapshot, EgressSnapshot, HostSnapshot, HostTableSnapshot};
pub use table::HostTable;
pub use types::{
    EcmpHostKey, ForwardAction, HostKey, HostTableConfig, HostTableError, HostTableStats, Result,
};
