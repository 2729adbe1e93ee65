//! Forwarding-table primitives shared by the host table crates.
//!
//! - [`VrfId`], [`PortId`], [`InterfaceId`]: numeric identifiers as the ASIC sees them
//! - [`MacAddress`]: 48-bit Ethernet MAC addresses
//! - [`NextHop`] / [`NextHopSet`]: resolved next hops and their canonical ordered set

mod ids;
mod mac;
mod nexthop;

pub use ids::{InterfaceId, PortId, VrfId};
pub use mac::MacAddress;
pub use nexthop::{NextHop, NextHopSet};

/// Common error type for parsing failures.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ParseError {
    #[error("invalid MAC address format: {0}")]
    InvalidMacAddress(String),

    #[error("invalid next hop format: {0} (expected <ip>@<interface>)")]
    InvalidNextHop(String),
}
