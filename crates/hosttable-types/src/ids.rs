//! Numeric identifiers for VRFs, physical ports and L3 interfaces.

use serde::{Deserialize, Serialize};
use std::fmt;

macro_rules! define_id {
    ($(#[$meta:meta])* $name:ident, $prefix:literal) => {
        $(#[$meta])*
        #[derive(
            Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize,
        )]
        #[serde(transparent)]
        pub struct $name(u32);

        impl $name {
            pub const fn new(raw: u32) -> Self {
                Self(raw)
            }

            pub const fn as_raw(&self) -> u32 {
                self.0
            }
        }

        impl From<u32> for $name {
            fn from(raw: u32) -> Self {
                Self(raw)
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}{}", $prefix, self.0)
            }
        }
    };
}

define_id!(
    /// Hardware VRF number. VRF 0 is the default routing table.
    VrfId,
    "vrf"
);

define_id!(
    /// Physical front-panel port. Port 0 means "no port".
    PortId,
    "port"
);

define_id!(
    /// Software L3 interface id, resolved to a router interface in hardware.
    InterfaceId,
    "intf"
);

impl VrfId {
    pub const DEFAULT: VrfId = VrfId(0);
}

impl PortId {
    /// Placeholder for entries that are not bound to a physical port.
    pub const NONE: PortId = PortId(0);

    pub const fn is_none(&self) -> bool {
        self.0 == 0
    }
}
