//! Type-safe hardware object ID wrappers.
//!
//! Egress objects and ECMP groups share one id space in the ASIC, so both are
//! [`EgressOid`]. Router interfaces have their own id type, which keeps an
//! interface id from ever being passed where an egress id is expected.

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::cmp::Ordering;
use std::fmt;
use std::hash::Hash;
use std::marker::PhantomData;

/// Raw hardware object ID.
pub type RawSaiObjectId = u64;

/// Marker trait for hardware object kinds.
pub trait SaiObjectKind: Send + Sync + 'static {
    fn type_name() -> &'static str;
}

/// A typed hardware object ID.
///
/// ```
/// use hosttable_sai::{EgressOid, RouterIntfOid};
///
/// let egress = EgressOid::from_raw(100_001).unwrap();
/// let intf = RouterIntfOid::from_raw(4001).unwrap();
/// assert_eq!(egress.as_raw(), 100_001);
///
/// // fn takes_egress(e: EgressOid) {}
/// // takes_egress(intf); // does not compile
/// # let _ = intf;
/// ```
#[derive(Clone, Copy)]
pub struct SaiObjectId<T: SaiObjectKind> {
    raw: RawSaiObjectId,
    _marker: PhantomData<T>,
}

impl<T: SaiObjectKind> SaiObjectId<T> {
    /// The null object ID.
    pub const NULL: Self = Self {
        raw: 0,
        _marker: PhantomData,
    };

    /// Creates an object ID from a raw value; `None` for the null id.
    pub fn from_raw(raw: RawSaiObjectId) -> Option<Self> {
        if raw == 0 {
            None
        } else {
            Some(Self::from_raw_unchecked(raw))
        }
    }

    pub const fn from_raw_unchecked(raw: RawSaiObjectId) -> Self {
        Self {
            raw,
            _marker: PhantomData,
        }
    }

    pub const fn as_raw(&self) -> RawSaiObjectId {
        self.raw
    }

    pub const fn is_null(&self) -> bool {
        self.raw == 0
    }
}

impl<T: SaiObjectKind> fmt::Debug for SaiObjectId<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}({})", T::type_name(), self.raw)
    }
}

impl<T: SaiObjectKind> fmt::Display for SaiObjectId<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.raw)
    }
}

impl<T: SaiObjectKind> PartialEq for SaiObjectId<T> {
    fn eq(&self, other: &Self) -> bool {
        self.raw == other.raw
    }
}

impl<T: SaiObjectKind> Eq for SaiObjectId<T> {}

impl<T: SaiObjectKind> PartialOrd for SaiObjectId<T> {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl<T: SaiObjectKind> Ord for SaiObjectId<T> {
    fn cmp(&self, other: &Self) -> Ordering {
        self.raw.cmp(&other.raw)
    }
}

impl<T: SaiObjectKind> Hash for SaiObjectId<T> {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        self.raw.hash(state);
    }
}

impl<T: SaiObjectKind> Default for SaiObjectId<T> {
    fn default() -> Self {
        Self::NULL
    }
}

impl<T: SaiObjectKind> Serialize for SaiObjectId<T> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u64(self.raw)
    }
}

impl<'de, T: SaiObjectKind> Deserialize<'de> for SaiObjectId<T> {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        RawSaiObjectId::deserialize(deserializer).map(Self::from_raw_unchecked)
    }
}

macro_rules! define_object_kind {
    ($name:ident, $type_name:literal, $oid_alias:ident) => {
        #[doc = concat!("Marker type for ", $type_name, " objects.")]
        #[derive(Debug, Clone, Copy)]
        pub struct $name;

        impl SaiObjectKind for $name {
            fn type_name() -> &'static str {
                $type_name
            }
        }

        #[doc = concat!("Type alias for ", $type_name, " object IDs.")]
        pub type $oid_alias = SaiObjectId<$name>;
    };
}

define_object_kind!(EgressKind, "Egress", EgressOid);
define_object_kind!(RouterInterfaceKind, "RouterInterface", RouterIntfOid);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_null_rejected() {
        assert!(EgressOid::from_raw(0).is_none());
        assert!(EgressOid::NULL.is_null());
        assert!(EgressOid::default().is_null());
    }

    #[test]
    fn test_debug_carries_kind() {
        let id = EgressOid::from_raw(100_002).unwrap();
        assert_eq!(format!("{:?}", id), "Egress(100002)");
        assert_eq!(id.to_string(), "100002");
    }

    #[test]
    fn test_ordering_follows_raw() {
        let a = EgressOid::from_raw_unchecked(5);
        let b = EgressOid::from_raw_unchecked(7);
        assert!(a < b);
    }

    #[test]
    fn test_serde_as_number() {
        let id = RouterIntfOid::from_raw_unchecked(4001);
        assert_eq!(serde_json::to_string(&id).unwrap(), "4001");
        let back: RouterIntfOid = serde_json::from_str("4001").unwrap();
        assert_eq!(back, id);
    }
}
