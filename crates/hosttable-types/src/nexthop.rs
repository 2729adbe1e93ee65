//! Resolved next hops and the canonical next-hop set used as an ECMP key.

use crate::{InterfaceId, ParseError};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;
use std::net::IpAddr;
use std::str::FromStr;

/// A resolved next hop: the neighbor address and the L3 interface it is reached through.
///
/// Ordering is by address first, then interface, which gives every next-hop
/// set a single canonical iteration order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct NextHop {
    pub ip: IpAddr,
    pub intf: InterfaceId,
}

impl NextHop {
    pub fn new(intf: InterfaceId, ip: IpAddr) -> Self {
        Self { ip, intf }
    }
}

impl fmt::Display for NextHop {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}@{}", self.ip, self.intf.as_raw())
    }
}

impl FromStr for NextHop {
    type Err = ParseError;

    /// Parses `<ip>@<interface>`, e.g. `10.0.0.1@4001`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || ParseError::InvalidNextHop(s.to_string());
        let (ip, intf) = s.split_once('@').ok_or_else(invalid)?;
        let ip = ip.parse::<IpAddr>().map_err(|_| invalid())?;
        let intf = intf.parse::<u32>().map_err(|_| invalid())?;
        Ok(NextHop::new(InterfaceId::new(intf), ip))
    }
}

impl TryFrom<String> for NextHop {
    type Error = ParseError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        s.parse()
    }
}

impl From<NextHop> for String {
    fn from(hop: NextHop) -> Self {
        hop.to_string()
    }
}

/// Ordered, duplicate-free set of next hops.
#[derive(Debug, Clone, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct NextHopSet(BTreeSet<NextHop>);

impl NextHopSet {
    pub fn new() -> Self {
        Self(BTreeSet::new())
    }

    /// Adds a next hop; returns false if it was already present.
    pub fn insert(&mut self, nexthop: NextHop) -> bool {
        self.0.insert(nexthop)
    }

    pub fn contains(&self, nexthop: &NextHop) -> bool {
        self.0.contains(nexthop)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Iterates in canonical order.
    pub fn iter(&self) -> impl Iterator<Item = &NextHop> {
        self.0.iter()
    }
}

impl FromIterator<NextHop> for NextHopSet {
    fn from_iter<I: IntoIterator<Item = NextHop>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

impl<'a> IntoIterator for &'a NextHopSet {
    type Item = &'a NextHop;
    type IntoIter = std::collections::btree_set::Iter<'a, NextHop>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}

impl fmt::Display for NextHopSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[")?;
        for (i, nh) in self.0.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{}", nh)?;
        }
        write!(f, "]")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn nh(s: &str) -> NextHop {
        s.parse().unwrap()
    }

    #[test]
    fn test_parse_next_hop() {
        let hop = nh("10.0.0.1@4001");
        assert_eq!(hop.intf, InterfaceId::new(4001));
        assert_eq!(hop.ip, "10.0.0.1".parse::<IpAddr>().unwrap());
        assert_eq!(hop.to_string(), "10.0.0.1@4001");

        let v6 = nh("2001:db8::1@7");
        assert!(v6.ip.is_ipv6());

        assert!("10.0.0.1".parse::<NextHop>().is_err());
        assert!("10.0.0.1@x".parse::<NextHop>().is_err());
    }

    #[test]
    fn test_set_is_canonical() {
        let a: NextHopSet = [nh("10.0.0.3@1"), nh("10.0.0.1@2"), nh("10.0.0.2@1")]
            .into_iter()
            .collect();
        let b: NextHopSet = [nh("10.0.0.2@1"), nh("10.0.0.3@1"), nh("10.0.0.1@2")]
            .into_iter()
            .collect();
        assert_eq!(a, b);
        let order: Vec<String> = a.iter().map(|h| h.to_string()).collect();
        assert_eq!(order, vec!["10.0.0.1@2", "10.0.0.2@1", "10.0.0.3@1"]);
    }

    #[test]
    fn test_set_deduplicates() {
        let mut set = NextHopSet::new();
        assert!(set.insert(nh("10.0.0.1@1")));
        assert!(!set.insert(nh("10.0.0.1@1")));
        assert!(set.insert(nh("10.0.0.1@2")));
        assert_eq!(set.len(), 2);
        assert_eq!(set.to_string(), "[10.0.0.1@1, 10.0.0.1@2]");
    }

    #[test]
    fn test_set_serializes_as_strings() {
        let set: NextHopSet = [nh("10.0.0.2@1"), nh("10.0.0.1@1")].into_iter().collect();
        let json = serde_json::to_string(&set).unwrap();
        assert_eq!(json, r#"["10.0.0.1@1","10.0.0.2@1"]"#);
        assert!(serde_json::from_str::<NextHopSet>(r#"["10.0.0.1"]"#).is_err());
    }
}
