//! ECMP groups: an egress object that load-balances over member egresses.

use crate::error::SaiResult;
use crate::types::EgressOid;

/// Hardware capability for ECMP group egress objects.
///
/// Group ids live in the same id space as single egress objects so a host
/// entry can point at either.
pub trait EcmpApi: Send + Sync {
    /// Creates a group over `members` in the given order.
    fn create_ecmp(&self, members: &[EgressOid]) -> SaiResult<EgressOid>;

    /// Adds a member back into the hash spread.
    fn add_ecmp_member(&self, ecmp: EgressOid, member: EgressOid) -> SaiResult<()>;

    /// Takes a member out of the hash spread without destroying it.
    fn remove_ecmp_member(&self, ecmp: EgressOid, member: EgressOid) -> SaiResult<()>;

    fn remove_ecmp(&self, ecmp: EgressOid) -> SaiResult<()>;
}
