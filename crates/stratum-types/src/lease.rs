use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::block::BlockId;

/// A named, time-bound claim on a block.
///
/// Leases are plain records. Nothing in the storage core enforces expiry;
/// callers compare [`Lease::expiry`] against their own clock.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Lease {
    pub expiry: DateTime<Utc>,
    pub bid: BlockId,
}

impl Lease {
    pub fn new(expiry: DateTime<Utc>, bid: BlockId) -> Self {
        Self { expiry, bid }
    }

    /// Returns `true` if the lease has expired at `now`.
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        now >= self.expiry
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};

    #[test]
    fn expiry_check() {
        let expiry = Utc.with_ymd_and_hms(2030, 1, 1, 0, 0, 0).unwrap();
        let lease = Lease::new(expiry, BlockId::of(b"root"));
        assert!(!lease.is_expired_at(expiry - Duration::seconds(1)));
        assert!(lease.is_expired_at(expiry));
    }

    #[test]
    fn bincode_roundtrip() {
        let lease = Lease::new(Utc::now(), BlockId::of(b"b"));
        let bytes = bincode::serialize(&lease).unwrap();
        let decoded: Lease = bincode::deserialize(&bytes).unwrap();
        assert_eq!(decoded, lease);
    }
}
