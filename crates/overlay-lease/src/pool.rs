use std::collections::HashSet;

use ipnet::Ipv4Net;

use crate::error::PoolError;

/// Picks an overlay subnet that no lease holds yet.
///
/// Implementations must be a pure function of their configuration and the
/// `taken` set. The controller calls this afresh on every retry, and
/// daemons on different hosts only converge because they all make the same
/// choice from the same view of the store.
pub trait SubnetPool: Send + Sync {
    fn get_available(&self, taken: &HashSet<Ipv4Net>) -> Result<Ipv4Net, PoolError>;
}

/// Fixed-size subnets carved out of a parent range, handed out in address
/// order.
#[derive(Debug, Clone)]
pub struct CidrPool {
    range: Ipv4Net,
    prefix_len: u8,
}

impl CidrPool {
    /// `range` is truncated to its network address. `prefix_len` must lie in
    /// `range.prefix_len()..=32`.
    pub fn new(range: Ipv4Net, prefix_len: u8) -> Result<Self, PoolError> {
        let range = range.trunc();
        if prefix_len < range.prefix_len() || prefix_len > 32 {
            return Err(PoolError::InvalidPrefix { range, prefix_len });
        }
        Ok(Self { range, prefix_len })
    }

    pub fn range(&self) -> Ipv4Net {
        self.range
    }

    pub fn prefix_len(&self) -> u8 {
        self.prefix_len
    }

    /// Number of candidate subnets in the range.
    pub fn capacity(&self) -> u64 {
        1u64 << (self.prefix_len - self.range.prefix_len())
    }

    fn candidates(&self) -> impl Iterator<Item = Ipv4Net> {
        // The prefix length is validated in `new`, so `subnets` cannot fail.
        self.range.subnets(self.prefix_len).into_iter().flatten()
    }
}

/// Whether two networks share at least one address.
fn overlaps(a: &Ipv4Net, b: &Ipv4Net) -> bool {
    a.contains(&b.network()) || b.contains(&a.network())
}

impl SubnetPool for CidrPool {
    fn get_available(&self, taken: &HashSet<Ipv4Net>) -> Result<Ipv4Net, PoolError> {
        self.candidates()
            .find(|candidate| {
                !taken.contains(candidate) && !taken.iter().any(|t| overlaps(t, candidate))
            })
            .ok_or(PoolError::Exhausted {
                range: self.range,
                prefix_len: self.prefix_len,
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn net(s: &str) -> Ipv4Net {
        s.parse().unwrap()
    }

    fn taken(subnets: &[&str]) -> HashSet<Ipv4Net> {
        subnets.iter().map(|s| net(s)).collect()
    }

    #[test]
    fn first_subnet_when_nothing_taken() {
        let pool = CidrPool::new(net("10.255.0.0/16"), 24).unwrap();
        assert_eq!(pool.get_available(&HashSet::new()).unwrap(), net("10.255.0.0/24"));
    }

    #[test]
    fn skips_taken_subnets_in_address_order() {
        let pool = CidrPool::new(net("10.255.0.0/16"), 24).unwrap();
        let got = pool
            .get_available(&taken(&["10.255.0.0/24", "10.255.1.0/24", "10.255.3.0/24"]))
            .unwrap();
        assert_eq!(got, net("10.255.2.0/24"));
    }

    #[test]
    fn same_input_same_answer() {
        let pool = CidrPool::new(net("10.255.0.0/16"), 24).unwrap();
        let t = taken(&["10.255.0.0/24", "10.255.2.0/24"]);
        let first = pool.get_available(&t).unwrap();
        for _ in 0..10 {
            assert_eq!(pool.get_available(&t).unwrap(), first);
        }
    }

    #[test]
    fn exhausted_when_every_candidate_taken() {
        let pool = CidrPool::new(net("10.255.0.0/22"), 24).unwrap();
        assert_eq!(pool.capacity(), 4);
        let err = pool
            .get_available(&taken(&[
                "10.255.0.0/24",
                "10.255.1.0/24",
                "10.255.2.0/24",
                "10.255.3.0/24",
            ]))
            .unwrap_err();
        assert!(
            matches!(err, PoolError::Exhausted { prefix_len: 24, .. }),
            "expected Exhausted, got: {err}"
        );
    }

    #[test]
    fn ignores_taken_subnets_outside_the_range() {
        let pool = CidrPool::new(net("10.255.0.0/23"), 24).unwrap();
        let got = pool
            .get_available(&taken(&["10.1.0.0/24", "192.168.0.0/24"]))
            .unwrap();
        assert_eq!(got, net("10.255.0.0/24"));
    }

    #[test]
    fn wider_lease_blocks_every_candidate_it_covers() {
        let pool = CidrPool::new(net("10.255.0.0/16"), 24).unwrap();
        let got = pool.get_available(&taken(&["10.255.0.0/22"])).unwrap();
        assert_eq!(got, net("10.255.4.0/24"));
    }

    #[test]
    fn range_is_truncated() {
        let pool = CidrPool::new(net("10.255.3.7/16"), 24).unwrap();
        assert_eq!(pool.range(), net("10.255.0.0/16"));
        assert_eq!(pool.get_available(&HashSet::new()).unwrap(), net("10.255.0.0/24"));
    }

    #[test]
    fn prefix_equal_to_range_yields_one_subnet() {
        let pool = CidrPool::new(net("10.255.0.0/24"), 24).unwrap();
        assert_eq!(pool.capacity(), 1);
        assert_eq!(pool.get_available(&HashSet::new()).unwrap(), net("10.255.0.0/24"));
        assert!(pool.get_available(&taken(&["10.255.0.0/24"])).is_err());
    }

    #[test]
    fn rejects_prefix_shorter_than_range() {
        let err = CidrPool::new(net("10.255.0.0/16"), 8).unwrap_err();
        assert!(matches!(err, PoolError::InvalidPrefix { prefix_len: 8, .. }));
    }

    #[test]
    fn rejects_prefix_longer_than_32() {
        let err = CidrPool::new(net("10.255.0.0/16"), 33).unwrap_err();
        assert!(matches!(err, PoolError::InvalidPrefix { prefix_len: 33, .. }));
    }
}
