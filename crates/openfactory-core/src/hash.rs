//! Deterministic port derivation for `local`-mode service URLs.
//!
//! The contract is determinism per group name, not a specific digest
//! algorithm: SHA-256 is used since nothing here needs interoperability
//! with an external consumer of the digest itself, only a stable `u64`
//! derived from it.

use sha2::{Digest, Sha256};

/// `base_port + hash(group_name) mod 1000`.
pub fn host_port_for_group(base_port: u16, group_name: &str) -> u16 {
    let digest = Sha256::digest(group_name.as_bytes());
    let mut acc: u64 = 0;
    for byte in &digest[..8] {
        acc = (acc << 8) | u64::from(*byte);
    }
    base_port + (acc % 1000) as u16
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn deterministic_for_same_name() {
        assert_eq!(
            host_port_for_group(6000, "workcenter-1"),
            host_port_for_group(6000, "workcenter-1")
        );
    }

    #[test]
    fn stays_within_thousand_port_window() {
        let p = host_port_for_group(6000, "anything-at-all");
        assert!((6000..7000).contains(&p));
    }

    #[test]
    fn differs_across_distinct_names_in_practice() {
        assert_ne!(
            host_port_for_group(6000, "workcenter-1"),
            host_port_for_group(6000, "workcenter-2")
        );
    }

    proptest::proptest! {
        #[test]
        fn always_within_window_and_deterministic(base in 0u16..60000, name in "[a-z0-9-]{1,40}") {
            let a = host_port_for_group(base, &name);
            let b = host_port_for_group(base, &name);
            proptest::prop_assert_eq!(a, b);
            proptest::prop_assert!(a >= base);
            proptest::prop_assert!((a as u32) < base as u32 + 1000);
        }
    }
}
