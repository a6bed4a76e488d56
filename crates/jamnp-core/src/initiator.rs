//! Deterministic, total, anti-symmetric rule for which validator of a pair
//! opens the connection.

use crate::ids::Ed25519PublicKey;

/// `P(a, b) = a` if `(a_31 > 127) ⊕ (b_31 > 127) ⊕ (a < b)`, else `b`.
///
/// Both endpoints of a validator pair compute this independently and agree,
/// so exactly one side ever dials.
pub fn preferred_initiator(a: &Ed25519PublicKey, b: &Ed25519PublicKey) -> Ed25519PublicKey {
    let a_high = a[31] > 127;
    let b_high = b[31] > 127;
    let a_less = a < b;

    if a_high ^ b_high ^ a_less {
        *a
    } else {
        *b
    }
}

/// `true` iff the local key should be the one to dial the remote key.
pub fn should_initiate(local: &Ed25519PublicKey, remote: &Ed25519PublicKey) -> bool {
    &preferred_initiator(local, remote) == local
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::RngCore;

    #[test]
    fn s2_all_zero_vs_all_one() {
        let a = [0u8; 32];
        let b = [0xFFu8; 32];
        assert_eq!(preferred_initiator(&a, &b), b);
        assert_eq!(preferred_initiator(&b, &a), b);
    }

    #[test]
    fn totality_and_anti_symmetry_over_random_pairs() {
        let mut rng = rand::thread_rng();
        for _ in 0..256 {
            let mut a = [0u8; 32];
            let mut b = [0u8; 32];
            rng.fill_bytes(&mut a);
            rng.fill_bytes(&mut b);
            if a == b {
                continue;
            }
            let p_ab = preferred_initiator(&a, &b);
            let p_ba = preferred_initiator(&b, &a);
            assert_eq!(p_ab, p_ba, "P(a,b) and P(b,a) must agree on the same winner");
            assert!(p_ab == a || p_ab == b);
        }
    }

    #[test]
    fn is_deterministic() {
        let a = [3u8; 32];
        let b = [9u8; 32];
        assert_eq!(preferred_initiator(&a, &b), preferred_initiator(&a, &b));
    }
}
