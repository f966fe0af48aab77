//! Seed/key transform for programming security access
//!
//! The unit hands out a 32-bit seed; the tester answers with the key below.
//! Any deviation is only detected by the unit rejecting the key, so the
//! transform is pinned by regression vectors.

/// XOR constant applied at the start of every round
const ROUND_XOR: u32 = 0x003F_1735;
/// Constant added (wrapping) in every round
const ROUND_ADD: u32 = 0xA3FF_7890;
/// Number of rounds
const ROUNDS: usize = 3;

/// Compute the security-access key for `seed`
pub fn compute_key(seed: u32) -> u32 {
    let mut key = seed;
    for _ in 0..ROUNDS {
        let tmp = key ^ ROUND_XOR;
        key = tmp.wrapping_add(ROUND_ADD);

        // Addition wrapped around
        if key < ROUND_ADD {
            key = (key >> 1) | (tmp << 31);
        }
    }
    key
}
