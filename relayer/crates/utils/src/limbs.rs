//! Balance sums travel through the proving pipeline as a sequence of 64-bit limbs.
//!
//! The encoding is little-endian with radix 2^64: `limbs[0]` is the least significant word,
//! so `[1, 0]` is 1 and `[0, 1]` is 2^64. At most [`MAX_LIMBS`] limbs are accepted, which
//! bounds every balance sum to `[0, 2^128)`.

use thiserror::Error;

pub const LIMB_BITS: u32 = u64::BITS;
pub const MAX_LIMBS: usize = 2;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum LimbError {
    #[error("balance sum has {0} limbs, at most {MAX_LIMBS} are supported")]
    TooManyLimbs(usize),
}

/// Rebuilds the integer encoded by `limbs`.
///
/// An empty slice decodes to zero.
pub fn limbs_to_u128(limbs: &[u64]) -> Result<u128, LimbError> {
    if limbs.len() > MAX_LIMBS {
        return Err(LimbError::TooManyLimbs(limbs.len()));
    }
    Ok(limbs.iter().rev().fold(0u128, |acc, limb| (acc << LIMB_BITS) | u128::from(*limb)))
}
