//! Frame integrity utilities
//!
//! Every recording frame carries a CRC32 of its payload so that a truncated
//! or bit-rotted recording is rejected instead of replayed.

use crc32fast::Hasher;

/// Compute the CRC32 checksum of a frame payload
#[inline]
pub fn compute_checksum(data: &[u8]) -> u32 {
    let mut hasher = Hasher::new();
    hasher.update(data);
    hasher.finalize()
}

/// Verify the CRC32 checksum of a frame payload
#[inline]
pub fn verify_checksum(data: &[u8], expected_checksum: u32) -> bool {
    compute_checksum(data) == expected_checksum
}
