//! CREATE2 deployment address computation.
//!
//! The searched salt is structured to prevent frontrunning and collisions:
//!   - the 20-byte caller address
//!   - a 4-byte segment drawn once per batch
//!   - an 8-byte nonce stepped through within the batch
//!
//! address = keccak256(0xff || factory || salt || initCodeHash)[12..32]

use super::keccak256;

/// Builds a 32-byte salt from caller address, batch segment and nonce.
pub fn assemble_salt(caller: &[u8; 20], segment: &[u8; 4], nonce: &[u8; 8]) -> [u8; 32] {
    let mut salt = [0u8; 32];
    salt[0..20].copy_from_slice(caller);
    salt[20..24].copy_from_slice(segment);
    salt[24..32].copy_from_slice(nonce);
    salt
}

/// Computes the CREATE2 deployment address.
/// Preimage: 0xff (1) || factory (20) || salt (32) || init_code_hash (32) = 85 bytes.
pub fn create2_address(
    factory: &[u8; 20],
    salt: &[u8; 32],
    init_code_hash: &[u8; 32],
) -> [u8; 20] {
    let mut preimage = [0u8; 85];
    preimage[0] = 0xff;
    preimage[1..21].copy_from_slice(factory);
    preimage[21..53].copy_from_slice(salt);
    preimage[53..85].copy_from_slice(init_code_hash);

    let hash = keccak256(&preimage);
    let mut address = [0u8; 20];
    address.copy_from_slice(&hash[12..32]);
    address
}
