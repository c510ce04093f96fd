//! Session token generation

use argon2::password_hash::rand_core::{OsRng, RngCore};
use data_encoding::HEXLOWER;

/// Generate an opaque session token from `bytes` bytes of OS randomness,
/// hex-encoded (so the string is twice as long as `bytes`).
pub fn generate_session_token(bytes: usize) -> String {
    let mut buf = vec![0u8; bytes];
    OsRng.fill_bytes(&mut buf);
    HEXLOWER.encode(&buf)
}
