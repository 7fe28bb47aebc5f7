//! Generation and hashing of one-time login tokens.
//!
//! Raw tokens carry 256 bits of CSPRNG entropy and only ever exist in the
//! login URL sent to the user. The database stores the SHA-256 digest, so
//! lookups hash the presented value and compare digests.

use base64::{Engine, engine::general_purpose::URL_SAFE_NO_PAD};
use rand::RngCore;
use sha2::{Digest, Sha256};

const TOKEN_BYTES: usize = 32;

/// Generate a fresh raw login token (base64url, no padding)
pub fn generate_token() -> String {
    let mut bytes = [0u8; TOKEN_BYTES];
    rand::rng().fill_bytes(&mut bytes);
    URL_SAFE_NO_PAD.encode(bytes)
}

/// Digest a raw token into its storable form
pub fn hash_token(raw: &str) -> String {
    URL_SAFE_NO_PAD.encode(Sha256::digest(raw.as_bytes()))
}
