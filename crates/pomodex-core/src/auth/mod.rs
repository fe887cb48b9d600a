//! Auth Core (C1): password hashing, access tokens, refresh token material.

mod keypair;
mod password;
mod token;

pub use keypair::{generate_ssh_keypair, SshKeypair};
pub use password::{hash_password, verify_password};
pub use token::{decode_access_token, encode_access_token, generate_refresh_token, hash_refresh_token, AccessClaims};
