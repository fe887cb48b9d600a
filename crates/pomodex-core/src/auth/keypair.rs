use russh_keys::key::KeyPair;

use crate::error::{PomodexError, Result};

pub struct SshKeypair {
    pub public_key: String,
    pub private_key: String,
}

/// Generates a fresh ed25519 keypair for a new project. The private key
/// is returned to the caller once on create; the control plane persists
/// it only because the spec requires retrieval after the fact, not
/// because it's ever used here to authenticate anywhere itself — the
/// sandbox's sshd trusts the public half via authorized_keys.
pub fn generate_ssh_keypair() -> Result<SshKeypair> {
    let keypair = KeyPair::generate_ed25519().ok_or_else(|| PomodexError::Backend("ed25519 keygen failed".into()))?;

    let public_key = russh_keys::PublicKeyBase64::public_key_base64(&keypair);
    let public_line = format!("ssh-ed25519 {public_key}");

    let mut private_key_buf = Vec::new();
    russh_keys::encode_pkcs8_pem(&keypair, &mut private_key_buf)
        .map_err(|e| PomodexError::Backend(format!("encoding ssh private key: {e}")))?;
    let private_key = String::from_utf8(private_key_buf)
        .map_err(|e| PomodexError::Backend(format!("encoding ssh private key: {e}")))?;

    Ok(SshKeypair { public_key: public_line, private_key })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn generated_keypair_has_expected_shapes() {
        let keypair = generate_ssh_keypair().unwrap();
        assert!(keypair.public_key.starts_with("ssh-ed25519 "));
        assert!(keypair.private_key.contains("PRIVATE KEY"));
    }
}
