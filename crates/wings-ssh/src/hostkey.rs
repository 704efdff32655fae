// SPDX-License-Identifier: MIT

//! Persistent host key (spec.md §4.7.1): 2048-bit RSA, generated once and
//! stored PEM-encoded with `0600`. Generation goes through the `rsa` crate
//! so the bit size is explicit, then bridges into `russh`'s key type via
//! `ssh_key`'s documented `TryFrom<&rsa::RsaPrivateKey>` conversion.

use std::fs::Permissions;
use std::os::unix::fs::PermissionsExt;
use std::path::Path;

use rand::rngs::OsRng;
use russh::keys::ssh_key::private::{KeypairData, PrivateKey, RsaKeypair};
use russh::keys::ssh_key::LineEnding;

use crate::error::SshError;

const RSA_KEY_BITS: usize = 2048;

/// Load the host key at `path`, generating and persisting a fresh one on
/// first start.
pub fn load_or_generate(path: &Path) -> Result<PrivateKey, SshError> {
    if path.exists() {
        let pem = std::fs::read_to_string(path)?;
        return Ok(PrivateKey::from_openssh(&pem)?);
    }

    let rsa_key = rsa::RsaPrivateKey::new(&mut OsRng, RSA_KEY_BITS)?;
    let keypair = RsaKeypair::try_from(&rsa_key).map_err(SshError::HostKeyEncoding)?;
    let private_key = PrivateKey::new(KeypairData::Rsa(keypair), "wings-host-key").map_err(SshError::HostKeyEncoding)?;

    let pem = private_key.to_openssh(LineEnding::LF).map_err(SshError::HostKeyEncoding)?;
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    std::fs::write(path, pem.as_bytes())?;
    std::fs::set_permissions(path, Permissions::from_mode(0o600))?;

    Ok(private_key)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn generates_and_persists_with_restrictive_permissions() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("host_key");

        load_or_generate(&path).unwrap();

        let mode = std::fs::metadata(&path).unwrap().permissions().mode() & 0o777;
        assert_eq!(mode, 0o600);
    }

    #[test]
    fn second_call_loads_the_persisted_key_rather_than_regenerating() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("host_key");

        let first = load_or_generate(&path).unwrap();
        let second = load_or_generate(&path).unwrap();

        assert_eq!(first.to_openssh(LineEnding::LF).unwrap(), second.to_openssh(LineEnding::LF).unwrap());
    }
}
