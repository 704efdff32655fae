// SPDX-License-Identifier: MIT

//! Username format check (spec.md §4.7.1 step 2): `<name>.<8-hex>`,
//! rejected before the Panel is ever called — a cheap DoS filter.

use crate::error::SshError;

pub fn validate_username(username: &str) -> Result<(), SshError> {
    let Some((name, suffix)) = username.rsplit_once('.') else {
        return Err(SshError::InvalidUsername);
    };
    let valid_suffix = suffix.len() == 8 && suffix.chars().all(|c| c.is_ascii_hexdigit());
    if name.is_empty() || !valid_suffix {
        return Err(SshError::InvalidUsername);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_name_dot_eight_hex() {
        assert!(validate_username("minecraft.1a2b3c4d").is_ok());
    }

    #[test]
    fn rejects_missing_dot() {
        assert!(validate_username("minecraft1a2b3c4d").is_err());
    }

    #[test]
    fn rejects_short_suffix() {
        assert!(validate_username("minecraft.1a2b").is_err());
    }

    #[test]
    fn rejects_non_hex_suffix() {
        assert!(validate_username("minecraft.zzzzzzzz").is_err());
    }

    #[test]
    fn rejects_empty_name() {
        assert!(validate_username(".1a2b3c4d").is_err());
    }
}
