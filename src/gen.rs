use crate::config::principal::MIN_PASSWORD_LENGTH;
use crate::config::Principal;
use anyhow::{anyhow, Result};
use rand::Rng;

/// No quotes and no backslash, so the password survives any quoting.
const CHARSET: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZ\
                        abcdefghijklmnopqrstuvwxyz\
                        0123456789)(*&^%$#@!~";

/// Generated password with given length
pub fn gen_password(length: usize) -> Result<String> {
    if length < MIN_PASSWORD_LENGTH {
        return Err(anyhow!(
            "password length must be at least {}, got {}",
            MIN_PASSWORD_LENGTH,
            length
        ));
    }

    let mut rng = rand::thread_rng();

    let password: String = (0..length)
        .map(|_| {
            let idx = rng.gen_range(0..CHARSET.len());
            CHARSET[idx] as char
        })
        .collect();

    Ok(password)
}

/// The `password_md5` recorded in the state file for this account.
pub fn fingerprint(password: &str, user: &str) -> String {
    Principal {
        user: user.to_string(),
        password: password.to_string(),
        ..Principal::default()
    }
    .password_md5()
}
