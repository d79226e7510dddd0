//! # ab-auth-simple
//!
//! Argon2-based implementation of `AuthProvider`.
//! Account passwords are stored as PHC strings with a per-hash random salt.

use ab_core::traits::AuthProvider;
use anyhow::anyhow;
use argon2::{
    password_hash::{PasswordHasher, SaltString},
    Argon2,
};

const SALT_LEN: usize = 16;

#[derive(Default)]
pub struct SimpleAuthProvider {
    argon2: Argon2<'static>,
}

impl SimpleAuthProvider {
    pub fn new() -> Self {
        Self::default()
    }

    fn fresh_salt() -> anyhow::Result<SaltString> {
        let mut bytes = [0u8; SALT_LEN];
        getrandom::getrandom(&mut bytes).map_err(|e| anyhow!("salt generation failed: {e}"))?;
        SaltString::encode_b64(&bytes).map_err(|e| anyhow!("salt encoding failed: {e}"))
    }
}

impl AuthProvider for SimpleAuthProvider {
    fn hash_password(&self, password: &str) -> anyhow::Result<String> {
        let salt = Self::fresh_salt()?;
        let hash = self
            .argon2
            .hash_password(password.as_bytes(), &salt)
            .map_err(|e| anyhow!("password hashing failed: {e}"))?;
        Ok(hash.to_string())
    }
}
