use argon2::Argon2;
use argon2::password_hash::{
    PasswordHash, PasswordHasher, PasswordVerifier, SaltString, rand_core::OsRng,
};

/// Argon2id password hashing in PHC string format.
#[derive(Clone, Default)]
pub struct PasswordEncoder {
    argon2: Argon2<'static>,
}

impl PasswordEncoder {
    pub fn encode(&self, raw: &str) -> anyhow::Result<String> {
        let salt = SaltString::generate(&mut OsRng);
        let hash = self
            .argon2
            .hash_password(raw.as_bytes(), &salt)
            .map_err(|e| anyhow::anyhow!("argon2 hash error: {e}"))?;
        Ok(hash.to_string())
    }

    /// False on mismatch; an unparsable stored hash is an error.
    pub fn matches(&self, raw: &str, encoded: &str) -> anyhow::Result<bool> {
        let parsed = PasswordHash::new(encoded)
            .map_err(|e| anyhow::anyhow!("invalid password hash: {e}"))?;
        Ok(self.argon2.verify_password(raw.as_bytes(), &parsed).is_ok())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn encodes_with_fresh_salt() {
        let encoder = PasswordEncoder::default();
        let a = encoder.encode("hunter2").unwrap();
        let b = encoder.encode("hunter2").unwrap();
        assert_ne!(a, b);
        assert!(a.starts_with("$argon2id$"));
        assert!(encoder.matches("hunter2", &a).unwrap());
        assert!(!encoder.matches("hunter3", &b).unwrap());
    }

    #[test]
    fn rejects_garbage_hash() {
        assert!(PasswordEncoder::default().matches("x", "plain").is_err());
    }
}
