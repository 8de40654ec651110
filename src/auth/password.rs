use argon2::{
    password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Algorithm, Argon2, Params, Version,
};
use rand::rngs::OsRng;
use std::sync::Arc;
use tracing::error;

use crate::config::PasswordConfig;

/// Argon2id hashing with the configured cost. Verification reads the
/// parameters back out of the stored PHC string, so old hashes keep
/// verifying after the cost is raised.
#[derive(Clone)]
pub struct PasswordHashing {
    params: Params,
    // verified against when the account is unknown, so both login paths cost the same
    decoy_hash: Arc<str>,
}

impl PasswordHashing {
    pub fn from_config(cfg: &PasswordConfig) -> anyhow::Result<Self> {
        let params = Params::new(cfg.memory_kib, cfg.iterations, cfg.parallelism, None)
            .map_err(|e| anyhow::anyhow!("invalid argon2 parameters: {e}"))?;
        let mut hashing = Self {
            params,
            decoy_hash: Arc::from(""),
        };
        hashing.decoy_hash = hashing.hash("taskdesk-decoy-password")?.into();
        Ok(hashing)
    }

    fn argon2(&self) -> Argon2<'static> {
        Argon2::new(Algorithm::Argon2id, Version::V0x13, self.params.clone())
    }

    pub fn hash(&self, plain: &str) -> anyhow::Result<String> {
        let salt = SaltString::generate(&mut OsRng);
        let hash = self
            .argon2()
            .hash_password(plain.as_bytes(), &salt)
            .map_err(|e| {
                error!(error = %e, "argon2 hash_password error");
                anyhow::anyhow!(e.to_string())
            })?
            .to_string();
        Ok(hash)
    }

    /// Run a full verification that can never succeed.
    pub fn verify_decoy(&self, plain: &str) {
        let _ = self.verify(plain, &self.decoy_hash);
    }

    pub fn verify(&self, plain: &str, hash: &str) -> anyhow::Result<bool> {
        let parsed = PasswordHash::new(hash).map_err(|e| {
            error!(error = %e, "argon2 parse hash error");
            anyhow::anyhow!(e.to_string())
        })?;
        Ok(Argon2::default()
            .verify_password(plain.as_bytes(), &parsed)
            .is_ok())
    }
}
