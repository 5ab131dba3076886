use std::sync::Arc;

use thiserror::Error;

#[derive(Debug, Error)]
#[error("password hashing failed: {0}")]
pub struct HashError(#[from] bcrypt::BcryptError);

/// PasswordHasher
///
/// One-way hashing of plaintext passwords. Kept behind a trait so tests can run
/// with a cheap work factor and handlers never touch bcrypt directly.
pub trait PasswordHasher: Send + Sync {
    fn hash(&self, plaintext: &str) -> Result<String, HashError>;

    /// True when `plaintext` hashes to `digest`. A digest that cannot be parsed
    /// counts as a mismatch.
    fn matches(&self, digest: &str, plaintext: &str) -> bool;

    /// Does the work of `matches` against a throwaway digest. Used when there is no
    /// stored digest to compare, so that rejection costs the same as a wrong password.
    fn match_decoy(&self, plaintext: &str);
}

/// bcrypt with a configurable cost.
#[derive(Debug, Clone)]
pub struct BcryptHasher {
    cost: u32,
    // Hashed once at the configured cost for `match_decoy`.
    decoy: String,
}

impl BcryptHasher {
    pub fn new(cost: u32) -> Self {
        let decoy = bcrypt::hash("photo-vault-decoy", cost).unwrap_or_else(|e| {
            tracing::warn!(error = %e, cost, "could not prepare the decoy digest");
            String::new()
        });
        Self { cost, decoy }
    }
}

impl PasswordHasher for BcryptHasher {
    fn hash(&self, plaintext: &str) -> Result<String, HashError> {
        Ok(bcrypt::hash(plaintext, self.cost)?)
    }

    fn matches(&self, digest: &str, plaintext: &str) -> bool {
        bcrypt::verify(plaintext, digest).unwrap_or_else(|e| {
            tracing::warn!(error = %e, "stored password digest could not be verified");
            false
        })
    }

    fn match_decoy(&self, plaintext: &str) {
        let _ = bcrypt::verify(plaintext, &self.decoy);
    }
}

pub type HasherState = Arc<dyn PasswordHasher>;
