//! Password accounts

use std::collections::{BTreeMap, HashMap};

use anyhow::{bail, Result};
use sha2::{Digest, Sha256};

/// Prefix of a stored password digest
const DIGEST_PREFIX: &str = "sha256:";

/// Decides who may open an SSH session
pub trait CredentialVerifier: Send + Sync {
    /// Whether the user must present a password. Users who don't are
    /// admitted on the "none" method.
    fn requires_password(&self, user: &str) -> bool;

    /// Check a password for a user
    fn verify(&self, user: &str, password: &str) -> bool;
}

/// Stored credential for one account
#[derive(Debug, Clone, PartialEq, Eq)]
enum Credential {
    /// No password required
    Open,
    /// SHA-256 digest of the password
    Sha256([u8; 32]),
}

/// Account table loaded from the `[accounts]` configuration section
#[derive(Debug, Default)]
pub struct PasswordTable {
    accounts: HashMap<String, Credential>,
}

impl PasswordTable {
    /// Create an empty table (every login is rejected)
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a table from `user = "<empty>" | "sha256:<hex>"` entries
    pub fn from_accounts(accounts: &BTreeMap<String, String>) -> Result<Self> {
        let mut table = Self::new();

        for (user, value) in accounts {
            let credential = if value.is_empty() {
                Credential::Open
            } else {
                let Some(hex_digest) = value.strip_prefix(DIGEST_PREFIX) else {
                    bail!("Account {}: expected \"\" or \"{}<hex>\"", user, DIGEST_PREFIX);
                };
                let bytes = hex::decode(hex_digest)
                    .map_err(|e| anyhow::anyhow!("Account {}: invalid digest: {}", user, e))?;
                let digest: [u8; 32] = bytes
                    .try_into()
                    .map_err(|_| anyhow::anyhow!("Account {}: digest must be 32 bytes", user))?;
                Credential::Sha256(digest)
            };

            tracing::debug!(
                "Loaded account {} ({})",
                user,
                if credential == Credential::Open { "open" } else { "password" }
            );
            table.accounts.insert(user.clone(), credential);
        }

        Ok(table)
    }

    /// Add an account that needs no password
    pub fn add_open(&mut self, user: impl Into<String>) {
        self.accounts.insert(user.into(), Credential::Open);
    }

    /// Add an account with a password
    pub fn add_password(&mut self, user: impl Into<String>, password: &str) {
        self.accounts
            .insert(user.into(), Credential::Sha256(Sha256::digest(password).into()));
    }

    /// Number of accounts
    pub fn len(&self) -> usize {
        self.accounts.len()
    }

    /// Check if there are no accounts
    pub fn is_empty(&self) -> bool {
        self.accounts.is_empty()
    }
}

impl CredentialVerifier for PasswordTable {
    fn requires_password(&self, user: &str) -> bool {
        // Unknown users are treated like password accounts so they fall
        // through to a verification that always fails
        !matches!(self.accounts.get(user), Some(Credential::Open))
    }

    fn verify(&self, user: &str, password: &str) -> bool {
        match self.accounts.get(user) {
            Some(Credential::Open) => true,
            Some(Credential::Sha256(expected)) => {
                let actual: [u8; 32] = Sha256::digest(password).into();
                constant_time_eq(&actual, expected)
            }
            None => false,
        }
    }
}

/// Produce the `sha256:<hex>` form stored in the configuration
pub fn hash_password(password: &str) -> String {
    format!("{}{}", DIGEST_PREFIX, hex::encode(Sha256::digest(password)))
}

fn constant_time_eq(a: &[u8; 32], b: &[u8; 32]) -> bool {
    a.iter().zip(b.iter()).fold(0u8, |acc, (x, y)| acc | (x ^ y)) == 0
}
