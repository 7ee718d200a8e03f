//! Authentication for SSH sessions
//!
//! The SSH handler only asks a [`CredentialVerifier`]; the account table
//! from the configuration is one implementation.

mod passwords;

pub use passwords::{hash_password, CredentialVerifier, PasswordTable};
