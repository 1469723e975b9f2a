//! Password hashing utilities

use bcrypt::{hash, verify, DEFAULT_COST};

// Minimum bcrypt cost keeps the test suite fast.
#[cfg(not(test))]
const COST: u32 = DEFAULT_COST;
#[cfg(test)]
const COST: u32 = 4;

#[derive(thiserror::Error, Debug)]
pub enum PasswordError {
    #[error("Password hashing failed: {0}")]
    Bcrypt(#[from] bcrypt::BcryptError),
}

/// Hash a password using bcrypt
pub fn hash_password(password: &str) -> Result<String, PasswordError> {
    Ok(hash(password, COST)?)
}

/// Verify a password against a stored bcrypt hash
pub fn verify_password(password: &str, stored: &str) -> Result<bool, PasswordError> {
    Ok(verify(password, stored)?)
}
