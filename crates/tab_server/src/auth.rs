//! Credential registration and checks.

use sha2::{Digest, Sha256};
use tracing::{debug, info, instrument, warn};

use crate::error::ServiceError;
use crate::store::{Repository, UserRecord};

/// Hex-encoded SHA-256 of the password.
pub fn digest(password: &str) -> String {
    hex::encode(Sha256::digest(password.as_bytes()))
}

/// Registers `nick`, or confirms the password of an existing user.
///
/// # Errors
///
/// [`ServiceError::CredentialsMismatch`] when the nick exists with a
/// different password; storage failures otherwise.
#[instrument(skip(store, password))]
pub fn register(store: &dyn Repository, nick: &str, password: &str) -> Result<(), ServiceError> {
    let hashed = digest(password);
    match store.user(nick)? {
        Some(user) if *user.password_digest() == hashed => {
            debug!("Existing user confirmed");
            Ok(())
        }
        Some(_) => {
            warn!("Registration with a different password");
            Err(ServiceError::CredentialsMismatch)
        }
        None => {
            store.save_user(&UserRecord::new(nick.to_string(), hashed))?;
            info!("User registered");
            Ok(())
        }
    }
}

/// Verifies a nick/password pair and returns the user record.
///
/// # Errors
///
/// [`ServiceError::Unauthorized`] for unknown users or wrong passwords.
#[instrument(skip(store, password))]
pub fn authenticate(
    store: &dyn Repository,
    nick: &str,
    password: &str,
) -> Result<UserRecord, ServiceError> {
    match store.user(nick)? {
        Some(user) if *user.password_digest() == digest(password) => Ok(user),
        _ => {
            debug!("Authentication failed");
            Err(ServiceError::Unauthorized)
        }
    }
}
