//! Service-level errors.

use derive_more::{Display, From};
use tab_game::GameError;

use crate::store::StoreError;

/// Why a request was refused.
///
/// Validation and credential failures are raised before any session is
/// touched; game errors leave the session unchanged.
#[derive(Debug, Display, From)]
pub enum ServiceError {
    /// Malformed or missing request fields.
    #[display("{}", _0)]
    Validation(String),

    /// Unknown user or wrong password.
    #[display("Auth failed")]
    Unauthorized,

    /// The nick is registered with another password.
    #[display("User registered with different password")]
    CredentialsMismatch,

    /// No session with this id.
    #[display("Game not found: {}", _0)]
    SessionNotFound(String),

    /// The session refused the action.
    #[display("{}", _0)]
    #[from]
    Game(GameError),

    /// Persisting state failed.
    #[display("{}", _0)]
    #[from]
    Store(StoreError),

    /// A state frame could not be encoded.
    #[display("Failed to encode game state: {}", _0)]
    #[from]
    Encode(serde_json::Error),
}

impl std::error::Error for ServiceError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Game(e) => Some(e),
            Self::Store(e) => Some(e),
            Self::Encode(e) => Some(e),
            _ => None,
        }
    }
}

impl ServiceError {
    /// Builds a validation error.
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }
}
