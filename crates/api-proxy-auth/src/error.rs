//! Gatekeeper error types.

use thiserror::Error;

/// A result type using `AuthError`.
pub type Result<T> = std::result::Result<T, AuthError>;

/// Errors that can occur while checking access with the authentication service.
#[derive(Debug, Error)]
pub enum AuthError {
    /// The route is protected but no token was presented.
    #[error("authorization token required but not present")]
    MissingToken,

    /// The authentication service rejected the token.
    #[error("authentication service rejected the token with status {status}")]
    Rejected {
        /// Status code returned by the authentication service.
        status: u16,
    },

    /// The token is valid but its permissions are below the required level.
    #[error("too low privileges: granted {granted}, required {required}")]
    InsufficientPrivileges {
        /// The token returned by the authentication service, possibly rotated.
        token: String,
        /// Permission level carried by the token.
        granted: i64,
        /// Level required by the requested path.
        required: u32,
    },

    /// The authentication service could not be reached or timed out.
    #[error("authentication service unavailable: {0}")]
    Unavailable(String),

    /// The authentication service answered with an undecodable body.
    #[error("invalid response from authentication service: {0}")]
    InvalidResponse(String),

    /// An internal error occurred.
    #[error("internal error: {0}")]
    Internal(String),
}

impl AuthError {
    /// Returns `true` if the caller is not authorized, as opposed to the check
    /// itself having failed.
    #[must_use]
    pub const fn is_unauthorized(&self) -> bool {
        matches!(
            self,
            Self::MissingToken | Self::Rejected { .. } | Self::InsufficientPrivileges { .. }
        )
    }

    /// The token issued by the authentication service alongside this error.
    ///
    /// Rotation may happen even when authorization fails, in which case the
    /// new token must still reach the client.
    #[must_use]
    pub fn issued_token(&self) -> Option<&str> {
        match self {
            Self::InsufficientPrivileges { token, .. } if !token.is_empty() => Some(token),
            _ => None,
        }
    }

    /// Returns the appropriate HTTP status code for this error.
    #[must_use]
    pub const fn http_status_code(&self) -> u16 {
        match self {
            Self::MissingToken | Self::Rejected { .. } | Self::InsufficientPrivileges { .. } => 401,
            Self::Unavailable(_) => 503,
            Self::InvalidResponse(_) | Self::Internal(_) => 500,
        }
    }
}
