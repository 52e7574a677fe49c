//! Common error types for api-proxy.
//!
//! These errors are raised while building configuration values and are shared
//! by the crates that consume them.

use thiserror::Error;

/// A result type using `CoreError`.
pub type Result<T> = std::result::Result<T, CoreError>;

/// Core errors that can occur while building target configuration.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum CoreError {
    /// A path rule declared both an exact path and a regex.
    #[error("path rule for method {method} declares both `exact` and `regex`")]
    AmbiguousPathRule {
        /// The method of the offending rule.
        method: String,
    },

    /// A path rule declared neither an exact path nor a regex.
    #[error("path rule for method {method} declares neither `exact` nor `regex`")]
    EmptyPathRule {
        /// The method of the offending rule.
        method: String,
    },

    /// A path rule has no method.
    #[error("path rule has an empty method")]
    MissingMethod,
}
