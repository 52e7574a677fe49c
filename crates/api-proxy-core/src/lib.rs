//! Core types for api-proxy.
//!
//! This crate provides the configuration model shared by the gateway:
//!
//! - **Targets**: [`TargetConfig`], [`TargetKind`] and [`Protocol`]
//! - **Policy**: [`Privileges`] and [`PathRule`], resolving the privilege
//!   level required for a path and method
//!
//! # Example
//!
//! ```
//! use api_proxy_core::{PathRule, Privileges, Protocol, TargetConfig};
//!
//! let privileges = Privileges::with_default(0)
//!     .rule(PathRule::exact("GET", "/catalog/templates", 5));
//! let config = TargetConfig::single("catalog", Protocol::Http, "http://catalog:8080")
//!     .with_privileges(privileges);
//!
//! assert_eq!(config.privileges.resolve("/catalog/templates", "GET"), 5);
//! assert_eq!(config.privileges.resolve("/catalog", "GET"), 0);
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]

pub mod config;
pub mod error;
pub mod policy;

pub use config::{Protocol, TargetConfig, TargetKind};
pub use error::{CoreError, Result};
pub use policy::{PathMatcher, PathRule, Privileges, RegexMatcher, MAX_PRIVILEGE};
