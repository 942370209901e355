//! Client configuration
//!
//! `HttpConfig` is a plain value with `with_*` builder methods. It is
//! validated once when the client is built and then shared read-only.

pub mod core;
pub mod timeouts;
pub mod validation;

pub use self::core::HttpConfig;
pub use validation::{ConfigValidator, ConfigurationError};
