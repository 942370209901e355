//! Core HTTP configuration types and default implementations
//!
//! - `types`: the HttpConfig struct definition
//! - `defaults`: default values
//! - `builders`: builder methods for redirects, auth, proxying and filters

pub mod builders;
pub mod defaults;
pub mod types;

pub use types::HttpConfig;
