//! Configuration validation

use std::time::Duration;

use super::core::HttpConfig;

/// Configuration validation result type
pub type ConfigResult<T> = Result<T, ConfigurationError>;

/// Configuration error types
#[derive(Debug, thiserror::Error)]
pub enum ConfigurationError {
    #[error("Invalid timeout value: {0}")]
    InvalidTimeout(String),

    #[error("Invalid configuration parameter: {0}")]
    InvalidParameter(String),

    #[error("Configuration conflict: {0}")]
    Conflict(String),
}

/// Common configuration validation utilities
pub struct ConfigValidator;

impl ConfigValidator {
    /// Validate timeout duration
    ///
    /// # Errors
    ///
    /// Returns `ConfigurationError::InvalidTimeout` if the duration is zero.
    pub fn validate_timeout(timeout: Duration, name: &str) -> ConfigResult<()> {
        if timeout.is_zero() {
            return Err(ConfigurationError::InvalidTimeout(format!(
                "{name} cannot be zero"
            )));
        }
        Ok(())
    }

    /// Validate an optional connection limit
    ///
    /// # Errors
    ///
    /// Returns `ConfigurationError::InvalidParameter` for a limit of zero.
    pub fn validate_limit(limit: Option<usize>, name: &str) -> ConfigResult<()> {
        if limit == Some(0) {
            return Err(ConfigurationError::InvalidParameter(format!(
                "{name} must be at least 1 when set"
            )));
        }
        Ok(())
    }
}

impl HttpConfig {
    /// Validate the configuration
    ///
    /// # Errors
    ///
    /// Returns a builder error if a timeout is zero, a limit is zero, or the
    /// per-host limit exceeds the global limit.
    pub fn validate(&self) -> crate::Result<()> {
        self.check().map_err(|e| {
            tracing::warn!(target: "conduit::pool", error = %e, "configuration rejected");
            crate::error::configuration(e)
        })
    }

    fn check(&self) -> ConfigResult<()> {
        ConfigValidator::validate_timeout(self.connect_timeout, "connect_timeout")?;
        ConfigValidator::validate_timeout(self.write_timeout, "write_timeout")?;
        ConfigValidator::validate_timeout(self.pool_cleaner_period, "pool_cleaner_period")?;
        if let Some(timeout) = self.request_timeout {
            ConfigValidator::validate_timeout(timeout, "request_timeout")?;
        }
        if let Some(timeout) = self.read_idle_timeout {
            ConfigValidator::validate_timeout(timeout, "read_idle_timeout")?;
        }
        ConfigValidator::validate_limit(self.max_connections, "max_connections")?;
        ConfigValidator::validate_limit(self.max_connections_per_host, "max_connections_per_host")?;
        if let (Some(total), Some(per_host)) = (self.max_connections, self.max_connections_per_host)
            && per_host > total
        {
            return Err(ConfigurationError::Conflict(format!(
                "max_connections_per_host ({per_host}) exceeds max_connections ({total})"
            )));
        }
        if self.feeder_max_pending_bytes == 0 {
            return Err(ConfigurationError::InvalidParameter(
                "feeder_max_pending_bytes cannot be zero".to_string(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_is_valid() {
        assert!(HttpConfig::default().validate().is_ok());
    }

    #[test]
    fn per_host_limit_above_total_is_rejected() {
        let config = HttpConfig::default()
            .with_max_connections(Some(2))
            .with_max_connections_per_host(Some(4));
        let err = config.validate().expect_err("conflicting limits must fail");
        assert!(err.is_builder());
    }

    #[test]
    fn zero_limit_is_rejected() {
        let config = HttpConfig::default().with_max_connections_per_host(Some(0));
        assert!(config.validate().is_err());
    }
}
