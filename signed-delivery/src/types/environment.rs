//! Deployment stage selection

use std::env;
use std::fmt;

use super::ConfigError;

/// Application environment
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Environment {
    /// Production: JSON logs, info level
    Production,
    /// Development: human-readable logs, debug level
    #[default]
    Development,
}

impl Environment {
    /// Reads the `APP_ENV` environment variable, defaulting to development
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::Invalid` for values other than `production` or `development`
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::parse(env::var("APP_ENV").ok().as_deref())
    }

    pub(crate) fn parse(value: Option<&str>) -> Result<Self, ConfigError> {
        let Some(value) = value else {
            return Ok(Self::default());
        };

        match value.trim().to_lowercase().as_str() {
            "production" => Ok(Self::Production),
            "development" | "" => Ok(Self::Development),
            other => Err(ConfigError::Invalid {
                var: "APP_ENV",
                value: other.to_string(),
                reason: "expected production or development".to_string(),
            }),
        }
    }

    /// Whether logs should be emitted as JSON
    #[must_use]
    pub const fn json_logs(self) -> bool {
        matches!(self, Self::Production)
    }

    /// Log filter used when `RUST_LOG` is not set
    #[must_use]
    pub const fn default_log_filter(self) -> &'static str {
        match self {
            Self::Production => "info",
            Self::Development => "debug,hyper=info,aws_smithy_runtime=info",
        }
    }
}

impl fmt::Display for Environment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Production => f.write_str("production"),
            Self::Development => f.write_str("development"),
        }
    }
}
