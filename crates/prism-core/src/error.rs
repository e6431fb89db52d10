//! Error types for Prism

use thiserror::Error;

/// The main error type for Prism operations
#[derive(Debug, Error)]
pub enum PrismError {
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Invalid model: {0}")]
    InvalidModel(String),

    #[error("No auth, please sign in")]
    Unauthenticated,

    #[error("No permission: {0}")]
    Forbidden(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Insufficient credits: need {required}, have {available}")]
    InsufficientCredits { required: u32, available: u32 },

    #[error("Provider not configured: {0}")]
    ProviderUnconfigured(String),

    #[error("Ledger error: {0}")]
    LedgerError(String),

    #[error("Config error: {0}")]
    ConfigError(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("TOML parse error: {0}")]
    TomlParseError(String),

    #[error("TOML serialization error: {0}")]
    TomlSerError(String),
}

impl PrismError {
    /// Stable machine-readable code used in API responses
    pub fn code(&self) -> &'static str {
        match self {
            PrismError::InvalidInput(_) => "invalid_input",
            PrismError::InvalidModel(_) => "invalid_model",
            PrismError::Unauthenticated => "unauthenticated",
            PrismError::Forbidden(_) => "forbidden",
            PrismError::NotFound(_) => "not_found",
            PrismError::InsufficientCredits { .. } => "insufficient_credits",
            PrismError::ProviderUnconfigured(_) => "provider_unconfigured",
            PrismError::LedgerError(_)
            | PrismError::IoError(_)
            | PrismError::TomlParseError(_)
            | PrismError::TomlSerError(_) => "ledger",
            PrismError::ConfigError(_) => "config",
        }
    }
}

/// Result type alias for Prism operations
pub type Result<T> = std::result::Result<T, PrismError>;

impl From<toml::de::Error> for PrismError {
    fn from(err: toml::de::Error) -> Self {
        PrismError::TomlParseError(err.to_string())
    }
}

impl From<toml::ser::Error> for PrismError {
    fn from(err: toml::ser::Error) -> Self {
        PrismError::TomlSerError(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_insufficient_credits_message() {
        let err = PrismError::InsufficientCredits {
            required: 6,
            available: 3,
        };
        assert_eq!(err.to_string(), "Insufficient credits: need 6, have 3");
        assert_eq!(err.code(), "insufficient_credits");
    }

    #[test]
    fn test_toml_errors_map_to_ledger_code() {
        let err: PrismError = toml::from_str::<toml::Value>("= nope").unwrap_err().into();
        assert!(matches!(err, PrismError::TomlParseError(_)));
        assert_eq!(err.code(), "ledger");
    }
}
