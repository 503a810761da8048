use std::fmt;

/// CORS configuration error
///
/// Returned when the `cors` middleware options are invalid or violate CORS
/// requirements.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CorsConfigError {
    /// Wildcard origin (`*`) cannot be used with credentials
    WildcardWithCredentials,
    /// An origin pattern is not a valid regular expression
    InvalidPattern {
        /// The offending pattern
        pattern: String,
        /// Regex compiler message
        reason: String,
    },
    /// The options block does not have the expected shape
    InvalidOptions(String),
}

impl fmt::Display for CorsConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CorsConfigError::WildcardWithCredentials => {
                write!(
                    f,
                    "CORS configuration error: Cannot use wildcard origin (*) with credentials. \
                    When allowCredentials is true, you must specify exact origins."
                )
            }
            CorsConfigError::InvalidPattern { pattern, reason } => {
                write!(
                    f,
                    "CORS configuration error: Invalid origin pattern '{pattern}': {reason}"
                )
            }
            CorsConfigError::InvalidOptions(reason) => {
                write!(f, "CORS configuration error: {reason}")
            }
        }
    }
}

impl std::error::Error for CorsConfigError {}
