use crate::config::models::GatewayConfig;

/// Validation result type alias
pub type ValidationResult<T> = Result<T, ValidationError>;

/// Validation error types
#[derive(Debug, thiserror::Error, Clone)]
pub enum ValidationError {
    #[error("Missing required field: {field}")]
    MissingField { field: String },

    #[error("Invalid field '{field}': {message}")]
    InvalidField { field: String, message: String },

    #[error("Validation failed: {message}")]
    ValidationFailed { message: String },
}

/// Gateway configuration validator
pub struct GatewayConfigValidator;

impl GatewayConfigValidator {
    /// Validate the entire gateway configuration
    pub fn validate(config: &GatewayConfig) -> ValidationResult<()> {
        let mut errors = Vec::new();

        if config.filter_scan.directories.is_empty() {
            errors.push(ValidationError::MissingField {
                field: "filter_scan.directories".to_string(),
            });
        }
        for directory in &config.filter_scan.directories {
            if directory.is_empty() {
                errors.push(ValidationError::InvalidField {
                    field: "filter_scan.directories".to_string(),
                    message: "Directory paths cannot be empty".to_string(),
                });
            }
        }

        if config.filter_scan.poll_interval_secs == 0 {
            errors.push(ValidationError::InvalidField {
                field: "filter_scan.poll_interval_secs".to_string(),
                message: "Poll interval must be at least 1 second".to_string(),
            });
        }

        if !config.filter_scan.script_suffix.starts_with('.')
            || config.filter_scan.script_suffix.len() < 2
        {
            errors.push(ValidationError::InvalidField {
                field: "filter_scan.script_suffix".to_string(),
                message: "Suffix must start with '.' followed by an extension".to_string(),
            });
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(ValidationError::ValidationFailed {
                message: Self::format_multiple_errors(errors),
            })
        }
    }

    /// Format multiple validation errors into a single message
    fn format_multiple_errors(errors: Vec<ValidationError>) -> String {
        if errors.len() == 1 {
            return errors[0].to_string();
        }

        let mut message = format!("Found {} validation errors:\n", errors.len());
        for (i, error) in errors.iter().enumerate() {
            message.push_str(&format!("  {}. {}\n", i + 1, error));
        }
        message
    }
}
