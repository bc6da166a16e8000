//! Test configuration validation.
//!
//! Checks a submitted [`TestConfig`] before it reaches the engine, collecting
//! every problem so the caller sees them all at once.

use thiserror::Error;

use crate::models::TestConfig;

/// Largest request budget accepted for a single test.
pub const MAX_REQUESTS: u64 = 1_000_000;

/// Largest worker count accepted for a single test.
pub const MAX_CONCURRENCY: u64 = 10_000;

/// Validation error with context about which field failed.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ValidationError {
    #[error("Field '{field}': {message}")]
    FieldError { field: String, message: String },

    #[error("Field '{field}' is required but not provided")]
    RequiredField { field: String },

    #[error("Field '{field}': value {value} is out of range ({min} to {max})")]
    OutOfRange {
        field: String,
        value: String,
        min: String,
        max: String,
    },

    #[error("Field '{field}': invalid format - {message}")]
    InvalidFormat { field: String, message: String },

    #[error("Field '{field}': invalid enum value '{value}'. Expected one of: {expected}")]
    InvalidEnum {
        field: String,
        value: String,
        expected: String,
    },

    #[error("Multiple validation errors: {0}")]
    Multiple(String),
}

/// Result type for validation operations.
pub type ValidationResult<T> = Result<T, ValidationError>;

/// Collects validation errors under a dotted field path.
pub struct ValidationContext {
    field_path: Vec<String>,
    errors: Vec<ValidationError>,
}

impl ValidationContext {
    pub fn new() -> Self {
        Self {
            field_path: Vec::new(),
            errors: Vec::new(),
        }
    }

    /// Enter a nested field context.
    pub fn enter(&mut self, field: &str) {
        self.field_path.push(field.to_string());
    }

    /// Exit the current field context.
    pub fn exit(&mut self) {
        self.field_path.pop();
    }

    /// Get the current field path as a string.
    pub fn current_path(&self) -> String {
        self.field_path.join(".")
    }

    /// Add a validation error.
    pub fn add_error(&mut self, error: ValidationError) {
        self.errors.push(error);
    }

    /// Record the error of a failed check, if any.
    pub fn check(&mut self, result: ValidationResult<()>) {
        if let Err(e) = result {
            self.add_error(e);
        }
    }

    /// Add a field error with automatic path.
    pub fn field_error(&mut self, message: String) {
        self.add_error(ValidationError::FieldError {
            field: self.current_path(),
            message,
        });
    }

    /// Consume the context and return a result.
    ///
    /// A single error is returned as-is; several are joined into `Multiple`.
    pub fn into_result(mut self) -> Result<(), ValidationError> {
        match self.errors.len() {
            0 => Ok(()),
            1 => Err(self.errors.remove(0)),
            _ => {
                let messages: Vec<String> = self.errors.iter().map(|e| e.to_string()).collect();
                Err(ValidationError::Multiple(messages.join("; ")))
            }
        }
    }
}

impl Default for ValidationContext {
    fn default() -> Self {
        Self::new()
    }
}

/// Validator for URLs.
pub struct UrlValidator;

impl UrlValidator {
    pub fn validate(url: &str, field: &str) -> ValidationResult<()> {
        if url.is_empty() {
            return Err(ValidationError::RequiredField {
                field: field.to_string(),
            });
        }

        if !url.starts_with("http://") && !url.starts_with("https://") {
            return Err(ValidationError::InvalidFormat {
                field: field.to_string(),
                message: format!("URL must start with http:// or https://, got: {}", url),
            });
        }

        if url.contains(' ') {
            return Err(ValidationError::InvalidFormat {
                field: field.to_string(),
                message: "URL cannot contain spaces".to_string(),
            });
        }

        Ok(())
    }
}

/// Validator for numeric ranges.
pub struct RangeValidator;

impl RangeValidator {
    pub fn validate_u64(value: u64, min: u64, max: u64, field: &str) -> ValidationResult<()> {
        if value < min || value > max {
            return Err(ValidationError::OutOfRange {
                field: field.to_string(),
                value: value.to_string(),
                min: min.to_string(),
                max: max.to_string(),
            });
        }
        Ok(())
    }
}

/// Validator for HTTP methods.
pub struct HttpMethodValidator;

impl HttpMethodValidator {
    const VALID_METHODS: &'static [&'static str] =
        &["GET", "POST", "PUT", "PATCH", "DELETE", "HEAD", "OPTIONS"];

    pub fn validate(method: &str) -> ValidationResult<()> {
        if method.trim().is_empty() {
            return Err(ValidationError::RequiredField {
                field: "method".to_string(),
            });
        }

        let method_upper = method.trim().to_uppercase();
        if !Self::VALID_METHODS.contains(&method_upper.as_str()) {
            return Err(ValidationError::InvalidEnum {
                field: "method".to_string(),
                value: method.to_string(),
                expected: Self::VALID_METHODS.join(", "),
            });
        }
        Ok(())
    }
}

/// Validates a test configuration submitted to the service.
pub fn validate_test_config(config: &TestConfig) -> ValidationResult<()> {
    let mut ctx = ValidationContext::new();

    ctx.check(UrlValidator::validate(config.endpoint.trim(), "endpoint"));
    ctx.check(HttpMethodValidator::validate(&config.method));
    ctx.check(RangeValidator::validate_u64(
        config.requests as u64,
        1,
        MAX_REQUESTS,
        "requests",
    ));
    ctx.check(RangeValidator::validate_u64(
        config.concurrency as u64,
        1,
        MAX_CONCURRENCY,
        "concurrency",
    ));

    ctx.enter("headers");
    for name in config.headers.keys() {
        if name.trim().is_empty() {
            ctx.field_error("header name cannot be empty".to_string());
        }
    }
    ctx.exit();

    ctx.into_result()
}
