//! Error categorization for better diagnostics and reporting.
//!
//! Failed requests are classified into categories (client errors, server
//! errors, network issues, timeouts) which label the per-category error
//! counter exported on `/metrics`.

use std::fmt;

/// Categories of errors that can occur during load testing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCategory {
    /// HTTP 4xx errors (client errors)
    ClientError,

    /// HTTP 5xx errors (server errors)
    ServerError,

    /// Network connectivity errors (DNS, connection refused, etc.)
    NetworkError,

    /// Request timeout errors
    TimeoutError,

    /// TLS/SSL certificate errors
    TlsError,

    /// The request could not be built (bad method, URL or header)
    InvalidRequest,

    /// Other/unknown errors
    OtherError,
}

impl ErrorCategory {
    /// Categorize an HTTP status code.
    ///
    /// Returns None for 2xx/3xx responses.
    pub fn from_status_code(status_code: u16) -> Option<Self> {
        match status_code {
            200..=399 => None,
            400..=499 => Some(ErrorCategory::ClientError),
            500..=599 => Some(ErrorCategory::ServerError),
            _ => Some(ErrorCategory::OtherError),
        }
    }

    /// Categorize a reqwest error.
    pub fn from_reqwest_error(error: &reqwest::Error) -> Self {
        if error.is_timeout() {
            ErrorCategory::TimeoutError
        } else if error.is_builder() {
            ErrorCategory::InvalidRequest
        } else if error.is_connect() || error.is_request() {
            ErrorCategory::NetworkError
        } else if error.is_body() || error.is_decode() {
            ErrorCategory::NetworkError
        } else if error.is_redirect() {
            ErrorCategory::ClientError
        } else {
            Self::from_message(&error.to_string())
        }
    }

    /// Categorize by scanning an error message for common patterns.
    pub fn from_message(message: &str) -> Self {
        let error_msg = message.to_lowercase();

        if error_msg.contains("certificate") || error_msg.contains("tls") || error_msg.contains("ssl")
        {
            ErrorCategory::TlsError
        } else if error_msg.contains("timeout") || error_msg.contains("timed out") {
            ErrorCategory::TimeoutError
        } else if error_msg.contains("dns")
            || error_msg.contains("resolve")
            || error_msg.contains("connect")
            || error_msg.contains("connection")
        {
            ErrorCategory::NetworkError
        } else {
            ErrorCategory::OtherError
        }
    }

    /// Get the Prometheus label for this error category.
    pub fn label(&self) -> &'static str {
        match self {
            ErrorCategory::ClientError => "client_error",
            ErrorCategory::ServerError => "server_error",
            ErrorCategory::NetworkError => "network_error",
            ErrorCategory::TimeoutError => "timeout_error",
            ErrorCategory::TlsError => "tls_error",
            ErrorCategory::InvalidRequest => "invalid_request",
            ErrorCategory::OtherError => "other_error",
        }
    }

    /// Get a human-readable description of this error category.
    pub fn description(&self) -> &'static str {
        match self {
            ErrorCategory::ClientError => "HTTP 4xx Client Errors",
            ErrorCategory::ServerError => "HTTP 5xx Server Errors",
            ErrorCategory::NetworkError => "Network/Connection Errors",
            ErrorCategory::TimeoutError => "Request Timeout Errors",
            ErrorCategory::TlsError => "TLS/SSL Certificate Errors",
            ErrorCategory::InvalidRequest => "Malformed Request Errors",
            ErrorCategory::OtherError => "Other/Unknown Errors",
        }
    }
}

impl fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.description())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_categorize_success_codes() {
        assert_eq!(ErrorCategory::from_status_code(200), None);
        assert_eq!(ErrorCategory::from_status_code(204), None);
        assert_eq!(ErrorCategory::from_status_code(302), None);
    }

    #[test]
    fn test_categorize_4xx_errors() {
        assert_eq!(
            ErrorCategory::from_status_code(404),
            Some(ErrorCategory::ClientError)
        );
        assert_eq!(
            ErrorCategory::from_status_code(429),
            Some(ErrorCategory::ClientError)
        );
    }

    #[test]
    fn test_categorize_5xx_errors() {
        assert_eq!(
            ErrorCategory::from_status_code(500),
            Some(ErrorCategory::ServerError)
        );
        assert_eq!(
            ErrorCategory::from_status_code(503),
            Some(ErrorCategory::ServerError)
        );
    }

    #[test]
    fn test_unusual_codes_are_other() {
        assert_eq!(
            ErrorCategory::from_status_code(0),
            Some(ErrorCategory::OtherError)
        );
        assert_eq!(
            ErrorCategory::from_status_code(101),
            Some(ErrorCategory::OtherError)
        );
    }

    #[test]
    fn test_categorize_messages() {
        assert_eq!(
            ErrorCategory::from_message("invalid peer certificate: UnknownIssuer"),
            ErrorCategory::TlsError
        );
        assert_eq!(
            ErrorCategory::from_message("operation timed out"),
            ErrorCategory::TimeoutError
        );
        assert_eq!(
            ErrorCategory::from_message("tcp connect error: Connection refused"),
            ErrorCategory::NetworkError
        );
        assert_eq!(
            ErrorCategory::from_message("something odd"),
            ErrorCategory::OtherError
        );
    }

    #[test]
    fn test_error_category_labels() {
        assert_eq!(ErrorCategory::ClientError.label(), "client_error");
        assert_eq!(ErrorCategory::ServerError.label(), "server_error");
        assert_eq!(ErrorCategory::NetworkError.label(), "network_error");
        assert_eq!(ErrorCategory::InvalidRequest.label(), "invalid_request");
    }

    #[test]
    fn test_display_uses_description() {
        assert_eq!(
            ErrorCategory::ServerError.to_string(),
            "HTTP 5xx Server Errors"
        );
    }
}
