use serde::Serialize;
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ErrorCode {
    #[serde(rename = "ERR_VALIDATION")]
    Validation,
    #[serde(rename = "ERR_CONFIG")]
    Config,
    #[serde(rename = "ERR_ELEMENT_NOT_FOUND")]
    ElementNotFound,
    #[serde(rename = "ERR_DRIVER")]
    DriverCommunication,
    #[serde(rename = "ERR_WATCHDOG")]
    WatchdogTimeout,
    #[serde(rename = "ERR_INTERRUPTED")]
    Interrupted,
    #[serde(rename = "ERR_SYSTEM")]
    System,
}

impl ErrorCode {
    pub fn as_str(self) -> &'static str {
        match self {
            ErrorCode::Validation => "ERR_VALIDATION",
            ErrorCode::Config => "ERR_CONFIG",
            ErrorCode::ElementNotFound => "ERR_ELEMENT_NOT_FOUND",
            ErrorCode::DriverCommunication => "ERR_DRIVER",
            ErrorCode::WatchdogTimeout => "ERR_WATCHDOG",
            ErrorCode::Interrupted => "ERR_INTERRUPTED",
            ErrorCode::System => "ERR_SYSTEM",
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct AppError {
    pub error: String,
    pub code: ErrorCode,
    pub trace_id: String,
}

impl AppError {
    pub fn new(code: ErrorCode, message: impl Into<String>, trace_id: impl Into<String>) -> Self {
        Self {
            error: message.into(),
            code,
            trace_id: trace_id.into(),
        }
    }

    pub fn validation(message: impl Into<String>, trace_id: impl Into<String>) -> Self {
        Self::new(ErrorCode::Validation, message, trace_id)
    }

    pub fn config(message: impl Into<String>, trace_id: impl Into<String>) -> Self {
        Self::new(ErrorCode::Config, message, trace_id)
    }

    pub fn element_not_found(message: impl Into<String>, trace_id: impl Into<String>) -> Self {
        Self::new(ErrorCode::ElementNotFound, message, trace_id)
    }

    pub fn driver(message: impl Into<String>, trace_id: impl Into<String>) -> Self {
        Self::new(ErrorCode::DriverCommunication, message, trace_id)
    }

    pub fn watchdog(message: impl Into<String>, trace_id: impl Into<String>) -> Self {
        Self::new(ErrorCode::WatchdogTimeout, message, trace_id)
    }

    pub fn interrupted(message: impl Into<String>, trace_id: impl Into<String>) -> Self {
        Self::new(ErrorCode::Interrupted, message, trace_id)
    }

    pub fn system(message: impl Into<String>, trace_id: impl Into<String>) -> Self {
        Self::new(ErrorCode::System, message, trace_id)
    }

    /// Errors that end the whole run. Flows log and absorb everything else.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self.code,
            ErrorCode::WatchdogTimeout | ErrorCode::Interrupted
        )
    }
}

impl fmt::Display for AppError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.error, self.code.as_str())
    }
}

impl std::error::Error for AppError {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_watchdog_and_interrupt_are_fatal() {
        assert!(AppError::watchdog("budget elapsed", "t").is_fatal());
        assert!(AppError::interrupted("SIGINT", "t").is_fatal());
        assert!(!AppError::element_not_found("no Next", "t").is_fatal());
        assert!(!AppError::driver("adb offline", "t").is_fatal());
    }

    #[test]
    fn display_includes_code() {
        let err = AppError::element_not_found("Install never appeared", "trace-1");
        assert_eq!(
            err.to_string(),
            "Install never appeared (ERR_ELEMENT_NOT_FOUND)"
        );
    }
}
