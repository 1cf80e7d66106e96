use chrono::{DateTime, Utc};
use std::fmt;
use std::time::Duration;

use crate::app::error::{AppError, ErrorCode};

#[derive(Clone, PartialEq, Eq)]
pub struct WalkthroughRequest {
    pub username: String,
    pub password: String,
    pub apps: Vec<String>,
    pub verify_installation: bool,
}

impl WalkthroughRequest {
    pub fn new(
        username: impl Into<String>,
        password: impl Into<String>,
        apps: Vec<String>,
        verify_installation: bool,
        trace_id: &str,
    ) -> Result<Self, AppError> {
        let username = username.into();
        let password = password.into();
        if username.trim().is_empty() {
            return Err(AppError::validation("username is required", trace_id));
        }
        if password.is_empty() {
            return Err(AppError::validation("password is required", trace_id));
        }
        let apps = apps
            .into_iter()
            .filter(|app| !app.trim().is_empty())
            .collect::<Vec<_>>();
        if apps.is_empty() {
            return Err(AppError::validation(
                "at least one app name is required",
                trace_id,
            ));
        }
        Ok(Self {
            username,
            password,
            apps,
            verify_installation,
        })
    }
}

// Keeps the password out of logs.
impl fmt::Debug for WalkthroughRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WalkthroughRequest")
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .field("apps", &self.apps)
            .field("verify_installation", &self.verify_installation)
            .finish()
    }
}

#[derive(Debug, Clone)]
pub struct WalkthroughResult {
    pub success: bool,
    pub timed_out: bool,
    pub started_at: DateTime<Utc>,
    pub duration_ms: u128,
}

impl WalkthroughResult {
    pub fn new(success: bool, timed_out: bool, started_at: DateTime<Utc>, elapsed: Duration) -> Self {
        Self {
            success,
            timed_out,
            started_at,
            duration_ms: elapsed.as_millis(),
        }
    }

    /// Deadline expiry and interruption end the run unsuccessfully; any other error here is
    /// one no flow absorbed, which also means failure.
    pub fn from_outcome(
        outcome: &Result<bool, AppError>,
        started_at: DateTime<Utc>,
        elapsed: Duration,
    ) -> Self {
        match outcome {
            Ok(success) => Self::new(*success, false, started_at, elapsed),
            Err(err) => Self::new(
                false,
                err.code == ErrorCode::WatchdogTimeout,
                started_at,
                elapsed,
            ),
        }
    }

    pub fn exit_code(&self) -> u8 {
        if self.success {
            0
        } else {
            1
        }
    }
}
