use tracing::debug;

use super::runner::{AdbTarget, CommandOutput};
use crate::app::error::AppError;

/// Host-side device commands the flows need besides UI input.
pub trait ShellExecutor {
    fn clear_app_data(&mut self, package: &str) -> Result<(), AppError>;

    fn uninstall(&mut self, package: &str) -> Result<(), AppError>;

    /// `am start -n <component>`.
    fn start_component(&mut self, component: &str) -> Result<(), AppError>;

    /// `am start -W -a <action>`, waiting for the activity to come up.
    fn start_action(&mut self, action: &str) -> Result<(), AppError>;

    /// Sends the MAIN/HOME intent.
    fn go_home(&mut self) -> Result<(), AppError>;
}

pub struct AdbShell {
    target: AdbTarget,
    trace_id: String,
}

impl AdbShell {
    pub fn new(target: AdbTarget, trace_id: impl Into<String>) -> Self {
        Self {
            target,
            trace_id: trace_id.into(),
        }
    }

    fn checked(&self, what: &str, output: CommandOutput) -> Result<(), AppError> {
        // `am start` reports failures on stdout with a zero exit status.
        let combined = output.combined_lowercase();
        if !output.succeeded() || combined.contains("error:") || combined.contains("failure") {
            return Err(AppError::system(
                format!(
                    "{what} failed: {} {}",
                    output.stdout.trim(),
                    output.stderr.trim()
                )
                .trim_end()
                .to_string(),
                &self.trace_id,
            ));
        }
        debug!(trace_id = %self.trace_id, command = %what, "shell command ok");
        Ok(())
    }
}

impl ShellExecutor for AdbShell {
    fn clear_app_data(&mut self, package: &str) -> Result<(), AppError> {
        let output = self.target.shell(["pm", "clear", package], &self.trace_id)?;
        self.checked(&format!("pm clear {package}"), output)
    }

    fn uninstall(&mut self, package: &str) -> Result<(), AppError> {
        let output = self.target.run(["uninstall", package], &self.trace_id)?;
        self.checked(&format!("uninstall {package}"), output)
    }

    fn start_component(&mut self, component: &str) -> Result<(), AppError> {
        let output = self
            .target
            .shell(["am", "start", "-n", component], &self.trace_id)?;
        self.checked(&format!("am start -n {component}"), output)
    }

    fn start_action(&mut self, action: &str) -> Result<(), AppError> {
        let output = self
            .target
            .shell(["am", "start", "-W", "-a", action], &self.trace_id)?;
        self.checked(&format!("am start -a {action}"), output)
    }

    fn go_home(&mut self) -> Result<(), AppError> {
        let output = self.target.shell(
            [
                "am",
                "start",
                "-a",
                "android.intent.action.MAIN",
                "-c",
                "android.intent.category.HOME",
            ],
            &self.trace_id,
        )?;
        self.checked("am start HOME", output)
    }
}
