use std::io::Read;
use std::process::{Command, Stdio};
use std::thread::JoinHandle;
use std::time::{Duration, Instant};

use crate::app::error::AppError;

#[derive(Debug, Clone)]
pub struct CommandOutput {
    pub stdout: String,
    pub stderr: String,
    pub exit_code: Option<i32>,
}

impl CommandOutput {
    pub fn succeeded(&self) -> bool {
        self.exit_code == Some(0)
    }

    pub fn combined_lowercase(&self) -> String {
        format!("{} {}", self.stdout, self.stderr).to_lowercase()
    }
}

/// An adb binary plus the device it talks to.
#[derive(Debug, Clone)]
pub struct AdbTarget {
    pub program: String,
    pub serial: Option<String>,
    pub timeout: Duration,
}

impl AdbTarget {
    pub fn new(program: impl Into<String>, serial: Option<String>, timeout: Duration) -> Self {
        Self {
            program: program.into(),
            serial: serial.filter(|value| !value.trim().is_empty()),
            timeout,
        }
    }

    pub fn args<'a>(&self, rest: impl IntoIterator<Item = &'a str>) -> Vec<String> {
        let mut args = Vec::new();
        if let Some(serial) = &self.serial {
            args.push("-s".to_string());
            args.push(serial.clone());
        }
        args.extend(rest.into_iter().map(str::to_string));
        args
    }

    pub fn run<'a>(
        &self,
        rest: impl IntoIterator<Item = &'a str>,
        trace_id: &str,
    ) -> Result<CommandOutput, AppError> {
        run_command_with_timeout(&self.program, &self.args(rest), self.timeout, trace_id)
    }

    pub fn shell<'a>(
        &self,
        command: impl IntoIterator<Item = &'a str>,
        trace_id: &str,
    ) -> Result<CommandOutput, AppError> {
        self.run(std::iter::once::<&'a str>("shell").chain(command), trace_id)
    }
}

fn drain<R: Read + Send + 'static>(mut reader: R) -> JoinHandle<Vec<u8>> {
    std::thread::spawn(move || {
        let mut buffer = Vec::<u8>::new();
        let mut temp = [0u8; 4096];
        loop {
            match reader.read(&mut temp) {
                Ok(0) => break,
                Ok(count) => buffer.extend_from_slice(&temp[..count]),
                Err(_) => break,
            }
        }
        buffer
    })
}

/// Runs `program` to completion or until `timeout`. A missing binary or a hung command both
/// mean the device channel is unusable, so they surface as driver errors.
pub fn run_command_with_timeout(
    program: &str,
    args: &[String],
    timeout: Duration,
    trace_id: &str,
) -> Result<CommandOutput, AppError> {
    let mut child = Command::new(program)
        .args(args)
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()
        .map_err(|err| AppError::driver(format!("Failed to spawn {program}: {err}"), trace_id))?;

    // Both pipes are drained concurrently; a full pipe buffer would otherwise stall the child
    // until the timeout.
    let stdout = child
        .stdout
        .take()
        .ok_or_else(|| AppError::system("Failed to capture stdout", trace_id))?;
    let stderr = child
        .stderr
        .take()
        .ok_or_else(|| AppError::system("Failed to capture stderr", trace_id))?;
    let stdout_handle = drain(stdout);
    let stderr_handle = drain(stderr);

    let start = Instant::now();
    let exit_code = loop {
        match child.try_wait() {
            Ok(Some(status)) => break status.code(),
            Ok(None) => {
                if start.elapsed() > timeout {
                    let _ = child.kill();
                    let _ = child.wait();
                    let _ = stdout_handle.join();
                    let _ = stderr_handle.join();
                    return Err(AppError::driver(
                        format!("{program} timed out after {timeout:?}"),
                        trace_id,
                    ));
                }
                std::thread::sleep(Duration::from_millis(50));
            }
            Err(err) => {
                let _ = stdout_handle.join();
                let _ = stderr_handle.join();
                return Err(AppError::system(
                    format!("Failed to poll command: {err}"),
                    trace_id,
                ));
            }
        }
    };

    let stdout_bytes = stdout_handle.join().unwrap_or_default();
    let stderr_bytes = stderr_handle.join().unwrap_or_default();

    Ok(CommandOutput {
        stdout: String::from_utf8_lossy(&stdout_bytes).to_string(),
        stderr: String::from_utf8_lossy(&stderr_bytes).to_string(),
        exit_code,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::app::error::ErrorCode;

    #[test]
    fn target_prefixes_serial_when_set() {
        let target = AdbTarget::new("adb", Some("emulator-5554".to_string()), Duration::from_secs(1));
        assert_eq!(
            target.args(["shell", "pm", "clear", "com.android.vending"]),
            vec!["-s", "emulator-5554", "shell", "pm", "clear", "com.android.vending"]
        );

        let anonymous = AdbTarget::new("adb", Some("  ".to_string()), Duration::from_secs(1));
        assert_eq!(anonymous.args(["devices"]), vec!["devices"]);
    }

    #[test]
    fn missing_binary_is_a_driver_error() {
        let err = run_command_with_timeout(
            "adb-binary-that-does-not-exist",
            &[],
            Duration::from_secs(1),
            "trace-missing",
        )
        .expect_err("spawn should fail");
        assert_eq!(err.code, ErrorCode::DriverCommunication);
        assert_eq!(err.trace_id, "trace-missing");
    }

    #[cfg(unix)]
    #[test]
    fn hung_command_times_out_as_driver_error() {
        let err = run_command_with_timeout(
            "sh",
            &[
                "-c".to_string(),
                "sleep 5".to_string(),
                "S3cretPass".to_string(),
            ],
            Duration::from_millis(200),
            "trace-hung",
        )
        .expect_err("should time out");
        assert_eq!(err.code, ErrorCode::DriverCommunication);
        assert!(err.error.contains("timed out"));
        assert!(!err.error.contains("S3cretPass"));
    }

    #[cfg(unix)]
    #[test]
    fn large_stdout_does_not_deadlock() {
        let args = vec![
            "-c".to_string(),
            "i=0; while [ $i -lt 100000 ]; do echo 1234567890; i=$((i+1)); done".to_string(),
        ];
        let output = run_command_with_timeout("sh", &args, Duration::from_secs(10), "trace-large")
            .expect("large-output command should complete");

        assert!(output.succeeded());
        assert!(output.stdout.len() >= 1_000_000);
    }
}
