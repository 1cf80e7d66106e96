use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

use tracing::debug;

use super::driver::{DeviceKey, UiDriver};
use super::hierarchy::{Screen, UiNode};
use super::selector::Selector;
use crate::app::adb::parse::parse_focused_package;
use crate::app::adb::runner::AdbTarget;
use crate::app::error::AppError;
use crate::app::interrupt::interrupt_flag;

const MAX_SCROLL_SWIPES: usize = 10;
const DUMP_ATTEMPTS: usize = 2;

/// [`UiDriver`] backed by `uiautomator dump` and `input` over adb.
pub struct AdbUiDriver {
    target: AdbTarget,
    poll_interval: Duration,
    interrupt: &'static AtomicBool,
    trace_id: String,
}

impl AdbUiDriver {
    pub fn new(target: AdbTarget, poll_interval: Duration, trace_id: impl Into<String>) -> Self {
        Self {
            target,
            poll_interval,
            interrupt: interrupt_flag(),
            trace_id: trace_id.into(),
        }
    }

    /// Waits stop when `flag` is raised instead of the process-wide signal flag.
    pub fn with_interrupt(mut self, flag: &'static AtomicBool) -> Self {
        self.interrupt = flag;
        self
    }

    fn raw_dump(&self) -> Result<String, AppError> {
        let mut last_error = String::new();
        for _ in 0..DUMP_ATTEMPTS {
            let output = self
                .target
                .run(["exec-out", "uiautomator", "dump", "/dev/tty"], &self.trace_id)?;
            if output.succeeded() && output.stdout.contains("<hierarchy") {
                return Ok(output.stdout);
            }
            // "could not get idle state" is common while an animation runs.
            last_error = format!("{} {}", output.stdout.trim(), output.stderr.trim());
            std::thread::sleep(self.poll_interval);
        }
        Err(AppError::driver(
            format!("uiautomator dump failed: {}", last_error.trim()),
            &self.trace_id,
        ))
    }

    fn locate(&mut self, selector: &Selector) -> Result<UiNode, AppError> {
        self.snapshot()?
            .find(selector)
            .cloned()
            .ok_or_else(|| AppError::element_not_found(format!("no element matches {selector}"), &self.trace_id))
    }

    fn input(&self, args: &[&str]) -> Result<(), AppError> {
        self.run_input(args, &args.join(" "), None)
    }

    /// Typed text may be a credential; it never appears in the error.
    fn input_text(&self, text: &str) -> Result<(), AppError> {
        let escaped = escape_input_text(text);
        self.run_input(&["text", &escaped], "text <redacted>", Some(text))
            .map_err(|mut err| {
                err.error = err.error.replace(&escaped, "<redacted>");
                err
            })
    }

    fn run_input(&self, args: &[&str], shown: &str, secret: Option<&str>) -> Result<(), AppError> {
        let output = self
            .target
            .shell(std::iter::once::<&str>("input").chain(args.iter().copied()), &self.trace_id)?;
        if !output.succeeded() {
            let mut detail = output.stderr.trim().to_string();
            if let Some(secret) = secret.filter(|secret| !secret.is_empty()) {
                detail = detail.replace(secret, "<redacted>");
            }
            return Err(AppError::driver(
                format!("input {shown} failed: {detail}"),
                &self.trace_id,
            ));
        }
        Ok(())
    }

    fn tap(&self, node: &UiNode) -> Result<(), AppError> {
        let (x, y) = node.bounds.center();
        self.input(&["tap", &x.to_string(), &y.to_string()])?;
        std::thread::sleep(self.poll_interval);
        Ok(())
    }

    fn swipe_up(&self, container: &UiNode, duration_ms: u32) -> Result<(), AppError> {
        let (x, _) = container.bounds.center();
        let span = container.bounds.height();
        let from = container.bounds.top + span * 4 / 5;
        let to = container.bounds.top + span / 5;
        self.input(&[
            "swipe",
            &x.to_string(),
            &from.to_string(),
            &x.to_string(),
            &to.to_string(),
            &duration_ms.to_string(),
        ])
    }

    fn poll(&mut self, timeout: Duration, mut done: impl FnMut(&Screen) -> bool) -> Result<bool, AppError> {
        let start = Instant::now();
        loop {
            if self.interrupt.load(Ordering::SeqCst) {
                return Err(AppError::interrupted("wait interrupted by signal", &self.trace_id));
            }
            if done(&self.snapshot()?) {
                return Ok(true);
            }
            if start.elapsed() >= timeout {
                return Ok(false);
            }
            let remaining = timeout.saturating_sub(start.elapsed());
            std::thread::sleep(self.poll_interval.min(remaining));
        }
    }
}

impl UiDriver for AdbUiDriver {
    fn snapshot(&mut self) -> Result<Screen, AppError> {
        let xml = self.raw_dump()?;
        Screen::parse(&xml).map_err(|err| {
            AppError::driver(format!("Failed to parse UI dump: {err}"), &self.trace_id)
        })
    }

    fn wait_exists(&mut self, selector: &Selector, timeout: Duration) -> Result<bool, AppError> {
        self.poll(timeout, |screen| screen.exists(selector))
    }

    fn wait_gone(&mut self, selector: &Selector, timeout: Duration) -> Result<bool, AppError> {
        self.poll(timeout, |screen| !screen.exists(selector))
    }

    fn click(&mut self, selector: &Selector) -> Result<(), AppError> {
        let node = self.locate(selector)?;
        debug!(trace_id = %self.trace_id, selector = %selector, "click");
        self.tap(&node)
    }

    fn set_text(&mut self, selector: &Selector, text: &str) -> Result<(), AppError> {
        let node = self.locate(selector)?;
        self.tap(&node)?;
        self.input(&["keyevent", "KEYCODE_MOVE_END"])?;
        let existing = node.text.chars().count();
        if existing > 0 {
            let mut args = vec!["keyevent"];
            args.extend(std::iter::repeat("KEYCODE_DEL").take(existing));
            self.input(&args)?;
        }
        if !text.is_empty() {
            self.input_text(text)?;
        }
        Ok(())
    }

    fn fling_to_end(&mut self, container: &Selector) -> Result<(), AppError> {
        let node = self.locate(container)?;
        let mut previous = self.snapshot()?;
        for _ in 0..MAX_SCROLL_SWIPES {
            self.swipe_up(&node, 100)?;
            let current = self.snapshot()?;
            if current == previous {
                break;
            }
            previous = current;
        }
        Ok(())
    }

    fn scroll_to(&mut self, container: &Selector, target: &Selector) -> Result<bool, AppError> {
        let node = self.locate(container)?;
        for _ in 0..MAX_SCROLL_SWIPES {
            if self.exists(target)? {
                return Ok(true);
            }
            self.swipe_up(&node, 400)?;
        }
        self.exists(target)
    }

    fn press(&mut self, key: DeviceKey) -> Result<(), AppError> {
        self.input(&["keyevent", key.keycode()])
    }

    fn foreground_app(&mut self) -> Result<String, AppError> {
        let output = self.target.shell(["dumpsys", "window"], &self.trace_id)?;
        parse_focused_package(&output.stdout).ok_or_else(|| {
            AppError::driver("Could not determine the focused window", &self.trace_id)
        })
    }

    fn dump_screen(&mut self) -> Result<String, AppError> {
        self.raw_dump()
    }

    fn set_natural_orientation(&mut self) -> Result<(), AppError> {
        for (key, value) in [("accelerometer_rotation", "0"), ("user_rotation", "0")] {
            let output = self
                .target
                .shell(["settings", "put", "system", key, value], &self.trace_id)?;
            if !output.succeeded() {
                return Err(AppError::driver(
                    format!("Failed to set {key}: {}", output.stderr.trim()),
                    &self.trace_id,
                ));
            }
        }
        Ok(())
    }
}

/// Escapes text for `input text`, which runs through the device shell and treats `%s` as a
/// space.
pub fn escape_input_text(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len() * 2);
    for ch in text.chars() {
        match ch {
            ' ' => escaped.push_str("%s"),
            '%' | '\\' | '\'' | '"' | '`' | '$' | '&' | '|' | ';' | '<' | '>' | '(' | ')' | '*'
            | '?' | '~' | '#' | '!' | '[' | ']' | '{' | '}' => {
                escaped.push('\\');
                escaped.push(ch);
            }
            _ => escaped.push(ch),
        }
    }
    escaped
}

#[cfg(test)]
mod tests {
    use super::*;

    #[cfg(unix)]
    const FAKE_ADB: &str = r#"#!/bin/sh
case "$*" in
  *"uiautomator dump"*)
    printf '%s' '<hierarchy rotation="0"><node text="" class="android.widget.EditText" clickable="true" bounds="[0,0][100,100]" /></hierarchy>'
    ;;
  *"input text"*)
    echo "Exception occurred while executing 'text': $*" >&2
    exit 1
    ;;
esac
exit 0
"#;

    /// A driver over a shell script standing in for adb.
    #[cfg(unix)]
    fn scripted_driver(dir: &tempfile::TempDir) -> AdbUiDriver {
        use std::os::unix::fs::PermissionsExt;

        let path = dir.path().join("adb");
        std::fs::write(&path, FAKE_ADB).expect("write script");
        std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755)).expect("chmod");
        let target = AdbTarget::new(
            path.to_string_lossy().to_string(),
            Some("emulator-5554".to_string()),
            Duration::from_secs(10),
        );
        AdbUiDriver::new(target, Duration::from_millis(1), "trace-driver")
    }

    #[cfg(unix)]
    #[test]
    fn failed_text_input_keeps_the_text_out_of_the_error() {
        let dir = tempfile::TempDir::new().expect("tmp");
        let mut driver = scripted_driver(&dir);

        let err = driver
            .set_text(
                &Selector::new().class_name("android.widget.EditText"),
                "S3cretPass",
            )
            .expect_err("input text fails");
        assert!(err.error.starts_with("input text <redacted> failed"));
        assert!(!err.error.contains("S3cretPass"));
    }

    #[cfg(unix)]
    #[test]
    fn waits_stop_when_interrupted() {
        let flag: &'static AtomicBool = Box::leak(Box::new(AtomicBool::new(false)));
        let dir = tempfile::TempDir::new().expect("tmp");
        let mut driver = scripted_driver(&dir).with_interrupt(flag);
        let raiser = std::thread::spawn(move || {
            std::thread::sleep(Duration::from_millis(100));
            flag.store(true, Ordering::SeqCst);
        });

        let started = Instant::now();
        let err = driver
            .wait_exists(&Selector::new().text("Open"), Duration::from_secs(300))
            .expect_err("interrupted");
        raiser.join().expect("raiser");
        assert_eq!(err.code, crate::app::error::ErrorCode::Interrupted);
        assert!(started.elapsed() < Duration::from_secs(5));
    }

    #[test]
    fn escapes_spaces_and_shell_metacharacters() {
        assert_eq!(escape_input_text("Google Maps"), "Google%sMaps");
        assert_eq!(escape_input_text("p@ss$word!"), "p@ss\\$word\\!");
        assert_eq!(escape_input_text("50% off"), "50\\%%soff");
        assert_eq!(escape_input_text("u@x.com"), "u@x.com");
    }

    #[test]
    fn keycodes_match_android_names() {
        assert_eq!(DeviceKey::Back.keycode(), "KEYCODE_BACK");
        assert_eq!(DeviceKey::Enter.keycode(), "KEYCODE_ENTER");
    }
}
