use std::time::{Duration, Instant};

use tracing::{debug, warn};

use crate::app::adb::shell::ShellExecutor;
use crate::app::config::FlowTimings;
use crate::app::error::AppError;
use crate::app::ui::driver::{DeviceKey, UiDriver};
use crate::app::ui::hierarchy::Screen;
use crate::app::ui::selector::Selector;
use crate::app::watchdog::Deadline;

const PAUSE_SLICE: Duration = Duration::from_millis(100);

/// The driver and shell of one device, behind the current deadline.
///
/// Every operation checks the deadline first, and waits and pauses never run past it.
pub struct Device {
    driver: Box<dyn UiDriver>,
    shell: Box<dyn ShellExecutor>,
    deadline: Deadline,
    timings: FlowTimings,
    trace_id: String,
}

impl Device {
    pub fn new(
        driver: Box<dyn UiDriver>,
        shell: Box<dyn ShellExecutor>,
        timings: FlowTimings,
        trace_id: impl Into<String>,
    ) -> Self {
        Self {
            driver,
            shell,
            deadline: Deadline::unbounded("session"),
            timings,
            trace_id: trace_id.into(),
        }
    }

    pub fn trace_id(&self) -> &str {
        &self.trace_id
    }

    pub fn timings(&self) -> FlowTimings {
        self.timings
    }

    pub fn deadline(&self) -> &Deadline {
        &self.deadline
    }

    /// Installs `deadline` and returns the one it replaces.
    pub fn set_deadline(&mut self, deadline: Deadline) -> Deadline {
        std::mem::replace(&mut self.deadline, deadline)
    }

    fn guard(&self) -> Result<(), AppError> {
        self.deadline.check(&self.trace_id)
    }

    fn guard_selector(&self, selector: &Selector) -> Result<(), AppError> {
        selector.validate(&self.trace_id)?;
        self.guard()
    }

    pub fn snapshot(&mut self) -> Result<Screen, AppError> {
        self.guard()?;
        self.driver.snapshot()
    }

    pub fn exists(&mut self, selector: &Selector) -> Result<bool, AppError> {
        self.guard_selector(selector)?;
        self.driver.exists(selector)
    }

    pub fn wait_exists(&mut self, selector: &Selector, timeout: Duration) -> Result<bool, AppError> {
        self.guard_selector(selector)?;
        let found = self.driver.wait_exists(selector, self.deadline.cap(timeout))?;
        if !found {
            self.guard()?;
        }
        Ok(found)
    }

    pub fn wait_gone(&mut self, selector: &Selector, timeout: Duration) -> Result<bool, AppError> {
        self.guard_selector(selector)?;
        let gone = self.driver.wait_gone(selector, self.deadline.cap(timeout))?;
        if !gone {
            self.guard()?;
        }
        Ok(gone)
    }

    pub fn click(&mut self, selector: &Selector) -> Result<(), AppError> {
        self.guard_selector(selector)?;
        self.driver.click(selector)
    }

    pub fn set_text(&mut self, selector: &Selector, text: &str) -> Result<(), AppError> {
        self.guard_selector(selector)?;
        self.driver.set_text(selector, text)
    }

    pub fn fling_to_end(&mut self, container: &Selector) -> Result<(), AppError> {
        self.guard_selector(container)?;
        self.driver.fling_to_end(container)
    }

    pub fn scroll_to(&mut self, container: &Selector, target: &Selector) -> Result<bool, AppError> {
        self.guard_selector(container)?;
        target.validate(&self.trace_id)?;
        self.driver.scroll_to(container, target)
    }

    pub fn press(&mut self, key: DeviceKey) -> Result<(), AppError> {
        self.guard()?;
        self.driver.press(key)
    }

    /// Presses back `times` times with `pause` after each press.
    pub fn press_back_times(&mut self, times: usize, pause: Duration) -> Result<(), AppError> {
        for _ in 0..times {
            self.press(DeviceKey::Back)?;
            self.pause(pause)?;
        }
        Ok(())
    }

    pub fn foreground_app(&mut self) -> Result<String, AppError> {
        self.guard()?;
        self.driver.foreground_app()
    }

    pub fn set_natural_orientation(&mut self) -> Result<(), AppError> {
        self.guard()?;
        self.driver.set_natural_orientation()
    }

    pub fn clear_app_data(&mut self, package: &str) -> Result<(), AppError> {
        self.guard()?;
        self.shell.clear_app_data(package)
    }

    pub fn start_component(&mut self, component: &str) -> Result<(), AppError> {
        self.guard()?;
        self.shell.start_component(component)
    }

    pub fn start_action(&mut self, action: &str) -> Result<(), AppError> {
        self.guard()?;
        self.shell.start_action(action)
    }

    /// Sleeps for `duration`, cut short by the deadline or an interrupt.
    pub fn pause(&mut self, duration: Duration) -> Result<(), AppError> {
        self.guard()?;
        let capped = self.deadline.cap(duration);
        let until = Instant::now().checked_add(capped);
        loop {
            let left = until.map_or(PAUSE_SLICE, |until| {
                until.saturating_duration_since(Instant::now())
            });
            if left.is_zero() || self.deadline.is_interrupted() {
                break;
            }
            std::thread::sleep(left.min(PAUSE_SLICE));
        }
        if capped < duration || self.deadline.is_interrupted() {
            self.guard()?;
        }
        Ok(())
    }

    /// The raw screen dump, or a placeholder when the channel is gone.
    pub fn dump_screen(&mut self) -> String {
        self.driver
            .dump_screen()
            .unwrap_or_else(|err| format!("<screen unavailable: {err}>"))
    }

    /// Logs `err` with the current screen so a failed unit can be diagnosed after the run.
    pub fn log_failure(&mut self, context: &str, err: &AppError) {
        let screen = self.dump_screen();
        warn!(
            trace_id = %self.trace_id,
            code = %err.code.as_str(),
            error = %err.error,
            screen = %screen,
            "{}", context
        );
    }

    /// Uninstalls `packages` and returns home, ignoring the deadline and every failure.
    pub fn reset_device_state(&mut self, packages: &[String]) {
        for package in packages {
            if let Err(err) = self.shell.uninstall(package) {
                debug!(trace_id = %self.trace_id, package = %package, error = %err, "uninstall skipped");
            }
        }
        if let Err(err) = self.shell.go_home() {
            debug!(trace_id = %self.trace_id, error = %err, "home intent failed");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::app::error::ErrorCode;
    use crate::app::testing::{label, FakeWorld};
    use std::sync::atomic::{AtomicBool, Ordering};

    #[test]
    fn operations_fail_once_the_deadline_expires() {
        let world = FakeWorld::new();
        world.add_screen("home", vec![label("Home")]);
        let mut device = world.device();
        device.set_deadline(Deadline::start("attempt", Duration::ZERO));

        let err = device.press(DeviceKey::Home).expect_err("expired");
        assert_eq!(err.code, ErrorCode::WatchdogTimeout);
        assert!(world.actions().is_empty());
    }

    #[test]
    fn empty_selectors_are_rejected_before_any_query() {
        let world = FakeWorld::new();
        world.add_screen("home", vec![label("Home")]);
        let mut device = world.device();

        let err = device.exists(&Selector::new()).expect_err("degenerate");
        assert_eq!(err.code, ErrorCode::Validation);
        assert_eq!(world.snapshot_count(), 0);
    }

    #[test]
    fn pause_is_cut_short_by_the_deadline() {
        let world = FakeWorld::new();
        world.add_screen("home", vec![label("Home")]);
        let mut device = world.device();
        device.set_deadline(Deadline::start("attempt", Duration::from_millis(20)));

        let started = std::time::Instant::now();
        let err = device.pause(Duration::from_secs(30)).expect_err("cut short");
        assert_eq!(err.code, ErrorCode::WatchdogTimeout);
        assert!(started.elapsed() < Duration::from_secs(5));
    }

    #[test]
    fn pause_wakes_up_on_interrupt() {
        let flag: &'static AtomicBool = Box::leak(Box::new(AtomicBool::new(false)));
        let world = FakeWorld::new();
        world.add_screen("home", vec![label("Home")]);
        let mut device = world.device();
        device.set_deadline(Deadline::unbounded("session").with_interrupt(flag));

        let raiser = std::thread::spawn(move || {
            std::thread::sleep(Duration::from_millis(50));
            flag.store(true, Ordering::SeqCst);
        });
        let started = std::time::Instant::now();
        let err = device.pause(Duration::from_secs(30)).expect_err("interrupted");
        raiser.join().expect("raiser");

        assert_eq!(err.code, ErrorCode::Interrupted);
        assert!(started.elapsed() < Duration::from_secs(5));
    }

    #[test]
    fn reset_ignores_failures_and_expired_deadlines() {
        let world = FakeWorld::new();
        world.add_screen("home", vec![label("Home")]);
        world.fail_uninstall();
        let mut device = world.device();
        device.set_deadline(Deadline::start("attempt", Duration::ZERO));

        device.reset_device_state(&["com.github.uiautomator".to_string()]);
        assert_eq!(
            world.shell_log(),
            vec!["uninstall com.github.uiautomator", "home"]
        );
    }

    #[test]
    fn failure_dump_falls_back_to_placeholder() {
        let world = FakeWorld::new();
        world.add_screen("home", vec![label("Home")]);
        world.break_channel();
        let mut device = world.device();
        assert!(device.dump_screen().starts_with("<screen unavailable"));
    }
}
