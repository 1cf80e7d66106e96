use tracing::{info, warn};

use super::{absorb, back_out};
use crate::app::config::{ms, StoreSettings};
use crate::app::device::Device;
use crate::app::error::AppError;
use crate::app::ui::driver::DeviceKey;
use crate::app::ui::selector::Selector;

const INSTALL_BACK_OUT: usize = 5;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InstallOutcome {
    /// "Open" was shown; launch was not checked.
    Installed,
    /// "Open" launched something other than the store.
    Launched,
    /// "Open" was pressed but the foreground app did not change.
    LaunchUnchanged,
    /// The download sat in "Pending" and was cancelled.
    Cancelled,
    /// "Open" never appeared.
    Incomplete,
}

impl InstallOutcome {
    pub fn succeeded(self) -> bool {
        matches!(self, InstallOutcome::Installed | InstallOutcome::Launched)
    }
}

pub(crate) fn search_box() -> Selector {
    Selector::new().text_starts_with("Search")
}

fn open_button() -> Selector {
    Selector::new().text("Open")
}

/// Launches the store and waits for its search box, relaunching once from one screen back.
fn open_store(device: &mut Device, store: &StoreSettings, ready: &Selector) -> Result<bool, AppError> {
    let wait = ms(device.timings().store_ready_ms);
    device.start_component(&store.main_component)?;
    if device.wait_exists(ready, wait)? {
        return Ok(true);
    }
    device.press(DeviceKey::Back)?;
    device.start_component(&store.main_component)?;
    device.wait_exists(ready, wait)
}

/// Searches for `name`, installs or updates it, and with `verify` checks that "Open" launches
/// it. Errors other than deadline and interrupt fail this app only.
pub fn install_app(
    device: &mut Device,
    store: &StoreSettings,
    name: &str,
    verify: bool,
) -> Result<bool, AppError> {
    let success = match drive_install(device, store, name, verify) {
        Ok(outcome) => {
            info!(trace_id = %device.trace_id(), app = %name, outcome = ?outcome, "install finished");
            outcome.succeeded()
        }
        Err(err) => absorb(device, &format!("Problem while installing '{name}'"), err)?,
    };
    let pause = ms(device.timings().back_out_pause_ms);
    back_out(device, INSTALL_BACK_OUT, pause)?;
    Ok(success)
}

fn drive_install(
    device: &mut Device,
    store: &StoreSettings,
    name: &str,
    verify: bool,
) -> Result<InstallOutcome, AppError> {
    let timings = device.timings();
    let search = search_box();
    if !open_store(device, store, &search)? {
        warn!(trace_id = %device.trace_id(), "store search never appeared");
    }
    device.click(&search)?;
    device.set_text(&search, name)?;
    device.press(DeviceKey::Enter)?;
    info!(trace_id = %device.trace_id(), app = %name, "Searching");

    let open = open_button();
    device.wait_exists(
        &Selector::new().text_starts_with("Install"),
        ms(timings.install_button_ms),
    )?;
    for label in ["Install", "Update"] {
        let button = Selector::new().text_starts_with(label);
        if device.exists(&open)? || !device.exists(&button)? {
            continue;
        }
        device.click(&button)?;
        info!(trace_id = %device.trace_id(), app = %name, button = label, "Clicked, waiting for the download");
        device.pause(ms(timings.install_started_pause_ms))?;
        let permissions = Selector::new().text_starts_with("Continue");
        if device.exists(&permissions)? {
            device.click(&permissions)?;
            device.pause(ms(timings.settle_pause_ms))?;
            device.click(&Selector::new().text_starts_with("Skip"))?;
        }
        device.wait_exists(&open, ms(timings.install_complete_ms))?;
    }

    if device.exists(&open)? {
        if !verify {
            return Ok(InstallOutcome::Installed);
        }
        info!(trace_id = %device.trace_id(), app = %name, "Checking that the app launches");
        let before = device.foreground_app()?;
        device.click(&open)?;
        device.pause(ms(timings.launch_verify_pause_ms))?;
        let after = device.foreground_app()?;
        if after != before {
            return Ok(InstallOutcome::Launched);
        }
        warn!(trace_id = %device.trace_id(), app = %name, foreground = %after, "Open did not switch apps");
        return Ok(InstallOutcome::LaunchUnchanged);
    }

    let cancel = Selector::new().text_contains("Cancel");
    if device.exists(&Selector::new().text_contains("Pending"))? && device.exists(&cancel)? {
        device.click(&cancel)?;
        return Ok(InstallOutcome::Cancelled);
    }
    Ok(InstallOutcome::Incomplete)
}
