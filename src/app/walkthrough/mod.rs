//! Sign in to the store if needed, then install every requested app, with retries inside one
//! wall-clock budget.

use std::time::Duration;

use tracing::{info, warn};

use crate::app::config::{ms, StoreSettings, WalkthroughConfig};
use crate::app::device::Device;
use crate::app::error::AppError;
use crate::app::flows::install::{install_app, search_box};
use crate::app::flows::popups::{dismiss_popups, PopupTable};
use crate::app::flows::resolve::{resolve_control, Control, LastResort};
use crate::app::flows::sign_in::sign_in;
use crate::app::models::WalkthroughRequest;
use crate::app::ui::driver::DeviceKey;
use crate::app::ui::selector::Selector;
use crate::app::watchdog::Deadline;


fn voice_search() -> Selector {
    Selector::new().description_starts_with("Voice")
}

fn account_row(username: &str) -> Selector {
    Selector::new().text_contains(username)
}

fn account_switcher() -> Control {
    let image = || Selector::new().class_name("android.widget.ImageView");
    Control::any_of(
        "account switcher",
        vec![
            Selector::new().description_starts_with("Signed in"),
            image().right_of(voice_search()),
        ],
    )
    .or_else(LastResort::Click(image().right_of(search_box())))
}

/// Runs the whole walkthrough on `device` within `budget`. `Ok(true)` iff one attempt
/// succeeded. Deadline expiry and interruption come back as errors.
pub fn run_walkthrough(
    device: &mut Device,
    request: &WalkthroughRequest,
    config: &WalkthroughConfig,
    budget: Duration,
) -> Result<bool, AppError> {
    let overall = device.deadline().child("walkthrough", budget);
    let previous = device.set_deadline(overall.clone());
    let outcome = walk(device, request, config, &overall, budget);
    device.set_deadline(previous);
    outcome
}

fn walk(
    device: &mut Device,
    request: &WalkthroughRequest,
    config: &WalkthroughConfig,
    overall: &Deadline,
    budget: Duration,
) -> Result<bool, AppError> {
    prepare(device, &config.store)?;

    let retries = config.budget.retries.max(1);
    let per_attempt = budget / retries;
    for attempt in 1..=retries {
        device.set_deadline(overall.child("attempt", per_attempt));
        info!(trace_id = %device.trace_id(), attempt, retries, "Starting attempt");
        match run_attempt(device, request, &config.store) {
            Ok(true) => {
                info!(trace_id = %device.trace_id(), attempt, "Attempt succeeded");
                return Ok(true);
            }
            Ok(false) => warn!(trace_id = %device.trace_id(), attempt, "Attempt failed"),
            Err(err) if err.is_fatal() => return Err(err),
            Err(err) => device.log_failure(&format!("Attempt {attempt} failed"), &err),
        }
    }
    Ok(false)
}

/// Clears store and settings state and dismisses whatever dialogs are up. Best-effort.
fn prepare(device: &mut Device, store: &StoreSettings) -> Result<(), AppError> {
    for package in [&store.settings_package, &store.package] {
        if let Err(err) = device.clear_app_data(package) {
            if err.is_fatal() {
                return Err(err);
            }
            warn!(trace_id = %device.trace_id(), package = %package, error = %err, "Could not clear app data");
        }
    }
    match dismiss_popups(device, &PopupTable::standard()) {
        Err(err) if err.is_fatal() => Err(err),
        Err(err) => {
            device.log_failure("Popup dismissal failed", &err);
            Ok(())
        }
        Ok(_) => Ok(()),
    }
}

fn launch_store(device: &mut Device, store: &StoreSettings) -> Result<bool, AppError> {
    device.start_component(&store.main_component)?;
    let wait = ms(device.timings().store_ready_ms);
    device.wait_exists(&voice_search(), wait)
}

fn run_attempt(
    device: &mut Device,
    request: &WalkthroughRequest,
    store: &StoreSettings,
) -> Result<bool, AppError> {
    let timings = device.timings();
    let account = account_row(&request.username);

    launch_store(device, store)?;
    if !device.exists(&account)? && !ensure_signed_in(device, request, store)? {
        return Ok(false);
    }

    let not_now = Selector::new().text_matches(".*(?i)not now.*");
    if device.exists(&not_now)? {
        device.click(&not_now)?;
    }

    resolve_control(device, &account_switcher())?;
    let expand = Selector::new().description_contains("Expand account list");
    device.wait_exists(&expand, ms(timings.account_list_ms))?;
    if device.exists(&expand)? || !device.exists(&account)? {
        device.click(&expand)?;
        device.pause(ms(timings.settle_pause_ms))?;
    }
    device.click(&account)?;
    device.pause(ms(timings.screen_pause_ms))?;

    info!(trace_id = %device.trace_id(), apps = request.apps.len(), "Installing apps");
    install_all(device, request, store)
}

/// Gets the account onto the device, through the store's own prompt or system account
/// settings. `Ok(false)` when sign-in failed.
fn ensure_signed_in(
    device: &mut Device,
    request: &WalkthroughRequest,
    store: &StoreSettings,
) -> Result<bool, AppError> {
    let timings = device.timings();
    let account = account_row(&request.username);

    let store_sign_in = Selector::new().text_matches("(?i)sign in");
    if device.exists(&store_sign_in)? {
        device.click(&store_sign_in)?;
    } else {
        device.start_action(&store.account_settings_action)?;
        device.pause(ms(timings.screen_pause_ms))?;
        if !device.exists(&account)? {
            device.click(&Selector::new().text_matches("(?i).*(add account).*"))?;
            device.pause(ms(timings.screen_pause_ms))?;
            let provider = Selector::new()
                .text_matches(format!("(?i){}", regex::escape(&store.account_provider)))
                .last();
            device.click(&provider)?;
            device.pause(ms(timings.screen_pause_ms))?;
            info!(trace_id = %device.trace_id(), "Navigated to the account sign-in page");
        }
    }

    if !device.exists(&account)? && !sign_in(device, &request.username, &request.password)? {
        warn!(trace_id = %device.trace_id(), "Failed to sign into the account");
        device.press(DeviceKey::Back)?;
        device.press(DeviceKey::Back)?;
        return Ok(false);
    }

    device.press(DeviceKey::Back)?;
    device.press(DeviceKey::Back)?;
    launch_store(device, store)?;
    Ok(true)
}

/// With verification every app must launch, and the loop stops at the first one that does
/// not. Without it, reaching the download step for each app is enough.
fn install_all(
    device: &mut Device,
    request: &WalkthroughRequest,
    store: &StoreSettings,
) -> Result<bool, AppError> {
    for app in &request.apps {
        let installed = install_app(device, store, app, request.verify_installation)?;
        if request.verify_installation && !installed {
            warn!(trace_id = %device.trace_id(), app = %app, "App failed verification");
            return Ok(false);
        }
    }
    Ok(true)
}
