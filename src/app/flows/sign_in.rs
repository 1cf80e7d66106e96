use tracing::{info, warn};

use super::resolve::{resolve_control, Control, LastResort};
use super::{absorb, back_out};
use crate::app::config::ms;
use crate::app::device::Device;
use crate::app::error::AppError;
use crate::app::ui::selector::Selector;

const SIGN_IN_BACK_OUT: usize = 3;

/// The account sign-in screens, in the order they are walked.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SignInStep {
    AwaitAccountCheck,
    EnterUsername,
    ConfirmUsername,
    EnterPassword,
    DeclineSync,
    AcceptTerms,
    CloseInterstitial,
    AwaitProgress,
    AcceptServices,
}

impl SignInStep {
    pub const FIRST: SignInStep = SignInStep::AwaitAccountCheck;

    pub fn next(self) -> Option<SignInStep> {
        use SignInStep::*;
        match self {
            AwaitAccountCheck => Some(EnterUsername),
            EnterUsername => Some(ConfirmUsername),
            ConfirmUsername => Some(EnterPassword),
            EnterPassword => Some(DeclineSync),
            DeclineSync => Some(AcceptTerms),
            AcceptTerms => Some(CloseInterstitial),
            CloseInterstitial => Some(AwaitProgress),
            AwaitProgress => Some(AcceptServices),
            AcceptServices => None,
        }
    }
}

fn edit_field() -> Selector {
    Selector::new().class_name("android.widget.EditText")
}

fn next_control() -> Control {
    Control::labelled("next", ".*(?i)next.*")
        .retry_after_back()
        .or_else(LastResort::RefocusAndSubmit(edit_field()))
}

fn accept_selector() -> Selector {
    Selector::new().text_matches("(?i)accept")
}

/// Signs in with the account form already on screen. `Ok(false)` when any step fails; the
/// failure is logged with the screen and the form is backed out of.
pub fn sign_in(device: &mut Device, username: &str, password: &str) -> Result<bool, AppError> {
    let mut step = SignInStep::FIRST;
    loop {
        if let Err(err) = run_step(device, step, username, password) {
            let context = format!("Sign-in failed at {step:?}");
            let outcome = absorb(device, &context, err)?;
            let pause = ms(device.timings().back_out_pause_ms);
            back_out(device, SIGN_IN_BACK_OUT, pause)?;
            return Ok(outcome);
        }
        match step.next() {
            Some(next) => step = next,
            None => break,
        }
    }
    info!(trace_id = %device.trace_id(), "Signed in");
    Ok(true)
}

fn run_step(
    device: &mut Device,
    step: SignInStep,
    username: &str,
    password: &str,
) -> Result<(), AppError> {
    let timings = device.timings();
    match step {
        SignInStep::AwaitAccountCheck => {
            device.wait_gone(
                &Selector::new().text_matches(".*(?i)checking info.*"),
                ms(timings.checking_info_gone_ms),
            )?;
        }
        SignInStep::EnterUsername => {
            device.set_text(&edit_field(), username)?;
            device.pause(ms(timings.settle_pause_ms))?;
            resolve_control(device, &next_control())?;
        }
        SignInStep::ConfirmUsername => {
            let echoed = Selector::new().text_contains(username);
            if device.exists(&echoed)? {
                device.wait_gone(&echoed, ms(timings.username_gone_ms))?;
                device.pause(ms(timings.settle_pause_ms))?;
            } else {
                device.pause(ms(timings.username_fallback_pause_ms))?;
            }
        }
        SignInStep::EnterPassword => {
            if !device.wait_exists(&edit_field(), ms(timings.password_field_ms))? {
                return Err(AppError::element_not_found(
                    "password field never appeared",
                    device.trace_id(),
                ));
            }
            device.set_text(&edit_field(), password)?;
            device.pause(ms(timings.settle_pause_ms))?;
            resolve_control(device, &next_control())?;
        }
        SignInStep::DeclineSync => {
            device.pause(ms(timings.sync_pause_ms))?;
            let declined =
                resolve_control(device, &Control::labelled("don't sync", "(?i)don't sync.*"))?;
            if declined.is_some() {
                device.pause(ms(timings.sync_pause_ms))?;
            }
        }
        SignInStep::AcceptTerms => {
            let agree = Control::labelled("i agree", "(?i)i agree").or_else(LastResort::Click(
                Selector::new().resource_id_matches(".*(?i)next.*"),
            ));
            resolve_control(device, &agree)?;
            device.pause(ms(timings.sync_pause_ms))?;
        }
        SignInStep::CloseInterstitial => {
            let closed = resolve_control(device, &Control::labelled("close", ".*(?i)close.*"))?;
            if closed.is_some() {
                device.pause(ms(timings.sync_pause_ms))?;
            }
        }
        SignInStep::AwaitProgress => {
            let progress = Selector::new().class_name("android.widget.ProgressBar");
            if device.exists(&progress)? {
                if !device.wait_gone(&progress, ms(timings.progress_gone_ms))? {
                    warn!(trace_id = %device.trace_id(), "progress bar still showing");
                }
            } else {
                device.pause(ms(timings.progress_fallback_pause_ms))?;
            }
        }
        SignInStep::AcceptServices => {
            let list = Selector::new().class_matches(".*RecyclerView");
            if device.exists(&list)? {
                device.fling_to_end(&list)?;
            }
            let accept = accept_selector();
            let scrollable = Selector::new().scrollable(true);
            if !device.exists(&accept)? && device.exists(&scrollable)? {
                device.scroll_to(&scrollable, &accept)?;
            }
            if device.exists(&accept)? {
                device.click(&accept)?;
            }
            device.pause(ms(timings.screen_pause_ms))?;
        }
    }
    Ok(())
}
