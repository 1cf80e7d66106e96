pub mod install;
pub mod popups;
pub mod resolve;
pub mod sign_in;

use std::time::Duration;

use crate::app::device::Device;
use crate::app::error::AppError;

/// Ends a flow that failed with `err`: fatal errors propagate, anything else is logged with the
/// current screen and becomes `Ok(false)`.
pub(crate) fn absorb(device: &mut Device, context: &str, err: AppError) -> Result<bool, AppError> {
    if err.is_fatal() {
        return Err(err);
    }
    device.log_failure(context, &err);
    Ok(false)
}

/// Presses back `times` times. Only deadline and interrupt errors escape.
pub(crate) fn back_out(device: &mut Device, times: usize, pause: Duration) -> Result<(), AppError> {
    match device.press_back_times(times, pause) {
        Err(err) if err.is_fatal() => Err(err),
        _ => Ok(()),
    }
}
