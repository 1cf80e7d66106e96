//! The "try the label, then the description, then back out and retry, then fall back" chain
//! shared by sign-in and store navigation.

use tracing::debug;

use crate::app::config::ms;
use crate::app::device::Device;
use crate::app::error::AppError;
use crate::app::ui::driver::DeviceKey;
use crate::app::ui::selector::Selector;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LastResort {
    /// The control is optional; resolving it may find nothing.
    Skip,
    /// Click this selector unconditionally; a miss is an `ERR_ELEMENT_NOT_FOUND`.
    Click(Selector),
    /// Tap the field and press enter twice, submitting the form without a button.
    RefocusAndSubmit(Selector),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResolveStage {
    /// `candidate` matched on the first look.
    Direct { candidate: usize },
    /// `candidate` matched after pressing back and waiting.
    AfterBack { candidate: usize },
    LastResort,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Control {
    pub name: &'static str,
    pub candidates: Vec<Selector>,
    pub back_and_retry: bool,
    pub last_resort: LastResort,
}

impl Control {
    /// A control found by its text, else by its accessibility description, both matched
    /// against the same pattern.
    pub fn labelled(name: &'static str, pattern: &str) -> Self {
        Self::any_of(
            name,
            vec![
                Selector::new().text_matches(pattern),
                Selector::new().description_matches(pattern),
            ],
        )
    }

    pub fn any_of(name: &'static str, candidates: Vec<Selector>) -> Self {
        Self {
            name,
            candidates,
            back_and_retry: false,
            last_resort: LastResort::Skip,
        }
    }

    pub fn retry_after_back(mut self) -> Self {
        self.back_and_retry = true;
        self
    }

    pub fn or_else(mut self, last_resort: LastResort) -> Self {
        self.last_resort = last_resort;
        self
    }
}

fn click_first(device: &mut Device, candidates: &[Selector]) -> Result<Option<usize>, AppError> {
    for (index, candidate) in candidates.iter().enumerate() {
        if device.exists(candidate)? {
            device.click(candidate)?;
            return Ok(Some(index));
        }
    }
    Ok(None)
}

/// Walks the stages of `control` until one of them acts. `Ok(None)` only for a
/// [`LastResort::Skip`] control that was nowhere to be found.
pub fn resolve_control(device: &mut Device, control: &Control) -> Result<Option<ResolveStage>, AppError> {
    let stage = resolve_stages(device, control)?;
    debug!(
        trace_id = %device.trace_id(),
        control = control.name,
        stage = ?stage,
        "control resolved"
    );
    Ok(stage)
}

fn resolve_stages(device: &mut Device, control: &Control) -> Result<Option<ResolveStage>, AppError> {
    if let Some(candidate) = click_first(device, &control.candidates)? {
        return Ok(Some(ResolveStage::Direct { candidate }));
    }
    if control.back_and_retry {
        device.press(DeviceKey::Back)?;
        device.pause(ms(device.timings().nav_retry_pause_ms))?;
        if let Some(candidate) = click_first(device, &control.candidates)? {
            return Ok(Some(ResolveStage::AfterBack { candidate }));
        }
    }
    match &control.last_resort {
        LastResort::Skip => Ok(None),
        LastResort::Click(selector) => {
            device.click(selector)?;
            Ok(Some(ResolveStage::LastResort))
        }
        LastResort::RefocusAndSubmit(field) => {
            device.click(field)?;
            device.press(DeviceKey::Enter)?;
            device.press(DeviceKey::Enter)?;
            Ok(Some(ResolveStage::LastResort))
        }
    }
}
