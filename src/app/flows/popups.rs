//! Unsolicited dialog handling.
//!
//! Each iteration classifies one snapshot into a [`PopupVerdict`] and performs at most one
//! resolving action. An affirmative button is only ever pressed on a screen that also shows a
//! known-benign context (SIM warnings, crash and ANR dialogs, a short whitelist); any other
//! dialog offering only an affirmative answer is backed out of.

use tracing::{debug, info, warn};

use crate::app::device::Device;
use crate::app::error::{AppError, ErrorCode};
use crate::app::ui::driver::DeviceKey;
use crate::app::ui::hierarchy::Screen;
use crate::app::ui::selector::Selector;

pub const MAX_POPUP_ITERATIONS: usize = 5;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PopupTable {
    pub negate: Selector,
    pub close: Selector,
    pub affirm: Selector,
    pub false_positive_affirm: Selector,
    pub do_not_show_again: Selector,
    pub safe_context: Vec<Selector>,
}

impl PopupTable {
    pub fn standard() -> Self {
        Self {
            negate: Selector::new()
                .clickable(true)
                .text_matches(
                    r".*(?i)\b(cancel|later|no|deny|decline|skip|close app|don't send|block)\b.*",
                ),
            close: Selector::new().clickable(true).description("Close"),
            affirm: Selector::new()
                .clickable(true)
                .text_matches(r".*(?i)\b(ok|okay|yes|start|accept|allow)\b.*"),
            false_positive_affirm: Selector::new()
                .clickable(true)
                .text_matches(r".*(?i)\b(autostart)\b.*"),
            do_not_show_again: Selector::new()
                .clickable(true)
                .text_matches(r"(?i)(do not|don't) show again"),
            safe_context: vec![
                Selector::new().text_matches(r".*(?i)\b(sim|mobile data)\b.*"),
                Selector::new().text_starts_with("Unfortunately"),
                Selector::new().text_contains("responding"),
                Selector::new().text_matches(
                    r".*(?i)\b(attention|hands free activation|multi window|select home|update firmware)\b.*",
                ),
            ],
        }
    }

    fn has_safe_context(&self, screen: &Screen) -> bool {
        self.safe_context
            .iter()
            .any(|selector| screen.exists(selector))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PopupVerdict {
    /// A dismissive button ("Cancel", "Later", ...) is offered.
    Negate,
    /// A "Close" control is offered.
    Close,
    /// An affirmative button on a known-benign dialog.
    AffirmSafe,
    /// "Autostart"-style text that only looks affirmative; nothing to resolve.
    FalsePositive,
    /// An affirmative button on a dialog nobody vetted.
    Unrecognized,
    Clean,
}

/// Pure classification of one snapshot, in priority order negate, close, affirm.
pub fn classify(table: &PopupTable, screen: &Screen) -> PopupVerdict {
    if screen.exists(&table.negate) {
        PopupVerdict::Negate
    } else if screen.exists(&table.close) {
        PopupVerdict::Close
    } else if screen.exists(&table.affirm) {
        if table.has_safe_context(screen) {
            PopupVerdict::AffirmSafe
        } else if screen.exists(&table.false_positive_affirm) {
            PopupVerdict::FalsePositive
        } else {
            PopupVerdict::Unrecognized
        }
    } else {
        PopupVerdict::Clean
    }
}

/// Resolves popups until the screen is clean, giving up after [`MAX_POPUP_ITERATIONS`].
/// `Ok(false)` means dialogs were still showing.
pub fn dismiss_popups(device: &mut Device, table: &PopupTable) -> Result<bool, AppError> {
    let trace_id = device.trace_id().to_string();
    info!(trace_id = %trace_id, "Handling sporadic popups");
    for iteration in 1..=MAX_POPUP_ITERATIONS {
        let screen = device.snapshot()?;
        let verdict = classify(table, &screen);
        debug!(trace_id = %trace_id, iteration, verdict = ?verdict, "popup check");
        match verdict {
            PopupVerdict::Clean | PopupVerdict::FalsePositive => {
                info!(trace_id = %trace_id, iteration, "Handled sporadic popups");
                return Ok(true);
            }
            PopupVerdict::Negate => {
                tick_do_not_show_again(device, table, &screen)?;
                click_if_present(device, &table.negate)?;
            }
            PopupVerdict::Close => {
                tick_do_not_show_again(device, table, &screen)?;
                click_if_present(device, &table.close)?;
            }
            PopupVerdict::AffirmSafe => {
                if tick_do_not_show_again(device, table, &screen)? {
                    // The checkbox may have changed the dialog; affirm only what is still safe.
                    let refreshed = device.snapshot()?;
                    if classify(table, &refreshed) != PopupVerdict::AffirmSafe {
                        continue;
                    }
                }
                click_if_present(device, &table.affirm)?;
            }
            PopupVerdict::Unrecognized => device.press(DeviceKey::Back)?,
        }
    }
    warn!(
        trace_id = %trace_id,
        iterations = MAX_POPUP_ITERATIONS,
        "Failed to handle sporadic popups"
    );
    Ok(false)
}

/// Ticks "don't show again" when the snapshot shows it unchecked. Returns whether it clicked.
fn tick_do_not_show_again(
    device: &mut Device,
    table: &PopupTable,
    screen: &Screen,
) -> Result<bool, AppError> {
    let unchecked = screen
        .find(&table.do_not_show_again)
        .is_some_and(|node| !node.checked);
    if unchecked {
        click_if_present(device, &table.do_not_show_again)?;
    }
    Ok(unchecked)
}

/// A dialog can vanish between the snapshot and the click; that counts as resolved.
fn click_if_present(device: &mut Device, selector: &Selector) -> Result<(), AppError> {
    match device.click(selector) {
        Err(err) if err.code == ErrorCode::ElementNotFound => {
            debug!(trace_id = %device.trace_id(), selector = %selector, "popup control vanished");
            Ok(())
        }
        other => other,
    }
}
