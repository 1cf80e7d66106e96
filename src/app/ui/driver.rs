use std::time::Duration;

use super::hierarchy::Screen;
use super::selector::Selector;
use crate::app::error::AppError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeviceKey {
    Back,
    Home,
    Enter,
}

impl DeviceKey {
    pub fn keycode(self) -> &'static str {
        match self {
            DeviceKey::Back => "KEYCODE_BACK",
            DeviceKey::Home => "KEYCODE_HOME",
            DeviceKey::Enter => "KEYCODE_ENTER",
        }
    }
}

/// Element queries and primitive input against the live screen.
///
/// Waits return `Ok(false)` when their budget runs out; `Err` is reserved for a broken
/// automation channel or, for `click`/`set_text`, a missing element.
pub trait UiDriver {
    fn snapshot(&mut self) -> Result<Screen, AppError>;

    fn wait_exists(&mut self, selector: &Selector, timeout: Duration) -> Result<bool, AppError>;

    fn wait_gone(&mut self, selector: &Selector, timeout: Duration) -> Result<bool, AppError>;

    fn click(&mut self, selector: &Selector) -> Result<(), AppError>;

    fn set_text(&mut self, selector: &Selector, text: &str) -> Result<(), AppError>;

    fn fling_to_end(&mut self, container: &Selector) -> Result<(), AppError>;

    fn scroll_to(&mut self, container: &Selector, target: &Selector) -> Result<bool, AppError>;

    fn press(&mut self, key: DeviceKey) -> Result<(), AppError>;

    fn foreground_app(&mut self) -> Result<String, AppError>;

    fn dump_screen(&mut self) -> Result<String, AppError>;

    fn set_natural_orientation(&mut self) -> Result<(), AppError>;

    fn exists(&mut self, selector: &Selector) -> Result<bool, AppError> {
        Ok(self.snapshot()?.exists(selector))
    }
}
