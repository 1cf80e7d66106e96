use std::time::Duration;

use tracing::{info, warn};

use crate::app::adb::locator::{resolve_adb_program, validate_adb_program, ADB_ENV};
use crate::app::adb::parse::{parse_adb_devices, select_online_device};
use crate::app::adb::runner::AdbTarget;
use crate::app::adb::shell::AdbShell;
use crate::app::config::{ms, WalkthroughConfig};
use crate::app::device::Device;
use crate::app::error::{AppError, ErrorCode};
use crate::app::ui::adb_driver::AdbUiDriver;
use crate::app::ui::driver::DeviceKey;

/// One connected device for the length of a run. Dropping the session uninstalls the
/// automation packages and sends the device home, however the run ended.
pub struct DeviceSession {
    device: Device,
    support_packages: Vec<String>,
}

impl DeviceSession {
    /// Finds the device to drive over adb and brings it to a known state. `serial` overrides
    /// the configured one.
    pub fn open(
        config: &WalkthroughConfig,
        serial: Option<&str>,
        trace_id: &str,
    ) -> Result<Self, AppError> {
        let env_value = std::env::var(ADB_ENV).ok();
        let program = resolve_adb_program(&config.device.adb_path, env_value.as_deref());
        validate_adb_program(&program).map_err(|err| AppError::config(err, trace_id))?;
        let timeout = Duration::from_secs(config.device.command_timeout_secs);

        let output = AdbTarget::new(program.clone(), None, timeout).run(["devices", "-l"], trace_id)?;
        if !output.succeeded() {
            return Err(AppError::driver(
                format!("adb devices failed: {}", output.stderr.trim()),
                trace_id,
            ));
        }
        let devices = parse_adb_devices(&output.stdout);
        let requested = serial
            .or(Some(config.device.serial.as_str()))
            .map(str::trim)
            .filter(|value| !value.is_empty());
        let selected = select_online_device(&devices, requested)
            .map_err(|err| AppError::driver(err, trace_id))?;
        info!(
            trace_id = %trace_id,
            serial = %selected.serial,
            model = selected.model.as_deref().unwrap_or("unknown"),
            "Using device"
        );

        let target = AdbTarget::new(program, Some(selected.serial.clone()), timeout);
        let driver = AdbUiDriver::new(
            target.clone(),
            ms(config.device.poll_interval_ms),
            trace_id,
        );
        let shell = AdbShell::new(target, trace_id);
        let device = Device::new(Box::new(driver), Box::new(shell), config.timings, trace_id);
        Self::start(
            device,
            config.device.support_packages.clone(),
            ms(config.device.init_retry_pause_ms),
        )
    }

    /// Puts the screen in natural orientation and goes home. A driver failure is retried once
    /// after `retry_pause` and a reset.
    pub fn start(
        device: Device,
        support_packages: Vec<String>,
        retry_pause: Duration,
    ) -> Result<Self, AppError> {
        let mut session = Self {
            device,
            support_packages,
        };
        if let Err(err) = session.initialize() {
            if err.code != ErrorCode::DriverCommunication {
                return Err(err);
            }
            warn!(trace_id = %session.device.trace_id(), error = %err, "Device init failed, retrying once");
            std::thread::sleep(retry_pause);
            session.device.reset_device_state(&session.support_packages);
            session.initialize()?;
        }
        Ok(session)
    }

    fn initialize(&mut self) -> Result<(), AppError> {
        self.device.set_natural_orientation()?;
        self.device.press(DeviceKey::Home)
    }

    pub fn device(&mut self) -> &mut Device {
        &mut self.device
    }
}

impl Drop for DeviceSession {
    fn drop(&mut self) {
        self.device.reset_device_state(&self.support_packages);
        info!(trace_id = %self.device.trace_id(), "Device session closed");
    }
}
