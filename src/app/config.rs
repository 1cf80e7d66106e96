use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::app::error::AppError;

pub const CONFIG_PATH_ENV: &str = "STORE_WALKTHROUGH_CONFIG_PATH";

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct DeviceSettings {
    pub adb_path: String,
    pub serial: String,
    pub command_timeout_secs: u64,
    pub support_packages: Vec<String>,
    pub init_retry_pause_ms: u64,
    pub poll_interval_ms: u64,
}

impl Default for DeviceSettings {
    fn default() -> Self {
        Self {
            adb_path: String::new(),
            serial: String::new(),
            command_timeout_secs: 30,
            support_packages: vec![
                "com.github.uiautomator".to_string(),
                "com.github.uiautomator.test".to_string(),
            ],
            init_retry_pause_ms: 3000,
            poll_interval_ms: 500,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct StoreSettings {
    pub package: String,
    pub main_component: String,
    pub settings_package: String,
    pub account_settings_action: String,
    pub account_provider: String,
}

impl Default for StoreSettings {
    fn default() -> Self {
        Self {
            package: "com.android.vending".to_string(),
            main_component: "com.android.vending/com.google.android.finsky.activities.MainActivity"
                .to_string(),
            settings_package: "com.android.settings".to_string(),
            account_settings_action: "android.settings.SYNC_SETTINGS".to_string(),
            account_provider: "google".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct BudgetSettings {
    pub base_secs: u64,
    pub per_extra_app_secs: u64,
    pub retries: u32,
}

impl Default for BudgetSettings {
    fn default() -> Self {
        Self {
            base_secs: 600,
            per_extra_app_secs: 300,
            retries: 2,
        }
    }
}

impl BudgetSettings {
    /// Wall-clock budget for a whole walkthrough over `app_count` apps.
    pub fn overall_budget(&self, app_count: usize) -> Duration {
        let extra = app_count.saturating_sub(1) as u64;
        Duration::from_secs(
            self.base_secs
                .saturating_add(self.per_extra_app_secs.saturating_mul(extra)),
        )
    }
}

/// Wait budgets and settle pauses used by the flows, in milliseconds.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct FlowTimings {
    pub checking_info_gone_ms: u64,
    pub username_gone_ms: u64,
    pub password_field_ms: u64,
    pub progress_gone_ms: u64,
    pub store_ready_ms: u64,
    pub install_button_ms: u64,
    pub install_complete_ms: u64,
    pub account_list_ms: u64,
    pub settle_pause_ms: u64,
    pub nav_retry_pause_ms: u64,
    pub username_fallback_pause_ms: u64,
    pub sync_pause_ms: u64,
    pub progress_fallback_pause_ms: u64,
    pub screen_pause_ms: u64,
    pub back_out_pause_ms: u64,
    pub install_started_pause_ms: u64,
    pub launch_verify_pause_ms: u64,
}

impl Default for FlowTimings {
    fn default() -> Self {
        Self {
            checking_info_gone_ms: 60_000,
            username_gone_ms: 15_000,
            password_field_ms: 5_000,
            progress_gone_ms: 30_000,
            store_ready_ms: 10_000,
            install_button_ms: 15_000,
            install_complete_ms: 300_000,
            account_list_ms: 10_000,
            settle_pause_ms: 1_000,
            nav_retry_pause_ms: 4_000,
            username_fallback_pause_ms: 3_000,
            sync_pause_ms: 5_000,
            progress_fallback_pause_ms: 15_000,
            screen_pause_ms: 3_000,
            back_out_pause_ms: 2_000,
            install_started_pause_ms: 5_000,
            launch_verify_pause_ms: 10_000,
        }
    }
}

impl FlowTimings {
    /// Same wait budgets, no fixed pauses. Used against simulated screens.
    pub fn without_pauses() -> Self {
        Self {
            settle_pause_ms: 0,
            nav_retry_pause_ms: 0,
            username_fallback_pause_ms: 0,
            sync_pause_ms: 0,
            progress_fallback_pause_ms: 0,
            screen_pause_ms: 0,
            back_out_pause_ms: 0,
            install_started_pause_ms: 0,
            launch_verify_pause_ms: 0,
            ..Self::default()
        }
    }
}

pub fn ms(value: u64) -> Duration {
    Duration::from_millis(value)
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct LoggingSettings {
    pub level: String,
    pub json: bool,
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            json: false,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct WalkthroughConfig {
    #[serde(default)]
    pub device: DeviceSettings,
    #[serde(default)]
    pub store: StoreSettings,
    #[serde(default)]
    pub budget: BudgetSettings,
    #[serde(default)]
    pub timings: FlowTimings,
    #[serde(default)]
    pub logging: LoggingSettings,
}

pub fn config_path(explicit: Option<&Path>) -> PathBuf {
    if let Some(path) = explicit {
        return path.to_path_buf();
    }
    if let Ok(path) = std::env::var(CONFIG_PATH_ENV) {
        if !path.trim().is_empty() {
            return PathBuf::from(path);
        }
    }
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".store_walkthrough_config.json")
}

pub fn load_config(explicit: Option<&Path>, trace_id: &str) -> Result<WalkthroughConfig, AppError> {
    load_config_from_path(&config_path(explicit), trace_id)
}

pub fn load_config_from_path(path: &Path, trace_id: &str) -> Result<WalkthroughConfig, AppError> {
    if !path.exists() {
        return Ok(WalkthroughConfig::default());
    }
    let raw = fs::read_to_string(path).map_err(|err| {
        AppError::config(
            format!("Failed to read config {}: {err}", path.display()),
            trace_id,
        )
    })?;
    let config: WalkthroughConfig = serde_json::from_str(&raw).map_err(|err| {
        AppError::config(
            format!("Failed to parse config {}: {err}", path.display()),
            trace_id,
        )
    })?;
    Ok(validate_config(config))
}

fn validate_config(mut config: WalkthroughConfig) -> WalkthroughConfig {
    let defaults = WalkthroughConfig::default();
    if config.device.command_timeout_secs == 0 {
        config.device.command_timeout_secs = defaults.device.command_timeout_secs;
    }
    if config.device.poll_interval_ms < 50 {
        config.device.poll_interval_ms = defaults.device.poll_interval_ms;
    }
    if config.budget.retries == 0 {
        config.budget.retries = defaults.budget.retries;
    }
    if config.budget.base_secs == 0 {
        config.budget.base_secs = defaults.budget.base_secs;
    }
    if config.store.package.trim().is_empty() {
        config.store.package = defaults.store.package;
    }
    if !config.store.main_component.contains('/') {
        config.store.main_component = defaults.store.main_component;
    }
    if config.store.settings_package.trim().is_empty() {
        config.store.settings_package = defaults.store.settings_package;
    }
    if config.store.account_settings_action.trim().is_empty() {
        config.store.account_settings_action = defaults.store.account_settings_action;
    }
    if config.store.account_provider.trim().is_empty() {
        config.store.account_provider = defaults.store.account_provider;
    }
    if config.logging.level.trim().is_empty() {
        config.logging.level = defaults.logging.level;
    }
    config
}
