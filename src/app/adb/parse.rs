use regex::Regex;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceSummary {
    pub serial: String,
    pub state: String,
    pub model: Option<String>,
}

pub fn parse_adb_devices(output: &str) -> Vec<DeviceSummary> {
    output
        .lines()
        .filter(|line| !line.trim().is_empty())
        .filter(|line| !line.trim_start().starts_with('*'))
        .filter(|line| !line.to_lowercase().contains("list of devices"))
        .filter_map(|line| {
            let tokens: Vec<&str> = line.split_whitespace().collect();
            if tokens.len() < 2 {
                return None;
            }
            let model = tokens
                .iter()
                .skip(2)
                .find_map(|token| token.strip_prefix("model:"))
                .map(str::to_string);
            Some(DeviceSummary {
                serial: tokens[0].to_string(),
                state: tokens[1].to_string(),
                model,
            })
        })
        .collect()
}

/// Picks the device a run will drive: the requested serial if it is online, otherwise the
/// single online device when no serial was requested.
pub fn select_online_device<'a>(
    devices: &'a [DeviceSummary],
    serial: Option<&str>,
) -> Result<&'a DeviceSummary, String> {
    let online = devices
        .iter()
        .filter(|device| device.state == "device")
        .collect::<Vec<_>>();
    match serial {
        Some(serial) => online
            .into_iter()
            .find(|device| device.serial == serial)
            .ok_or_else(|| format!("device {serial} is not connected or not authorized")),
        None => match online.as_slice() {
            [only] => Ok(only),
            [] => Err("no online device found".to_string()),
            _ => Err("multiple devices connected; pass --serial".to_string()),
        },
    }
}

/// Extracts the package of the focused window from `dumpsys window` output.
pub fn parse_focused_package(output: &str) -> Option<String> {
    let focus_re = Regex::new(r"m(?:CurrentFocus|FocusedApp)=.*?\{[^}]*?\s([A-Za-z0-9_.]+)/").ok()?;
    let window_re = Regex::new(r"mCurrentFocus=Window\{\S+\s+\S+\s+([A-Za-z0-9_.]+)\}").ok()?;

    let mut focused_app = None;
    let mut window_only = None;
    for line in output.lines() {
        let trimmed = line.trim();
        if !trimmed.starts_with("mCurrentFocus=") && !trimmed.starts_with("mFocusedApp=") {
            continue;
        }
        if let Some(captures) = focus_re.captures(trimmed) {
            let package = captures[1].to_string();
            if trimmed.starts_with("mCurrentFocus=") {
                return Some(package);
            }
            focused_app.get_or_insert(package);
        } else if let Some(captures) = window_re.captures(trimmed) {
            // Focused windows without an activity, e.g. "StatusBar" or a system dialog.
            window_only.get_or_insert(captures[1].to_string());
        }
    }
    focused_app.or(window_only)
}
