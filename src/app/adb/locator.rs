use std::path::Path;

pub const ADB_ENV: &str = "ADB";

pub fn normalize_command_path(value: &str) -> String {
    let trimmed = value.trim();
    for quote in ['"', '\''] {
        if let Some(inner) = trimmed
            .strip_prefix(quote)
            .and_then(|candidate| candidate.strip_suffix(quote))
        {
            return inner.trim().to_string();
        }
    }
    trimmed.to_string()
}

/// Configured path first, then `$ADB`, then whatever `adb` is on PATH.
pub fn resolve_adb_program(configured: &str, env_value: Option<&str>) -> String {
    let normalized = normalize_command_path(configured);
    if !normalized.is_empty() {
        return normalized;
    }
    env_value
        .map(normalize_command_path)
        .filter(|value| !value.is_empty())
        .unwrap_or_else(|| "adb".to_string())
}

pub fn validate_adb_program(program: &str) -> Result<(), String> {
    if program.trim().is_empty() {
        return Err("adb command is empty".to_string());
    }
    // Bare names are resolved through PATH at spawn time.
    if !program.contains('/') && !program.contains('\\') {
        return Ok(());
    }
    let path = Path::new(program);
    if path.is_dir() {
        return Err("adb path must point to an executable file".to_string());
    }
    if !path.exists() {
        return Err(format!("adb executable not found at {program}"));
    }
    Ok(())
}
