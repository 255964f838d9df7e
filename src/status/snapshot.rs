use serde::Serialize;

use crate::types::types::AttemptPhase;

/// Point-in-time view of one download, as rendered on the status dashboard.
#[derive(Debug, Clone, Serialize)]
pub struct StatusSnapshot {
    pub uid: u64,
    pub gid: String,
    pub name: String,
    pub size: u64,
    pub downloaded_bytes: u64,
    pub speed: u64,
    /// Percentage in `0.0..=100.0`.
    pub progress: f64,
    pub eta_secs: f64,
    pub phase: AttemptPhase,
}

impl StatusSnapshot {
    pub fn size_string(&self) -> String {
        format_bytes(self.size)
    }

    pub fn processed_string(&self) -> String {
        format_bytes(self.downloaded_bytes)
    }

    pub fn speed_string(&self) -> String {
        format_speed(self.speed)
    }
}

pub fn progress_percent(downloaded: u64, size: u64) -> f64 {
    if size == 0 {
        return 0.0;
    }
    (downloaded as f64 / size as f64 * 100.0).min(100.0)
}

/// Seconds left at the current speed, `0.0` when unknown.
pub fn eta_secs(downloaded: u64, size: u64, speed: u64) -> f64 {
    let remaining = size.saturating_sub(downloaded);
    if speed > 0 {
        remaining as f64 / speed as f64
    } else {
        0.0
    }
}

const UNITS: [&str; 4] = ["KB", "MB", "GB", "TB"];

/// Size in binary units as shown on the dashboard. Kilobytes get one
/// decimal, larger units two.
pub fn format_bytes(bytes: u64) -> String {
    if bytes < 1024 {
        return format!("{} B", bytes);
    }
    let mut value = bytes as f64 / 1024.0;
    let mut unit = 0;
    while value >= 1024.0 && unit + 1 < UNITS.len() {
        value /= 1024.0;
        unit += 1;
    }
    let precision = if unit == 0 { 1 } else { 2 };
    format!("{:.*} {}", precision, value, UNITS[unit])
}

pub fn format_speed(bytes_per_sec: u64) -> String {
    format!("{}/s", format_bytes(bytes_per_sec))
}
