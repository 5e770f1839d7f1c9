use std::time::Duration;

/// 格式化字节数
///
/// One decimal from KB upwards, plain `Bytes` below 1 KB.
pub fn format_bytes(bytes: u64) -> String {
    const UNITS: [&str; 4] = ["KB", "MB", "GB", "TB"];
    const UNIT_SIZE: u64 = 1024;

    for (i, unit) in UNITS.iter().enumerate().rev() {
        let threshold = UNIT_SIZE.pow(i as u32 + 1);
        if bytes >= threshold {
            return format!("{:.1} {}", bytes as f64 / threshold as f64, unit);
        }
    }

    format!("{} Bytes", bytes)
}

/// 格式化速度
pub fn format_speed(bytes_per_second: u64) -> String {
    format!("{}/s", format_bytes(bytes_per_second))
}

/// 格式化持续时间
pub fn format_duration(duration: Duration) -> String {
    let secs = duration.as_secs();
    let hours = secs / 3600;
    let minutes = (secs % 3600) / 60;
    let seconds = secs % 60;

    if hours > 0 {
        format!("{}h {}m {}s", hours, minutes, seconds)
    } else if minutes > 0 {
        format!("{}m {}s", minutes, seconds)
    } else {
        format!("{}s", seconds)
    }
}
