pub const PLACEHOLDER: &str = "--";

const KB: f64 = 1024.0;
const MB: f64 = 1024.0 * 1024.0;
const GB: f64 = 1024.0 * 1024.0 * 1024.0;

pub fn format_speed(bytes_per_sec: f64) -> String {
    if bytes_per_sec >= GB {
        format!("{:.2}G", bytes_per_sec / GB)
    } else if bytes_per_sec >= MB {
        format!("{:.2}M", bytes_per_sec / MB)
    } else if bytes_per_sec >= KB {
        format!("{:.0}K", bytes_per_sec / KB)
    } else {
        "0".to_string()
    }
}

pub fn format_optional_speed(bytes_per_sec: Option<f64>) -> String {
    bytes_per_sec
        .map(format_speed)
        .unwrap_or_else(|| PLACEHOLDER.to_string())
}

pub fn format_memory(bytes: u64) -> String {
    let value = bytes as f64;
    if value >= GB {
        format!("{:.2} GB", value / GB)
    } else if value >= MB {
        format!("{:.1} MB", value / MB)
    } else if value >= KB {
        format!("{:.0} KB", value / KB)
    } else {
        format!("{bytes} B")
    }
}

pub fn format_used_memory(used_bytes: Option<u64>) -> String {
    match used_bytes {
        Some(bytes) => format!("{:.2} GB", bytes as f64 / GB),
        None => PLACEHOLDER.to_string(),
    }
}

pub fn format_percentage(value: Option<f64>) -> String {
    match value {
        Some(v) if v.is_finite() => format!("{v:.1}"),
        _ => PLACEHOLDER.to_string(),
    }
}
