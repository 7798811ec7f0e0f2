use std::time::Duration;

const PLACEHOLDER: &str = "--";

/// Seconds with two decimals, e.g. `12.34`
pub fn format_seconds(duration: Duration) -> String {
    format!("{:.2}", duration.as_secs_f64())
}

/// Optional pre-formatted text, or a placeholder when absent
pub fn or_placeholder(value: Option<&str>) -> &str {
    value.unwrap_or(PLACEHOLDER)
}

pub fn placeholder() -> &'static str {
    PLACEHOLDER
}
