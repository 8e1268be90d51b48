//! Formatting helpers shared across front ends.

use chrono::{Local, TimeZone};

/// Total spend with four decimals, e.g. `$0.0042`.
pub fn format_cost(cost: f64) -> String {
    format!("${:.4}", cost)
}

/// Latency rounded to whole milliseconds, e.g. `123ms`.
pub fn format_latency(latency_ms: f64) -> String {
    format!("{}ms", latency_ms.round() as i64)
}

/// Integer with thousands separators, e.g. `1,405`.
pub fn format_tokens(tokens: u64) -> String {
    let digits = tokens.to_string();
    let mut out = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, c) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            out.push(',');
        }
        out.push(c);
    }
    out
}

/// Wall-clock time of an epoch-millisecond timestamp in the local zone (`HH:MM:SS`).
pub fn format_clock(timestamp_ms: i64) -> String {
    match Local.timestamp_millis_opt(timestamp_ms).single() {
        Some(ts) => ts.format("%H:%M:%S").to_string(),
        None => "--:--:--".to_string(),
    }
}
