//! Traffic and date formatting for panel listings.

use chrono::{DateTime, NaiveDate, Utc};
use serde::Serialize;

const KIB: f64 = 1024.0;
const GIB: f64 = KIB * KIB * KIB;
const TIB: f64 = GIB * KIB;
const SECONDS_PER_DAY: f64 = 86_400.0;

pub fn gb_to_bytes(gb: f64) -> u64 {
    (gb * GIB).floor() as u64
}

pub fn bytes_to_gb(bytes: u64) -> f64 {
    bytes as f64 / GIB
}

pub fn tb_to_bytes(tb: f64) -> u64 {
    (tb * TIB).floor() as u64
}

pub fn bytes_to_tb(bytes: u64) -> f64 {
    bytes as f64 / TIB
}

/// Human-readable traffic, e.g. `1.5 GB`.
pub fn format_traffic(bytes: u64) -> String {
    if bytes == 0 {
        return "0 B".to_string();
    }
    scale(bytes, 2, &["B", "KB", "MB", "GB", "TB"])
}

/// Human-readable size with `decimals` places, e.g. `512 Bytes`.
pub fn format_bytes(bytes: u64, decimals: usize) -> String {
    if bytes == 0 {
        return "0 Bytes".to_string();
    }
    scale(bytes, decimals, &["Bytes", "KB", "MB", "GB", "TB"])
}

fn scale(bytes: u64, decimals: usize, units: &[&str]) -> String {
    let exponent = ((bytes as f64).ln() / KIB.ln()).floor() as usize;
    let exponent = exponent.min(units.len() - 1);
    let value = bytes as f64 / KIB.powi(exponent as i32);

    format!("{} {}", trim_decimals(&format!("{:.*}", decimals, value)), units[exponent])
}

/// `1.50` -> `1.5`, `2.00` -> `2`
fn trim_decimals(fixed: &str) -> &str {
    if fixed.contains('.') {
        fixed.trim_end_matches('0').trim_end_matches('.')
    } else {
        fixed
    }
}

/// Calendar days from `today` until an expiry date.
///
/// Accepts `YYYY-MM-DD` or an RFC 3339 timestamp; returns `None` for an empty
/// or unparseable value.
pub fn remaining_days(expiry: &str, today: NaiveDate) -> Option<i64> {
    let expiry = expiry.trim();
    if expiry.is_empty() {
        return None;
    }

    let date = DateTime::parse_from_rfc3339(expiry)
        .map(|dt| dt.date_naive())
        .or_else(|_| NaiveDate::parse_from_str(expiry, "%Y-%m-%d"))
        .ok()?;

    Some((date - today).num_days())
}

/// Expiry summary shown next to a user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ExpiryStatus {
    pub text: String,
    pub is_expired: bool,
    pub days_left: i64,
}

pub fn format_expiry_with_days(expiry: DateTime<Utc>, now: DateTime<Utc>) -> ExpiryStatus {
    let diff_secs = (expiry - now).num_milliseconds() as f64 / 1000.0;
    let days = (diff_secs / SECONDS_PER_DAY).ceil() as i64;

    let (text, is_expired) = match days {
        d if d < 0 => (format!("Expired {} days ago", -d), true),
        0 => ("Expires today".to_string(), false),
        1 => ("1 day left".to_string(), false),
        d => (format!("{} days left", d), false),
    };

    ExpiryStatus {
        text,
        is_expired,
        days_left: days,
    }
}

/// `Oct 19, 2026`
pub fn format_date(date: DateTime<Utc>) -> String {
    date.format("%b %-d, %Y").to_string()
}

/// `Oct 19, 2026, 09:05 AM`
pub fn format_date_time(date: DateTime<Utc>) -> String {
    date.format("%b %-d, %Y, %I:%M %p").to_string()
}
