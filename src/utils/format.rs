//! Display formatting shared between change reports and any UI.
//!
//! Both sides of a change field go through these helpers so "previous"
//! and "current" always render the same way.

use chrono::{DateTime, Utc};

/// Format an integer with thin space grouping: 1234567 -> "1 234 567".
pub fn format_number(value: i64) -> String {
    let negative = value < 0;
    let digits: Vec<u8> = value.unsigned_abs().to_string().into_bytes();

    let mut out = String::with_capacity(digits.len() + digits.len() / 3 + 1);
    for (i, b) in digits.iter().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            out.push(' ');
        }
        out.push(*b as char);
    }

    if negative {
        format!("-{}", out)
    } else {
        out
    }
}

/// Format a currency amount. The gateway reports whole units.
pub fn format_money(value: i64) -> String {
    format!("{} US$", format_number(value))
}

/// Format a timestamp for display, `never` when absent.
pub fn format_date(date: Option<DateTime<Utc>>) -> String {
    match date {
        Some(d) => d.format("%b %d, %Y").to_string(),
        None => "never".to_string(),
    }
}

/// Format an injury state: healthy, bruised, or weeks remaining.
pub fn format_injury(weeks: Option<u32>) -> String {
    match weeks {
        None => "healthy".to_string(),
        Some(0) => "bruised".to_string(),
        Some(1) => "1 week".to_string(),
        Some(w) => format!("{} weeks", w),
    }
}

/// Format an optional string, returning a default if None
pub fn format_optional(value: &Option<String>, default: &str) -> String {
    value.as_deref().unwrap_or(default).to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_format_number() {
        assert_eq!(format_number(0), "0");
        assert_eq!(format_number(18), "18");
        assert_eq!(format_number(950), "950");
        assert_eq!(format_number(12345), "12 345");
        assert_eq!(format_number(1234567), "1 234 567");
        assert_eq!(format_number(-54321), "-54 321");
    }

    #[test]
    fn test_format_injury() {
        assert_eq!(format_injury(None), "healthy");
        assert_eq!(format_injury(Some(0)), "bruised");
        assert_eq!(format_injury(Some(1)), "1 week");
        assert_eq!(format_injury(Some(4)), "4 weeks");
    }

    #[test]
    fn test_format_date() {
        let d = Utc.with_ymd_and_hms(2026, 3, 5, 12, 0, 0).unwrap();
        assert_eq!(format_date(Some(d)), "Mar 05, 2026");
        assert_eq!(format_date(None), "never");
    }
}
