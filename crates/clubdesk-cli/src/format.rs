//! Text formatting for table output.

/// Format a phone number for display.
/// Uzbek numbers are normalized to `+998 XX XXX XX XX`.
pub fn format_phone(phone: &str) -> String {
    let digits: String = phone.chars().filter(|c| c.is_ascii_digit()).collect();

    let local = match digits.len() {
        12 if digits.starts_with("998") => &digits[3..],
        9 => digits.as_str(),
        _ => return phone.to_string(),
    };
    format!(
        "+998 {} {} {} {}",
        &local[0..2],
        &local[2..5],
        &local[5..7],
        &local[7..9]
    )
}

/// Truncate a string to a maximum number of characters, adding ellipsis if needed
pub fn truncate_string(s: &str, max_len: usize) -> String {
    if s.chars().count() <= max_len {
        s.to_string()
    } else if max_len <= 3 {
        s.chars().take(max_len).collect()
    } else {
        let truncated: String = s.chars().take(max_len - 3).collect();
        format!("{}...", truncated)
    }
}

/// Format an optional string, returning a default if None
pub fn format_optional(value: Option<&str>, default: &str) -> String {
    match value {
        Some(v) if !v.trim().is_empty() => v.to_string(),
        _ => default.to_string(),
    }
}

/// Format an API date as `DD.MM.YYYY`
pub fn format_date(date: &str) -> String {
    if let Ok(dt) = chrono::DateTime::parse_from_rfc3339(date) {
        dt.format("%d.%m.%Y").to_string()
    } else if let Ok(d) = chrono::NaiveDate::parse_from_str(date.get(..10).unwrap_or(date), "%Y-%m-%d") {
        d.format("%d.%m.%Y").to_string()
    } else {
        date.to_string()
    }
}

/// Pad or cut to an exact column width
pub fn column(s: &str, width: usize) -> String {
    format!("{:<width$}", truncate_string(s, width), width = width)
}
