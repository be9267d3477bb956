//! HTTP Status Code Matching Utilities
//!
//! Matches status codes against patterns such as "2xx" or "206".

use reqwest::StatusCode;

/// Check if a status code matches any of the acceptable status code patterns
pub fn is_status_acceptable(status: &StatusCode, acceptable_codes: &[String]) -> bool {
    let status_code = status.as_u16();
    acceptable_codes
        .iter()
        .any(|pattern| matches_pattern(status_code, pattern))
}

/// Check if a status code matches a specific pattern
fn matches_pattern(status_code: u16, pattern: &str) -> bool {
    let pattern = pattern.trim().to_ascii_lowercase();

    if let Some(prefix) = pattern.strip_suffix("xx") {
        // Wildcard class like "2xx"
        if prefix.len() == 1 {
            if let Ok(prefix_digit) = prefix.parse::<u16>() {
                return status_code / 100 == prefix_digit;
            }
        }
        return false;
    }

    pattern
        .parse::<u16>()
        .map(|exact| exact == status_code)
        .unwrap_or(false)
}
