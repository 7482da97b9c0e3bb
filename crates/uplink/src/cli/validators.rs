//! CLI input validation functions.
//!
//! These validators are used by clap's `value_parser` attribute to validate
//! user input at parse time, providing immediate feedback for invalid values.

use crate::config;
use chrono::NaiveDate;

/// Validate an issue key such as `MGTT-14108`.
///
/// Requires a non-empty namespace, a hyphen and a non-empty remainder, with
/// no whitespace anywhere.
pub fn validate_issue_key(s: &str) -> Result<String, String> {
    let s = s.trim();
    if s.is_empty() {
        return Err("Issue key cannot be empty".to_string());
    }
    if s.chars().any(char::is_whitespace) {
        return Err(format!("Issue key '{s}' must not contain whitespace"));
    }
    match s.split_once('-') {
        Some((namespace, rest)) if !namespace.is_empty() && !rest.is_empty() => Ok(s.to_string()),
        _ => Err(format!(
            "Invalid issue key '{s}'. Expected NAMESPACE-NUMBER (e.g., MGTT-14108)"
        )),
    }
}

/// Validate a namespace such as `ITPT`.
pub fn validate_namespace(s: &str) -> Result<String, String> {
    let s = s.trim();
    if s.is_empty() {
        return Err("Namespace cannot be empty".to_string());
    }
    if !s.chars().all(|c| c.is_ascii_alphanumeric() || c == '_') {
        return Err(format!(
            "Namespace '{s}' must contain only letters, digits and underscores"
        ));
    }
    Ok(s.to_string())
}

/// Validate a `YYYY/MM/DD` date bound.
pub fn validate_date(s: &str) -> Result<NaiveDate, String> {
    match config::parse_date(s) {
        Ok(Some(date)) => Ok(date),
        Ok(None) => Err("Date cannot be empty".to_string()),
        Err(e) => Err(e.to_string()),
    }
}

/// Validate a concurrency level (at least 1).
pub fn validate_concurrency(s: &str) -> Result<usize, String> {
    match s.trim().parse::<usize>() {
        Ok(0) => Err("Concurrency must be at least 1".to_string()),
        Ok(n) => Ok(n),
        Err(_) => Err(format!("Invalid concurrency '{s}'")),
    }
}
