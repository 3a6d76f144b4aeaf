//! Input validation for API requests.
//!
//! Validation functions return a human-readable message on failure; handlers
//! collect them per field through the `ValidationErrorBuilder` from the
//! `error` module.

use lazy_static::lazy_static;
use regex::Regex;

lazy_static! {
    /// Regex for validating slugs (lowercase alphanumeric with dashes)
    static ref SLUG_REGEX: Regex = Regex::new(r"^[a-z0-9]([a-z0-9-]*[a-z0-9])?$").unwrap();

    /// Regex for a pragmatic email shape check
    static ref EMAIL_REGEX: Regex =
        Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").unwrap();
}

/// Generate a URL-friendly slug from a title or name. Non-alphanumeric runs
/// collapse to single dashes; non-ASCII titles fall back to an empty string
/// and the caller substitutes an id-based slug.
pub fn generate_slug(name: &str) -> String {
    name.to_lowercase()
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() { c } else { '-' })
        .collect::<String>()
        .split('-')
        .filter(|s| !s.is_empty())
        .collect::<Vec<_>>()
        .join("-")
}

/// Validate a slug
pub fn validate_slug(slug: &str) -> Result<(), String> {
    if slug.is_empty() {
        return Err("Slug is required".to_string());
    }
    if slug.len() > 100 {
        return Err("Slug is too long (max 100 characters)".to_string());
    }
    if !SLUG_REGEX.is_match(slug) {
        return Err(
            "Slug must be lowercase alphanumeric with dashes, starting and ending with alphanumeric"
                .to_string(),
        );
    }
    if slug.contains("--") {
        return Err("Slug cannot contain consecutive dashes".to_string());
    }
    Ok(())
}

/// Validate an email address used as a manager login
pub fn validate_email(email: &str) -> Result<(), String> {
    if email.is_empty() {
        return Err("Email is required".to_string());
    }
    if email.len() > 254 {
        return Err("Email is too long (max 254 characters)".to_string());
    }
    if !EMAIL_REGEX.is_match(email) {
        return Err("Invalid email format".to_string());
    }
    Ok(())
}

/// Validate a display name or title field
pub fn validate_name(name: &str, field: &str) -> Result<(), String> {
    if name.trim().is_empty() {
        return Err(format!("{} is required", field));
    }
    if name.len() > 200 {
        return Err(format!("{} is too long (max 200 characters)", field));
    }
    Ok(())
}

/// Validate a session price in currency units
pub fn validate_price(price: i64) -> Result<(), String> {
    if price < 0 {
        return Err("Price cannot be negative".to_string());
    }
    if price > 1_000_000 {
        return Err("Price is too high (max 1000000)".to_string());
    }
    Ok(())
}

/// Validate a certification level (registry tiers are 1-3)
pub fn validate_certification_level(level: i64) -> Result<(), String> {
    if !(1..=3).contains(&level) {
        return Err("Certification level must be 1, 2 or 3".to_string());
    }
    Ok(())
}

/// Validate an ISO birth date (YYYY-MM-DD); empty string means "clear"
pub fn validate_birth_date(date: &str) -> Result<(), String> {
    if date.is_empty() {
        return Ok(());
    }
    let parsed = chrono::NaiveDate::parse_from_str(date, "%Y-%m-%d")
        .map_err(|_| "Birth date must be an ISO date (YYYY-MM-DD)".to_string())?;
    let today = chrono::Utc::now().date_naive();
    if parsed > today {
        return Err("Birth date cannot be in the future".to_string());
    }
    Ok(())
}

/// Validate a manager password
pub fn validate_password(password: &str) -> Result<(), String> {
    if password.len() < 8 {
        return Err("Password must be at least 8 characters".to_string());
    }
    if password.len() > 128 {
        return Err("Password is too long (max 128 characters)".to_string());
    }
    Ok(())
}

/// Validate a UUID string
pub fn validate_uuid(id: &str, field_name: &str) -> Result<(), String> {
    if id.is_empty() {
        return Err(format!("{} is required", field_name));
    }
    if uuid::Uuid::parse_str(id).is_err() {
        return Err(format!("Invalid {} format", field_name));
    }
    Ok(())
}

/// Validate a relative upload path coming from a URL wildcard. Rejects
/// anything that could escape the upload directory.
pub fn validate_upload_path(path: &str) -> Result<(), String> {
    if path.is_empty() {
        return Err("File path is required".to_string());
    }
    if path.len() > 512 {
        return Err("File path is too long (max 512 characters)".to_string());
    }
    if path.starts_with('/') || path.contains('\\') || path.contains('\0') {
        return Err("Invalid file path".to_string());
    }
    if path.split('/').any(|part| part.is_empty() || part == "." || part == "..") {
        return Err("File path cannot contain traversal segments".to_string());
    }
    Ok(())
}

/// Validate a menu link target (site-relative or absolute http(s) URL)
pub fn validate_href(href: &str) -> Result<(), String> {
    if href.is_empty() {
        return Err("Link target is required".to_string());
    }
    if href.len() > 512 {
        return Err("Link target is too long (max 512 characters)".to_string());
    }
    if href.starts_with('/') || href.starts_with("http://") || href.starts_with("https://") {
        Ok(())
    } else {
        Err("Link target must be site-relative or an http(s) URL".to_string())
    }
}
