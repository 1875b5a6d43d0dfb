use chrono::{DateTime, Utc};

/// Validate email format (basic validation)
pub fn is_valid_email(email: &str) -> bool {
    email.contains('@')
        && email.contains('.')
        && email.len() > 5
        && !email.starts_with('@')
        && !email.ends_with('@')
        && !email.starts_with('.')
        && !email.ends_with('.')
        && !email.chars().any(char::is_whitespace)
}

/// UK-style phone numbers: digits, spaces, an optional leading `+`, 10 to 15 digits
pub fn is_valid_phone(phone: &str) -> bool {
    let trimmed = phone.trim();
    let body = trimmed.strip_prefix('+').unwrap_or(trimmed);
    if !body
        .chars()
        .all(|c| c.is_ascii_digit() || c == ' ' || c == '-' || c == '(' || c == ')')
    {
        return false;
    }
    let digits = body.chars().filter(char::is_ascii_digit).count();
    (10..=15).contains(&digits)
}

/// Generate a unique identifier for quotes and comments
pub fn generate_id() -> String {
    uuid::Uuid::new_v4().to_string()
}

/// Collapse runs of whitespace and lowercase, for address comparisons
pub fn normalize_text(value: &str) -> String {
    value
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase()
}

pub fn parse_rfc3339(value: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(value)
        .ok()
        .map(|dt| dt.with_timezone(&Utc))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_email_validation() {
        assert!(is_valid_email("test@example.com"));
        assert!(is_valid_email("first.last+tag@domain.co.uk"));
        assert!(!is_valid_email("invalid-email"));
        assert!(!is_valid_email("@.com"));
        assert!(!is_valid_email("user@example."));
        assert!(!is_valid_email("us er@example.com"));
    }

    #[test]
    fn test_phone_validation() {
        assert!(is_valid_phone("07700 900123"));
        assert!(is_valid_phone("+44 7700 900123"));
        assert!(is_valid_phone("(01632) 960-001"));
        assert!(!is_valid_phone("12345"));
        assert!(!is_valid_phone("call me"));
    }

    #[test]
    fn test_normalize_text() {
        assert_eq!(normalize_text("  Heathrow   Airport T5 "), "heathrow airport t5");
    }

    #[test]
    fn test_generate_id_is_unique() {
        assert_ne!(generate_id(), generate_id());
    }
}
