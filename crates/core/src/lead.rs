//! Phone-number normalization and local-format validation for lead capture.

use std::sync::OnceLock;

use regex::Regex;

fn direct_phone_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN
        .get_or_init(|| Regex::new(r"05\d[- ]?\d{3}[- ]?\d{4}").expect("hard-coded pattern"))
}

/// Keep only ASCII digits, the canonical form leads are deduplicated by.
pub fn normalize_digits(phone: &str) -> String {
    phone.chars().filter(|c| c.is_ascii_digit()).collect()
}

/// Local mobile format: exactly 10 digits starting with `05`.
pub fn is_valid_local_phone(phone: &str) -> bool {
    let digits = normalize_digits(phone);
    digits.len() == 10 && digits.starts_with("05")
}

/// First mobile-looking number typed directly into a message, if any.
pub fn find_phone(message: &str) -> Option<&str> {
    direct_phone_pattern().find(message).map(|found| found.as_str())
}

#[cfg(test)]
mod tests {
    use super::{find_phone, is_valid_local_phone, normalize_digits};

    #[test]
    fn normalization_strips_separators() {
        assert_eq!(normalize_digits("052-123 4567"), "0521234567");
    }

    #[test]
    fn valid_local_numbers_pass_in_any_separator_style() {
        assert!(is_valid_local_phone("0521234567"));
        assert!(is_valid_local_phone("052-123-4567"));
        assert!(is_valid_local_phone("052 123 4567"));
    }

    #[test]
    fn wrong_prefix_or_length_is_rejected() {
        assert!(!is_valid_local_phone("0321234567"));
        assert!(!is_valid_local_phone("052123456"));
        assert!(!is_valid_local_phone("05212345678"));
    }

    #[test]
    fn finds_phone_embedded_in_free_text() {
        let message = "אפשר לחזור אליי? 052-123-4567 תודה";
        assert_eq!(find_phone(message), Some("052-123-4567"));
        assert_eq!(find_phone("אין כאן מספר"), None);
    }
}
