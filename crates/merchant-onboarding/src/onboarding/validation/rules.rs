use chrono::NaiveDate;

use crate::onboarding::domain::{SocialMediaSlots, SocialPlatform};

use super::Violations;

pub const PASSWORD_SPECIAL_CHARACTERS: &str = "!@#$%^&*";
pub const PASSWORD_MIN_LENGTH: usize = 8;
pub const PHONE_NUMBER_DIGITS: usize = 11;

/// Character classes a password must draw from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PasswordClass {
    Digit,
    Lowercase,
    Uppercase,
    Special,
}

impl PasswordClass {
    pub const ALL: [PasswordClass; 4] = [
        PasswordClass::Digit,
        PasswordClass::Lowercase,
        PasswordClass::Uppercase,
        PasswordClass::Special,
    ];

    fn matches(self, c: char) -> bool {
        match self {
            PasswordClass::Digit => c.is_ascii_digit(),
            PasswordClass::Lowercase => c.is_lowercase(),
            PasswordClass::Uppercase => c.is_uppercase(),
            PasswordClass::Special => PASSWORD_SPECIAL_CHARACTERS.contains(c),
        }
    }

    pub const fn message(self) -> &'static str {
        match self {
            PasswordClass::Digit => "Password must contain at least one number",
            PasswordClass::Lowercase => "Password must contain at least one lowercase letter",
            PasswordClass::Uppercase => "Password must contain at least one uppercase letter",
            PasswordClass::Special => {
                "Password must contain at least one special character (!@#$%^&*)"
            }
        }
    }
}

/// Trimmed value must be non-empty.
pub fn required(value: &str, label: &str) -> Option<String> {
    if value.trim().is_empty() {
        return Some(format!("{label} is required"));
    }
    None
}

pub fn required_choice<T>(value: &Option<T>, label: &str) -> Option<String> {
    if value.is_none() {
        return Some(format!("{label} is required"));
    }
    None
}

/// Required text bounded to `min..=max` characters.
pub fn length(value: &str, label: &str, min: usize, max: usize) -> Option<String> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Some(format!("{label} is required"));
    }
    let count = trimmed.chars().count();
    if count < min {
        return Some(format!("{label} must be at least {min} characters"));
    }
    if count > max {
        return Some(format!("{label} must be at most {max} characters"));
    }
    None
}

/// Optional text; only the upper bound applies.
pub fn optional_length(value: &str, label: &str, max: usize) -> Option<String> {
    let trimmed = value.trim();
    if !trimmed.is_empty() && trimmed.chars().count() > max {
        return Some(format!("{label} must be at most {max} characters"));
    }
    None
}

pub fn email(value: &str, label: &str) -> Option<String> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Some(format!("{label} is required"));
    }
    if is_email(trimmed) {
        None
    } else {
        Some(format!("{label} must be a valid email address"))
    }
}

fn is_email(value: &str) -> bool {
    if value.chars().any(char::is_whitespace) {
        return false;
    }
    let mut parts = value.split('@');
    let (Some(local), Some(domain), None) = (parts.next(), parts.next(), parts.next()) else {
        return false;
    };
    if local.is_empty() || !domain.contains('.') {
        return false;
    }
    domain.split('.').all(|label| !label.is_empty())
}

pub fn phone_number(value: &str, label: &str) -> Option<String> {
    let trimmed = value.trim();
    if trimmed.len() == PHONE_NUMBER_DIGITS && trimmed.chars().all(|c| c.is_ascii_digit()) {
        None
    } else {
        Some(format!("{label} must be {PHONE_NUMBER_DIGITS} digits"))
    }
}

/// One message per missing character class, in a fixed order.
pub fn password_classes(value: &str) -> Vec<String> {
    PasswordClass::ALL
        .into_iter()
        .filter(|class| !value.chars().any(|c| class.matches(c)))
        .map(|class| class.message().to_string())
        .collect()
}

pub fn password_length(value: &str) -> Option<String> {
    if value.chars().count() < PASSWORD_MIN_LENGTH {
        return Some(format!(
            "Password must be at least {PASSWORD_MIN_LENGTH} characters"
        ));
    }
    None
}

/// Length plus every class rule, so all unmet requirements surface together.
pub fn password(value: &str) -> Vec<String> {
    if value.is_empty() {
        return vec!["Password is required".to_string()];
    }
    let mut messages: Vec<String> = password_length(value).into_iter().collect();
    messages.extend(password_classes(value));
    messages
}

pub fn matches(value: &str, other: &str, message: &str) -> Option<String> {
    if value != other {
        return Some(message.to_string());
    }
    None
}

pub fn at_least_one(count: usize, label: &str) -> Option<String> {
    if count == 0 {
        return Some(format!("Select at least one {label}"));
    }
    None
}

pub fn required_date(value: Option<NaiveDate>, today: NaiveDate, label: &str) -> Option<String> {
    match value {
        None => Some(format!("{label} is required")),
        Some(date) => not_in_future(date, today, label),
    }
}

pub fn not_in_future(date: NaiveDate, today: NaiveDate, label: &str) -> Option<String> {
    if date > today {
        return Some(format!("{label} cannot be in the future"));
    }
    None
}

/// Every filled slot needs a handle and platforms may not repeat.
pub fn social_media(slots: &SocialMediaSlots, field: &str) -> Violations {
    let mut violations = Violations::new();
    let mut seen: Vec<SocialPlatform> = Vec::new();
    for (slot, entry) in slots.iter() {
        if entry.handle.trim().is_empty() {
            violations.push(format!("{field}.{slot}.handle"), "Handle is required");
        }
        if seen.contains(&entry.platform) {
            violations.push(
                format!("{field}.{slot}.platform"),
                "Each platform can only be added once",
            );
        } else {
            seen.push(entry.platform);
        }
    }
    violations
}
