//! Input validation for credential flows.

use super::AuthError;

pub const USERNAME_MIN: usize = 4;
pub const USERNAME_MAX: usize = 64;
pub const EMAIL_MAX: usize = 64;
pub const PASSWORD_MIN: usize = 8;
pub const PASSWORD_MAX: usize = 64;

/// Syntactic email check: one `@`, non-empty local part, dotted domain,
/// no whitespace.
pub fn is_email(value: &str) -> bool {
    if value.chars().any(char::is_whitespace) {
        return false;
    }
    let Some((local, domain)) = value.split_once('@') else {
        return false;
    };
    !local.is_empty()
        && !domain.contains('@')
        && domain.contains('.')
        && !domain.starts_with('.')
        && !domain.ends_with('.')
}

pub fn validate_password(password: &str) -> Result<(), AuthError> {
    let len = password.chars().count();
    if !(PASSWORD_MIN..=PASSWORD_MAX).contains(&len) {
        return Err(AuthError::ValidationError(format!(
            "Password must be between {PASSWORD_MIN} and {PASSWORD_MAX} characters"
        )));
    }
    Ok(())
}

pub fn validate_email(email: &str) -> Result<(), AuthError> {
    if email.chars().count() > EMAIL_MAX || !is_email(email) {
        return Err(AuthError::ValidationError("Invalid email address".into()));
    }
    Ok(())
}

pub fn validate_sign_up(username: &str, email: &str, password: &str) -> Result<(), AuthError> {
    let len = username.chars().count();
    if !(USERNAME_MIN..=USERNAME_MAX).contains(&len) {
        return Err(AuthError::ValidationError(format!(
            "Username must be between {USERNAME_MIN} and {USERNAME_MAX} characters"
        )));
    }
    // A username that looks like an email would be unreachable at sign-in.
    if is_email(username) {
        return Err(AuthError::ValidationError(
            "Username must not be an email address".into(),
        ));
    }
    validate_email(email)?;
    validate_password(password)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_plain_addresses() {
        assert!(is_email("ann@example.com"));
        assert!(is_email("a.b+tag@mail.example.org"));
    }

    #[test]
    fn rejects_non_addresses() {
        assert!(!is_email("ann"));
        assert!(!is_email("@example.com"));
        assert!(!is_email("ann@localhost"));
        assert!(!is_email("ann@@example.com"));
        assert!(!is_email("ann @example.com"));
        assert!(!is_email("ann@example."));
    }

    #[test]
    fn sign_up_bounds() {
        assert!(validate_sign_up("ann_", "ann@example.com", "password1").is_ok());
        assert!(validate_sign_up("ann", "ann@example.com", "password1").is_err());
        assert!(validate_sign_up("ann_", "not-an-email", "password1").is_err());
        assert!(validate_sign_up("ann_", "ann@example.com", "short").is_err());
        assert!(validate_sign_up("ann@example.com", "ann@example.com", "password1").is_err());
        let long = "p".repeat(PASSWORD_MAX + 1);
        assert!(validate_password(&long).is_err());
    }
}
