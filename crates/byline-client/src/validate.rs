//! Client-side validation, applied before any request is dispatched.
//!
//! Bounds mirror the server's forms so obviously-bad input never reaches the
//! network. The server remains authoritative; these checks only short-circuit
//! the round trip.

use byline_types::RegisterRequest;

use crate::error::ApiError;

/// Maximum comment length in characters.
pub const MAX_COMMENT_LEN: usize = 500;

const PASSWORD_SYMBOLS: &str = "!@#$%^&*(),.?\":{}|<>";

/// Validates login credentials: username 3..=20 chars, password 3..=50.
pub fn login(username: &str, password: &str) -> Result<(), ApiError> {
    let username = username.trim();
    if username.is_empty() {
        return Err(ApiError::validation("username", "Username is required"));
    }
    if username.chars().count() < 3 {
        return Err(ApiError::validation(
            "username",
            "Username must be at least 3 characters",
        ));
    }
    if username.chars().count() > 20 {
        return Err(ApiError::validation(
            "username",
            "Username must be 20 characters or less",
        ));
    }
    if password.is_empty() {
        return Err(ApiError::validation("password", "Password is required"));
    }
    if password.chars().count() < 3 {
        return Err(ApiError::validation(
            "password",
            "Password must be at least 3 characters",
        ));
    }
    if password.chars().count() > 50 {
        return Err(ApiError::validation(
            "password",
            "Password must be 50 characters or less",
        ));
    }
    Ok(())
}

/// Validates a registration payload.
pub fn register(request: &RegisterRequest) -> Result<(), ApiError> {
    let username = request.username.trim();
    let valid_chars = username.chars().all(|c| c.is_ascii_alphanumeric() || c == '_');
    let length = username.chars().count();
    if username.is_empty() {
        return Err(ApiError::validation("username", "Username is required"));
    }
    if !valid_chars || !(3..=20).contains(&length) {
        return Err(ApiError::validation(
            "username",
            "Username must be 3-20 characters, using letters, numbers, or underscores",
        ));
    }
    if !username.chars().any(|c| c.is_ascii_alphabetic()) {
        return Err(ApiError::validation(
            "username",
            "Username must contain at least one letter",
        ));
    }

    if request.email.is_empty() {
        return Err(ApiError::validation("email", "Email is required"));
    }
    if !is_plausible_email(&request.email) {
        return Err(ApiError::validation("email", "Invalid email format"));
    }

    let password = &request.password;
    if password.is_empty() {
        return Err(ApiError::validation("password", "Password is required"));
    }
    let strong = password.chars().count() >= 8
        && password.chars().any(|c| c.is_ascii_uppercase())
        && password.chars().any(|c| c.is_ascii_lowercase())
        && password.chars().any(|c| c.is_ascii_digit())
        && password.chars().any(|c| PASSWORD_SYMBOLS.contains(c));
    if !strong {
        return Err(ApiError::validation(
            "password",
            "Password must be at least 8 characters and include an uppercase letter, \
             lowercase letter, number, and special character",
        ));
    }

    if let Some(bio) = &request.bio {
        if bio.chars().count() > 200 {
            return Err(ApiError::validation("bio", "Bio cannot exceed 200 characters"));
        }
    }

    Ok(())
}

/// Validates comment content: trimmed non-empty, at most 500 characters.
pub fn comment(content: &str) -> Result<(), ApiError> {
    let trimmed = content.trim();
    if trimmed.is_empty() {
        return Err(ApiError::validation("content", "Comment cannot be empty"));
    }
    if trimmed.chars().count() > MAX_COMMENT_LEN {
        return Err(ApiError::validation(
            "content",
            "Comment must be 500 characters or less",
        ));
    }
    Ok(())
}

/// `local@domain.tld` shape, nothing more.
fn is_plausible_email(email: &str) -> bool {
    if email.chars().any(char::is_whitespace) {
        return false;
    }
    let Some((local, domain)) = email.split_once('@') else {
        return false;
    };
    if local.is_empty() || domain.contains('@') {
        return false;
    }
    matches!(domain.rsplit_once('.'), Some((host, tld)) if !host.is_empty() && !tld.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request() -> RegisterRequest {
        RegisterRequest {
            username: "new_user1".to_string(),
            email: "new@example.com".to_string(),
            password: "Sup3r!pass".to_string(),
            bio: None,
        }
    }

    /// Test: login bounds from the login form.
    #[test]
    fn test_login_bounds() {
        assert!(login("ada", "pwd").is_ok());
        assert!(matches!(
            login("ab", "x"),
            Err(ApiError::Validation { field, .. }) if field == "username"
        ));
        assert!(matches!(
            login("", "secret"),
            Err(ApiError::Validation { field, .. }) if field == "username"
        ));
        assert!(matches!(
            login("a".repeat(21).as_str(), "secret"),
            Err(ApiError::Validation { field, .. }) if field == "username"
        ));
        assert!(matches!(
            login("ada", ""),
            Err(ApiError::Validation { field, .. }) if field == "password"
        ));
    }

    /// Test: register rules accept a well-formed payload.
    #[test]
    fn test_register_accepts_valid() {
        assert!(register(&request()).is_ok());
    }

    /// Test: digit-only usernames are refused.
    #[test]
    fn test_register_username_needs_letter() {
        let mut req = request();
        req.username = "12345".to_string();
        assert!(matches!(
            register(&req),
            Err(ApiError::Validation { field, .. }) if field == "username"
        ));
    }

    /// Test: weak passwords are refused; 8 chars with all classes passes.
    #[test]
    fn test_register_password_strength() {
        let mut req = request();
        req.password = "Abcd12!?".to_string();
        assert!(register(&req).is_ok());

        for weak in ["Ab1!", "nouppercase1!", "NOLOWERCASE1!", "NoDigits!!", "NoSymbol11"] {
            req.password = weak.to_string();
            assert!(
                matches!(
                    register(&req),
                    Err(ApiError::Validation { field, .. }) if field == "password"
                ),
                "expected rejection for {weak:?}"
            );
        }
    }

    /// Test: email shape check.
    #[test]
    fn test_register_email_shape() {
        let mut req = request();
        for bad in ["plainaddress", "user@nodot", "two words@example.com", "@example.com"] {
            req.email = bad.to_string();
            assert!(register(&req).is_err(), "expected rejection for {bad:?}");
        }
    }

    /// Test: comment length rule, including the exact boundary.
    #[test]
    fn test_comment_rules() {
        assert!(comment("looks good").is_ok());
        assert!(comment("   ").is_err());
        assert!(comment(&"x".repeat(500)).is_ok());
        assert!(comment(&"x".repeat(501)).is_err());
    }
}
