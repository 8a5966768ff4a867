//! Password strength policy applied at registration and invitation
//! acceptance. Passwords are never stored by Evidentia; the check only gates
//! what is forwarded to the identity provider.

use crate::error::ValidationError;

/// Minimum accepted password length in characters.
pub const MIN_PASSWORD_LEN: usize = 8;

/// Require at least eight characters including one uppercase letter, one
/// digit, and one character that is neither a letter nor a digit.
pub fn check_password_strength(password: &str) -> Result<(), ValidationError> {
    let long_enough = password.chars().count() >= MIN_PASSWORD_LEN;
    let has_upper = password.chars().any(char::is_uppercase);
    let has_digit = password.chars().any(|c| c.is_ascii_digit());
    let has_special = password.chars().any(|c| !c.is_alphanumeric());

    if long_enough && has_upper && has_digit && has_special {
        Ok(())
    } else {
        Err(ValidationError::WeakPassword)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_policy_compliant_password() {
        assert!(check_password_strength("Compl1ance!").is_ok());
    }

    #[test]
    fn rejects_each_missing_class() {
        assert!(check_password_strength("Sh0rt!").is_err());
        assert!(check_password_strength("nouppercase1!").is_err());
        assert!(check_password_strength("NoDigitsHere!").is_err());
        assert!(check_password_strength("NoSpecial123").is_err());
    }

    #[test]
    fn counts_characters_not_bytes() {
        // Seven characters, more than eight bytes.
        assert!(check_password_strength("Ünï1!éa").is_err());
        assert!(check_password_strength("Ünï1!éab").is_ok());
    }
}
