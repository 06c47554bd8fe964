//! Form checks that run before any upstream call.

use crate::error::TimecapsuleError;

pub const SIGN_UP_MIN_PASSWORD: usize = 8;
pub const SETTINGS_MIN_PASSWORD: usize = 6;

pub fn sign_in(email: &str, password: &str) -> Result<(), TimecapsuleError> {
    if email.trim().is_empty() || password.is_empty() {
        return Err(TimecapsuleError::validation(
            "Please enter your email and password.",
        ));
    }
    Ok(())
}

/// Confirmation is compared before length, so a short mismatched pair reports the mismatch.
pub fn sign_up(email: &str, password: &str, confirm: &str) -> Result<(), TimecapsuleError> {
    if email.trim().is_empty() {
        return Err(TimecapsuleError::validation("Please enter your email address."));
    }
    if password != confirm {
        return Err(TimecapsuleError::validation("Passwords do not match."));
    }
    if password.chars().count() < SIGN_UP_MIN_PASSWORD {
        return Err(TimecapsuleError::validation(
            "Password must be at least 8 characters.",
        ));
    }
    Ok(())
}

pub fn change_email(new_email: &str) -> Result<(), TimecapsuleError> {
    if new_email.is_empty() || !new_email.contains('@') {
        return Err(TimecapsuleError::validation(
            "Please enter a valid email address.",
        ));
    }
    Ok(())
}

pub fn change_password(current: &str, new: &str, confirm: &str) -> Result<(), TimecapsuleError> {
    if current.is_empty() || new.is_empty() || confirm.is_empty() {
        return Err(TimecapsuleError::validation(
            "Please fill in all password fields.",
        ));
    }
    if new != confirm {
        return Err(TimecapsuleError::validation("New passwords do not match."));
    }
    if new.chars().count() < SETTINGS_MIN_PASSWORD {
        return Err(TimecapsuleError::validation(
            "Password must be at least 6 characters.",
        ));
    }
    Ok(())
}
