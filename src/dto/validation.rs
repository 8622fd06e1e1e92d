//! Validation helpers for DTOs.

use validator::ValidationError;

/// Validates that a submitted text field carries at least one non-whitespace
/// character.
pub fn validate_not_blank(value: &str) -> Result<(), ValidationError> {
    if value.trim().is_empty() {
        let mut err = ValidationError::new("not_blank");
        err.message = Some("value must not be blank".into());
        return Err(err);
    }

    Ok(())
}

/// Validates a team reference: an id, a shareable link, or a link fragment.
/// Anything non-blank and reasonably sized is accepted; resolution happens
/// later.
pub fn validate_team_ref(value: &str) -> Result<(), ValidationError> {
    validate_not_blank(value)?;

    if value.len() > 512 {
        let mut err = ValidationError::new("team_ref_length");
        err.message = Some(format!("team reference too long ({} characters)", value.len()).into());
        return Err(err);
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_not_blank_valid() {
        assert!(validate_not_blank("answer").is_ok());
        assert!(validate_not_blank(" a ").is_ok());
    }

    #[test]
    fn test_validate_not_blank_invalid() {
        assert!(validate_not_blank("").is_err());
        assert!(validate_not_blank("   ").is_err());
        assert!(validate_not_blank("\t\n").is_err());
    }

    #[test]
    fn test_validate_team_ref() {
        assert!(validate_team_ref("abc123").is_ok());
        assert!(validate_team_ref("https://host/race/abc123").is_ok());
        assert!(validate_team_ref("").is_err());
        assert!(validate_team_ref(&"x".repeat(513)).is_err());
    }
}
