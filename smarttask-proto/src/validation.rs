//! Input rules for task forms.
//!
//! Lengths count Unicode scalar values, not bytes.

/// Minimum task title length in characters.
pub const MIN_TASK_TITLE_LENGTH: usize = 3;

/// Maximum task description length in characters.
pub const MAX_TASK_DESCRIPTION_LENGTH: usize = 500;

/// A task form field that failed validation.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ValidationError {
    /// Title shorter than [`MIN_TASK_TITLE_LENGTH`].
    #[error("Title must be at least {MIN_TASK_TITLE_LENGTH} characters")]
    TitleTooShort,
    /// Description longer than [`MAX_TASK_DESCRIPTION_LENGTH`].
    #[error("Description cannot exceed {MAX_TASK_DESCRIPTION_LENGTH} characters")]
    DescriptionTooLong,
}

/// Checks a task title.
///
/// # Errors
///
/// Returns [`ValidationError::TitleTooShort`] for titles under three characters.
pub fn validate_title(title: &str) -> Result<(), ValidationError> {
    if title.chars().count() < MIN_TASK_TITLE_LENGTH {
        return Err(ValidationError::TitleTooShort);
    }
    Ok(())
}

/// Checks an optional task description.
///
/// # Errors
///
/// Returns [`ValidationError::DescriptionTooLong`] above 500 characters.
pub fn validate_description(description: Option<&str>) -> Result<(), ValidationError> {
    match description {
        Some(text) if text.chars().count() > MAX_TASK_DESCRIPTION_LENGTH => {
            Err(ValidationError::DescriptionTooLong)
        }
        _ => Ok(()),
    }
}
