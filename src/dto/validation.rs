//! Validation helpers for DTOs.

use validator::ValidationError;

use crate::services::slot_model::MAX_GROUP_SIZE;

/// Validates that option sizes are distinct values between 1 and 4.
///
/// # Examples
///
/// ```ignore
/// validate_option_sizes(&[2, 4]) // Ok
/// validate_option_sizes(&[])     // Err - empty
/// validate_option_sizes(&[2, 2]) // Err - duplicate
/// validate_option_sizes(&[5])    // Err - out of range
/// ```
pub fn validate_option_sizes(sizes: &[u8]) -> Result<(), ValidationError> {
    if sizes.is_empty() {
        let mut err = ValidationError::new("option_sizes_empty");
        err.message = Some("At least one option size is required".into());
        return Err(err);
    }

    if let Some(size) = sizes
        .iter()
        .find(|size| **size == 0 || **size > MAX_GROUP_SIZE)
    {
        let mut err = ValidationError::new("option_sizes_range");
        err.message = Some(
            format!("Option size must be between 1 and {MAX_GROUP_SIZE} (got {size})").into(),
        );
        return Err(err);
    }

    let mut seen = [false; MAX_GROUP_SIZE as usize + 1];
    for size in sizes {
        if std::mem::replace(&mut seen[usize::from(*size)], true) {
            let mut err = ValidationError::new("option_sizes_duplicate");
            err.message = Some(format!("Option size {size} is listed twice").into());
            return Err(err);
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_option_sizes_valid() {
        assert!(validate_option_sizes(&[1, 2, 3, 4]).is_ok());
        assert!(validate_option_sizes(&[4]).is_ok());
    }

    #[test]
    fn test_validate_option_sizes_invalid() {
        assert!(validate_option_sizes(&[]).is_err());
        assert!(validate_option_sizes(&[0]).is_err());
        assert!(validate_option_sizes(&[5]).is_err());
        assert!(validate_option_sizes(&[2, 3, 2]).is_err());
    }
}
