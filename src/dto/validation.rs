//! Validation helpers for inbound command payloads.

use validator::ValidationError;

/// Characters the remote database forbids inside a key.
const FORBIDDEN_KEY_CHARS: [char; 6] = ['/', '.', '#', '$', '[', ']'];

/// Validates that a region, event or session identifier is a single, non-empty database key.
///
/// # Examples
///
/// ```ignore
/// validate_path_segment("socal")      // Ok
/// validate_path_segment("")           // Err - empty
/// validate_path_segment("socal/demo") // Err - would address a nested path
/// ```
pub fn validate_path_segment(value: &str) -> Result<(), ValidationError> {
    if value.trim().is_empty() {
        let mut err = ValidationError::new("path_segment_empty");
        err.message = Some("Identifier must not be empty".into());
        return Err(err);
    }

    if value.chars().any(|c| FORBIDDEN_KEY_CHARS.contains(&c) || c.is_control()) {
        let mut err = ValidationError::new("path_segment_format");
        err.message = Some(
            format!("Identifier `{value}` must not contain any of / . # $ [ ] or control characters")
                .into(),
        );
        return Err(err);
    }

    Ok(())
}
