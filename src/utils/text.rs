use crate::error::{SyncError, SyncResult};

/// Trim surrounding whitespace and reject values that end up empty.
///
/// `what` names the field in the resulting validation message, e.g. `"project id"`.
pub fn require_trimmed(value: &str, what: &str) -> SyncResult<String> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(SyncError::validation(format!("{what} must not be empty")));
    }
    Ok(trimmed.to_string())
}

/// Trim an optional free-text field, collapsing blank values to `None`.
pub fn trim_optional(value: Option<String>) -> Option<String> {
    value
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
}
