/// Pure functions for formatting error and success messages (Discord-agnostic)

/// Format a validation error message with emoji
pub fn format_error(message: &str) -> String {
    format!("❌ {}", message)
}

/// Format a success message with emoji
pub fn format_success(message: &str) -> String {
    format!("✅ {}", message)
}

/// Format an info message with emoji
pub fn format_info(message: &str) -> String {
    format!("ℹ️ {}", message)
}

/// Build an error message for missing permissions
pub fn build_permission_error(required_permission: &str) -> String {
    format_error(&format!(
        "You don't have permission to do this. Required: {}",
        required_permission
    ))
}

/// Build an error message for a call made in the wrong context
pub fn build_context_error(required_context: &str) -> String {
    format_error(&format!(
        "This must be used {}",
        required_context
    ))
}
