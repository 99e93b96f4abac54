// Error handling utilities for consistent error messages and exit codes

use std::process;
use crate::error::{ErrorCode, StoreError};

/// Exit with a user error (exit code 1)
/// User errors are for invalid input, missing resources, etc.
pub fn user_error(message: &str) -> ! {
    eprintln!("Error: {}", message);
    process::exit(1);
}

/// Whether an error chain carries a store conflict or a database failure.
/// Such errors are reported as internal errors (exit code 2); an empty row
/// is a missing resource and stays a user error.
pub fn is_internal(err: &anyhow::Error) -> bool {
    err.chain().any(|cause| {
        if let Some(store_err) = cause.downcast_ref::<StoreError>() {
            return store_err.code() != ErrorCode::EmptyRow;
        }
        cause.downcast_ref::<rusqlite::Error>().is_some()
    })
}

/// Validate that a string is not empty
pub fn validate_non_empty(value: &str, field_name: &str) -> Result<(), String> {
    if value.trim().is_empty() {
        Err(format!("{} cannot be empty", field_name))
    } else {
        Ok(())
    }
}

/// Validate a project resource id (letters, numbers, hyphens, underscores)
pub fn validate_resource_id(resource_id: &str) -> Result<(), String> {
    if resource_id.trim().is_empty() {
        return Err("Resource id cannot be empty".to_string());
    }

    if resource_id.chars().all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_') {
        Ok(())
    } else {
        Err(format!(
            "Invalid resource id: '{}'. Resource ids can only contain letters, numbers, hyphens, and underscores.",
            resource_id
        ))
    }
}
