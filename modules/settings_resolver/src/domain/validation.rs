//! Validation of schema paths and provider batches

use crate::contract::{CfgError, Item, PATH_SEPARATOR};

/// Validate one schema key used as a path segment
///
/// Rejects:
/// - empty keys
/// - keys containing the path separator, which would make names ambiguous
pub fn validate_segment(segment: &str, path: &str) -> Result<(), CfgError> {
    if segment.is_empty() {
        return Err(CfgError::schema(path, "path segment cannot be empty"));
    }

    if segment.contains(PATH_SEPARATOR) {
        return Err(CfgError::schema(
            path,
            format!(
                "path segment '{}' must not contain '{}'",
                segment, PATH_SEPARATOR
            ),
        ));
    }

    Ok(())
}

/// Every item in a record-backed batch must carry a correlation code
pub fn validate_item_codes(items: &[Item]) -> Result<(), CfgError> {
    let missing: Vec<&str> = items
        .iter()
        .filter(|item| item.code.as_deref().map_or(true, str::is_empty))
        .map(|item| item.name.as_str())
        .collect();

    if !missing.is_empty() {
        return Err(CfgError::validation(format!(
            "The code field must be set for all config items (missing for: {})",
            missing.join(", ")
        )));
    }

    Ok(())
}
