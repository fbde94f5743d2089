//! Boundary checks for collection names and document ids.

use crate::constants::RESERVED_COLLECTIONS;
use crate::errors::ValidationError;

/// Collections become key segments, so they must be non-empty, free of `:`
/// and distinct from the metadata keys.
pub fn validate_collection(name: &str) -> Result<(), ValidationError> {
    if name.is_empty() {
        return Err(ValidationError::EmptyIdentifier {
            field: "collection",
        });
    }
    if name.contains(':') {
        return Err(ValidationError::InvalidIdentifier {
            field: "collection",
            value: name.to_string(),
            reason: "must not contain ':'".to_string(),
        });
    }
    if RESERVED_COLLECTIONS.contains(&name) {
        return Err(ValidationError::ReservedCollection {
            name: name.to_string(),
        });
    }
    Ok(())
}

pub fn validate_document_id(id: &str) -> Result<(), ValidationError> {
    if id.is_empty() {
        return Err(ValidationError::EmptyIdentifier { field: "id" });
    }
    if id.contains(':') {
        return Err(ValidationError::InvalidIdentifier {
            field: "id",
            value: id.to_string(),
            reason: "must not contain ':'".to_string(),
        });
    }
    Ok(())
}
