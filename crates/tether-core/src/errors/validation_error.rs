/// Input rejected before it reaches the Local Store or the Operation Log.
#[derive(Debug, thiserror::Error)]
pub enum ValidationError {
    #[error("{field} must not be empty")]
    EmptyIdentifier { field: &'static str },

    #[error("invalid {field} '{value}': {reason}")]
    InvalidIdentifier {
        field: &'static str,
        value: String,
        reason: String,
    },

    #[error("collection name '{name}' is reserved")]
    ReservedCollection { name: String },

    #[error("payload for {collection}/{id} must be a JSON object")]
    PayloadNotObject { collection: String, id: String },

    #[error("payload field '{field}' is missing or not a string")]
    MissingIdField { field: String },

    #[error("serialization failed: {reason}")]
    Serialization { reason: String },

    #[error("invalid timestamp '{value}': {reason}")]
    InvalidTimestamp { value: String, reason: String },
}
