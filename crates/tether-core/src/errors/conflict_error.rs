/// Conflict lifecycle errors.
#[derive(Debug, thiserror::Error)]
pub enum ConflictError {
    #[error("{count} unresolved conflict(s) block sync completion")]
    Unresolved { count: usize },

    #[error("no open conflict for {collection}/{id}")]
    NotFound { collection: String, id: String },

    #[error("merge for {collection}/{id} has no choice for fields {missing:?}")]
    IncompleteMerge {
        collection: String,
        id: String,
        missing: Vec<String>,
    },
}
