//! Error handling for Tether.
//! One error enum per subsystem, `thiserror` only, aggregated into [`TetherError`].

pub mod config_error;
pub mod conflict_error;
pub mod remote_error;
pub mod storage_error;
pub mod tether_error;
pub mod validation_error;

pub use config_error::ConfigError;
pub use conflict_error::ConflictError;
pub use remote_error::RemoteError;
pub use storage_error::StorageError;
pub use tether_error::{ErrorKind, TetherError, TetherResult};
pub use validation_error::ValidationError;
