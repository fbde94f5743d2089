// Single source of truth for all default values.

// --- Sync ---
pub const DEFAULT_API_BASE_URL: &str = "";
pub const DEFAULT_AUTO_SYNC_INTERVAL_MS: u64 = 30_000;
pub const DEFAULT_REQUEST_TIMEOUT_MS: u64 = 15_000;
pub const DEFAULT_MAX_RETRIES: u32 = 3;
pub const DEFAULT_ID_FIELD: &str = "id";

// --- Cache ---
pub const DEFAULT_CACHE_EXPIRY_HOURS: u64 = 24;
pub const DEFAULT_MAX_CACHE_SIZE: usize = 1_000;

// --- Storage ---
pub const DEFAULT_DB_FILENAME: &str = "tether.db";
pub const DEFAULT_KEY_PREFIX: &str = "tether";

// --- Observability ---
pub const DEFAULT_LOG_LEVEL: &str = "info";
pub const DEFAULT_JSON_LOGS: bool = false;
