//! Capabilities injected into the engine. Each has a production
//! implementation and a deterministic one for tests.

pub mod clock;
pub mod key_value_store;
pub mod notifier;

pub use clock::{Clock, ManualClock, SystemClock};
pub use key_value_store::{KeyValueStore, KvWrite};
pub use notifier::{Connectivity, ConnectivityNotifier, WatchNotifier};
