use serde::{Deserialize, Serialize};
use tokio::sync::watch;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Connectivity {
    Online,
    Offline,
}

impl Connectivity {
    pub fn is_online(self) -> bool {
        self == Self::Online
    }
}

/// Connectivity capability. How changes are detected (polling, OS push) is
/// up to the implementation.
pub trait ConnectivityNotifier: Send + Sync {
    fn current(&self) -> Connectivity;

    /// Receiver that observes every subsequent change.
    fn subscribe(&self) -> watch::Receiver<Connectivity>;
}

/// Notifier fed by the host application from its network callbacks.
#[derive(Debug)]
pub struct WatchNotifier {
    tx: watch::Sender<Connectivity>,
}

impl WatchNotifier {
    pub fn new(initial: Connectivity) -> Self {
        let (tx, _rx) = watch::channel(initial);
        Self { tx }
    }

    /// Publish a new state. Unchanged values do not wake subscribers.
    pub fn set(&self, state: Connectivity) {
        self.tx.send_if_modified(|current| {
            if *current == state {
                false
            } else {
                *current = state;
                true
            }
        });
    }
}

impl ConnectivityNotifier for WatchNotifier {
    fn current(&self) -> Connectivity {
        *self.tx.borrow()
    }

    fn subscribe(&self) -> watch::Receiver<Connectivity> {
        self.tx.subscribe()
    }
}
