use crate::error::{Result, ServiceError};
use parking_lot::{Condvar, Mutex};
use tracing::debug;

#[derive(Debug, Clone, PartialEq)]
enum Slot {
    Unset,
    Set,
    Closed(String),
}

/// Set-once latch the main path parks on until a stop is requested.
///
/// Setting is idempotent and the latch is never reset. If the notification
/// channel is lost before a stop arrives the latch is closed instead, and the
/// waiter sees an error rather than a stop.
#[derive(Debug)]
pub struct StopSignal {
    slot: Mutex<Slot>,
    released: Condvar,
}

impl StopSignal {
    pub fn new() -> Self {
        Self {
            slot: Mutex::new(Slot::Unset),
            released: Condvar::new(),
        }
    }

    /// Set the latch. Returns true only for the call that actually set it.
    pub fn set(&self) -> bool {
        let mut slot = self.slot.lock();
        if *slot != Slot::Unset {
            return false;
        }
        *slot = Slot::Set;
        self.released.notify_all();
        debug!("Stop signal set");
        true
    }

    /// Release the waiter with a failure; ignored once the latch is set
    pub fn close<S: Into<String>>(&self, reason: S) -> bool {
        let mut slot = self.slot.lock();
        if *slot != Slot::Unset {
            return false;
        }
        *slot = Slot::Closed(reason.into());
        self.released.notify_all();
        true
    }

    pub fn is_set(&self) -> bool {
        *self.slot.lock() == Slot::Set
    }

    /// Block until the latch is set or closed. No timeout.
    pub fn wait(&self) -> Result<()> {
        let mut slot = self.slot.lock();
        while *slot == Slot::Unset {
            self.released.wait(&mut slot);
        }
        match &*slot {
            Slot::Closed(reason) => Err(ServiceError::stop_signal(reason.clone())),
            _ => Ok(()),
        }
    }
}

impl Default for StopSignal {
    fn default() -> Self {
        Self::new()
    }
}
