//! # Connection states
//!
//! The modem reports connection changes by unsolicited status lines (e.g. `WIFI GOT IP`). Callbacks
//! registered on these lines push the new state into a [LinkStatus]. The state is never queried from
//! the modem.
use core::cell::Cell;
use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
use embassy_sync::blocking_mutex::Mutex;
use embassy_sync::signal::Signal;
use embassy_time::{with_timeout, Duration};

/// Logical services with their own connection state
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Service {
    /// WIFI access point association
    Wifi,
    /// MQTT broker connection
    Mqtt,
    /// Vendor IoT cloud service
    SmartIot,
}

/// Connection state of a single service
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub enum ConnectionState {
    #[default]
    Disconnected,
    /// Connect command was sent, confirmation is pending
    Connecting,
    Connected,
}

/// Connection state which may be awaited
pub struct LinkStatus {
    state: Mutex<CriticalSectionRawMutex, Cell<ConnectionState>>,

    /// Signaled on every state change
    changed: Signal<CriticalSectionRawMutex, ()>,
}

impl Default for LinkStatus {
    fn default() -> Self {
        Self::new()
    }
}

impl LinkStatus {
    pub const fn new() -> Self {
        Self {
            state: Mutex::new(Cell::new(ConnectionState::Disconnected)),
            changed: Signal::new(),
        }
    }

    pub fn get(&self) -> ConnectionState {
        self.state.lock(|state| state.get())
    }

    pub fn is_connected(&self) -> bool {
        self.get() == ConnectionState::Connected
    }

    pub fn set(&self, state: ConnectionState) {
        self.state.lock(|current| current.set(state));
        self.changed.signal(());
    }

    /// Marks a connection attempt, unless already connected
    pub(crate) fn begin(&self) {
        let started = self.state.lock(|state| {
            if state.get() == ConnectionState::Connected {
                return false;
            }

            state.set(ConnectionState::Connecting);
            true
        });

        if started {
            self.changed.signal(());
        }
    }

    /// Waits until connected. Returns false if the deadline passed before.
    ///
    /// Only one task may wait on the same status at a time.
    pub async fn wait_connected(&self, deadline: Duration) -> bool {
        let task = async {
            while !self.is_connected() {
                self.changed.wait().await;
            }
        };

        with_timeout(deadline, task).await.is_ok()
    }
}
