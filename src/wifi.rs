//! # WIFI access point client
//!
//! Joining a network is supervised: if no IP gets assigned within the join deadline, the modem is
//! reset and the join is repeated, up to the configured number of attempts. Success or failure is
//! not returned, but reflected by the connection state, s. [WifiAdapter::is_joined].
//!
//! The state is pushed by the status lines `WIFI GOT IP` and `WIFI DISCONNECT`, so it also follows
//! connection losses after the join.
use crate::commands::{bounded, AccessPointConnectCommand};
use crate::modem::Modem;
use crate::status::{ConnectionState, LinkStatus};
use alloc::sync::Arc;
use core::fmt::Debug;
use embassy_time::Duration;
use embedded_io_async::Write;

/// Status line signaling a lost connection
const DISCONNECTED: &str = "WIFI DISCONNECT";

/// Status line signaling an assigned IP
const GOT_IP: &str = "WIFI GOT IP";

/// Wifi network adapter trait
pub trait WifiAdapter {
    /// Error when joining a WIFI network
    type JoinError: Debug;

    /// Connects to an WIFI access point. The outcome is reported by [WifiAdapter::join_state].
    fn join(&self, ssid: &str, key: &str) -> impl core::future::Future<Output = Result<(), Self::JoinError>>;

    /// Returns the current WIFI connection state
    fn join_state(&self) -> ConnectionState;

    /// True if an IP was assigned and the connection was not lost since
    fn is_joined(&self) -> bool {
        self.join_state() == ConnectionState::Connected
    }
}

/// Possible errors when joining an access point
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum JoinError {
    /// Given SSD is longer then the max. size of 32 chars
    InvalidSSIDLength,

    /// Given password is longer then the max. size of 63 chars
    InvalidPasswordLength,
}

impl<W: Write> WifiAdapter for Modem<W> {
    type JoinError = JoinError;

    async fn join(&self, ssid: &str, key: &str) -> Result<(), JoinError> {
        if key.len() > 63 {
            return Err(JoinError::InvalidPasswordLength);
        }

        let command = AccessPointConnectCommand::new(
            bounded(ssid, JoinError::InvalidSSIDLength)?,
            bounded(key, JoinError::InvalidPasswordLength)?,
        );

        self.watch_wifi();
        let mut attempts = self.config.join_attempts.max(1);

        loop {
            log::debug!("Joining access point {:?}", ssid);
            self.wifi.begin();

            if let Err(error) = self.command(&command, Duration::from_ticks(0)).await {
                log::warn!("Sending join command failed: {:?}", error);
            }

            if self.wifi.wait_connected(self.config.join_deadline).await {
                log::info!("Joined access point {:?}", ssid);
                return Ok(());
            }

            attempts -= 1;
            if attempts == 0 {
                log::warn!("No IP assigned by {:?}, giving up", ssid);
                self.wifi.set(ConnectionState::Disconnected);
                return Ok(());
            }

            log::warn!("No IP assigned by {:?}, resetting modem ({} attempts left)", ssid, attempts);
            self.reset().await;
        }
    }

    fn join_state(&self) -> ConnectionState {
        self.wifi.get()
    }
}

impl<W: Write> Modem<W> {
    /// Registers the callbacks following the WIFI status lines
    fn watch_wifi(&self) {
        let status: Arc<LinkStatus> = self.wifi.clone();
        self.router.register(DISCONNECTED, move |_| {
            log::debug!("WIFI disconnected");
            status.set(ConnectionState::Disconnected);
        });

        let status = self.wifi.clone();
        self.router.register(GOT_IP, move |_| {
            log::debug!("WIFI got IP");
            status.set(ConnectionState::Connected);
        });
    }
}
