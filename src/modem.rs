//! # Modem context
//!
//! [Modem] owns the serial transmitter, the [Router] and the connection states of all services. The
//! receiving side is fed by a separate reader task, either chunk wise by [Modem::ingest] or by
//! [Modem::run_reader].
//!
//! Commands are sent in two flavors:
//! * [Modem::send_command] transmits a command and pauses for a fixed time without waiting for a response.
//! * [Modem::send_command_and_wait] transmits a command and waits for the first line containing the
//!   given key. The reader task must run concurrently, otherwise the response can't arrive.
use crate::commands::{
    Acknowledged, RestartCommand, RestoreCommand, SntpConfigCommand, WifiModeCommand,
};
use crate::framer::LineFramer;
use crate::http::PostTarget;
use crate::mqtt::MqttSession;
use crate::router::Router;
use crate::status::{ConnectionState, LinkStatus, Service};
use alloc::string::String;
use alloc::sync::Arc;
use alloc::vec;
use alloc::vec::Vec;
use atat::AtatCmd;
use core::cell::RefCell;
use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
use embassy_sync::blocking_mutex::Mutex as BlockingMutex;
use embassy_sync::mutex::Mutex;
use embassy_time::{with_timeout, Duration, Timer};
use embedded_io::Error as _;
use embedded_io::ErrorKind;
use embedded_io_async::{Read, Write};

/// Command failures
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Error {
    /// No line containing the match key arrived in time, or the pending request got superseded
    Timeout,

    /// Writing to the serial transmitter failed
    Transmit(ErrorKind),
}

/// Timing configuration
#[derive(Clone, Debug)]
pub struct Config {
    /// Time for the access point to assign an IP, per join attempt
    pub join_deadline: Duration,

    /// Total number of join attempts. The modem gets reset between two attempts.
    pub join_attempts: u8,

    /// Time for the broker to confirm the connection, per connect attempt
    pub mqtt_deadline: Duration,

    /// Total number of broker connect attempts
    pub mqtt_attempts: u8,

    /// Pause after commands whose acknowledgement is not awaited
    pub command_delay: Duration,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            join_deadline: Duration::from_millis(3_500),
            join_attempts: 3,
            mqtt_deadline: Duration::from_millis(3_500),
            mqtt_attempts: 3,
            command_delay: Duration::from_millis(1_000),
        }
    }
}

/// ESP-AT modem driver context
pub struct Modem<W: Write> {
    /// Serial transmitter
    serial: Mutex<CriticalSectionRawMutex, W>,

    /// Framing state of the receiving side
    framer: BlockingMutex<CriticalSectionRawMutex, RefCell<LineFramer>>,

    /// Line handlers
    pub(crate) router: Router,

    pub(crate) config: Config,

    /// WIFI connection state. Gets updated by status lines.
    pub(crate) wifi: Arc<LinkStatus>,

    /// MQTT connection state and subscriptions
    pub(crate) mqtt: Arc<MqttSession>,

    /// Vendor IoT service state. Not driven by the modem, callers set it through [Modem::link].
    smart_iot: Arc<LinkStatus>,

    /// HTTP POST destination
    pub(crate) http: BlockingMutex<CriticalSectionRawMutex, RefCell<PostTarget>>,
}

impl<W: Write> Modem<W> {
    pub fn new(serial: W) -> Self {
        Self::with_config(serial, Config::default())
    }

    pub fn with_config(serial: W, config: Config) -> Self {
        Self {
            serial: Mutex::new(serial),
            framer: BlockingMutex::new(RefCell::new(LineFramer::new())),
            router: Router::new(),
            config,
            wifi: Arc::new(LinkStatus::new()),
            mqtt: Arc::new(MqttSession::new()),
            smart_iot: Arc::new(LinkStatus::new()),
            http: BlockingMutex::new(RefCell::new(PostTarget::default())),
        }
    }

    /// Line handlers of this modem
    pub fn router(&self) -> &Router {
        &self.router
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Passes received serial data to the framer and routes all completed lines
    pub fn ingest(&self, data: &[u8]) {
        let lines = self.framer.lock(|framer| framer.borrow_mut().push(data));

        for line in lines {
            log::trace!("<- {}", line);
            self.router.deliver(&line);
        }
    }

    /// Reads from the serial receiver until EOF and routes all lines
    pub async fn run_reader<R: Read>(&self, serial: &mut R) -> Result<(), R::Error> {
        let mut buffer = [0x0; 64];

        loop {
            let length = serial.read(&mut buffer).await?;
            if length == 0 {
                log::debug!("Serial receiver reached EOF");
                return Ok(());
            }

            self.ingest(&buffer[..length]);
        }
    }

    /// Installs a persistent callback for all lines containing `key`
    pub fn on_match<F>(&self, key: &str, callback: F)
    where
        F: Fn(&str) + Send + Sync + 'static,
    {
        self.router.register(key, callback);
    }

    /// Removes the handler of the given key
    pub fn unregister(&self, key: &str) {
        self.router.remove(key);
    }

    /// Sends the command terminated by CR+LF and pauses for the given time
    pub async fn send_command(&self, command: &str, post_delay: Duration) -> Result<(), Error> {
        self.transmit(&terminate(command)).await?;
        Timer::after(post_delay).await;
        Ok(())
    }

    /// Sends the command terminated by CR+LF and returns the first line containing `key`.
    ///
    /// Returns [Error::Timeout] if no such line arrived within `timeout` or if another request
    /// registered the same key meanwhile. The handler for `key` is removed in any case.
    pub async fn send_command_and_wait(&self, command: &str, key: &str, timeout: Duration) -> Result<String, Error> {
        self.exchange(&terminate(command), key, timeout).await
    }

    /// Connection state of the given service
    pub fn status(&self, service: Service) -> ConnectionState {
        self.link(service).get()
    }

    pub fn is_connected(&self, service: Service) -> bool {
        self.link(service).is_connected()
    }

    /// Connection state handle of the given service
    pub fn link(&self, service: Service) -> &LinkStatus {
        match service {
            Service::Wifi => &self.wifi,
            Service::Mqtt => &self.mqtt.status,
            Service::SmartIot => &self.smart_iot,
        }
    }

    /// Re-initializes the driver state and resets the modem.
    ///
    /// Drops any partial line, removes all line handlers (pending requests time out) and marks all
    /// services as disconnected. MQTT subscriptions and message handlers are kept.
    pub async fn init(&self) {
        self.framer.lock(|framer| framer.borrow_mut().clear());
        self.router.clear();

        for service in [Service::Wifi, Service::Mqtt, Service::SmartIot] {
            self.link(service).set(ConnectionState::Disconnected);
        }

        self.reset().await;
    }

    /// Restores factory settings, restarts the modem, enables station mode and configures SNTP.
    ///
    /// Failed steps are logged, the sequence continues in any case.
    pub async fn reset(&self) {
        log::debug!("Resetting modem");

        log_failure("restore", self.request(&RestoreCommand).await);
        log_failure("restart", self.request(&RestartCommand).await);

        if self.request(&WifiModeCommand::station_mode()).await.is_err() {
            log_failure("station mode", self.request(&WifiModeCommand::station_mode()).await);
        }

        log_failure("SNTP configuration", self.request(&SntpConfigCommand::default()).await);
    }

    /// Sends the command and waits for its acknowledgement, using the command timeout
    pub(crate) async fn request<Cmd: AtatCmd + Acknowledged>(&self, command: &Cmd) -> Result<String, Error> {
        let timeout = Duration::from_millis(Cmd::MAX_TIMEOUT_MS as u64);
        self.exchange(&encode(command), Cmd::ACK, timeout).await
    }

    /// Sends the command and pauses for the given time
    pub(crate) async fn command<Cmd: AtatCmd>(&self, command: &Cmd, post_delay: Duration) -> Result<(), Error> {
        self.transmit(&encode(command)).await?;
        Timer::after(post_delay).await;
        Ok(())
    }

    async fn exchange(&self, data: &[u8], key: &str, timeout: Duration) -> Result<String, Error> {
        let waiter = self.router.register_waiter(key);
        self.transmit(data).await?;

        match with_timeout(timeout, waiter.wait()).await {
            Ok(Some(line)) => Ok(line),
            Ok(None) => {
                log::warn!("Request waiting for {:?} got superseded", key);
                Err(Error::Timeout)
            }
            Err(_) => {
                log::warn!("No response containing {:?} within {} ms", key, timeout.as_millis());
                Err(Error::Timeout)
            }
        }
    }

    async fn transmit(&self, data: &[u8]) -> Result<(), Error> {
        if let Ok(text) = core::str::from_utf8(data) {
            log::trace!("-> {}", text.trim_end());
        }

        let mut serial = self.serial.lock().await;
        serial.write_all(data).await.map_err(|e| Error::Transmit(e.kind()))?;
        serial.flush().await.map_err(|e| Error::Transmit(e.kind()))
    }
}

fn log_failure<T>(step: &str, result: Result<T, Error>) {
    if let Err(error) = result {
        log::warn!("Modem reset step '{}' failed: {:?}", step, error);
    }
}

/// Appends the CR+LF terminator
fn terminate(command: &str) -> Vec<u8> {
    let mut data = Vec::with_capacity(command.len() + 2);
    data.extend_from_slice(command.as_bytes());
    data.extend_from_slice(b"\r\n");
    data
}

/// Encodes the AT command including its terminator
fn encode<Cmd: AtatCmd>(command: &Cmd) -> Vec<u8> {
    let mut buffer = vec![0x0; Cmd::MAX_LEN];
    let length = command.write(&mut buffer);
    buffer.truncate(length);
    buffer
}
