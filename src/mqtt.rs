//! # MQTT client
//!
//! Uses the MQTT client of the ESP-AT firmware on link 0. Subscriptions are recorded independently of
//! the connection state and get re-issued on every successful [Modem::mqtt_connect]. Received messages
//! are dispatched to the handler registered for their topic, s. [Modem::on_mqtt_message].
use crate::commands::{
    bounded, MqttCleanCommand, MqttConnectCommand, MqttPublishCommand, MqttSubscribeCommand, MqttUserConfigCommand,
};
use crate::modem::{Error, Modem};
use crate::status::{ConnectionState, LinkStatus};
use alloc::collections::BTreeMap;
use alloc::string::String;
use alloc::sync::Arc;
use alloc::vec::Vec;
use core::cell::RefCell;
use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
use embassy_sync::blocking_mutex::Mutex;
use embassy_time::Duration;
use embedded_io_async::Write;

/// Status line signaling an established broker connection
const CONNECTED: &str = "+MQTTCONNECTED";

/// Status line signaling a lost broker connection
const DISCONNECTED: &str = "+MQTTDISCONNECTED";

/// Prefix of received publish messages
const RECEIVED: &str = "MQTTSUBRECV";

/// Quality of service level
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Qos {
    AtMostOnce = 0,
    AtLeastOnce = 1,
    ExactlyOnce = 2,
}

/// Transport scheme of the broker connection
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Scheme {
    /// MQTT over TCP
    Tcp = 1,
    /// MQTT over TLS, no certificate verification
    Tls = 2,
    /// MQTT over WebSocket
    WebSocket = 6,
    /// MQTT over WebSocket secure, no certificate verification
    WebSocketTls = 7,
}

/// Errors of MQTT commands
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum MqttError {
    /// Client ID is longer then 128 chars
    InvalidClientIdLength,

    /// Username is longer then 64 chars
    InvalidUsernameLength,

    /// Password is longer then 64 chars
    InvalidPasswordLength,

    /// Resource path is longer then 32 chars
    InvalidPathLength,

    /// Broker host is longer then 128 chars
    InvalidHostLength,

    /// Topic is longer then 128 chars
    InvalidTopicLength,

    /// Message is longer then 256 chars
    InvalidMessageLength,

    /// Sending the command failed
    CommandError(Error),
}

impl From<Error> for MqttError {
    fn from(error: Error) -> Self {
        MqttError::CommandError(error)
    }
}

/// Handler of received messages
pub trait MessageHandler: Send + Sync {
    fn handle(&self, topic: &str, message: &str);
}

impl<F: Fn(&str, &str) + Send + Sync> MessageHandler for F {
    fn handle(&self, topic: &str, message: &str) {
        self(topic, message)
    }
}

/// Received publish message
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct Publish<'a> {
    pub topic: &'a str,
    pub message: &'a str,
}

/// Parses a publish notification, e.g. `+MQTTSUBRECV:0,"t/1",5,"hello"`.
///
/// The line is split into at most four fields, so the message may contain commas. Returns None if
/// the line has less fields.
pub fn parse_publish(line: &str) -> Option<Publish<'_>> {
    let fields: heapless::Vec<&str, 4> = line.splitn(4, ',').collect();
    if fields.len() < 4 {
        return None;
    }

    Some(Publish {
        topic: unquote(fields[1]),
        message: unquote(fields[3].trim_end_matches('\r')),
    })
}

/// Strips a single pair of surrounding quotes
fn unquote(value: &str) -> &str {
    value
        .strip_prefix('"')
        .and_then(|inner| inner.strip_suffix('"'))
        .unwrap_or(value)
}

/// Connection state, subscriptions and message handlers
pub(crate) struct MqttSession {
    pub(crate) status: LinkStatus,

    /// Topic => QoS of all subscriptions
    subscriptions: Mutex<CriticalSectionRawMutex, RefCell<BTreeMap<String, Qos>>>,

    /// Topic => message handler
    handlers: Mutex<CriticalSectionRawMutex, RefCell<BTreeMap<String, Arc<dyn MessageHandler>>>>,
}

impl MqttSession {
    pub(crate) fn new() -> Self {
        Self {
            status: LinkStatus::new(),
            subscriptions: Mutex::new(RefCell::new(BTreeMap::new())),
            handlers: Mutex::new(RefCell::new(BTreeMap::new())),
        }
    }

    /// Routes a publish notification to the handler of its topic
    fn dispatch(&self, line: &str) {
        let Some(publish) = parse_publish(line) else {
            log::debug!("Ignoring malformed MQTT message {:?}", line);
            return;
        };

        let handler = self.handlers.lock(|handlers| handlers.borrow().get(publish.topic).cloned());
        match handler {
            Some(handler) => handler.handle(publish.topic, publish.message),
            None => log::debug!("No handler for MQTT topic {:?}", publish.topic),
        }
    }

    fn subscriptions(&self) -> Vec<(String, Qos)> {
        self.subscriptions.lock(|subscriptions| {
            subscriptions
                .borrow()
                .iter()
                .map(|(topic, qos)| (topic.clone(), *qos))
                .collect()
        })
    }
}

impl<W: Write> Modem<W> {
    /// Sets client ID, credentials and transport scheme for the broker connection
    pub async fn mqtt_configure(
        &self,
        scheme: Scheme,
        client_id: &str,
        username: &str,
        password: &str,
        path: &str,
    ) -> Result<(), MqttError> {
        let command = MqttUserConfigCommand::new(
            scheme as u8,
            bounded(client_id, MqttError::InvalidClientIdLength)?,
            bounded(username, MqttError::InvalidUsernameLength)?,
            bounded(password, MqttError::InvalidPasswordLength)?,
            bounded(path, MqttError::InvalidPathLength)?,
        );

        self.command(&command, self.config.command_delay).await?;
        Ok(())
    }

    /// Connects to the broker and re-issues all subscriptions.
    ///
    /// If the broker does not confirm the connection within the deadline, the link gets cleaned and
    /// the connect is repeated, up to the configured number of attempts. The outcome is reported by
    /// [Modem::mqtt_connected]. Transmit failures count as failed attempts and are only logged, the
    /// only errors are invalid arguments.
    pub async fn mqtt_connect(&self, host: &str, port: u16, reconnect: bool) -> Result<(), MqttError> {
        let command = MqttConnectCommand::new(bounded(host, MqttError::InvalidHostLength)?, port, reconnect);

        self.watch_mqtt();
        let mut attempts = self.config.mqtt_attempts.max(1);

        loop {
            log::debug!("Connecting to MQTT broker {}:{}", host, port);
            self.mqtt.status.begin();

            if let Err(error) = self.command(&command, Duration::from_ticks(0)).await {
                log::warn!("Sending MQTT connect command failed: {:?}", error);
            }

            if self.mqtt.status.wait_connected(self.config.mqtt_deadline).await {
                log::info!("Connected to MQTT broker {}:{}", host, port);
                break;
            }

            attempts -= 1;
            if attempts == 0 {
                log::warn!("MQTT broker {} did not confirm connection, giving up", host);
                self.mqtt.status.set(ConnectionState::Disconnected);
                return Ok(());
            }

            log::warn!("MQTT broker {} did not confirm connection ({} attempts left)", host, attempts);
            if let Err(error) = self.command(&MqttCleanCommand::default(), self.config.command_delay).await {
                log::warn!("Sending MQTT clean command failed: {:?}", error);
            }
        }

        for (topic, qos) in self.mqtt.subscriptions() {
            if let Err(error) = self.send_subscription(&topic, qos).await {
                log::warn!("Resubscribing MQTT topic {:?} failed: {:?}", topic, error);
            }
        }

        Ok(())
    }

    /// Subscribes the topic. Sent immediately if connected, otherwise on the next connect.
    pub async fn mqtt_subscribe(&self, topic: &str, qos: Qos) -> Result<(), MqttError> {
        if topic.len() > 128 {
            return Err(MqttError::InvalidTopicLength);
        }

        self.mqtt
            .subscriptions
            .lock(|subscriptions| subscriptions.borrow_mut().insert(topic.into(), qos));

        if self.mqtt_connected() {
            self.send_subscription(topic, qos).await?;
        }

        Ok(())
    }

    /// Installs the handler for messages received on the given topic. Replaces a previous handler.
    pub fn on_mqtt_message<H: MessageHandler + 'static>(&self, topic: &str, handler: H) {
        self.mqtt
            .handlers
            .lock(|handlers| handlers.borrow_mut().insert(topic.into(), Arc::new(handler)));
    }

    /// Publishes a string message
    pub async fn mqtt_publish(&self, topic: &str, message: &str, qos: Qos, retain: bool) -> Result<(), MqttError> {
        let command = MqttPublishCommand::new(
            bounded(topic, MqttError::InvalidTopicLength)?,
            bounded(message, MqttError::InvalidMessageLength)?,
            qos as u8,
            retain,
        );

        self.command(&command, self.config.command_delay).await?;
        Ok(())
    }

    /// True if the broker confirmed the connection and it was not lost since
    pub fn mqtt_connected(&self) -> bool {
        self.mqtt.status.is_connected()
    }

    async fn send_subscription(&self, topic: &str, qos: Qos) -> Result<(), MqttError> {
        let command = MqttSubscribeCommand::new(bounded(topic, MqttError::InvalidTopicLength)?, qos as u8);
        self.command(&command, self.config.command_delay).await?;
        Ok(())
    }

    /// Registers the callbacks following broker status lines and received messages
    fn watch_mqtt(&self) {
        let session = self.mqtt.clone();
        self.router.register(CONNECTED, move |_| {
            log::debug!("MQTT connected");
            session.status.set(ConnectionState::Connected);
        });

        let session = self.mqtt.clone();
        self.router.register(DISCONNECTED, move |_| {
            log::debug!("MQTT disconnected");
            session.status.set(ConnectionState::Disconnected);
        });

        let session = self.mqtt.clone();
        self.router.register(RECEIVED, move |line| session.dispatch(line));
    }
}
