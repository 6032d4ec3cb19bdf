use atat::atat_derive::{AtatCmd, AtatResp};
use atat::heapless::String;
use core::str::FromStr;

/// Commands which gets just responded by OK
#[derive(Clone, AtatResp)]
pub struct NoResponse;

/// Trait for commands awaited by a response line
pub trait Acknowledged {
    /// Substring of the line confirming the command
    const ACK: &'static str;
}

/// Converts the given value to a bounded string, mapping capacity overflows to the given error
pub(crate) fn bounded<const N: usize, E>(value: &str, error: E) -> Result<String<N>, E> {
    String::from_str(value).map_err(|_| error)
}

/// Restores the factory settings and restarts the module
#[derive(Clone, Default, AtatCmd)]
#[at_cmd("+RESTORE", NoResponse, timeout_ms = 2_000)]
pub struct RestoreCommand;

impl Acknowledged for RestoreCommand {
    const ACK: &'static str = "ready";
}

/// Restarts the module
#[derive(Clone, Default, AtatCmd)]
#[at_cmd("+RST", NoResponse, timeout_ms = 2_000)]
pub struct RestartCommand;

impl Acknowledged for RestartCommand {
    const ACK: &'static str = "ready";
}

/// Sets the WIFI mode
#[derive(Clone, Default, AtatCmd)]
#[at_cmd("+CWMODE", NoResponse, timeout_ms = 1_000)]
pub struct WifiModeCommand {
    /// WIFI mode:
    ///     0: Null mode. Wi-Fi RF will be disabled.
    ///     1: Station mode.
    ///     2: SoftAP mode.
    ///     3: SoftAP+Station mode.
    #[at_arg(position = 0)]
    mode: u8,
}

impl WifiModeCommand {
    pub fn station_mode() -> Self {
        Self { mode: 1 }
    }
}

impl Acknowledged for WifiModeCommand {
    const ACK: &'static str = "OK";
}

/// Configures the SNTP time synchronization
#[derive(Clone, AtatCmd)]
#[at_cmd("+CIPSNTPCFG", NoResponse, timeout_ms = 3_000)]
pub struct SntpConfigCommand {
    /// 1: Enable SNTP
    enable: u8,

    /// UTC offset in hours
    timezone: i8,

    first_server: String<32>,
    second_server: String<32>,
    third_server: String<32>,
}

impl Default for SntpConfigCommand {
    fn default() -> Self {
        Self {
            enable: 1,
            timezone: 8,
            first_server: String::from_str("ntp1.aliyun.com").unwrap_or_default(),
            second_server: String::from_str("0.pool.ntp.org").unwrap_or_default(),
            third_server: String::from_str("time.google.com").unwrap_or_default(),
        }
    }
}

impl Acknowledged for SntpConfigCommand {
    /// The modem echoes the command before confirming it
    const ACK: &'static str = "AT+CIPSNTPCFG";
}

/// Command for setting the target WIFI access point parameters
#[derive(Clone, Default, AtatCmd)]
#[at_cmd("+CWJAP", NoResponse, timeout_ms = 5_000)]
pub struct AccessPointConnectCommand {
    /// The SSID of the target access point
    #[at_arg(position = 0)]
    ssid: String<32>,

    /// The password/key of the target access point
    #[at_arg(position = 1)]
    password: String<64>,
}

impl AccessPointConnectCommand {
    pub fn new(ssid: String<32>, password: String<64>) -> Self {
        Self { ssid, password }
    }
}

/// Sets the MQTT user configuration of link 0
#[derive(Clone, AtatCmd)]
#[at_cmd("+MQTTUSERCFG", NoResponse, timeout_ms = 1_000)]
pub struct MqttUserConfigCommand {
    link_id: u8,

    /// Transport scheme, s. [crate::mqtt::Scheme]
    scheme: u8,

    client_id: String<128>,
    username: String<64>,
    password: String<64>,

    /// Certificate ID, unused
    cert_key_id: u8,

    /// CA ID, unused
    ca_id: u8,

    /// Resource path, only used for websocket schemes
    path: String<32>,
}

impl MqttUserConfigCommand {
    pub fn new(
        scheme: u8,
        client_id: String<128>,
        username: String<64>,
        password: String<64>,
        path: String<32>,
    ) -> Self {
        Self {
            link_id: 0,
            scheme,
            client_id,
            username,
            password,
            cert_key_id: 0,
            ca_id: 0,
            path,
        }
    }
}

/// Connects link 0 to the MQTT broker
#[derive(Clone, AtatCmd)]
#[at_cmd("+MQTTCONN", NoResponse, timeout_ms = 5_000)]
pub struct MqttConnectCommand {
    link_id: u8,
    host: String<128>,
    port: u16,

    /// 0: No automatic reconnect, 1: ESP-AT reconnects automatically
    reconnect: u8,
}

impl MqttConnectCommand {
    pub fn new(host: String<128>, port: u16, reconnect: bool) -> Self {
        Self {
            link_id: 0,
            host,
            port,
            reconnect: reconnect as u8,
        }
    }
}

/// Subscribes a topic on link 0
#[derive(Clone, AtatCmd)]
#[at_cmd("+MQTTSUB", NoResponse, timeout_ms = 1_000)]
pub struct MqttSubscribeCommand {
    link_id: u8,
    topic: String<128>,
    qos: u8,
}

impl MqttSubscribeCommand {
    pub fn new(topic: String<128>, qos: u8) -> Self {
        Self { link_id: 0, topic, qos }
    }
}

/// Publishes a string message on link 0
#[derive(Clone, AtatCmd)]
#[at_cmd("+MQTTPUB", NoResponse, timeout_ms = 1_000)]
pub struct MqttPublishCommand {
    link_id: u8,
    topic: String<128>,
    data: String<256>,
    qos: u8,
    retain: u8,
}

impl MqttPublishCommand {
    pub fn new(topic: String<128>, data: String<256>, qos: u8, retain: bool) -> Self {
        Self {
            link_id: 0,
            topic,
            data,
            qos,
            retain: retain as u8,
        }
    }
}

/// Closes link 0 and releases its resources
#[derive(Clone, Default, AtatCmd)]
#[at_cmd("+MQTTCLEAN", NoResponse, timeout_ms = 1_000)]
pub struct MqttCleanCommand {
    link_id: u8,
}
