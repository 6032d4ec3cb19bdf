//! Example that runs on Linux using a serial-USB-adapter.
//!
//! Joins a WIFI network, connects to an MQTT broker and echoes all messages received on `esp/in`
//! to `esp/out`.
use std::io::Read;
use std::{env, io, thread, time::Duration as StdDuration};

use embassy_futures::block_on;
use embassy_time::{Duration, Timer};
use esp_at_router::{
    modem::Modem,
    mqtt::{Qos, Scheme},
    wifi::WifiAdapter,
};
use serialport::{DataBits, FlowControl, Parity, SerialPort, StopBits};
use std::sync::mpsc;

fn main() {
    env_logger::init();

    // Parse args
    let args: Vec<String> = env::args().collect();
    if args.len() != 6 {
        println!("Usage: {} <path-to-serial> <baudrate> <ssid> <psk> <broker>", args[0]);
        println!("Example: {} /dev/ttyUSB0 115200 mywifi hellopasswd123 test.mosquitto.org", args[0]);
        println!("\nNote: To run the example with debug logging, run it like this:");
        println!("\n  RUST_LOG=trace cargo run --example linux -- /dev/ttyUSB0 115200 mywifi hellopasswd123 test.mosquitto.org");
        std::process::exit(1);
    }
    let dev = &args[1];
    let baud_rate: u32 = args[2].parse().expect("Invalid baud rate");
    let ssid = &args[3];
    let psk = &args[4];
    let broker = &args[5];

    println!("Starting (dev={}, baud={:?})...", dev, baud_rate);

    // Open serial port
    let serial_tx = serialport::new(dev, baud_rate)
        .data_bits(DataBits::Eight)
        .flow_control(FlowControl::None)
        .parity(Parity::None)
        .stop_bits(StopBits::One)
        .timeout(StdDuration::from_millis(500))
        .open()
        .expect("Could not open serial port");
    let mut serial_rx = serial_tx.try_clone().expect("Could not clone serial port");

    // Flush serial RX buffer, to ensure that there isn't any remaining left
    // form previous sessions.
    flush_serial(&mut serial_rx);

    let modem: &'static Modem<serial::Transmitter> = Box::leak(Box::new(Modem::new(serial::Transmitter::new(serial_tx))));

    // Launch reading thread, to pass incoming data from serial to the modem
    thread::Builder::new()
        .name("serial_read".to_string())
        .spawn(move || loop {
            let mut buffer = [0; 32];
            match serial_rx.read(&mut buffer[..]) {
                Ok(0) => {}
                Ok(bytes_read) => modem.ingest(&buffer[0..bytes_read]),
                Err(e) => match e.kind() {
                    io::ErrorKind::WouldBlock | io::ErrorKind::TimedOut | io::ErrorKind::Interrupted => {
                        // Ignore
                    }
                    _ => {
                        log::error!("Serial reading thread error while reading: {}", e);
                    }
                },
            }
        })
        .expect("Could not spawn reading thread");

    // Received messages are forwarded to the main task
    let (sender, receiver) = mpsc::channel::<String>();
    let sender = std::sync::Mutex::new(sender);
    modem.on_mqtt_message("esp/in", move |_topic: &str, message: &str| {
        let _ = sender.lock().map(|sender| sender.send(message.to_string()));
    });

    block_on(async {
        println!("Resetting modem...");
        modem.init().await;

        println!("Join WiFi \"{}\"...", ssid);
        modem.join(ssid, psk).await.expect("Invalid WIFI credentials");
        if !modem.is_joined() {
            panic!("Could not join WIFI \"{}\"", ssid);
        }

        println!("Connecting to {}...", broker);
        modem
            .mqtt_configure(Scheme::Tcp, "esp-at-router", "", "", "")
            .await
            .expect("MQTT configuration failed");
        modem.mqtt_subscribe("esp/in", Qos::AtLeastOnce).await.expect("Invalid topic");
        modem.mqtt_connect(broker, 1883, true).await.expect("Invalid broker host");
        if !modem.mqtt_connected() {
            panic!("Could not connect to {}", broker);
        }
        println!("Connected! Publish to esp/in for an echo on esp/out.");

        loop {
            while let Ok(message) = receiver.try_recv() {
                println!("Received: {}", message);
                if let Err(e) = modem.mqtt_publish("esp/out", &message, Qos::AtMostOnce, false).await {
                    log::error!("Echo failed: {:?}", e);
                }
            }

            Timer::after(Duration::from_millis(100)).await;
        }
    });
}

/// Flush the serial port receive buffer.
fn flush_serial(serial_rx: &mut Box<dyn SerialPort>) {
    let mut buf = [0; 32];
    loop {
        match serial_rx.read(&mut buf[..]) {
            Ok(0) => break,
            Err(e) if e.kind() == io::ErrorKind::WouldBlock || e.kind() == io::ErrorKind::TimedOut => break,
            Ok(_) => continue,
            Err(e) => panic!("Error while flushing serial: {}", e),
        }
    }
}

mod serial {
    use embedded_io::{ErrorKind, ErrorType};
    use serialport::SerialPort;
    use std::io::Write;

    /// Serial error, just carrying the IO error kind
    #[derive(Debug)]
    pub struct Error(std::io::ErrorKind);

    impl embedded_io::Error for Error {
        fn kind(&self) -> ErrorKind {
            match self.0 {
                std::io::ErrorKind::TimedOut => ErrorKind::TimedOut,
                std::io::ErrorKind::Interrupted => ErrorKind::Interrupted,
                std::io::ErrorKind::BrokenPipe => ErrorKind::BrokenPipe,
                _ => ErrorKind::Other,
            }
        }
    }

    /// Blocking serial port exposed as async transmitter
    pub struct Transmitter {
        port: Box<dyn SerialPort>,
    }

    impl Transmitter {
        pub fn new(port: Box<dyn SerialPort>) -> Self {
            Self { port }
        }
    }

    impl ErrorType for Transmitter {
        type Error = Error;
    }

    impl embedded_io_async::Write for Transmitter {
        async fn write(&mut self, buf: &[u8]) -> Result<usize, Error> {
            self.port.write(buf).map_err(|e| Error(e.kind()))
        }

        async fn flush(&mut self) -> Result<(), Error> {
            self.port.flush().map_err(|e| Error(e.kind()))
        }
    }
}
