//! # HTTP POST
//!
//! Posts a body to a preconfigured destination using the HTTP client of the ESP-AT firmware. The
//! response is not awaited.
use crate::modem::{Error, Modem};
use alloc::format;
use alloc::string::String;
use embedded_io_async::Write;

/// Destination of POST requests
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct PostTarget {
    pub host: String,
    pub path: String,
}

impl PostTarget {
    /// URL as expected by the modem, host and path are just concatenated
    pub fn url(&self) -> String {
        format!("{}{}", self.host, self.path)
    }
}

impl<W: Write> Modem<W> {
    /// Sets the destination of following POST requests
    pub fn http_set_target(&self, host: &str, path: &str) {
        self.http.lock(|target| {
            *target.borrow_mut() = PostTarget {
                host: host.into(),
                path: path.into(),
            }
        });
    }

    /// Current destination of POST requests
    pub fn http_target(&self) -> PostTarget {
        self.http.lock(|target| target.borrow().clone())
    }

    /// Posts the body as JSON to the configured destination
    pub async fn http_post(&self, body: &str) -> Result<(), Error> {
        // POST, application/json, URL, no separate host + path, SSL transport
        let command = format!("AT+HTTPCLIENT=3,1,\"{}\",,,2,\"{}\"", self.http_target().url(), body);
        self.send_command(&command, self.config.command_delay).await
    }
}
