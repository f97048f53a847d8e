//! Session configuration.

use std::time::Duration;

/// Port SRCDS listens for rcon on unless told otherwise.
pub const DEFAULT_PORT: u16 = 27015;

/// Default read buffer size (4 KiB, one maximum-size srcds packet).
pub const DEFAULT_READ_BUFFER_SIZE: usize = 4096;

/// Tunables that change how a session talks to the server.
#[derive(Debug, Clone)]
pub struct ConnectOptions {
    /// Accept any auth reply as success. Some servers (Project Zomboid, for
    /// one) answer the auth packet with a different id or type.
    pub ignore_invalid_auth_response: bool,
    /// Fail a command whose response carries an id other than ours.
    pub strict_correlation: bool,
    /// Follow every command with an empty sentinel packet and glue split
    /// responses back together. Only servers that mirror the sentinel
    /// (srcds) support this.
    pub multi_packet_responses: bool,
    /// Upper bound for opening the transport and authenticating.
    pub connect_timeout: Option<Duration>,
    /// Upper bound for a single command round trip.
    pub request_timeout: Option<Duration>,
    /// Size of the chunk read from the socket at a time.
    pub read_buffer_size: usize,
}

impl Default for ConnectOptions {
    fn default() -> Self {
        Self {
            ignore_invalid_auth_response: false,
            strict_correlation: true,
            multi_packet_responses: false,
            connect_timeout: Some(Duration::from_secs(10)),
            request_timeout: Some(Duration::from_secs(30)),
            read_buffer_size: DEFAULT_READ_BUFFER_SIZE,
        }
    }
}

impl ConnectOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_ignore_invalid_auth_response(mut self, ignore: bool) -> Self {
        self.ignore_invalid_auth_response = ignore;
        self
    }

    pub fn with_strict_correlation(mut self, strict: bool) -> Self {
        self.strict_correlation = strict;
        self
    }

    pub fn with_multi_packet_responses(mut self, enabled: bool) -> Self {
        self.multi_packet_responses = enabled;
        self
    }

    pub fn with_connect_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.connect_timeout = timeout;
        self
    }

    pub fn with_request_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.request_timeout = timeout;
        self
    }

    pub fn with_read_buffer_size(mut self, size: usize) -> Self {
        self.read_buffer_size = size.max(1);
        self
    }
}

/// Where to connect and how to authenticate.
#[derive(Debug, Clone)]
pub struct SessionConfig {
    pub host: String,
    pub port: u16,
    pub password: String,
    pub options: ConnectOptions,
}

impl SessionConfig {
    pub fn new(host: impl Into<String>, port: u16, password: impl Into<String>) -> Self {
        Self {
            host: host.into(),
            port,
            password: password.into(),
            options: ConnectOptions::default(),
        }
    }

    pub fn with_options(mut self, options: ConnectOptions) -> Self {
        self.options = options;
        self
    }

    /// `host:port`, for log lines.
    pub fn address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}
