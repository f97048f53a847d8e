use thiserror::Error;
use tokio::time::error::Elapsed;

/// Possible errors for the package.
#[derive(Error, Debug)]
pub enum RconError {
    /// Returned if the socket could not be opened, or failed while reading
    /// or writing (refused, reset, broken pipe).
    #[error("transport error: {0}")]
    Transport(#[from] std::io::Error),
    /// Returned if the server closed the connection while we were waiting
    /// for a response.
    #[error("connection closed by host")]
    ConnectionClosed,
    /// Returned if the incoming bytes cannot be framed into a packet (short
    /// buffer, bad size field).
    #[error("malformed packet: {0}")]
    MalformedPacket(String),
    /// Returned if a packet body contains NUL or characters that do not fit
    /// in a single byte.
    #[error("packet body must be NUL-free ascii/latin-1 text")]
    InvalidBody,
    /// Returned if you can't remember the password, or the server answered
    /// the auth packet with something we don't recognize.
    #[error("authentication failed")]
    AuthenticationFailed,
    /// Returned if a command is issued before `connect()` succeeded or after
    /// the session was torn down.
    #[error("session is not ready for commands")]
    NotReady,
    /// Returned if the server answered with a request id that is not ours.
    #[error("unexpected response id {actual} (expected {expected})")]
    UnexpectedResponse { expected: i32, actual: i32 },
    /// Returned if the server did not respond in time.
    #[error("timeout")]
    Timeout(#[from] Elapsed),
}

pub type Result<T> = std::result::Result<T, RconError>;
