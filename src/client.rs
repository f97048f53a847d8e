use crate::{
    config::{ConnectOptions, SessionConfig},
    error::RconError,
    session::{Session, SessionState},
};
use log::trace;
use tokio::net::TcpStream;

/// Simple asynchronous rcon client. Call `connect()` to establish a connection
/// and authenticate. The client should be `mut` because only one command may
/// be in flight at a time.
///
/// ## Example
/// ```no_run
/// use sourcon::client::Client;
/// use sourcon::config::ConnectOptions;
/// use std::error::Error;
///
/// #[tokio::main]
/// async fn main() -> Result<(), Box<dyn Error>> {
///     let options = ConnectOptions::default();
///     let mut client =
///         Client::connect("localhost", 25575, "<put rcon password here>", options).await?;
///     let response = client.command("time set day").await?;
///
///     assert_eq!(response.body(), "Set the time to 1000");
///     client.disconnect().await;
///     Ok(())
/// }
/// ```
pub struct Client {
    session: Session<TcpStream>,
}

/// Container struct for a response that can be glued together from multiple
/// packets.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Response {
    body: String,
}

impl Response {
    pub fn body(&self) -> &str {
        self.body.as_ref()
    }

    pub fn into_body(self) -> String {
        self.body
    }
}

impl Client {
    pub async fn connect(
        host: &str,
        port: u16,
        password: &str,
        options: ConnectOptions,
    ) -> Result<Self, RconError> {
        let config = SessionConfig::new(host, port, password).with_options(options);
        let mut session: Session<TcpStream> = Session::new(config);

        session.connect().await?;
        trace!("client ready on {}:{}", host, port);

        Ok(Client { session })
    }

    /// Run a rcon command asynchronously. Fails with [RconError::NotReady]
    /// once the client has been disconnected.
    pub async fn command(&mut self, command: &str) -> Result<Response, RconError> {
        let body = self.session.send_command(command).await?;
        Ok(Response { body })
    }

    pub async fn disconnect(&mut self) {
        self.session.disconnect().await;
    }

    pub fn state(&self) -> SessionState {
        self.session.state()
    }

    pub fn session(&self) -> &Session<TcpStream> {
        &self.session
    }
}
