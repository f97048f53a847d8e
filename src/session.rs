//! Connection lifecycle and request/response correlation.
//!
//! A [Session] walks one transport through
//! `Disconnected -> Connecting -> Authenticating -> Ready` and back to
//! `Disconnected` on `disconnect()` or on any transport failure. Only one
//! request is ever outstanding, so responses pair up with requests by order;
//! the correlation id only confirms that a reply belongs to this session.

use std::future::Future;
use std::io;
use std::time::Duration;

use log::{debug, trace};
use rand::Rng;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::net::TcpStream;

use crate::config::SessionConfig;
use crate::error::{RconError, Result};
use crate::packet::{Packet, PacketDecoder, PacketType};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Disconnected,
    Connecting,
    Authenticating,
    Ready,
}

/// Owns the transport exclusively; nothing else reads from or writes to it.
pub struct Session<S = TcpStream> {
    config: SessionConfig,
    state: SessionState,
    correlation_id: i32,
    stream: Option<S>,
    decoder: PacketDecoder,
    read_buf: Vec<u8>,
    // correlation id of the request awaiting its response
    pending: Option<i32>,
}

impl<S> Session<S>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    pub fn new(config: SessionConfig) -> Self {
        let read_buf = vec![0; config.options.read_buffer_size.max(1)];
        Session {
            config,
            state: SessionState::Disconnected,
            correlation_id: 0,
            stream: None,
            decoder: PacketDecoder::new(),
            read_buf,
            pending: None,
        }
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn is_ready(&self) -> bool {
        self.state == SessionState::Ready
    }

    /// Id chosen for the current (or last) connection attempt.
    pub fn correlation_id(&self) -> i32 {
        self.correlation_id
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    /// Opens a transport with `open(host, port)` and authenticates over it.
    ///
    /// Any transport left over from an earlier attempt is released first. On
    /// failure the session is back in [SessionState::Disconnected].
    pub async fn connect_with<F, Fut>(&mut self, open: F) -> Result<()>
    where
        F: FnOnce(String, u16) -> Fut,
        Fut: Future<Output = io::Result<S>>,
    {
        if self.state != SessionState::Disconnected {
            debug!("connect called in state {:?}, dropping old transport", self.state);
            self.release();
        }

        let limit = self.config.options.connect_timeout;
        let mut guard = ReleaseOnDrop::new(self);
        let result = bounded(limit, guard.session.establish(open)).await;

        match result {
            Ok(()) => guard.disarm(),
            Err(ref e) => {
                let address = guard.session.config.address();
                debug!("connection to {} failed: {}", address, e);
            }
        }
        result
    }

    /// Sends one command and returns the response body.
    pub async fn send_command(&mut self, command: &str) -> Result<String> {
        if self.state != SessionState::Ready {
            return Err(RconError::NotReady);
        }

        let packet = Packet::new(self.correlation_id, PacketType::EXEC_COMMAND, command)?;

        // a caller dropping this future mid-flight must not leave a reply
        // on the wire for the next command to pick up
        let limit = self.config.options.request_timeout;
        let mut guard = ReleaseOnDrop::new(self);
        let result = bounded(limit, guard.session.exchange(packet)).await;

        match result {
            Ok(_) => guard.disarm(),
            Err(ref e) => debug!("command failed ({}), disconnecting", e),
        }
        result
    }

    /// Closes the transport. Safe to call in any state, any number of times.
    pub async fn disconnect(&mut self) {
        if let Some(mut stream) = self.stream.take() {
            trace!("closing transport to {}", self.config.address());
            if let Err(e) = stream.shutdown().await {
                debug!("error while closing transport: {}", e);
            }
        }
        self.release();
    }

    async fn establish<F, Fut>(&mut self, open: F) -> Result<()>
    where
        F: FnOnce(String, u16) -> Fut,
        Fut: Future<Output = io::Result<S>>,
    {
        self.state = SessionState::Connecting;
        let stream = open(self.config.host.clone(), self.config.port).await?;

        self.stream = Some(stream);
        self.decoder.clear();
        self.state = SessionState::Authenticating;
        self.correlation_id = rand::rng().random_range(0..=i32::MAX);

        trace!(
            "opened transport to {}, attempting auth as id {}",
            self.config.address(),
            self.correlation_id
        );

        self.auth().await?;

        trace!("auth complete");
        self.state = SessionState::Ready;
        Ok(())
    }

    async fn auth(&mut self) -> Result<()> {
        let auth_packet = Packet::new(
            self.correlation_id,
            PacketType::AUTH,
            &self.config.password,
        )?;

        trace!("sending auth packet to server");
        self.write_packet(&auth_packet).await?;

        loop {
            let response = self.read_packet().await?;
            trace!(
                "receive auth response for packet id {} type {}",
                response.id(),
                response.packet_type().raw()
            );

            // srcds sends an empty RESPONSE_VALUE ahead of the real answer
            if response.id() == self.correlation_id
                && response.packet_type() == PacketType::RESPONSE_VALUE
                && response.body().is_empty()
            {
                trace!("skipping empty response value ahead of auth response");
                continue;
            }

            if self.config.options.ignore_invalid_auth_response {
                debug!("accepting auth response without validating it");
                return Ok(());
            }

            if response.id() == self.correlation_id
                && response.packet_type() == PacketType::AUTH_RESPONSE
            {
                return Ok(());
            }

            return Err(RconError::AuthenticationFailed);
        }
    }

    async fn exchange(&mut self, packet: Packet) -> Result<String> {
        let multi_packet = self.config.options.multi_packet_responses;
        self.pending = Some(packet.id());

        trace!("sending command packet to server");
        self.write_packet(&packet).await?;

        if multi_packet {
            // srcds won't say how many packets a response spans, but it
            // mirrors an empty RESPONSE_VALUE back once it is done
            let sentinel = Packet::new(packet.id(), PacketType::RESPONSE_VALUE, "")?;
            trace!("sending sentinel (blank) packet to server");
            self.write_packet(&sentinel).await?;
        }

        // the first packet always belongs to the command, even when empty
        let mut body = self.read_response().await?.into_body();

        if multi_packet {
            loop {
                let next = self.read_response().await?;
                if next.body().is_empty() {
                    trace!("that was the sentinel, completing response");
                    break;
                }
                body.push_str(next.body());
            }
        }

        self.pending = None;
        Ok(body)
    }

    async fn read_response(&mut self) -> Result<Packet> {
        let response = self.read_packet().await?;
        trace!("receive response for packet id {}", response.id());

        let expected = self.pending.unwrap_or(self.correlation_id);
        if self.config.options.strict_correlation && response.id() != expected {
            return Err(RconError::UnexpectedResponse {
                expected,
                actual: response.id(),
            });
        }
        Ok(response)
    }

    async fn write_packet(&mut self, packet: &Packet) -> Result<()> {
        let stream = self.stream.as_mut().ok_or(RconError::NotReady)?;
        stream.write_all(&packet.pack()).await?;
        stream.flush().await?;
        Ok(())
    }

    /// Reads until the decoder can hand out a whole packet. Bytes of any
    /// following packet stay in the decoder for the next call.
    async fn read_packet(&mut self) -> Result<Packet> {
        loop {
            if let Some(packet) = self.decoder.decode_packet()? {
                if self.config.options.multi_packet_responses && packet.is_sentinel_trailer() {
                    trace!("discarding sentinel trailer");
                    continue;
                }
                return Ok(packet);
            }

            let stream = self.stream.as_mut().ok_or(RconError::NotReady)?;
            let read = stream.read(&mut self.read_buf).await?;
            if read == 0 {
                return Err(RconError::ConnectionClosed);
            }

            trace!("read {} bytes from transport", read);
            self.decoder.extend(&self.read_buf[..read]);
        }
    }
}

impl<S> Session<S> {
    /// Drops the transport and anything buffered from it.
    fn release(&mut self) {
        if self.state != SessionState::Disconnected {
            trace!("{:?} -> Disconnected", self.state);
        }
        self.stream = None;
        self.decoder.clear();
        self.pending = None;
        self.state = SessionState::Disconnected;
    }
}

/// Releases the session when dropped unless disarmed, so an awaited step
/// that is cancelled or fails leaves it Disconnected.
struct ReleaseOnDrop<'a, S> {
    session: &'a mut Session<S>,
    armed: bool,
}

impl<'a, S> ReleaseOnDrop<'a, S> {
    fn new(session: &'a mut Session<S>) -> Self {
        ReleaseOnDrop {
            session,
            armed: true,
        }
    }

    fn disarm(&mut self) {
        self.armed = false;
    }
}

impl<S> Drop for ReleaseOnDrop<'_, S> {
    fn drop(&mut self) {
        if self.armed {
            self.session.release();
        }
    }
}

impl Session<TcpStream> {
    /// Opens a TCP connection to the configured host and authenticates.
    pub async fn connect(&mut self) -> Result<()> {
        self.connect_with(|host, port| async move {
            let stream = TcpStream::connect((host.as_str(), port)).await?;
            stream.set_nodelay(true)?;
            Ok::<_, io::Error>(stream)
        })
        .await
    }
}

async fn bounded<T, F>(limit: Option<Duration>, fut: F) -> Result<T>
where
    F: Future<Output = Result<T>>,
{
    match limit {
        Some(limit) => tokio::time::timeout(limit, fut).await?,
        None => fut.await,
    }
}
