//! In-process rcon server that behaves like srcds, for end-to-end tests.

#![allow(dead_code)]

use std::net::SocketAddr;
use std::sync::Arc;

use sourcon::packet::{Packet, PacketDecoder, PacketType};
use tokio::{
    io::{AsyncReadExt, AsyncWriteExt},
    net::{TcpListener, TcpStream},
    task::JoinHandle,
};

pub const PASSWORD: &str = "hunter2";

type Handler = Arc<dyn Fn(&str) -> String + Send + Sync>;

pub struct FakeServer {
    pub addr: SocketAddr,
    handle: JoinHandle<()>,
}

impl FakeServer {
    /// Starts a server answering every command with `handler(command)`.
    /// Responses longer than `chunk` bytes are split over several packets.
    pub async fn start<F>(chunk: usize, handler: F) -> Self
    where
        F: Fn(&str) -> String + Send + Sync + 'static,
    {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let handler: Handler = Arc::new(handler);

        let handle = tokio::spawn(async move {
            loop {
                let (stream, _) = match listener.accept().await {
                    Ok(conn) => conn,
                    Err(_) => return,
                };
                let handler = handler.clone();
                tokio::spawn(async move {
                    let _ = process(stream, chunk, handler).await;
                });
            }
        });

        FakeServer { addr, handle }
    }

    pub fn port(&self) -> u16 {
        self.addr.port()
    }
}

impl Drop for FakeServer {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

async fn send(
    stream: &mut TcpStream,
    id: i32,
    packet_type: PacketType,
    body: &str,
) -> std::io::Result<()> {
    let packet = Packet::new(id, packet_type, body).unwrap();
    stream.write_all(&packet.pack()).await
}

async fn process(mut stream: TcpStream, chunk: usize, handler: Handler) -> std::io::Result<()> {
    let mut decoder = PacketDecoder::new();
    let mut buf = [0u8; 1024];

    loop {
        let packet = loop {
            if let Some(packet) = decoder.decode_packet().unwrap() {
                break packet;
            }
            let n = stream.read(&mut buf).await?;
            if n == 0 {
                return Ok(());
            }
            decoder.extend(&buf[..n]);
        };

        match packet.packet_type() {
            PacketType::AUTH => {
                send(&mut stream, packet.id(), PacketType::RESPONSE_VALUE, "").await?;
                let id = if packet.body() == PASSWORD {
                    packet.id()
                } else {
                    -1
                };
                send(&mut stream, id, PacketType::AUTH_RESPONSE, "").await?;
            }
            PacketType::EXEC_COMMAND => {
                let output = handler(packet.body());
                let bytes: Vec<char> = output.chars().collect();
                if bytes.is_empty() {
                    send(&mut stream, packet.id(), PacketType::RESPONSE_VALUE, "").await?;
                }
                for part in bytes.chunks(chunk) {
                    let body: String = part.iter().collect();
                    send(&mut stream, packet.id(), PacketType::RESPONSE_VALUE, &body).await?;
                }
            }
            PacketType::RESPONSE_VALUE => {
                // mirror the sentinel, then the trailer
                send(&mut stream, packet.id(), PacketType::RESPONSE_VALUE, "").await?;
                let mut trailer = vec![0x0E, 0, 0, 0];
                trailer.extend_from_slice(&packet.id().to_le_bytes());
                trailer.extend_from_slice(&[0, 0, 0, 0, 0x00, 0x01, 0x00, 0x00, 0, 0]);
                stream.write_all(&trailer).await?;
            }
            _ => {}
        }
    }
}
