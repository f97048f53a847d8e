//! Wire format for Source RCON packets.
//!
//! ```text
//! +--------+--------+--------+-------------+------+------+
//! |  size  |   id   |  type  |    body     | 0x00 | 0x00 |
//! | i32 LE | i32 LE | i32 LE | size-10 B   |  1 B |  1 B |
//! +--------+--------+--------+-------------+------+------+
//! ```
//!
//! `size` counts every byte after itself, so a packet occupies `size + 4`
//! bytes on the wire.

use bytes::{Buf, BytesMut};

use crate::error::{RconError, Result};

/// Width of the leading size field.
pub const HEADER_SIZE: usize = 4;

/// Smallest legal value of the size field: id + type + two terminators.
pub const MIN_PACKET_SIZE: usize = 10;

/// Body SRCDS sends in the packet that follows a mirrored empty
/// RESPONSE_VALUE.
pub(crate) const SENTINEL_TRAILER: &str = "\u{0}\u{1}\u{0}\u{0}";

/// Packet type as it appears on the wire.
///
/// The protocol reuses `2` for both a client command and the server's auth
/// reply, so the type is kept as the raw value and the meaning depends on
/// the direction of travel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PacketType(i32);

impl PacketType {
    // SERVERDATA_AUTH
    pub const AUTH: PacketType = PacketType(3);
    // SERVERDATA_AUTH_RESPONSE
    pub const AUTH_RESPONSE: PacketType = PacketType(2);
    // SERVERDATA_EXECCOMMAND
    pub const EXEC_COMMAND: PacketType = PacketType(2);
    // SERVERDATA_RESPONSE_VALUE
    pub const RESPONSE_VALUE: PacketType = PacketType(0);

    pub const fn from_raw(value: i32) -> Self {
        PacketType(value)
    }

    pub const fn raw(&self) -> i32 {
        self.0
    }

    pub fn to_le_bytes(&self) -> [u8; 4] {
        self.0.to_le_bytes()
    }
}

impl From<i32> for PacketType {
    fn from(value: i32) -> Self {
        PacketType(value)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Packet {
    id: i32,
    packet_type: PacketType,
    body: String,
}

impl Packet {
    pub const BASE_PACKET_SIZE: i32 = MIN_PACKET_SIZE as i32;

    /// Builds a packet, rejecting bodies that cannot be sent as one byte per
    /// character or that contain NUL (it would end the body early).
    pub fn new(id: i32, packet_type: PacketType, body: &str) -> Result<Self> {
        if body.chars().any(|c| c == '\0' || u32::from(c) > 0xFF) {
            return Err(RconError::InvalidBody);
        }

        Ok(Self::new_unchecked(id, packet_type, body.to_owned()))
    }

    fn new_unchecked(id: i32, packet_type: PacketType, body: String) -> Self {
        Packet {
            id,
            packet_type,
            body,
        }
    }

    // Since the only one of these values that can change in length is the body,
    // an easy way to calculate the size of a packet is to find the byte-length
    // of the packet body, then add 10 to it.
    pub fn size(&self) -> i32 {
        self.body.chars().count() as i32 + Self::BASE_PACKET_SIZE
    }

    pub fn id(&self) -> i32 {
        self.id
    }

    pub fn packet_type(&self) -> PacketType {
        self.packet_type
    }

    pub fn body(&self) -> &str {
        self.body.as_ref()
    }

    pub fn into_body(self) -> String {
        self.body
    }

    pub(crate) fn is_sentinel_trailer(&self) -> bool {
        self.packet_type == PacketType::RESPONSE_VALUE && self.body == SENTINEL_TRAILER
    }

    /// Encodes the packet into its wire representation.
    pub fn pack(&self) -> Vec<u8> {
        // Size, ID, Type, Body, Terminator
        let mut payload = Vec::with_capacity(self.size() as usize + HEADER_SIZE);
        payload.extend_from_slice(&self.size().to_le_bytes());
        payload.extend_from_slice(&self.id.to_le_bytes());
        payload.extend_from_slice(&self.packet_type.to_le_bytes());
        // latin-1: every char was checked to fit in one byte
        payload.extend(self.body.chars().map(|c| c as u8));
        // null terminate the body, then null terminate the entire packet
        payload.extend_from_slice(&[0u8, 0u8]);
        payload
    }

    /// Decodes exactly one packet from `buf`. The buffer must hold the whole
    /// packet and nothing else.
    pub fn unpack(buf: &[u8]) -> Result<Self> {
        if buf.len() < MIN_PACKET_SIZE {
            return Err(RconError::MalformedPacket(format!(
                "{} bytes is shorter than the minimum packet length",
                buf.len()
            )));
        }

        let size = read_i32(buf, 0);
        let remaining = buf.len() - HEADER_SIZE;
        if size < MIN_PACKET_SIZE as i32 || size as usize != remaining {
            return Err(RconError::MalformedPacket(format!(
                "size field says {} bytes but {} follow it",
                size, remaining
            )));
        }

        let id = read_i32(buf, 4);
        let packet_type = PacketType::from_raw(read_i32(buf, 8));
        let body = latin1(&buf[12..buf.len() - 2]);

        Ok(Self::new_unchecked(id, packet_type, body))
    }
}

fn read_i32(buf: &[u8], offset: usize) -> i32 {
    i32::from_le_bytes([
        buf[offset],
        buf[offset + 1],
        buf[offset + 2],
        buf[offset + 3],
    ])
}

fn latin1(bytes: &[u8]) -> String {
    bytes.iter().map(|&b| char::from(b)).collect()
}

/// Frames packets out of a byte stream that may deliver them split or
/// coalesced in any way.
#[derive(Debug)]
pub struct PacketDecoder {
    buffer: BytesMut,
}

impl PacketDecoder {
    pub fn new() -> Self {
        Self::with_capacity(4096)
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            buffer: BytesMut::with_capacity(capacity),
        }
    }

    /// Appends data to the internal buffer.
    pub fn extend(&mut self, data: &[u8]) {
        self.buffer.extend_from_slice(data);
    }

    /// Returns the next complete packet, or `None` if more bytes are needed.
    /// Bytes past the returned packet stay buffered.
    pub fn decode_packet(&mut self) -> Result<Option<Packet>> {
        if self.buffer.len() < HEADER_SIZE {
            return Ok(None);
        }

        let size = read_i32(&self.buffer, 0);
        if size < MIN_PACKET_SIZE as i32 {
            return Err(RconError::MalformedPacket(format!(
                "size field {} is below the minimum of {}",
                size, MIN_PACKET_SIZE
            )));
        }

        // the buffer grows with the bytes that actually arrive; the size
        // field alone is never trusted for an allocation
        let total = HEADER_SIZE + size as usize;
        if self.buffer.len() < total {
            return Ok(None);
        }

        let frame = self.buffer.split_to(total);
        Packet::unpack(&frame).map(Some)
    }

    /// Returns the number of bytes currently buffered.
    pub fn buffered(&self) -> usize {
        self.buffer.remaining()
    }

    /// Drops everything buffered.
    pub fn clear(&mut self) {
        self.buffer.clear();
    }
}

impl Default for PacketDecoder {
    fn default() -> Self {
        Self::new()
    }
}
