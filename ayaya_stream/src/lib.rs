//! Shared AyayaStream protocol helpers.
//!
//! The engine publishes one render snapshot per tick to whatever display
//! surface is listening. Every message is a fixed-size header followed by a
//! MessagePack payload; both producer and consumer go through this crate so
//! the framing stays in one place.

use std::convert::TryFrom;
use std::io::Read;

use bytes::Buf;
use serde::{Deserialize, Serialize};
use serde_repr::{Deserialize_repr, Serialize_repr};
use thiserror::Error;

/// Bytes that prefix every AyayaStream message ("AYAS").
pub const HEADER_MAGIC: [u8; 4] = *b"AYAS";

/// Protocol revision understood by this crate.
pub const PROTOCOL_VERSION: u16 = 0x0001;

/// Length of the binary header in bytes.
pub const HEADER_LEN: usize = 4 + 2 + 2 + 4;

/// Upper bound on a single payload; anything larger is treated as corruption.
pub const MAX_PAYLOAD_LEN: u32 = 16 * 1024 * 1024;

/// Message kinds understood by AyayaStream v1.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize_repr, Deserialize_repr, Hash)]
#[repr(u16)]
pub enum MessageKind {
    Hello = 0x0001,
    RenderSnapshot = 0x0002,
    Heartbeat = 0x0003,
}

/// Envelope describing the upcoming payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MessageHeader {
    pub version: u16,
    pub kind: MessageKind,
    pub length: u32,
}

impl MessageHeader {
    /// Encode the header as big-endian bytes.
    pub fn encode(&self) -> [u8; HEADER_LEN] {
        let mut out = [0u8; HEADER_LEN];
        out[..4].copy_from_slice(&HEADER_MAGIC);
        out[4..6].copy_from_slice(&self.version.to_be_bytes());
        out[6..8].copy_from_slice(&(self.kind as u16).to_be_bytes());
        out[8..12].copy_from_slice(&self.length.to_be_bytes());
        out
    }

    /// Decode a header from raw bytes.
    pub fn decode(input: &[u8]) -> Result<Self, ProtocolError> {
        if input.len() < HEADER_LEN {
            return Err(ProtocolError::TruncatedHeader);
        }
        if input[..4] != HEADER_MAGIC {
            return Err(ProtocolError::BadMagic);
        }
        let mut version_bytes = &input[4..6];
        let version = version_bytes.get_u16();
        if version != PROTOCOL_VERSION {
            return Err(ProtocolError::UnsupportedVersion(version));
        }
        let mut kind_bytes = &input[6..8];
        let kind_raw = kind_bytes.get_u16();
        let kind = MessageKind::try_from(kind_raw)
            .map_err(|_| ProtocolError::UnknownMessageKind(kind_raw))?;
        let mut len_bytes = &input[8..12];
        let length = len_bytes.get_u32();
        if length > MAX_PAYLOAD_LEN {
            return Err(ProtocolError::PayloadTooLarge(length));
        }
        Ok(Self {
            version,
            kind,
            length,
        })
    }
}

impl TryFrom<u16> for MessageKind {
    type Error = ();

    fn try_from(value: u16) -> std::result::Result<Self, Self::Error> {
        match value {
            0x0001 => Ok(Self::Hello),
            0x0002 => Ok(Self::RenderSnapshot),
            0x0003 => Ok(Self::Heartbeat),
            _ => Err(()),
        }
    }
}

/// Handshake message that opens a stream.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Hello {
    pub protocol: String,
    pub producer: String,
    pub build: Option<String>,
}

impl Hello {
    pub fn new(producer: impl Into<String>, build: Option<String>) -> Self {
        Self {
            protocol: "AyayaStream".to_string(),
            producer: producer.into(),
            build,
        }
    }
}

/// Keep-alive sent while no ticks are being produced.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Heartbeat {
    pub host_time_ns: u64,
}

/// Read-cost figures for the tick that produced a snapshot (milliseconds).
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct PerformanceSample {
    pub time: f64,
    pub max: f64,
}

/// A buff as shown on the overlay.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RenderBuff {
    pub name: String,
    pub count: u32,
}

/// Overlay view of a single actor.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RenderEntity {
    pub handle: u64,
    pub name: String,
    pub team: u32,
    pub screen_pos: [f32; 2],
    pub world_pos: [f32; 3],
    pub bounding_radius: f32,
    pub health: f32,
    pub max_health: f32,
    pub mana: f32,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub path_end: Option<[f32; 3]>,
    #[serde(skip_serializing_if = "Vec::is_empty", default)]
    pub buffs: Vec<RenderBuff>,
}

/// Overlay view of a projectile.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RenderMissile {
    pub handle: u64,
    pub name: String,
    pub source: u64,
    pub start: [f32; 3],
    pub end: [f32; 3],
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub start_screen: Option<[f32; 2]>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub end_screen: Option<[f32; 2]>,
}

/// Primitive emitted by a module's draw hook. Colours are packed RGBA.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum DrawCommand {
    Text {
        text: String,
        x: f32,
        y: f32,
        size: f32,
        color: u32,
    },
    Circle {
        center: [f32; 3],
        radius: f32,
        points: u32,
        color: u32,
        thickness: f32,
    },
    CircleScreen {
        center: [f32; 2],
        radius: f32,
        color: u32,
        thickness: f32,
    },
}

/// Everything the display surface needs to draw one tick.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RenderSnapshot {
    pub seq: u64,
    pub host_time_ns: u64,
    pub tick: u64,
    pub me: RenderEntity,
    pub enemy_champions: Vec<RenderEntity>,
    pub missiles: Vec<RenderMissile>,
    pub performance: PerformanceSample,
    pub screen: [f32; 2],
    pub matrix: [f32; 16],
    #[serde(skip_serializing_if = "Vec::is_empty", default)]
    pub draw: Vec<DrawCommand>,
}

/// Error conditions returned by the protocol helpers.
#[derive(Debug, Error)]
pub enum ProtocolError {
    #[error("header smaller than {HEADER_LEN} bytes")]
    TruncatedHeader,
    #[error("header magic mismatch")]
    BadMagic,
    #[error("protocol version {0:#06x} is not supported")]
    UnsupportedVersion(u16),
    #[error("message kind {0:#06x} is unknown")]
    UnknownMessageKind(u16),
    #[error("payload of {0} bytes exceeds the frame limit")]
    PayloadTooLarge(u32),
    #[error("payload length mismatch: header declared {expected} bytes but read {actual}")]
    LengthMismatch { expected: u32, actual: usize },
    #[error("payload decode error: {0}")]
    PayloadDecode(#[from] rmp_serde::decode::Error),
    #[error("payload encode error: {0}")]
    PayloadEncode(#[from] rmp_serde::encode::Error),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

/// Wraps a payload with framing suitable for the wire.
pub fn encode_message<T>(kind: MessageKind, payload: &T) -> Result<Vec<u8>, ProtocolError>
where
    T: Serialize,
{
    let payload_bytes = rmp_serde::to_vec_named(payload)?;
    let length = u32::try_from(payload_bytes.len())
        .ok()
        .filter(|len| *len <= MAX_PAYLOAD_LEN)
        .ok_or(ProtocolError::LengthMismatch {
            expected: MAX_PAYLOAD_LEN,
            actual: payload_bytes.len(),
        })?;
    let header = MessageHeader {
        version: PROTOCOL_VERSION,
        kind,
        length,
    };
    let mut out = Vec::with_capacity(HEADER_LEN + payload_bytes.len());
    out.extend_from_slice(&header.encode());
    out.extend_from_slice(&payload_bytes);
    Ok(out)
}

/// Decodes a framed message returning both header and payload bytes.
pub fn decode_envelope(bytes: &[u8]) -> std::result::Result<(MessageHeader, &[u8]), ProtocolError> {
    if bytes.len() < HEADER_LEN {
        return Err(ProtocolError::TruncatedHeader);
    }
    let header = MessageHeader::decode(&bytes[..HEADER_LEN])?;
    let payload = &bytes[HEADER_LEN..];
    if payload.len() != header.length as usize {
        return Err(ProtocolError::LengthMismatch {
            expected: header.length,
            actual: payload.len(),
        });
    }
    Ok((header, payload))
}

/// Decode a payload straight into the requested type.
pub fn decode_payload<T>(payload: &[u8]) -> std::result::Result<T, ProtocolError>
where
    T: for<'de> Deserialize<'de>,
{
    let value = rmp_serde::from_slice(payload)?;
    Ok(value)
}

/// Blocking read of one framed message from a byte stream.
pub fn read_message<R: Read>(reader: &mut R) -> Result<(MessageHeader, Vec<u8>), ProtocolError> {
    let mut header_bytes = [0u8; HEADER_LEN];
    reader.read_exact(&mut header_bytes)?;
    let header = MessageHeader::decode(&header_bytes)?;
    let mut payload = vec![0u8; header.length as usize];
    reader.read_exact(&mut payload)?;
    Ok((header, payload))
}
