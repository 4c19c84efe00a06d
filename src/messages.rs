//! Wire-level message types for the lumictl control protocol.
//!
//! Every frame starts with the 8-byte device identifier and a little-endian
//! opcode. Replies reuse the opcode of the request that triggers them. Byte
//! layouts live in [`crate::codec`]; this module only names the fields.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Identifier field width at the start of every frame.
pub const IDENTIFIER_LEN: usize = 8;
/// Identifier plus opcode.
pub const HEADER_LEN: usize = IDENTIFIER_LEN + 2;
/// Width of filename, login, salt and signature fields.
pub const NAME_FIELD_LEN: usize = 32;
/// Width of the device name in a poll reply.
pub const DEVICE_NAME_LEN: usize = 10;
/// Reserved tail of a file request, always zero.
pub const FILE_REQUEST_RESERVED_LEN: usize = 512;

/// Wire sentinel for an inapplicable 16-bit zone field.
pub const ABSENT_U16: u16 = 0xFFFF;
/// Wire sentinel for an inapplicable packed RGB value.
pub const ABSENT_RGB: u32 = 0x0FFF_FFFF;

/// Operation selector carried after the identifier.
#[repr(u16)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Opcode {
    Poll = 0x00,
    File = 0x1F,
    ZoneStatus = 0x25,
    Salt = 0x47,
    Auth = 0x48,
    SceneTrigger = 0x6D,
}

impl Opcode {
    pub fn from_u16(value: u16) -> Option<Self> {
        match value {
            0x00 => Some(Self::Poll),
            0x1F => Some(Self::File),
            0x25 => Some(Self::ZoneStatus),
            0x47 => Some(Self::Salt),
            0x48 => Some(Self::Auth),
            0x6D => Some(Self::SceneTrigger),
            _ => None,
        }
    }

    pub fn as_u16(self) -> u16 {
        self as u16
    }
}

impl fmt::Display for Opcode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}(0x{:02X})", self, self.as_u16())
    }
}

/// Sub-code of a scene-trigger frame telling the device which parameter changes.
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TriggerCommand {
    /// Start the scene in the zone.
    Start = 0x00,
    SetDimmer = 0x01,
    SetSpeed = 0x02,
    SetColor = 0x03,
}

impl TriggerCommand {
    pub fn from_u8(value: u8) -> Option<Self> {
        match value {
            0x00 => Some(Self::Start),
            0x01 => Some(Self::SetDimmer),
            0x02 => Some(Self::SetSpeed),
            0x03 => Some(Self::SetColor),
            _ => None,
        }
    }
}

/// 8-bit RGB triple.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct Rgb {
    pub red: u8,
    pub green: u8,
    pub blue: u8,
}

impl Rgb {
    pub const fn new(red: u8, green: u8, blue: u8) -> Self {
        Self { red, green, blue }
    }
}

/// Last reported state of one zone.
///
/// Absent fields are ones the device marked "not applicable" with a sentinel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ZoneState {
    pub running_scene: Option<u16>,
    pub scene_state: Option<u16>,
    pub dimmer: Option<u16>,
    pub speed: Option<u16>,
    pub color: Option<Rgb>,
    pub saturation: Option<u16>,
    pub extra: [Option<u16>; 3],
}

/// Poll request (discovery / identity query).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PollRequest {
    pub protocol_version: u32,
}

/// Scene trigger sent over the datagram path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SceneTrigger {
    pub scene: u16,
    pub zone_sync_id: u8,
    pub command: TriggerCommand,
    pub dimmer: Option<u16>,
    pub speed: Option<u16>,
    pub color: Option<Rgb>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileRequest {
    pub filename: String,
    pub first: bool,
    pub chunk_size: i16,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ZoneQuery {
    pub timestamp: u64,
    pub zone_id: u16,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SaltRequest {
    pub timestamp: u64,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthRequest {
    pub timestamp: u64,
    pub login: String,
    pub salt: [u8; 32],
    pub signature: [u8; 32],
}

/// Every frame the client sends.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Request {
    Poll(PollRequest),
    SceneTrigger(SceneTrigger),
    File(FileRequest),
    ZoneQuery(ZoneQuery),
    Salt(SaltRequest),
    Auth(AuthRequest),
}

impl Request {
    pub fn opcode(&self) -> Opcode {
        match self {
            Request::Poll(_) => Opcode::Poll,
            Request::SceneTrigger(_) => Opcode::SceneTrigger,
            Request::File(_) => Opcode::File,
            Request::ZoneQuery(_) => Opcode::ZoneStatus,
            Request::Salt(_) => Opcode::Salt,
            Request::Auth(_) => Opcode::Auth,
        }
    }
}

/// Identity block returned for a poll.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct PollReply {
    pub name: String,
    pub firmware_version: u16,
    pub serial: u32,
    pub state: u8,
    pub tcp_port: u16,
}

/// One chunk of a file transfer. `chunk.len()` is the declared in-chunk byte count.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileData {
    pub filename: String,
    pub marker: u8,
    pub chunk: Vec<u8>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ZoneStatus {
    pub timestamp: u64,
    pub zone_id: u16,
    pub state: ZoneState,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SaltReply {
    pub timestamp: u64,
    pub status: u32,
    pub salt: [u8; 32],
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthReply {
    pub timestamp: u64,
    pub result: u32,
}

/// Every frame the device sends back.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Reply {
    Poll(PollReply),
    File(FileData),
    ZoneStatus(ZoneStatus),
    Salt(SaltReply),
    Auth(AuthReply),
}

impl Reply {
    pub fn opcode(&self) -> Opcode {
        match self {
            Reply::Poll(_) => Opcode::Poll,
            Reply::File(_) => Opcode::File,
            Reply::ZoneStatus(_) => Opcode::ZoneStatus,
            Reply::Salt(_) => Opcode::Salt,
            Reply::Auth(_) => Opcode::Auth,
        }
    }
}
