//! Client for the binary scene-controller protocol spoken by networked
//! lighting appliances.
//!
//! Scene triggers go out as fire-and-forget UDP datagrams. Everything else
//! runs over one persistent TCP control stream: identity polls, zone status
//! queries, chunked file downloads and the salted HMAC-SHA-256 login that
//! guards them. Frames are fixed-size little-endian layouts keyed by a 2-byte
//! opcode behind an 8-byte device identifier.

pub mod codec;
pub mod config;
pub mod device;
pub mod dispatch;
pub mod e2e_common;
pub mod handshake;
pub mod messages;
pub mod profile;
pub mod sdk;
pub mod session;
pub mod transfer;

pub use codec::{Codec, CodecError};
pub use config::{ConfigError, ControllerConfig};
pub use device::{DeviceState, NameTable};
pub use handshake::{Credentials, HandshakeError};
pub use messages::{
    AuthReply, FileData, Opcode, PollReply, Reply, Request, Rgb, SaltReply, TriggerCommand,
    ZoneState, ZoneStatus,
};
pub use profile::{CompiledProfile, DeviceProfile, ProfileError};
pub use sdk::{ClientError, Controller, DiscoveryClient};
pub use session::{AuthState, Category};
pub use transfer::TransferError;
