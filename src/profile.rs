use serde::{Deserialize, Serialize};

use crate::messages::IDENTIFIER_LEN;

/// Error produced when device profile parameters fail validation.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum ProfileError {
    #[error("device identifier must be exactly 8 bytes, got {0}")]
    IdentifierLength(usize),
    #[error("chunk size must be between 1 and {max} inclusive, got {got}")]
    ChunkSizeOutOfRange { got: u16, max: u16 },
    #[error("continuation and terminal file markers must differ")]
    MarkersCollide,
    #[error("base secret cannot be empty")]
    EmptySecret,
}

/// Largest chunk a device will accept in a single file-data reply.
pub const MAX_CHUNK_SIZE: u16 = 4096;

/// Per-device protocol constants.
///
/// Two appliances from different product lines can speak the same opcodes
/// with a different identifier literal or signing secret, so these values
/// travel with the controller instance rather than living in statics.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DeviceProfile {
    /// ASCII identifier emitted unchanged at the start of every frame.
    pub identifier: String,
    /// Protocol-wide secret prefixed to the password when signing.
    pub base_secret: String,
    pub protocol_version: u32,
    /// Chunk size requested for file transfers; also the reply chunk capacity.
    pub chunk_size: u16,
    pub continuation_marker: u8,
    /// Devices in the field send 0xFF here even though 0x00 is documented.
    pub terminal_marker: u8,
}

impl Default for DeviceProfile {
    fn default() -> Self {
        Self {
            identifier: "LUMICTRL".to_string(),
            base_secret: "lumictl-protocol-base".to_string(),
            protocol_version: 1,
            chunk_size: 512,
            continuation_marker: 1,
            terminal_marker: 0xFF,
        }
    }
}

impl DeviceProfile {
    /// Validates the profile and fixes the identifier into its wire form.
    ///
    /// # Guarantees
    /// * The identifier is exactly 8 bytes, so every frame header is well formed.
    /// * File markers are distinct, so a chunk is never both final and continued.
    pub fn compile(&self) -> Result<CompiledProfile, ProfileError> {
        let bytes = self.identifier.as_bytes();
        if bytes.len() != IDENTIFIER_LEN {
            return Err(ProfileError::IdentifierLength(bytes.len()));
        }
        if self.chunk_size == 0 || self.chunk_size > MAX_CHUNK_SIZE {
            return Err(ProfileError::ChunkSizeOutOfRange {
                got: self.chunk_size,
                max: MAX_CHUNK_SIZE,
            });
        }
        if self.continuation_marker == self.terminal_marker {
            return Err(ProfileError::MarkersCollide);
        }
        if self.base_secret.is_empty() {
            return Err(ProfileError::EmptySecret);
        }

        let mut identifier = [0u8; IDENTIFIER_LEN];
        identifier.copy_from_slice(bytes);
        Ok(CompiledProfile {
            identifier,
            base_secret: self.base_secret.as_bytes().to_vec(),
            protocol_version: self.protocol_version,
            chunk_size: self.chunk_size,
            continuation_marker: self.continuation_marker,
            terminal_marker: self.terminal_marker,
        })
    }
}

/// Validated profile consumed by the codec, handshake and transfer layers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompiledProfile {
    identifier: [u8; IDENTIFIER_LEN],
    base_secret: Vec<u8>,
    protocol_version: u32,
    chunk_size: u16,
    continuation_marker: u8,
    terminal_marker: u8,
}

impl CompiledProfile {
    pub fn identifier(&self) -> [u8; IDENTIFIER_LEN] {
        self.identifier
    }

    pub fn base_secret(&self) -> &[u8] {
        &self.base_secret
    }

    pub fn protocol_version(&self) -> u32 {
        self.protocol_version
    }

    pub fn chunk_size(&self) -> u16 {
        self.chunk_size
    }

    pub fn continuation_marker(&self) -> u8 {
        self.continuation_marker
    }

    pub fn terminal_marker(&self) -> u8 {
        self.terminal_marker
    }
}

impl Default for CompiledProfile {
    fn default() -> Self {
        Self {
            identifier: *b"LUMICTRL",
            base_secret: b"lumictl-protocol-base".to_vec(),
            protocol_version: 1,
            chunk_size: 512,
            continuation_marker: 1,
            terminal_marker: 0xFF,
        }
    }
}
