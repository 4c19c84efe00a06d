//! Pure encode/decode functions for every lumictl frame.
//!
//! All integers are little-endian, every field is zero-padded to its declared
//! width and alignment bytes are written as zero. The codec holds no state
//! beyond the device identifier and the file chunk capacity taken from the
//! compiled profile.

use bytes::{Buf, BufMut};
use thiserror::Error;

use crate::messages::{
    AuthReply, AuthRequest, FileData, FileRequest, Opcode, PollReply, PollRequest, Reply,
    Request, Rgb, SaltReply, SaltRequest, SceneTrigger, TriggerCommand, ZoneQuery, ZoneState,
    ZoneStatus, ABSENT_RGB, ABSENT_U16, DEVICE_NAME_LEN, FILE_REQUEST_RESERVED_LEN, HEADER_LEN,
    IDENTIFIER_LEN, NAME_FIELD_LEN,
};
use crate::profile::CompiledProfile;

pub mod framing;

pub const POLL_REQUEST_LEN: usize = HEADER_LEN + 4 + 2;
pub const SCENE_TRIGGER_LEN: usize = HEADER_LEN + 2 + 1 + 1 + 2 + 2 + 1 + 1 + 4;
pub const FILE_REQUEST_LEN: usize =
    HEADER_LEN + NAME_FIELD_LEN + 1 + 1 + 2 + 2 + FILE_REQUEST_RESERVED_LEN;
pub const ZONE_QUERY_LEN: usize = HEADER_LEN + 8 + 2 + 4;
pub const SALT_REQUEST_LEN: usize = HEADER_LEN + 8 + 6;
pub const AUTH_REQUEST_LEN: usize = HEADER_LEN + 8 + NAME_FIELD_LEN * 3 + 6;
/// HMAC input; never sent on the wire.
pub const AUTH_SIGNING_LEN: usize = HEADER_LEN + 8 + NAME_FIELD_LEN * 2;

pub const POLL_REPLY_LEN: usize = HEADER_LEN + DEVICE_NAME_LEN + 10 + 2 + 4 + 4 + 10 + 1 + 5 + 2;
/// File-data reply without its chunk area.
pub const FILE_DATA_FIXED_LEN: usize = HEADER_LEN + NAME_FIELD_LEN + 1 + 1 + 2 + 2;
pub const ZONE_STATUS_LEN: usize = HEADER_LEN + 8 + 2 * 5 + 4 + 2 * 4;
pub const SALT_REPLY_LEN: usize = HEADER_LEN + 8 + 4 + NAME_FIELD_LEN;
pub const AUTH_REPLY_LEN: usize = HEADER_LEN + 8 + 4;

/// Errors raised while encoding or decoding frames.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum CodecError {
    #[error("unknown opcode 0x{0:04X}")]
    UnknownOpcode(u16),
    #[error("frame shorter than its header: {0} bytes")]
    MissingHeader(usize),
    #[error("{opcode} frame truncated: expected {expected} bytes, got {got}")]
    Truncated {
        opcode: Opcode,
        expected: usize,
        got: usize,
    },
    #[error("{field} exceeds {max} bytes")]
    FieldTooLong { field: &'static str, max: usize },
    #[error("chunk byte count {count} exceeds capacity {capacity}")]
    ChunkOverflow { count: usize, capacity: usize },
    #[error("unknown trigger command 0x{0:02X}")]
    UnknownTriggerCommand(u8),
    #[error("{0} has no {1} layout")]
    NoLayout(Opcode, &'static str),
}

/// Frame encoder/decoder bound to one device profile.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Codec {
    identifier: [u8; IDENTIFIER_LEN],
    chunk_capacity: usize,
}

impl Codec {
    pub fn new(profile: &CompiledProfile) -> Self {
        Self {
            identifier: profile.identifier(),
            chunk_capacity: usize::from(profile.chunk_size()),
        }
    }

    pub fn identifier(&self) -> [u8; IDENTIFIER_LEN] {
        self.identifier
    }

    pub fn chunk_capacity(&self) -> usize {
        self.chunk_capacity
    }

    /// Total encoded length of a client request with this opcode.
    pub fn request_len(opcode: Opcode) -> usize {
        match opcode {
            Opcode::Poll => POLL_REQUEST_LEN,
            Opcode::SceneTrigger => SCENE_TRIGGER_LEN,
            Opcode::File => FILE_REQUEST_LEN,
            Opcode::ZoneStatus => ZONE_QUERY_LEN,
            Opcode::Salt => SALT_REQUEST_LEN,
            Opcode::Auth => AUTH_REQUEST_LEN,
        }
    }

    /// Total encoded length of a device reply, or `None` if the opcode never
    /// appears inbound.
    pub fn reply_len(&self, opcode: Opcode) -> Option<usize> {
        match opcode {
            Opcode::Poll => Some(POLL_REPLY_LEN),
            Opcode::File => Some(FILE_DATA_FIXED_LEN + self.chunk_capacity),
            Opcode::ZoneStatus => Some(ZONE_STATUS_LEN),
            Opcode::Salt => Some(SALT_REPLY_LEN),
            Opcode::Auth => Some(AUTH_REPLY_LEN),
            Opcode::SceneTrigger => None,
        }
    }

    /// Splits a frame into its identifier and raw opcode.
    pub fn header(buf: &[u8]) -> Result<([u8; IDENTIFIER_LEN], u16), CodecError> {
        if buf.len() < HEADER_LEN {
            return Err(CodecError::MissingHeader(buf.len()));
        }
        let mut identifier = [0u8; IDENTIFIER_LEN];
        identifier.copy_from_slice(&buf[..IDENTIFIER_LEN]);
        let opcode = u16::from_le_bytes([buf[IDENTIFIER_LEN], buf[IDENTIFIER_LEN + 1]]);
        Ok((identifier, opcode))
    }

    /// Encodes a request as one frame, identifier and opcode first.
    ///
    /// # Errors
    /// `CodecError` when a string field does not fit its fixed width.
    pub fn encode_request(&self, request: &Request) -> Result<Vec<u8>, CodecError> {
        let opcode = request.opcode();
        let mut buf = self.start_frame(opcode, Self::request_len(opcode));
        match request {
            Request::Poll(poll) => {
                buf.put_u32_le(poll.protocol_version);
                buf.put_bytes(0, 2);
            }
            Request::SceneTrigger(trigger) => {
                buf.put_u16_le(trigger.scene);
                buf.put_u8(trigger.zone_sync_id);
                buf.put_u8(trigger.command as u8);
                buf.put_u16_le(trigger.dimmer.unwrap_or(ABSENT_U16));
                buf.put_u16_le(trigger.speed.unwrap_or(ABSENT_U16));
                buf.put_bytes(0, 2);
                buf.put_u32_le(pack_rgb(trigger.color));
            }
            Request::File(file) => {
                put_fixed_str(&mut buf, &file.filename, NAME_FIELD_LEN, "filename")?;
                buf.put_u8(u8::from(file.first));
                buf.put_u8(0);
                buf.put_i16_le(file.chunk_size);
                buf.put_bytes(0, 2);
                buf.put_bytes(0, FILE_REQUEST_RESERVED_LEN);
            }
            Request::ZoneQuery(query) => {
                buf.put_u64_le(query.timestamp);
                buf.put_u16_le(query.zone_id);
                buf.put_bytes(0, 4);
            }
            Request::Salt(salt) => {
                buf.put_u64_le(salt.timestamp);
                buf.put_bytes(0, 6);
            }
            Request::Auth(auth) => {
                buf.put_u64_le(auth.timestamp);
                put_fixed_str(&mut buf, &auth.login, NAME_FIELD_LEN, "login")?;
                buf.put_slice(&auth.salt);
                buf.put_slice(&auth.signature);
                buf.put_bytes(0, 6);
            }
        }
        debug_assert_eq!(buf.len(), Self::request_len(opcode));
        Ok(buf)
    }

    /// Parses a request frame; the inverse of [`Codec::encode_request`].
    pub fn decode_request(&self, buf: &[u8]) -> Result<Request, CodecError> {
        let (_, raw) = Self::header(buf)?;
        let opcode = Opcode::from_u16(raw).ok_or(CodecError::UnknownOpcode(raw))?;
        let mut body = body_of(buf, opcode, Self::request_len(opcode))?;
        let request = match opcode {
            Opcode::Poll => Request::Poll(PollRequest {
                protocol_version: body.get_u32_le(),
            }),
            Opcode::SceneTrigger => {
                let scene = body.get_u16_le();
                let zone_sync_id = body.get_u8();
                let raw_command = body.get_u8();
                let command = TriggerCommand::from_u8(raw_command)
                    .ok_or(CodecError::UnknownTriggerCommand(raw_command))?;
                let dimmer = absent_u16(body.get_u16_le());
                let speed = absent_u16(body.get_u16_le());
                body.advance(2);
                Request::SceneTrigger(SceneTrigger {
                    scene,
                    zone_sync_id,
                    command,
                    dimmer,
                    speed,
                    color: unpack_rgb(body.get_u32_le()),
                })
            }
            Opcode::File => {
                let filename = get_fixed_str(&mut body, NAME_FIELD_LEN);
                let first = body.get_u8() != 0;
                body.advance(1);
                Request::File(FileRequest {
                    filename,
                    first,
                    chunk_size: body.get_i16_le(),
                })
            }
            Opcode::ZoneStatus => Request::ZoneQuery(ZoneQuery {
                timestamp: body.get_u64_le(),
                zone_id: body.get_u16_le(),
            }),
            Opcode::Salt => Request::Salt(SaltRequest {
                timestamp: body.get_u64_le(),
            }),
            Opcode::Auth => {
                let timestamp = body.get_u64_le();
                let login = get_fixed_str(&mut body, NAME_FIELD_LEN);
                let mut salt = [0u8; NAME_FIELD_LEN];
                body.copy_to_slice(&mut salt);
                let mut signature = [0u8; NAME_FIELD_LEN];
                body.copy_to_slice(&mut signature);
                Request::Auth(AuthRequest {
                    timestamp,
                    login,
                    salt,
                    signature,
                })
            }
        };
        Ok(request)
    }

    /// Encodes a reply frame as the device would send it.
    pub fn encode_reply(&self, reply: &Reply) -> Result<Vec<u8>, CodecError> {
        let opcode = reply.opcode();
        let len = self
            .reply_len(opcode)
            .ok_or(CodecError::NoLayout(opcode, "reply"))?;
        let mut buf = self.start_frame(opcode, len);
        match reply {
            Reply::Poll(poll) => {
                put_fixed_str(&mut buf, &poll.name, DEVICE_NAME_LEN, "name")?;
                buf.put_bytes(0, 10);
                buf.put_u16_le(poll.firmware_version);
                buf.put_bytes(0, 4);
                buf.put_u32_le(poll.serial);
                buf.put_bytes(0, 10);
                buf.put_u8(poll.state);
                buf.put_bytes(0, 5);
                buf.put_u16_le(poll.tcp_port);
            }
            Reply::File(data) => {
                if data.chunk.len() > self.chunk_capacity {
                    return Err(CodecError::ChunkOverflow {
                        count: data.chunk.len(),
                        capacity: self.chunk_capacity,
                    });
                }
                put_fixed_str(&mut buf, &data.filename, NAME_FIELD_LEN, "filename")?;
                buf.put_u8(data.marker);
                buf.put_u8(0);
                // capacity is bounded by MAX_CHUNK_SIZE, well inside u16
                buf.put_u16_le(data.chunk.len() as u16);
                buf.put_bytes(0, 2);
                buf.put_slice(&data.chunk);
                buf.put_bytes(0, self.chunk_capacity - data.chunk.len());
            }
            Reply::ZoneStatus(status) => {
                let state = &status.state;
                buf.put_u64_le(status.timestamp);
                buf.put_u16_le(status.zone_id);
                buf.put_u16_le(state.running_scene.unwrap_or(ABSENT_U16));
                buf.put_u16_le(state.scene_state.unwrap_or(ABSENT_U16));
                buf.put_u16_le(state.dimmer.unwrap_or(ABSENT_U16));
                buf.put_u16_le(state.speed.unwrap_or(ABSENT_U16));
                buf.put_u32_le(pack_rgb(state.color));
                buf.put_u16_le(state.saturation.unwrap_or(ABSENT_U16));
                for extra in state.extra {
                    buf.put_u16_le(extra.unwrap_or(ABSENT_U16));
                }
            }
            Reply::Salt(salt) => {
                buf.put_u64_le(salt.timestamp);
                buf.put_u32_le(salt.status);
                buf.put_slice(&salt.salt);
            }
            Reply::Auth(auth) => {
                buf.put_u64_le(auth.timestamp);
                buf.put_u32_le(auth.result);
            }
        }
        debug_assert_eq!(buf.len(), len);
        Ok(buf)
    }

    /// Parses exactly one reply frame.
    ///
    /// # Errors
    /// `CodecError` on an unknown opcode or a truncated frame.
    pub fn decode_reply(&self, buf: &[u8]) -> Result<Reply, CodecError> {
        let (_, raw) = Self::header(buf)?;
        let opcode = Opcode::from_u16(raw).ok_or(CodecError::UnknownOpcode(raw))?;
        let len = self
            .reply_len(opcode)
            .ok_or(CodecError::NoLayout(opcode, "reply"))?;
        let mut body = body_of(buf, opcode, len)?;
        let reply = match opcode {
            Opcode::Poll => {
                let name = get_fixed_str(&mut body, DEVICE_NAME_LEN);
                body.advance(10);
                let firmware_version = body.get_u16_le();
                body.advance(4);
                let serial = body.get_u32_le();
                body.advance(10);
                let state = body.get_u8();
                body.advance(5);
                Reply::Poll(PollReply {
                    name,
                    firmware_version,
                    serial,
                    state,
                    tcp_port: body.get_u16_le(),
                })
            }
            Opcode::File => {
                let filename = get_fixed_str(&mut body, NAME_FIELD_LEN);
                let marker = body.get_u8();
                body.advance(1);
                let count = usize::from(body.get_u16_le());
                body.advance(2);
                if count > self.chunk_capacity {
                    return Err(CodecError::ChunkOverflow {
                        count,
                        capacity: self.chunk_capacity,
                    });
                }
                Reply::File(FileData {
                    filename,
                    marker,
                    chunk: body[..count].to_vec(),
                })
            }
            Opcode::ZoneStatus => {
                let timestamp = body.get_u64_le();
                let zone_id = body.get_u16_le();
                let running_scene = absent_u16(body.get_u16_le());
                let scene_state = absent_u16(body.get_u16_le());
                let dimmer = absent_u16(body.get_u16_le());
                let speed = absent_u16(body.get_u16_le());
                let color = unpack_rgb(body.get_u32_le());
                let saturation = absent_u16(body.get_u16_le());
                let extra = [
                    absent_u16(body.get_u16_le()),
                    absent_u16(body.get_u16_le()),
                    absent_u16(body.get_u16_le()),
                ];
                Reply::ZoneStatus(ZoneStatus {
                    timestamp,
                    zone_id,
                    state: ZoneState {
                        running_scene,
                        scene_state,
                        dimmer,
                        speed,
                        color,
                        saturation,
                        extra,
                    },
                })
            }
            Opcode::Salt => {
                let timestamp = body.get_u64_le();
                let status = body.get_u32_le();
                let mut salt = [0u8; NAME_FIELD_LEN];
                body.copy_to_slice(&mut salt);
                Reply::Salt(SaltReply {
                    timestamp,
                    status,
                    salt,
                })
            }
            Opcode::Auth => Reply::Auth(AuthReply {
                timestamp: body.get_u64_le(),
                result: body.get_u32_le(),
            }),
            Opcode::SceneTrigger => return Err(CodecError::NoLayout(opcode, "reply")),
        };
        Ok(reply)
    }

    /// Builds the auth-signing message: the auth request prefix without the
    /// signature, used only as HMAC input.
    pub fn signing_message(
        &self,
        timestamp: u64,
        login: &str,
        salt: &[u8; 32],
    ) -> Result<Vec<u8>, CodecError> {
        let mut buf = self.start_frame(Opcode::Auth, AUTH_SIGNING_LEN);
        buf.put_u64_le(timestamp);
        put_fixed_str(&mut buf, login, NAME_FIELD_LEN, "login")?;
        buf.put_slice(salt);
        Ok(buf)
    }

    fn start_frame(&self, opcode: Opcode, len: usize) -> Vec<u8> {
        let mut buf = Vec::with_capacity(len);
        buf.put_slice(&self.identifier);
        buf.put_u16_le(opcode.as_u16());
        buf
    }
}

fn body_of(buf: &[u8], opcode: Opcode, expected: usize) -> Result<&[u8], CodecError> {
    if buf.len() < expected {
        return Err(CodecError::Truncated {
            opcode,
            expected,
            got: buf.len(),
        });
    }
    Ok(&buf[HEADER_LEN..expected])
}

fn absent_u16(raw: u16) -> Option<u16> {
    (raw != ABSENT_U16).then_some(raw)
}

/// Packs a colour as blue in byte 0, red in byte 1 and green in byte 2.
pub fn pack_rgb(color: Option<Rgb>) -> u32 {
    match color {
        Some(c) => u32::from(c.blue) | u32::from(c.red) << 8 | u32::from(c.green) << 16,
        None => ABSENT_RGB,
    }
}

pub fn unpack_rgb(raw: u32) -> Option<Rgb> {
    if raw == ABSENT_RGB {
        return None;
    }
    let [b0, b1, b2, _] = raw.to_le_bytes();
    Some(Rgb {
        red: b1,
        green: b2,
        blue: b0,
    })
}

fn put_fixed_str(
    buf: &mut Vec<u8>,
    value: &str,
    width: usize,
    field: &'static str,
) -> Result<(), CodecError> {
    let bytes = value.as_bytes();
    if bytes.len() > width {
        return Err(CodecError::FieldTooLong { field, max: width });
    }
    buf.put_slice(bytes);
    buf.put_bytes(0, width - bytes.len());
    Ok(())
}

fn get_fixed_str(body: &mut &[u8], width: usize) -> String {
    let raw = &body[..width];
    let end = raw.iter().position(|b| *b == 0).unwrap_or(width);
    let value = String::from_utf8_lossy(&raw[..end]).into_owned();
    body.advance(width);
    value
}

#[cfg(test)]
mod tests {
    use super::*;

    fn codec() -> Codec {
        Codec::new(&CompiledProfile::default())
    }

    #[test]
    fn requests_have_fixed_lengths_and_identifier() {
        let codec = codec();
        let requests = [
            Request::Poll(PollRequest { protocol_version: 1 }),
            Request::SceneTrigger(SceneTrigger {
                scene: 4,
                zone_sync_id: 2,
                command: TriggerCommand::SetColor,
                dimmer: None,
                speed: None,
                color: Some(Rgb::new(1, 2, 3)),
            }),
            Request::File(FileRequest {
                filename: "names.xml".into(),
                first: true,
                chunk_size: 512,
            }),
            Request::ZoneQuery(ZoneQuery {
                timestamp: 99,
                zone_id: 3,
            }),
            Request::Salt(SaltRequest { timestamp: 7 }),
            Request::Auth(AuthRequest {
                timestamp: 7,
                login: "admin".into(),
                salt: [9; 32],
                signature: [5; 32],
            }),
        ];
        let expected = [16, 24, 560, 24, 24, 120];
        for (request, len) in requests.iter().zip(expected) {
            let bytes = codec.encode_request(request).unwrap();
            assert_eq!(bytes.len(), len, "{:?}", request.opcode());
            assert_eq!(&bytes[..8], b"LUMICTRL");
            assert_eq!(codec.decode_request(&bytes).unwrap(), *request);
        }
    }

    #[test]
    fn scene_trigger_layout_is_bit_exact() {
        let bytes = codec()
            .encode_request(&Request::SceneTrigger(SceneTrigger {
                scene: 0x0102,
                zone_sync_id: 7,
                command: TriggerCommand::SetDimmer,
                dimmer: Some(0x0304),
                speed: None,
                color: None,
            }))
            .unwrap();
        assert_eq!(
            &bytes[8..],
            &[
                0x6D, 0x00, // opcode
                0x02, 0x01, // scene
                0x07, 0x01, // zone sync, command
                0x04, 0x03, // dimmer
                0xFF, 0xFF, // speed absent
                0x00, 0x00, // padding
                0xFF, 0xFF, 0xFF, 0x0F, // colour absent
            ]
        );
    }

    #[test]
    fn zone_status_sentinels_decode_as_absent() {
        let codec = codec();
        let status = ZoneStatus {
            timestamp: 1,
            zone_id: 2,
            state: ZoneState {
                running_scene: Some(5),
                dimmer: Some(1000),
                ..ZoneState::default()
            },
        };
        let bytes = codec.encode_reply(&Reply::ZoneStatus(status.clone())).unwrap();
        assert_eq!(bytes.len(), ZONE_STATUS_LEN);
        // scene_state on the wire is the raw sentinel
        assert_eq!(&bytes[22..24], &[0xFF, 0xFF]);
        match codec.decode_reply(&bytes).unwrap() {
            Reply::ZoneStatus(decoded) => {
                assert_eq!(decoded, status);
                assert_eq!(decoded.state.scene_state, None);
                assert_eq!(decoded.state.color, None);
            }
            other => panic!("unexpected reply {other:?}"),
        }
    }

    #[test]
    fn rgb_bytes_unpack_in_device_order() {
        // byte0 = blue, byte1 = red, byte2 = green
        assert_eq!(unpack_rgb(0x0033_2211), Some(Rgb::new(0x22, 0x33, 0x11)));
        assert_eq!(pack_rgb(Some(Rgb::new(0x22, 0x33, 0x11))), 0x0033_2211);
        assert_eq!(unpack_rgb(ABSENT_RGB), None);
        // full white is a real colour, not the sentinel
        assert_eq!(unpack_rgb(0x00FF_FFFF), Some(Rgb::new(255, 255, 255)));
    }

    #[test]
    fn file_data_keeps_only_declared_bytes() {
        let codec = codec();
        let data = FileData {
            filename: "names.xml".into(),
            marker: 1,
            chunk: b"<root".to_vec(),
        };
        let bytes = codec.encode_reply(&Reply::File(data.clone())).unwrap();
        assert_eq!(bytes.len(), FILE_DATA_FIXED_LEN + 512);
        assert_eq!(codec.decode_reply(&bytes).unwrap(), Reply::File(data));
    }

    #[test]
    fn file_data_rejects_count_above_capacity() {
        let codec = codec();
        let mut bytes = codec
            .encode_reply(&Reply::File(FileData {
                filename: "x".into(),
                marker: 0xFF,
                chunk: vec![],
            }))
            .unwrap();
        bytes[HEADER_LEN + 34..HEADER_LEN + 36].copy_from_slice(&600u16.to_le_bytes());
        assert_eq!(
            codec.decode_reply(&bytes),
            Err(CodecError::ChunkOverflow {
                count: 600,
                capacity: 512
            })
        );
    }

    #[test]
    fn poll_salt_auth_replies_round_trip() {
        let codec = codec();
        let replies = [
            Reply::Poll(PollReply {
                name: "Lobby".into(),
                firmware_version: 3,
                serial: 42,
                state: 1,
                tcp_port: 3000,
            }),
            Reply::Salt(SaltReply {
                timestamp: 7,
                status: 0,
                salt: [0xAB; 32],
            }),
            Reply::Auth(AuthReply {
                timestamp: 7,
                result: 4,
            }),
        ];
        for reply in replies {
            let bytes = codec.encode_reply(&reply).unwrap();
            assert_eq!(Some(bytes.len()), codec.reply_len(reply.opcode()));
            assert_eq!(codec.decode_reply(&bytes).unwrap(), reply);
        }
    }

    #[test]
    fn rejects_unknown_opcode_and_short_payloads() {
        let codec = codec();
        let mut frame = b"LUMICTRL".to_vec();
        frame.extend_from_slice(&0x0099u16.to_le_bytes());
        assert_eq!(
            codec.decode_reply(&frame),
            Err(CodecError::UnknownOpcode(0x99))
        );

        let auth = codec
            .encode_reply(&Reply::Auth(AuthReply {
                timestamp: 1,
                result: 0,
            }))
            .unwrap();
        assert_eq!(
            codec.decode_reply(&auth[..auth.len() - 1]),
            Err(CodecError::Truncated {
                opcode: Opcode::Auth,
                expected: AUTH_REPLY_LEN,
                got: AUTH_REPLY_LEN - 1,
            })
        );
        assert_eq!(codec.decode_reply(&auth[..4]), Err(CodecError::MissingHeader(4)));
    }

    #[test]
    fn oversized_strings_are_rejected() {
        let err = codec()
            .encode_request(&Request::File(FileRequest {
                filename: "x".repeat(33),
                first: true,
                chunk_size: 512,
            }))
            .unwrap_err();
        assert_eq!(
            err,
            CodecError::FieldTooLong {
                field: "filename",
                max: 32
            }
        );
    }

    #[test]
    fn signing_message_mirrors_auth_prefix() {
        let codec = codec();
        let salt = [3u8; 32];
        let message = codec.signing_message(11, "admin", &salt).unwrap();
        let request = codec
            .encode_request(&Request::Auth(AuthRequest {
                timestamp: 11,
                login: "admin".into(),
                salt,
                signature: [0; 32],
            }))
            .unwrap();
        assert_eq!(message.len(), AUTH_SIGNING_LEN);
        assert_eq!(&request[..AUTH_SIGNING_LEN], message.as_slice());
    }
}
