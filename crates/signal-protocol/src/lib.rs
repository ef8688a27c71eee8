//! Wire framing for the signaling protocol.
//!
//! A frame is a 6-byte header (`type: u16`, `id: u32`, both little-endian)
//! followed by a type-specific payload. The transport (WebSocket) already
//! delivers message boundaries, so there is no outer length prefix here —
//! a received binary message's payload *is* `header || body`.

use bytes::{Buf, BufMut, Bytes, BytesMut};
use thiserror::Error;

pub const HEADER_LEN: usize = 6;

/// Sentinel `id` used for events that are not tied to a specific request.
pub const NO_ID: u32 = 0;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum FramingError {
    #[error("frame shorter than the {HEADER_LEN}-byte header")]
    TooShort,
    #[error("declared field lengths do not match payload size")]
    LengthMismatch,
    #[error("name field is not valid UTF-8")]
    InvalidUtf8,
    #[error("unknown packet type {0}")]
    UnknownType(u16),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Header {
    pub kind: u16,
    pub id: u32,
}

impl Header {
    pub fn encode(&self, out: &mut BytesMut) {
        out.put_u16_le(self.kind);
        out.put_u32_le(self.id);
    }
}

/// Splits a raw frame into its header and remaining payload bytes.
pub fn extract_header(mut frame: Bytes) -> Result<(Header, Bytes), FramingError> {
    if frame.len() < HEADER_LEN {
        return Err(FramingError::TooShort);
    }
    let kind = frame.get_u16_le();
    let id = frame.get_u32_le();
    Ok((Header { kind, id }, frame))
}

fn take_string(buf: &mut Bytes, len: usize) -> Result<String, FramingError> {
    if buf.remaining() < len {
        return Err(FramingError::LengthMismatch);
    }
    let raw = buf.copy_to_bytes(len);
    String::from_utf8(raw.to_vec()).map_err(|_| FramingError::InvalidUtf8)
}

fn take_bytes(buf: &mut Bytes, len: usize) -> Result<Vec<u8>, FramingError> {
    if buf.remaining() < len {
        return Err(FramingError::LengthMismatch);
    }
    Ok(buf.copy_to_bytes(len).to_vec())
}

/// Returns the remaining bytes of `buf` as an unterminated byte string.
/// Used for payloads that end in a single variable-length tail field.
pub fn extract_last_string(buf: Bytes) -> Vec<u8> {
    buf.to_vec()
}

fn encode_frame(kind: u16, id: u32, body_len: usize, body: impl FnOnce(&mut BytesMut)) -> Bytes {
    let mut out = BytesMut::with_capacity(HEADER_LEN + body_len);
    Header { kind, id }.encode(&mut out);
    body(&mut out);
    out.freeze()
}

// ---------------------------------------------------------------------------
// Peer-linker packet types
// ---------------------------------------------------------------------------

pub mod peer_linker {
    use super::*;

    pub const SUCCESS: u16 = 0;
    pub const ERROR: u16 = 1;
    pub const REGISTER: u16 = 2;
    pub const UNREGISTER: u16 = 3;
    pub const LINK: u16 = 4;
    pub const UNLINK: u16 = 5;
    pub const LINK_AUTH: u16 = 6;
    pub const LINK_AUTH_RESPONSE: u16 = 7;
    pub const LINK_SUCCESS: u16 = 8;
    pub const LINK_DENIED: u16 = 9;
    pub const UNLINKED: u16 = 10;
    pub const SET_CANDIDATES: u16 = 11;
    pub const ADD_CANDIDATES: u16 = 12;
    pub const GATHERING_DONE: u16 = 13;

    #[derive(Debug, Clone, PartialEq, Eq)]
    pub enum Body {
        Success,
        Error,
        Register { pad_name: String },
        Unregister,
        Link { requestee_name: String, secret: Vec<u8> },
        Unlink,
        LinkAuth { requester_name: String, secret: Vec<u8> },
        LinkAuthResponse { ok: bool, requester_name: String },
        LinkSuccess,
        LinkDenied,
        Unlinked,
        SetCandidates { sdp: String },
        AddCandidates { sdp: String },
        GatheringDone,
        /// Any type code this layer does not recognize — forwarded verbatim
        /// to the linked peer by the server, or handed to application hooks
        /// by the client.
        Passthrough { kind: u16, payload: Bytes },
    }

    /// Encodes `(id, body)` into a single WebSocket binary message.
    pub fn encode(id: u32, body: &Body) -> Bytes {
        match body {
            Body::Success => encode_frame(SUCCESS, id, 0, |_| {}),
            Body::Error => encode_frame(ERROR, id, 0, |_| {}),
            Body::Register { pad_name } => {
                encode_frame(REGISTER, id, pad_name.len(), |b| b.put_slice(pad_name.as_bytes()))
            }
            Body::Unregister => encode_frame(UNREGISTER, id, 0, |_| {}),
            Body::Link { requestee_name, secret } => encode_frame(
                LINK,
                id,
                4 + requestee_name.len() + secret.len(),
                |b| {
                    b.put_u16_le(requestee_name.len() as u16);
                    b.put_u16_le(secret.len() as u16);
                    b.put_slice(requestee_name.as_bytes());
                    b.put_slice(secret);
                },
            ),
            Body::Unlink => encode_frame(UNLINK, id, 0, |_| {}),
            Body::LinkAuth { requester_name, secret } => encode_frame(
                LINK_AUTH,
                id,
                4 + requester_name.len() + secret.len(),
                |b| {
                    b.put_u16_le(requester_name.len() as u16);
                    b.put_u16_le(secret.len() as u16);
                    b.put_slice(requester_name.as_bytes());
                    b.put_slice(secret);
                },
            ),
            Body::LinkAuthResponse { ok, requester_name } => encode_frame(
                LINK_AUTH_RESPONSE,
                id,
                2 + requester_name.len(),
                |b| {
                    b.put_u16_le(u16::from(*ok));
                    b.put_slice(requester_name.as_bytes());
                },
            ),
            Body::LinkSuccess => encode_frame(LINK_SUCCESS, id, 0, |_| {}),
            Body::LinkDenied => encode_frame(LINK_DENIED, id, 0, |_| {}),
            Body::Unlinked => encode_frame(UNLINKED, id, 0, |_| {}),
            Body::SetCandidates { sdp } => {
                encode_frame(SET_CANDIDATES, id, sdp.len(), |b| b.put_slice(sdp.as_bytes()))
            }
            Body::AddCandidates { sdp } => {
                encode_frame(ADD_CANDIDATES, id, sdp.len(), |b| b.put_slice(sdp.as_bytes()))
            }
            Body::GatheringDone => encode_frame(GATHERING_DONE, id, 0, |_| {}),
            Body::Passthrough { kind, payload } => {
                encode_frame(*kind, id, payload.len(), |b| b.put_slice(payload))
            }
        }
    }

    /// Decodes a full WebSocket binary message into `(id, body)`.
    pub fn decode(frame: Bytes) -> Result<(u32, Body), FramingError> {
        let (header, rest) = extract_header(frame)?;
        let body = decode_body(header.kind, rest)?;
        Ok((header.id, body))
    }

    /// Decodes a body from an already-extracted `(kind, payload)` pair, i.e.
    /// the header has already been stripped by the caller (the client
    /// session layers receive frames this way from [`crate::extract_header`]).
    pub fn decode_body(kind: u16, mut rest: Bytes) -> Result<Body, FramingError> {
        let body = match kind {
            SUCCESS => Body::Success,
            ERROR => Body::Error,
            REGISTER => Body::Register {
                pad_name: String::from_utf8(extract_last_string(rest))
                    .map_err(|_| FramingError::InvalidUtf8)?,
            },
            UNREGISTER => Body::Unregister,
            LINK => {
                if rest.remaining() < 4 {
                    return Err(FramingError::LengthMismatch);
                }
                let name_len = rest.get_u16_le() as usize;
                let secret_len = rest.get_u16_le() as usize;
                if rest.remaining() != name_len + secret_len {
                    return Err(FramingError::LengthMismatch);
                }
                let requestee_name = take_string(&mut rest, name_len)?;
                let secret = take_bytes(&mut rest, secret_len)?;
                Body::Link { requestee_name, secret }
            }
            UNLINK => Body::Unlink,
            LINK_AUTH => {
                if rest.remaining() < 4 {
                    return Err(FramingError::LengthMismatch);
                }
                let name_len = rest.get_u16_le() as usize;
                let secret_len = rest.get_u16_le() as usize;
                if rest.remaining() != name_len + secret_len {
                    return Err(FramingError::LengthMismatch);
                }
                let requester_name = take_string(&mut rest, name_len)?;
                let secret = take_bytes(&mut rest, secret_len)?;
                Body::LinkAuth { requester_name, secret }
            }
            LINK_AUTH_RESPONSE => {
                if rest.remaining() < 2 {
                    return Err(FramingError::LengthMismatch);
                }
                let ok = rest.get_u16_le() != 0;
                let requester_name = String::from_utf8(extract_last_string(rest))
                    .map_err(|_| FramingError::InvalidUtf8)?;
                Body::LinkAuthResponse { ok, requester_name }
            }
            LINK_SUCCESS => Body::LinkSuccess,
            LINK_DENIED => Body::LinkDenied,
            UNLINKED => Body::Unlinked,
            SET_CANDIDATES => Body::SetCandidates {
                sdp: String::from_utf8(extract_last_string(rest))
                    .map_err(|_| FramingError::InvalidUtf8)?,
            },
            ADD_CANDIDATES => Body::AddCandidates {
                sdp: String::from_utf8(extract_last_string(rest))
                    .map_err(|_| FramingError::InvalidUtf8)?,
            },
            GATHERING_DONE => Body::GatheringDone,
            other => Body::Passthrough { kind: other, payload: rest },
        };
        Ok(body)
    }
}

// ---------------------------------------------------------------------------
// Channel-hub packet types
// ---------------------------------------------------------------------------

pub mod channel_hub {
    use super::*;

    pub const SUCCESS: u16 = 0;
    pub const ERROR: u16 = 1;
    pub const REGISTER: u16 = 2;
    pub const UNREGISTER: u16 = 3;
    pub const GET_CHANNELS: u16 = 4;
    pub const GET_CHANNELS_RESPONSE: u16 = 5;
    pub const PAD_REQUEST: u16 = 6;
    pub const PAD_REQUEST_RESPONSE: u16 = 7;

    #[derive(Debug, Clone, PartialEq, Eq)]
    pub enum Body {
        Success,
        Error,
        Register { channel_name: String },
        Unregister { channel_name: String },
        GetChannels,
        GetChannelsResponse { channel_names: Vec<String> },
        PadRequest { channel_name: String },
        PadRequestResponse { ok: bool, pad_name: String },
    }

    pub fn encode(id: u32, body: &Body) -> Bytes {
        match body {
            Body::Success => encode_frame(SUCCESS, id, 0, |_| {}),
            Body::Error => encode_frame(ERROR, id, 0, |_| {}),
            Body::Register { channel_name } => {
                encode_frame(REGISTER, id, channel_name.len(), |b| b.put_slice(channel_name.as_bytes()))
            }
            Body::Unregister { channel_name } => {
                encode_frame(UNREGISTER, id, channel_name.len(), |b| b.put_slice(channel_name.as_bytes()))
            }
            Body::GetChannels => encode_frame(GET_CHANNELS, id, 0, |_| {}),
            Body::GetChannelsResponse { channel_names } => {
                // Every name is NUL-terminated on the wire, including the last,
                // not merely NUL-separated.
                let buf: Vec<u8> = channel_names
                    .iter()
                    .flat_map(|name| name.bytes().chain(std::iter::once(0)))
                    .collect();
                encode_frame(GET_CHANNELS_RESPONSE, id, buf.len(), |b| b.put_slice(&buf))
            }
            Body::PadRequest { channel_name } => {
                encode_frame(PAD_REQUEST, id, channel_name.len(), |b| b.put_slice(channel_name.as_bytes()))
            }
            Body::PadRequestResponse { ok, pad_name } => encode_frame(
                PAD_REQUEST_RESPONSE,
                id,
                2 + pad_name.len(),
                |b| {
                    b.put_u16_le(u16::from(*ok));
                    b.put_slice(pad_name.as_bytes());
                },
            ),
        }
    }

    pub fn decode(frame: Bytes) -> Result<(u32, Body), FramingError> {
        let (header, rest) = extract_header(frame)?;
        let body = decode_body(header.kind, rest)?;
        Ok((header.id, body))
    }

    /// Decodes a body from an already-extracted `(kind, payload)` pair.
    pub fn decode_body(kind: u16, mut rest: Bytes) -> Result<Body, FramingError> {
        let body = match kind {
            SUCCESS => Body::Success,
            ERROR => Body::Error,
            REGISTER => Body::Register {
                channel_name: String::from_utf8(extract_last_string(rest))
                    .map_err(|_| FramingError::InvalidUtf8)?,
            },
            UNREGISTER => Body::Unregister {
                channel_name: String::from_utf8(extract_last_string(rest))
                    .map_err(|_| FramingError::InvalidUtf8)?,
            },
            GET_CHANNELS => Body::GetChannels,
            GET_CHANNELS_RESPONSE => {
                let raw = extract_last_string(rest);
                let joined = String::from_utf8(raw).map_err(|_| FramingError::InvalidUtf8)?;
                // Every name is NUL-terminated, including the last, so
                // `split_terminator` (not `split`) avoids a trailing empty entry.
                let channel_names = joined.split_terminator('\0').map(str::to_owned).collect();
                Body::GetChannelsResponse { channel_names }
            }
            PAD_REQUEST => Body::PadRequest {
                channel_name: String::from_utf8(extract_last_string(rest))
                    .map_err(|_| FramingError::InvalidUtf8)?,
            },
            PAD_REQUEST_RESPONSE => {
                if rest.remaining() < 2 {
                    return Err(FramingError::LengthMismatch);
                }
                let ok = rest.get_u16_le() != 0;
                let pad_name = String::from_utf8(extract_last_string(rest))
                    .map_err(|_| FramingError::InvalidUtf8)?;
                Body::PadRequestResponse { ok, pad_name }
            }
            other => return Err(FramingError::UnknownType(other)),
        };
        Ok(body)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn header_too_short_is_rejected() {
        let frame = Bytes::from_static(&[1, 2, 3]);
        assert_eq!(extract_header(frame), Err(FramingError::TooShort));
    }

    #[test]
    fn register_round_trips() {
        let body = peer_linker::Body::Register { pad_name: "agent a".to_owned() };
        let encoded = peer_linker::encode(7, &body);
        let (id, decoded) = peer_linker::decode(encoded).unwrap();
        assert_eq!(id, 7);
        assert_eq!(decoded, body);
    }

    #[test]
    fn link_round_trips_with_secret_bytes() {
        let body = peer_linker::Body::Link {
            requestee_name: "agent b".to_owned(),
            secret: vec![0, 1, 2, 0, 255],
        };
        let encoded = peer_linker::encode(42, &body);
        let (id, decoded) = peer_linker::decode(encoded).unwrap();
        assert_eq!(id, 42);
        assert_eq!(decoded, body);
    }

    #[test]
    fn link_rejects_length_mismatch() {
        let mut out = BytesMut::new();
        Header { kind: peer_linker::LINK, id: 1 }.encode(&mut out);
        out.put_u16_le(5);
        out.put_u16_le(0);
        out.put_slice(b"ab");
        let err = peer_linker::decode(out.freeze()).unwrap_err();
        assert_eq!(err, FramingError::LengthMismatch);
    }

    #[test]
    fn unknown_peer_linker_type_is_passthrough() {
        let payload = Bytes::from_static(b"application data");
        let body = peer_linker::Body::Passthrough { kind: 999, payload: payload.clone() };
        let encoded = peer_linker::encode(3, &body);
        let (id, decoded) = peer_linker::decode(encoded).unwrap();
        assert_eq!(id, 3);
        assert_eq!(decoded, body);
    }

    #[test]
    fn channel_hub_get_channels_response_round_trips() {
        let body = channel_hub::Body::GetChannelsResponse {
            channel_names: vec!["room".to_owned(), "lobby".to_owned()],
        };
        let encoded = channel_hub::encode(9, &body);
        let (id, decoded) = channel_hub::decode(encoded).unwrap();
        assert_eq!(id, 9);
        assert_eq!(decoded, body);
    }

    #[test]
    fn channel_hub_empty_channel_list_round_trips() {
        let body = channel_hub::Body::GetChannelsResponse { channel_names: vec![] };
        let encoded = channel_hub::encode(9, &body);
        let (_, decoded) = channel_hub::decode(encoded).unwrap();
        assert_eq!(decoded, body);
    }

    #[test]
    fn channel_hub_unknown_type_is_an_error() {
        let mut out = BytesMut::new();
        Header { kind: 200, id: 1 }.encode(&mut out);
        let err = channel_hub::decode(out.freeze()).unwrap_err();
        assert_eq!(err, FramingError::UnknownType(200));
    }
}
