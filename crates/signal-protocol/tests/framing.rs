use bytes::Bytes;
use signal_protocol::{peer_linker, FramingError};

#[test]
fn pad_request_response_survives_round_trip_via_channel_hub() {
    use signal_protocol::channel_hub;

    let body = channel_hub::Body::PadRequestResponse { ok: true, pad_name: "room.42".to_owned() };
    let encoded = channel_hub::encode(11, &body);
    let (id, decoded) = channel_hub::decode(encoded).unwrap();
    assert_eq!(id, 11);
    assert_eq!(decoded, body);
}

#[test]
fn link_auth_response_preserves_denied_flag() {
    let body = peer_linker::Body::LinkAuthResponse { ok: false, requester_name: "agent a".to_owned() };
    let encoded = peer_linker::encode(5, &body);
    let (_, decoded) = peer_linker::decode(encoded).unwrap();
    assert_eq!(decoded, body);
}

#[test]
fn empty_frame_is_too_short() {
    let err = peer_linker::decode(Bytes::new()).unwrap_err();
    assert_eq!(err, FramingError::TooShort);
}

#[test]
fn invalid_utf8_pad_name_is_rejected() {
    use bytes::{BufMut, BytesMut};
    let mut out = BytesMut::new();
    signal_protocol::Header { kind: peer_linker::REGISTER, id: 1 }.encode(&mut out);
    out.put_slice(&[0xff, 0xfe]);
    let err = peer_linker::decode(out.freeze()).unwrap_err();
    assert_eq!(err, FramingError::InvalidUtf8);
}

#[test]
fn get_channels_response_nul_terminates_every_name_on_the_wire() {
    use signal_protocol::channel_hub;

    let body = channel_hub::Body::GetChannelsResponse {
        channel_names: vec!["room".to_owned(), "lobby".to_owned()],
    };
    let encoded = channel_hub::encode(1, &body);
    // Header is 6 bytes; the body must be every name followed by a NUL,
    // including the last one ("room\0lobby\0"), not just NUL-*separated*.
    assert_eq!(&encoded[6..], b"room\0lobby\0".as_slice());
}
