//! Authoritative channel registry and pad-request brokerage (SPEC_FULL
//! §4.7). Shaped like `peer_linker_server::state`: one mutex, cross-session
//! delivery via each session's own outbound channel, never across an
//! `.await`.

use std::collections::{HashMap, HashSet};
use std::sync::Mutex;

use bytes::Bytes;
use signal_protocol::channel_hub::{self as wire, Body};
use signal_protocol::NO_ID;
use tokio::sync::mpsc;
use tracing::warn;
use uuid::Uuid;

use crate::error::ChannelHubError;

struct Channel {
    owner_session: Uuid,
}

struct PendingPadRequest {
    requester_session: Uuid,
    responder_session: Uuid,
}

struct SessionEntry {
    channels: HashSet<String>,
    pending_request: Option<u32>,
    outbound: mpsc::UnboundedSender<Bytes>,
}

#[derive(Default)]
struct Inner {
    channels: HashMap<String, Channel>,
    sessions: HashMap<Uuid, SessionEntry>,
    pending_requests: HashMap<u32, PendingPadRequest>,
    next_packet_id: u32,
}

impl Inner {
    fn mint_packet_id(&mut self) -> u32 {
        self.next_packet_id += 1;
        self.next_packet_id
    }
}

pub struct ChannelHubState {
    inner: Mutex<Inner>,
}

impl Default for ChannelHubState {
    fn default() -> Self {
        Self { inner: Mutex::new(Inner { next_packet_id: 1, ..Inner::default() }) }
    }
}

impl ChannelHubState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register_session(&self, session_id: Uuid, outbound: mpsc::UnboundedSender<Bytes>) {
        let mut inner = self.inner.lock().unwrap();
        inner.sessions.insert(
            session_id,
            SessionEntry { channels: HashSet::new(), pending_request: None, outbound },
        );
    }

    /// Tears down everything owned by a disconnecting session: its
    /// channels, and any pending pad request it was either the requester or
    /// the addressed responder for.
    pub fn remove_session(&self, session_id: Uuid) {
        let mut inner = self.inner.lock().unwrap();
        let Some(entry) = inner.sessions.remove(&session_id) else { return };
        for channel_name in entry.channels {
            inner.channels.remove(&channel_name);
        }
        inner
            .pending_requests
            .retain(|_, p| p.requester_session != session_id && p.responder_session != session_id);
    }

    pub fn handle_packet(&self, session_id: Uuid, id: u32, kind: u16, payload: Bytes) -> Option<Bytes> {
        let body = match wire::decode_body(kind, payload) {
            Ok(body) => body,
            Err(err) => {
                warn!(%err, "malformed channel-hub frame");
                return Some(wire::encode(id, &Body::Error));
            }
        };

        let mut inner = self.inner.lock().unwrap();
        match body {
            Body::Register { channel_name } => {
                match Self::do_register(&mut inner, session_id, channel_name) {
                    Ok(()) => Some(wire::encode(id, &Body::Success)),
                    Err(err) => Self::reply_error(id, err),
                }
            }
            Body::Unregister { channel_name } => {
                match Self::do_unregister(&mut inner, session_id, &channel_name) {
                    Ok(()) => Some(wire::encode(id, &Body::Success)),
                    Err(err) => Self::reply_error(id, err),
                }
            }
            Body::GetChannels => {
                let channel_names = inner.channels.keys().cloned().collect();
                Some(wire::encode(id, &Body::GetChannelsResponse { channel_names }))
            }
            Body::PadRequest { channel_name } => {
                match Self::do_pad_request(&mut inner, session_id, &channel_name) {
                    Ok(()) => Some(wire::encode(id, &Body::Success)),
                    Err(err) => Self::reply_error(id, err),
                }
            }
            Body::PadRequestResponse { ok, pad_name } => {
                match Self::do_pad_request_response(&mut inner, session_id, id, ok, pad_name) {
                    Ok(()) => Some(wire::encode(id, &Body::Success)),
                    Err(err) => Self::reply_error(id, err),
                }
            }
            Body::Success | Body::Error => None,
        }
    }

    fn reply_error(id: u32, err: ChannelHubError) -> Option<Bytes> {
        warn!(reason = err.message(), "channel-hub request rejected");
        Some(wire::encode(id, &Body::Error))
    }

    fn do_register(inner: &mut Inner, session_id: Uuid, channel_name: String) -> Result<(), ChannelHubError> {
        if channel_name.is_empty() {
            return Err(ChannelHubError::EmptyChannelName);
        }
        if inner.channels.contains_key(&channel_name) {
            return Err(ChannelHubError::ChannelAlreadyRegistered);
        }
        inner.channels.insert(channel_name.clone(), Channel { owner_session: session_id });
        inner.sessions.get_mut(&session_id).unwrap().channels.insert(channel_name);
        Ok(())
    }

    fn do_unregister(inner: &mut Inner, session_id: Uuid, channel_name: &str) -> Result<(), ChannelHubError> {
        let owner = inner.channels.get(channel_name).ok_or(ChannelHubError::ChannelNotFound)?.owner_session;
        if owner != session_id {
            return Err(ChannelHubError::ChannelNotRegisteredBySender);
        }
        inner.channels.remove(channel_name);
        inner.sessions.get_mut(&session_id).unwrap().channels.remove(channel_name);
        Ok(())
    }

    fn do_pad_request(inner: &mut Inner, session_id: Uuid, channel_name: &str) -> Result<(), ChannelHubError> {
        if inner.sessions.get(&session_id).is_some_and(|e| e.pending_request.is_some()) {
            return Err(ChannelHubError::AnotherRequestPending);
        }
        let owner_session = inner
            .channels
            .get(channel_name)
            .ok_or(ChannelHubError::ChannelNotFound)?
            .owner_session;

        let req_id = inner.mint_packet_id();
        inner.pending_requests.insert(
            req_id,
            PendingPadRequest { requester_session: session_id, responder_session: owner_session },
        );
        inner.sessions.get_mut(&session_id).unwrap().pending_request = Some(req_id);

        if let Some(entry) = inner.sessions.get(&owner_session) {
            let frame = wire::encode(req_id, &Body::PadRequest { channel_name: channel_name.to_owned() });
            let _ = entry.outbound.send(frame);
        }
        Ok(())
    }

    fn do_pad_request_response(
        inner: &mut Inner,
        session_id: Uuid,
        req_id: u32,
        ok: bool,
        pad_name: String,
    ) -> Result<(), ChannelHubError> {
        let pending = inner.pending_requests.get(&req_id).ok_or(ChannelHubError::RequesterNotFound)?;
        if pending.responder_session != session_id {
            return Err(ChannelHubError::RequesterNotFound);
        }
        let requester_session = pending.requester_session;

        inner.pending_requests.remove(&req_id);
        if let Some(requester_entry) = inner.sessions.get_mut(&requester_session) {
            requester_entry.pending_request = None;
        }
        if let Some(entry) = inner.sessions.get(&requester_session) {
            // Delivered as an unsolicited push, not a reply: the requester
            // never sent a request under `req_id` (that id was minted for,
            // and sent to, the channel owner), so it goes out with `NO_ID`.
            let frame = wire::encode(NO_ID, &Body::PadRequestResponse { ok, pad_name });
            let _ = entry.outbound.send(frame);
        }
        Ok(())
    }
}
