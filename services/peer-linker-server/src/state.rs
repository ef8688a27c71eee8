//! Authoritative pad registry and handler table (SPEC_FULL §4.6).
//!
//! All state lives behind a single `Mutex`, mutated only inside
//! [`PeerLinkerState::handle_packet`]/[`PeerLinkerState::remove_session`] —
//! never across an `.await`. Cross-session delivery (a `LinkAuth`, an
//! `Unlinked` notice, a passthrough frame) is hand-delivered through the
//! target session's own outbound channel rather than by reaching for that
//! session's socket directly, so the critical section stays synchronous.

use std::collections::HashMap;
use std::sync::Mutex;

use bytes::Bytes;
use signal_protocol::peer_linker::{self as wire, Body};
use signal_protocol::NO_ID;
use tokio::sync::mpsc;
use tracing::warn;
use uuid::Uuid;

use crate::error::PeerLinkerError;

struct Pad {
    session_id: Uuid,
    linked: Option<String>,
    authenticator_name: Option<String>,
}

struct SessionEntry {
    pad_name: Option<String>,
    outbound: mpsc::UnboundedSender<Bytes>,
}

#[derive(Default)]
struct Inner {
    pads: HashMap<String, Pad>,
    sessions: HashMap<Uuid, SessionEntry>,
}

impl Inner {
    /// Removes `pad_name`, notifying and unlinking its peer if it had one.
    /// Leaves the owning session entry's `pad_name` untouched — callers
    /// clear or drop the session entry themselves.
    fn remove_pad(&mut self, pad_name: &str) {
        let Some(pad) = self.pads.remove(pad_name) else { return };
        let _ = pad.session_id;
        if let Some(peer_name) = pad.linked {
            if let Some(peer) = self.pads.get_mut(&peer_name) {
                peer.linked = None;
                if let Some(entry) = self.sessions.get(&peer.session_id) {
                    let frame = wire::encode(NO_ID, &Body::Unlinked);
                    let _ = entry.outbound.send(frame);
                }
            }
        }
    }
}

#[derive(Default)]
pub struct PeerLinkerState {
    inner: Mutex<Inner>,
}

impl PeerLinkerState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register_session(&self, session_id: Uuid, outbound: mpsc::UnboundedSender<Bytes>) {
        let mut inner = self.inner.lock().unwrap();
        inner
            .sessions
            .insert(session_id, SessionEntry { pad_name: None, outbound });
    }

    /// Tears down everything owned by a disconnecting session: its pad (if
    /// any), unlinking and notifying its peer.
    pub fn remove_session(&self, session_id: Uuid) {
        let mut inner = self.inner.lock().unwrap();
        let pad_name = inner.sessions.remove(&session_id).and_then(|e| e.pad_name);
        if let Some(pad_name) = pad_name {
            inner.remove_pad(&pad_name);
        }
    }

    /// Processes one inbound frame for `session_id`. Returns the frame (if
    /// any) to send back to the *same* session — forwards/notifications to
    /// other sessions are delivered via their outbound channels as a side
    /// effect, not returned here.
    pub fn handle_packet(&self, session_id: Uuid, id: u32, kind: u16, payload: Bytes) -> Option<Bytes> {
        let body = match wire::decode_body(kind, payload.clone()) {
            Ok(body) => body,
            Err(err) => {
                warn!(%err, "malformed peer-linker frame");
                return Some(wire::encode(id, &Body::Error));
            }
        };

        let mut inner = self.inner.lock().unwrap();
        match body {
            Body::Register { pad_name } => match Self::do_register(&mut inner, session_id, pad_name) {
                Ok(()) => Some(wire::encode(id, &Body::Success)),
                Err(err) => Self::reply_error(id, err),
            },
            Body::Unregister => match Self::do_unregister(&mut inner, session_id) {
                Ok(()) => Some(wire::encode(id, &Body::Success)),
                Err(err) => Self::reply_error(id, err),
            },
            Body::Link { requestee_name, secret } => {
                match Self::do_link(&mut inner, session_id, &requestee_name, secret) {
                    Ok(()) => Some(wire::encode(id, &Body::Success)),
                    Err(err) => Self::reply_error(id, err),
                }
            }
            Body::Unlink => match Self::do_unlink(&mut inner, session_id) {
                Ok(()) => Some(wire::encode(id, &Body::Success)),
                Err(err) => Self::reply_error(id, err),
            },
            Body::LinkAuthResponse { ok, requester_name } => {
                match Self::do_link_auth_response(&mut inner, session_id, ok, &requester_name) {
                    Ok(()) => Some(wire::encode(id, &Body::Success)),
                    Err(err) => Self::reply_error(id, err),
                }
            }
            _other => Self::do_passthrough(&mut inner, session_id, kind, id, payload),
        }
    }

    fn reply_error(id: u32, err: PeerLinkerError) -> Option<Bytes> {
        warn!(reason = err.message(), "peer-linker request rejected");
        Some(wire::encode(id, &Body::Error))
    }

    fn pad_name_of(inner: &Inner, session_id: Uuid) -> Result<String, PeerLinkerError> {
        inner
            .sessions
            .get(&session_id)
            .and_then(|e| e.pad_name.clone())
            .ok_or(PeerLinkerError::NotRegistered)
    }

    fn do_register(inner: &mut Inner, session_id: Uuid, pad_name: String) -> Result<(), PeerLinkerError> {
        let already_has_pad = inner
            .sessions
            .get(&session_id)
            .is_none_or(|e| e.pad_name.is_some());
        if already_has_pad {
            return Err(PeerLinkerError::DuplicateRegistration);
        }
        if pad_name.is_empty() {
            return Err(PeerLinkerError::EmptyName);
        }
        if inner.pads.contains_key(&pad_name) {
            return Err(PeerLinkerError::DuplicateRegistration);
        }
        inner.pads.insert(
            pad_name.clone(),
            Pad { session_id, linked: None, authenticator_name: None },
        );
        inner.sessions.get_mut(&session_id).unwrap().pad_name = Some(pad_name);
        Ok(())
    }

    fn do_unregister(inner: &mut Inner, session_id: Uuid) -> Result<(), PeerLinkerError> {
        let pad_name = Self::pad_name_of(inner, session_id)?;
        inner.remove_pad(&pad_name);
        inner.sessions.get_mut(&session_id).unwrap().pad_name = None;
        Ok(())
    }

    fn do_link(
        inner: &mut Inner,
        session_id: Uuid,
        target: &str,
        secret: Vec<u8>,
    ) -> Result<(), PeerLinkerError> {
        let pad_name = Self::pad_name_of(inner, session_id)?;
        {
            let pad = inner.pads.get(&pad_name).ok_or(PeerLinkerError::NotRegistered)?;
            if pad.linked.is_some() {
                return Err(PeerLinkerError::AlreadyLinked);
            }
            if pad.authenticator_name.is_some() {
                return Err(PeerLinkerError::AuthInProgress);
            }
        }
        let target_session = {
            let target_pad = inner.pads.get(target).ok_or(PeerLinkerError::PeerNotFound)?;
            target_pad.session_id
        };
        if let Some(entry) = inner.sessions.get(&target_session) {
            let frame = wire::encode(
                NO_ID,
                &Body::LinkAuth { requester_name: pad_name.clone(), secret },
            );
            let _ = entry.outbound.send(frame);
        }
        inner.pads.get_mut(&pad_name).unwrap().authenticator_name = Some(target.to_owned());
        Ok(())
    }

    fn do_unlink(inner: &mut Inner, session_id: Uuid) -> Result<(), PeerLinkerError> {
        let pad_name = Self::pad_name_of(inner, session_id)?;
        let peer_name = inner
            .pads
            .get(&pad_name)
            .and_then(|p| p.linked.clone())
            .ok_or(PeerLinkerError::NotLinked)?;
        inner.pads.get_mut(&pad_name).unwrap().linked = None;
        if let Some(peer) = inner.pads.get_mut(&peer_name) {
            peer.linked = None;
            if let Some(entry) = inner.sessions.get(&peer.session_id) {
                let frame = wire::encode(NO_ID, &Body::Unlinked);
                let _ = entry.outbound.send(frame);
            }
        }
        Ok(())
    }

    fn do_link_auth_response(
        inner: &mut Inner,
        session_id: Uuid,
        ok: bool,
        requester_name: &str,
    ) -> Result<(), PeerLinkerError> {
        let responder_name = Self::pad_name_of(inner, session_id)?;
        let requester_matches = inner
            .pads
            .get(requester_name)
            .is_some_and(|r| r.authenticator_name.as_deref() == Some(responder_name.as_str()));
        if !requester_matches {
            return Err(PeerLinkerError::AuthNotInProgress);
        }

        inner.pads.get_mut(requester_name).unwrap().authenticator_name = None;

        let requester_session = inner.pads.get(requester_name).unwrap().session_id;
        if ok {
            inner.pads.get_mut(requester_name).unwrap().linked = Some(responder_name.clone());
            inner.pads.get_mut(&responder_name).unwrap().linked = Some(requester_name.to_owned());
        }
        let reply_body = if ok { Body::LinkSuccess } else { Body::LinkDenied };
        if let Some(entry) = inner.sessions.get(&requester_session) {
            let frame = wire::encode(NO_ID, &reply_body);
            let _ = entry.outbound.send(frame);
        }
        Ok(())
    }

    /// Forwards a frame this layer does not itself interpret (an unknown
    /// application type, or an ICE type such as `SetCandidates` that only
    /// the client-side `IceSession` understands) to the linked peer
    /// verbatim, re-using the original `kind`/`payload` bytes untouched.
    fn do_passthrough(inner: &mut Inner, session_id: Uuid, kind: u16, id: u32, payload: Bytes) -> Option<Bytes> {
        let Ok(pad_name) = Self::pad_name_of(inner, session_id) else {
            return Self::reply_error(id, PeerLinkerError::NotRegistered);
        };
        let Some(peer_name) = inner.pads.get(&pad_name).and_then(|p| p.linked.clone()) else {
            return Self::reply_error(id, PeerLinkerError::NotLinked);
        };
        let Some(peer) = inner.pads.get(&peer_name) else {
            return Self::reply_error(id, PeerLinkerError::PeerNotFound);
        };
        if let Some(entry) = inner.sessions.get(&peer.session_id) {
            let frame = wire::encode(id, &Body::Passthrough { kind, payload });
            let _ = entry.outbound.send(frame);
        }
        None
    }
}
