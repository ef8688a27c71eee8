//! Closed error-kind enumeration for the channel-hub server (SPEC_FULL
//! §7/§9), mirroring `peer_linker_server::error::PeerLinkerError`.

use thiserror::Error;

#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum ChannelHubError {
    #[error("channel name must not be empty")]
    EmptyChannelName,
    #[error("a channel with this name is already registered")]
    ChannelAlreadyRegistered,
    #[error("no channel with that name is registered")]
    ChannelNotFound,
    #[error("channel is not registered by this session")]
    ChannelNotRegisteredBySender,
    #[error("another pad request is already pending for this session")]
    AnotherRequestPending,
    #[error("no pending pad request with that id")]
    RequesterNotFound,
}

impl ChannelHubError {
    pub fn message(self) -> &'static str {
        match self {
            Self::EmptyChannelName => "channel name must not be empty",
            Self::ChannelAlreadyRegistered => "a channel with this name is already registered",
            Self::ChannelNotFound => "no channel with that name is registered",
            Self::ChannelNotRegisteredBySender => "channel is not registered by this session",
            Self::AnotherRequestPending => "another pad request is already pending for this session",
            Self::RequesterNotFound => "no pending pad request with that id",
        }
    }
}
