//! Closed error-kind enumeration for the peer-linker server, replacing the
//! reference implementation's parallel `enum` + `std::array<&str>` table
//! (see SPEC_FULL §7/§9) with a `thiserror` enum and a `message()` accessor.

use thiserror::Error;

#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum PeerLinkerError {
    #[error("pad name must not be empty")]
    EmptyName,
    #[error("a pad with this name is already registered")]
    DuplicateRegistration,
    #[error("session does not have a registered pad")]
    NotRegistered,
    #[error("no pad with that name is registered")]
    PeerNotFound,
    #[error("pad is already linked")]
    AlreadyLinked,
    #[error("pad is not linked")]
    NotLinked,
    #[error("an authentication exchange is already in flight for this pad")]
    AuthInProgress,
    #[error("no authentication exchange is in flight for this pad")]
    AuthNotInProgress,
    #[error("authenticator does not match the pad that requested the link")]
    AuthenticatorMismatched,
}

impl PeerLinkerError {
    pub fn message(self) -> &'static str {
        // `Display` (via `#[error(...)]`) already carries exactly this text;
        // `message` exists because the wire/log call sites want a
        // `&'static str` rather than a formatter.
        match self {
            Self::EmptyName => "pad name must not be empty",
            Self::DuplicateRegistration => "a pad with this name is already registered",
            Self::NotRegistered => "session does not have a registered pad",
            Self::PeerNotFound => "no pad with that name is registered",
            Self::AlreadyLinked => "pad is already linked",
            Self::NotLinked => "pad is not linked",
            Self::AuthInProgress => "an authentication exchange is already in flight for this pad",
            Self::AuthNotInProgress => "no authentication exchange is in flight for this pad",
            Self::AuthenticatorMismatched => {
                "authenticator does not match the pad that requested the link"
            }
        }
    }
}
