use std::time::Duration;

use roost_proto::{OpCode, ProtoError, ServerErrorKind};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("an auth request is already in flight")]
    AuthInProgress,
    #[error("server rejected credentials")]
    AuthFailed,
    #[error("session died while {op} on {path:?} was pending")]
    ConnectionLost { op: OpCode, path: String },
    #[error(transparent)]
    Server(ServerErrorKind),
    #[error("unclassified server error code {0}")]
    Unknown(i32),
    #[error("connection engine is gone")]
    EngineGone,
    #[error("empty server list")]
    NoServers,
    #[error("connect timed out after {0:?}")]
    ConnectTimeout(Duration),
    #[error("handshake timed out after {0:?}")]
    HandshakeTimeout(Duration),
    #[error("connection closed during handshake")]
    HandshakeClosed,
    #[error("server refused the session")]
    SessionRefused,
    #[error(transparent)]
    Proto(#[from] ProtoError),
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl Error {
    /// Maps a non-zero reply error code onto the caller-facing taxonomy.
    pub(crate) fn from_wire(code: i32) -> Self {
        match ServerErrorKind::from_code(code) {
            Some(kind) => Self::Server(kind),
            None => Self::Unknown(code),
        }
    }
}
