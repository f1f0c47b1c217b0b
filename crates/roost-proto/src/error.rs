use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum ProtoError {
    #[error("frame truncated: needed {needed} bytes, {have} remaining")]
    Truncated { needed: usize, have: usize },
    #[error("invalid field length {0}")]
    BadLength(i32),
    #[error("wire string is not valid utf-8")]
    BadUtf8,
    #[error("connect reply must be {expected} bytes, got {got}")]
    BadConnectReply { expected: usize, got: usize },
    #[error("opcode {0} has no reply body")]
    UnexpectedOpcode(i32),
}

/// Server error codes carried in reply headers, mapped to their stable kinds.
///
/// Codes the server may send that are not listed here surface to callers as
/// an unclassified raw code.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum ServerErrorKind {
    #[error("connection loss")]
    ConnectionLoss,
    #[error("marshalling error")]
    MarshallingError,
    #[error("unimplemented operation")]
    Unimplemented,
    #[error("operation timeout")]
    OperationTimeout,
    #[error("bad arguments")]
    BadArguments,
    #[error("no node")]
    NoNode,
    #[error("not authenticated")]
    NoAuth,
    #[error("bad version")]
    BadVersion,
    #[error("ephemeral nodes cannot have children")]
    NoChildrenForEphemerals,
    #[error("node exists")]
    NodeExists,
    #[error("node has children")]
    NotEmpty,
    #[error("session expired")]
    SessionExpired,
    #[error("invalid acl")]
    InvalidAcl,
    #[error("authentication failed")]
    AuthFailed,
    #[error("session is closing")]
    Closing,
    #[error("session moved to another server")]
    SessionMoved,
}

impl ServerErrorKind {
    pub fn from_code(code: i32) -> Option<Self> {
        let kind = match code {
            -4 => Self::ConnectionLoss,
            -5 => Self::MarshallingError,
            -6 => Self::Unimplemented,
            -7 => Self::OperationTimeout,
            -8 => Self::BadArguments,
            -101 => Self::NoNode,
            -102 => Self::NoAuth,
            -103 => Self::BadVersion,
            -108 => Self::NoChildrenForEphemerals,
            -110 => Self::NodeExists,
            -111 => Self::NotEmpty,
            -112 => Self::SessionExpired,
            -114 => Self::InvalidAcl,
            -115 => Self::AuthFailed,
            -116 => Self::Closing,
            -118 => Self::SessionMoved,
            _ => return None,
        };
        Some(kind)
    }

    pub fn code(self) -> i32 {
        match self {
            Self::ConnectionLoss => -4,
            Self::MarshallingError => -5,
            Self::Unimplemented => -6,
            Self::OperationTimeout => -7,
            Self::BadArguments => -8,
            Self::NoNode => -101,
            Self::NoAuth => -102,
            Self::BadVersion => -103,
            Self::NoChildrenForEphemerals => -108,
            Self::NodeExists => -110,
            Self::NotEmpty => -111,
            Self::SessionExpired => -112,
            Self::InvalidAcl => -114,
            Self::AuthFailed => -115,
            Self::Closing => -116,
            Self::SessionMoved => -118,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::ServerErrorKind;

    #[test]
    fn known_codes_round_trip() {
        for code in [
            -4, -5, -6, -7, -8, -101, -102, -103, -108, -110, -111, -112,
            -114, -115, -116, -118,
        ] {
            let kind = ServerErrorKind::from_code(code)
                .expect("code should be classified");
            assert_eq!(kind.code(), code);
        }
    }

    #[test]
    fn unknown_codes_are_unclassified() {
        assert_eq!(ServerErrorKind::from_code(0), None);
        assert_eq!(ServerErrorKind::from_code(-1), None);
        assert_eq!(ServerErrorKind::from_code(-999), None);
        assert_eq!(ServerErrorKind::from_code(42), None);
    }
}
