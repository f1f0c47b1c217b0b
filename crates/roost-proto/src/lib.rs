//! ZooKeeper 3.x wire codec.
//!
//! Pure encode/decode over byte buffers; the connection engine owns all I/O.
//! Frames on the wire are prefixed with a 4-byte big-endian length. With the
//! `codec` feature the crate also provides the matching length-delimited
//! codec for `tokio-util` framed transports.

pub mod error;
pub mod reply;
pub mod request;
pub mod wire;

pub use error::{ProtoError, ServerErrorKind};
pub use reply::{
    CONNECT_REPLY_LEN, ConnectReply, EventKind, FrameKind, KeeperState,
    ReplyHeader, Response, Stat, WatchEvent, decode_body,
    decode_connect_reply, decode_reply_header, decode_stat,
    decode_watch_event,
};
pub use request::{
    Acl, CreateFlags, OpCode, PING_FRAME, Perms, Request, encode_auth,
    encode_connect, encode_ping,
};

/// xid of server-pushed watch event frames.
pub const WATCH_EVENT_XID: i32 = -1;
/// xid of heartbeat frames and their acknowledgements.
pub const PING_XID: i32 = -2;
/// xid of auth requests and their replies.
pub const AUTH_XID: i32 = -4;

/// Upper bound on a single frame body, matching the server's default
/// jute.maxbuffer plus header slack.
pub const MAX_FRAME_LEN: usize = 1024 * 1024 + 1024;

/// Builds the length-delimited codec for the framed transport.
#[cfg(feature = "codec")]
pub fn frame_codec() -> tokio_util::codec::LengthDelimitedCodec {
    tokio_util::codec::LengthDelimitedCodec::builder()
        .length_field_length(4)
        .max_frame_length(MAX_FRAME_LEN)
        .new_codec()
}
