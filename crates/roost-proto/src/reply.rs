//! Server-to-client frame decoding: reply headers, per-opcode bodies, watch
//! events, and the session handshake reply.

use bytes::Buf;

use crate::error::ProtoError;
use crate::request::{Acl, OpCode, Perms};
use crate::wire;
use crate::{AUTH_XID, PING_XID, WATCH_EVENT_XID};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReplyHeader {
    pub xid: i32,
    pub zxid: i64,
    pub err: i32,
}

/// Classification of an inbound frame by its xid.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameKind {
    /// Correlated reply to an outstanding client request.
    Reply,
    /// Server-pushed watch event.
    WatchEvent,
    /// Heartbeat acknowledgement.
    PingAck,
    /// Reply to an auth request.
    AuthReply,
}

impl ReplyHeader {
    pub fn kind(&self) -> FrameKind {
        match self.xid {
            WATCH_EVENT_XID => FrameKind::WatchEvent,
            PING_XID => FrameKind::PingAck,
            AUTH_XID => FrameKind::AuthReply,
            _ => FrameKind::Reply,
        }
    }
}

pub fn decode_reply_header(
    buf: &mut impl Buf
) -> Result<ReplyHeader, ProtoError> {
    Ok(ReplyHeader {
        xid: wire::read_i32(buf)?,
        zxid: wire::read_i64(buf)?,
        err: wire::read_i32(buf)?,
    })
}

/// Node metadata returned alongside data and children listings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Stat {
    pub czxid: i64,
    pub mzxid: i64,
    pub ctime: i64,
    pub mtime: i64,
    pub version: i32,
    pub cversion: i32,
    pub aversion: i32,
    pub ephemeral_owner: i64,
    pub data_length: i32,
    pub num_children: i32,
    pub pzxid: i64,
}

pub fn decode_stat(buf: &mut impl Buf) -> Result<Stat, ProtoError> {
    Ok(Stat {
        czxid: wire::read_i64(buf)?,
        mzxid: wire::read_i64(buf)?,
        ctime: wire::read_i64(buf)?,
        mtime: wire::read_i64(buf)?,
        version: wire::read_i32(buf)?,
        cversion: wire::read_i32(buf)?,
        aversion: wire::read_i32(buf)?,
        ephemeral_owner: wire::read_i64(buf)?,
        data_length: wire::read_i32(buf)?,
        num_children: wire::read_i32(buf)?,
        pzxid: wire::read_i64(buf)?,
    })
}

/// Decoded success payload of a correlated reply, shaped per opcode.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Response {
    Created { path: String },
    Deleted,
    Data { data: Vec<u8>, stat: Stat },
    Stat(Stat),
    Acls { acls: Vec<Acl>, stat: Stat },
    Children(Vec<String>),
    ChildrenStat { children: Vec<String>, stat: Stat },
}

/// Decodes the body that follows a zero-error reply header.
///
/// The opcode must be the one saved when the request was submitted; the wire
/// carries no per-reply type information.
pub fn decode_body(
    op: OpCode,
    buf: &mut impl Buf,
) -> Result<Response, ProtoError> {
    match op {
        OpCode::Create => {
            Ok(Response::Created { path: wire::read_string(buf)? })
        }
        OpCode::Delete => Ok(Response::Deleted),
        OpCode::GetData => {
            let data = wire::read_buffer(buf)?;
            let stat = decode_stat(buf)?;
            Ok(Response::Data { data, stat })
        }
        OpCode::SetData | OpCode::SetAcl => {
            Ok(Response::Stat(decode_stat(buf)?))
        }
        OpCode::GetAcl => {
            let acls = read_acls(buf)?;
            let stat = decode_stat(buf)?;
            Ok(Response::Acls { acls, stat })
        }
        OpCode::GetChildren => {
            Ok(Response::Children(wire::read_string_list(buf)?))
        }
        OpCode::GetChildren2 => {
            let children = wire::read_string_list(buf)?;
            let stat = decode_stat(buf)?;
            Ok(Response::ChildrenStat { children, stat })
        }
        OpCode::Ping | OpCode::Auth => {
            Err(ProtoError::UnexpectedOpcode(op.wire()))
        }
    }
}

fn read_acls(buf: &mut impl Buf) -> Result<Vec<Acl>, ProtoError> {
    let count = wire::read_i32(buf)?;
    if count < 0 || (count as usize).saturating_mul(12) > buf.remaining() {
        return Err(ProtoError::BadLength(count));
    }
    let mut acls = Vec::with_capacity(count as usize);
    for _ in 0..count {
        let perms = Perms::from_bits_retain(wire::read_u32(buf)?);
        let scheme = wire::read_string(buf)?;
        let id = wire::read_string(buf)?;
        acls.push(Acl { perms, scheme, id });
    }
    Ok(acls)
}

/// Connection state reported inside watch events.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeeperState {
    Disconnected,
    Connected,
    Expired,
    AuthFailed,
    Other(i32),
}

impl KeeperState {
    pub fn from_wire(code: i32) -> Self {
        match code {
            0 => Self::Disconnected,
            3 => Self::Connected,
            4 => Self::AuthFailed,
            -112 => Self::Expired,
            other => Self::Other(other),
        }
    }
}

/// What changed on the node a watch event refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventKind {
    Created,
    Deleted,
    DataChanged,
    ChildrenChanged,
    Other(i32),
}

impl EventKind {
    pub fn from_wire(code: i32) -> Self {
        match code {
            1 => Self::Created,
            2 => Self::Deleted,
            3 => Self::DataChanged,
            4 => Self::ChildrenChanged,
            other => Self::Other(other),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WatchEvent {
    pub kind: EventKind,
    pub state: KeeperState,
    pub path: String,
}

/// Decodes the body of an xid −1 frame.
pub fn decode_watch_event(
    buf: &mut impl Buf
) -> Result<WatchEvent, ProtoError> {
    let kind = EventKind::from_wire(wire::read_i32(buf)?);
    let state = KeeperState::from_wire(wire::read_i32(buf)?);
    let path = wire::read_string(buf)?;
    Ok(WatchEvent { kind, state, path })
}

pub const CONNECT_REPLY_LEN: usize = 36;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectReply {
    pub protocol_version: i32,
    pub timeout_ms: i32,
    pub session_id: i64,
    pub passwd: [u8; 16],
}

/// Decodes the 36-byte session handshake reply.
pub fn decode_connect_reply(frame: &[u8]) -> Result<ConnectReply, ProtoError> {
    if frame.len() != CONNECT_REPLY_LEN {
        return Err(ProtoError::BadConnectReply {
            expected: CONNECT_REPLY_LEN,
            got: frame.len(),
        });
    }

    let mut buf = frame;
    let protocol_version = wire::read_i32(&mut buf)?;
    let timeout_ms = wire::read_i32(&mut buf)?;
    let session_id = wire::read_i64(&mut buf)?;
    let passwd_len = wire::read_i32(&mut buf)?;
    if passwd_len != 16 {
        return Err(ProtoError::BadLength(passwd_len));
    }
    let mut passwd = [0_u8; 16];
    buf.copy_to_slice(&mut passwd);

    Ok(ConnectReply { protocol_version, timeout_ms, session_id, passwd })
}
