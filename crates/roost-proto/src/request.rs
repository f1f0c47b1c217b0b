//! Client-to-server request encoding.
//!
//! `Request::encode` produces the full frame body (everything after the
//! 4-byte length prefix): `xid | opcode | payload`.

use std::fmt;

use bitflags::bitflags;
use bytes::{BufMut, Bytes, BytesMut};

use crate::AUTH_XID;
use crate::wire;

/// Version argument for delete/set requests; matches any node version.
const ANY_VERSION: i32 = -1;

bitflags! {
    /// Node permission bits carried in ACL entries.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct Perms: u32 {
        const READ = 1;
        const WRITE = 1 << 1;
        const CREATE = 1 << 2;
        const DELETE = 1 << 3;
        const ADMIN = 1 << 4;
    }
}

bitflags! {
    /// Create mode flags: plain, ephemeral, sequential, or both.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct CreateFlags: i32 {
        const EPHEMERAL = 1;
        const SEQUENTIAL = 1 << 1;
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Acl {
    pub perms: Perms,
    pub scheme: String,
    pub id: String,
}

impl Acl {
    pub fn new(
        perms: Perms,
        scheme: impl Into<String>,
        id: impl Into<String>,
    ) -> Self {
        Self { perms, scheme: scheme.into(), id: id.into() }
    }

    /// The `world:anyone` ACL with all permission bits set.
    pub fn open_unsafe() -> Self {
        Self::new(Perms::all(), "world", "anyone")
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OpCode {
    Create,
    Delete,
    GetData,
    SetData,
    GetAcl,
    SetAcl,
    GetChildren,
    Ping,
    GetChildren2,
    Auth,
}

impl OpCode {
    pub const fn wire(self) -> i32 {
        match self {
            Self::Create => 1,
            Self::Delete => 2,
            Self::GetData => 4,
            Self::SetData => 5,
            Self::GetAcl => 6,
            Self::SetAcl => 7,
            Self::GetChildren => 8,
            Self::Ping => 11,
            Self::GetChildren2 => 12,
            Self::Auth => 100,
        }
    }
}

impl fmt::Display for OpCode {
    fn fmt(
        &self,
        f: &mut fmt::Formatter<'_>,
    ) -> fmt::Result {
        let name = match self {
            Self::Create => "create",
            Self::Delete => "delete",
            Self::GetData => "get_data",
            Self::SetData => "set_data",
            Self::GetAcl => "get_acl",
            Self::SetAcl => "set_acl",
            Self::GetChildren => "get_children",
            Self::Ping => "ping",
            Self::GetChildren2 => "get_children2",
            Self::Auth => "auth",
        };
        f.write_str(name)
    }
}

/// A logical client request.
///
/// Read operations carry a `watch` flag; the same opcode is used for the
/// watching and non-watching variant, distinguished only by the trailing
/// boolean in the payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Request {
    Create {
        path: String,
        data: Vec<u8>,
        flags: CreateFlags,
        acls: Vec<Acl>,
    },
    Delete {
        path: String,
    },
    GetData {
        path: String,
        watch: bool,
    },
    SetData {
        path: String,
        data: Vec<u8>,
    },
    GetAcl {
        path: String,
    },
    SetAcl {
        path: String,
        acls: Vec<Acl>,
    },
    GetChildren {
        path: String,
        watch: bool,
    },
    GetChildren2 {
        path: String,
        watch: bool,
    },
}

impl Request {
    pub fn opcode(&self) -> OpCode {
        match self {
            Self::Create { .. } => OpCode::Create,
            Self::Delete { .. } => OpCode::Delete,
            Self::GetData { .. } => OpCode::GetData,
            Self::SetData { .. } => OpCode::SetData,
            Self::GetAcl { .. } => OpCode::GetAcl,
            Self::SetAcl { .. } => OpCode::SetAcl,
            Self::GetChildren { .. } => OpCode::GetChildren,
            Self::GetChildren2 { .. } => OpCode::GetChildren2,
        }
    }

    pub fn path(&self) -> &str {
        match self {
            Self::Create { path, .. }
            | Self::Delete { path }
            | Self::GetData { path, .. }
            | Self::SetData { path, .. }
            | Self::GetAcl { path }
            | Self::SetAcl { path, .. }
            | Self::GetChildren { path, .. }
            | Self::GetChildren2 { path, .. } => path,
        }
    }

    /// Encodes the frame body for this request under the given xid.
    pub fn encode(&self, xid: i32) -> Bytes {
        let mut buf = BytesMut::with_capacity(64 + self.path().len());
        buf.put_i32(xid);
        buf.put_i32(self.opcode().wire());

        match self {
            Self::Create { path, data, flags, acls } => {
                wire::write_string(&mut buf, path);
                wire::write_buffer(&mut buf, data);
                write_acls(&mut buf, acls);
                buf.put_i32(flags.bits());
            }
            Self::Delete { path } => {
                wire::write_string(&mut buf, path);
                buf.put_i32(ANY_VERSION);
            }
            Self::GetData { path, watch } => {
                wire::write_string(&mut buf, path);
                buf.put_u8(*watch as u8);
            }
            Self::SetData { path, data } => {
                wire::write_string(&mut buf, path);
                wire::write_buffer(&mut buf, data);
                buf.put_i32(ANY_VERSION);
            }
            Self::GetAcl { path } => {
                wire::write_string(&mut buf, path);
            }
            Self::SetAcl { path, acls } => {
                wire::write_string(&mut buf, path);
                write_acls(&mut buf, acls);
                buf.put_i32(ANY_VERSION);
            }
            Self::GetChildren { path, watch }
            | Self::GetChildren2 { path, watch } => {
                wire::write_string(&mut buf, path);
                buf.put_u8(*watch as u8);
            }
        }

        buf.freeze()
    }
}

fn write_acls(
    buf: &mut BytesMut,
    acls: &[Acl],
) {
    buf.put_i32(acls.len() as i32);
    for acl in acls {
        buf.put_u32(acl.perms.bits());
        wire::write_string(buf, &acl.scheme);
        wire::write_string(buf, &acl.id);
    }
}

/// Encodes the 44-byte session handshake request.
pub fn encode_connect(wanted_timeout_ms: i32) -> Bytes {
    let mut buf = BytesMut::with_capacity(44);
    buf.put_i32(0); // protocol version
    buf.put_i64(0); // last seen zxid
    buf.put_i32(wanted_timeout_ms);
    buf.put_i64(0); // session id, zero requests a fresh session
    wire::write_buffer(&mut buf, &[0_u8; 16]); // password
    buf.freeze()
}

/// The fixed heartbeat frame body: xid −2, opcode 11.
pub const PING_FRAME: [u8; 8] =
    [0xFF, 0xFF, 0xFF, 0xFE, 0x00, 0x00, 0x00, 0x0B];

pub fn encode_ping() -> Bytes {
    Bytes::from_static(&PING_FRAME)
}

/// Encodes an auth request under the fixed auth xid.
pub fn encode_auth(
    scheme: &str,
    auth: &[u8],
) -> Bytes {
    let mut buf = BytesMut::with_capacity(20 + scheme.len() + auth.len());
    buf.put_i32(AUTH_XID);
    buf.put_i32(OpCode::Auth.wire());
    buf.put_i32(0); // auth type
    wire::write_string(&mut buf, scheme);
    wire::write_buffer(&mut buf, auth);
    buf.freeze()
}

#[cfg(test)]
mod tests {
    use bytes::Buf;

    use super::{
        Acl, CreateFlags, OpCode, PING_FRAME, Perms, Request, encode_auth,
        encode_connect, encode_ping,
    };
    use crate::wire;

    #[test]
    fn ping_frame_matches_wire_bytes() {
        let frame = encode_ping();
        assert_eq!(&frame[..], &PING_FRAME);
        let mut buf = frame;
        assert_eq!(buf.get_i32(), crate::PING_XID);
        assert_eq!(buf.get_i32(), OpCode::Ping.wire());
    }

    #[test]
    fn connect_frame_is_44_bytes() {
        let frame = encode_connect(30_000);
        assert_eq!(frame.len(), 44);
        // wanted timeout sits after protocol version and last zxid
        assert_eq!(&frame[12..16], &30_000_i32.to_be_bytes());
        // password length prefix
        assert_eq!(&frame[24..28], &16_i32.to_be_bytes());
    }

    #[test]
    fn create_encodes_path_data_acls_flags() {
        let req = Request::Create {
            path: "/a".to_string(),
            data: b"x".to_vec(),
            flags: CreateFlags::EPHEMERAL | CreateFlags::SEQUENTIAL,
            acls: vec![Acl::open_unsafe()],
        };
        let mut buf = req.encode(7);

        assert_eq!(wire::read_i32(&mut buf).unwrap(), 7);
        assert_eq!(wire::read_i32(&mut buf).unwrap(), OpCode::Create.wire());
        assert_eq!(wire::read_string(&mut buf).unwrap(), "/a");
        assert_eq!(wire::read_buffer(&mut buf).unwrap(), b"x".to_vec());
        assert_eq!(wire::read_i32(&mut buf).unwrap(), 1); // one acl
        assert_eq!(wire::read_u32(&mut buf).unwrap(), Perms::all().bits());
        assert_eq!(wire::read_string(&mut buf).unwrap(), "world");
        assert_eq!(wire::read_string(&mut buf).unwrap(), "anyone");
        assert_eq!(wire::read_i32(&mut buf).unwrap(), 0b11);
        assert_eq!(buf.len(), 0);
    }

    #[test]
    fn watch_flag_is_trailing_byte() {
        let watching =
            Request::GetData { path: "/a".to_string(), watch: true }.encode(1);
        let plain =
            Request::GetData { path: "/a".to_string(), watch: false }.encode(2);
        assert_eq!(watching[watching.len() - 1], 1);
        assert_eq!(plain[plain.len() - 1], 0);
        // identical opcode either way
        assert_eq!(watching[4..8], plain[4..8]);
    }

    #[test]
    fn delete_carries_any_version() {
        let mut buf = Request::Delete { path: "/a".to_string() }.encode(3);
        wire::read_i32(&mut buf).unwrap();
        wire::read_i32(&mut buf).unwrap();
        wire::read_string(&mut buf).unwrap();
        assert_eq!(wire::read_i32(&mut buf).unwrap(), -1);
    }

    #[test]
    fn auth_frame_uses_fixed_xid() {
        let mut buf = encode_auth("digest", b"user:pass");
        assert_eq!(wire::read_i32(&mut buf).unwrap(), -4);
        assert_eq!(wire::read_i32(&mut buf).unwrap(), OpCode::Auth.wire());
        assert_eq!(wire::read_i32(&mut buf).unwrap(), 0);
        assert_eq!(wire::read_string(&mut buf).unwrap(), "digest");
        assert_eq!(wire::read_buffer(&mut buf).unwrap(), b"user:pass".to_vec());
    }
}
