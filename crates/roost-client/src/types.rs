use std::fmt;
use std::time::Duration;

use roost_proto::{KeeperState, Response};
use tokio::sync::mpsc;

use crate::error::Error;

/// One entry of the configured server list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerSpec {
    pub host: String,
    pub port: u16,
    /// Session timeout requested at handshake, in milliseconds.
    pub timeout_ms: i32,
}

impl ServerSpec {
    pub fn new(
        host: impl Into<String>,
        port: u16,
        timeout_ms: i32,
    ) -> Self {
        Self { host: host.into(), port, timeout_ms }
    }
}

impl fmt::Display for ServerSpec {
    fn fmt(
        &self,
        f: &mut fmt::Formatter<'_>,
    ) -> fmt::Result {
        write!(f, "{}:{}", self.host, self.port)
    }
}

#[derive(Debug, Clone)]
pub struct ConnectOptions {
    /// Heartbeat period. Clamped down when the negotiated session timeout
    /// requires a shorter one.
    pub heartbeat_interval: Duration,
    pub connect_timeout: Duration,
}

impl Default for ConnectOptions {
    fn default() -> Self {
        Self {
            heartbeat_interval: Duration::from_secs(10),
            connect_timeout: Duration::from_secs(5),
        }
    }
}

/// Which server-side watch table a subscription lands in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum WatchKind {
    Data,
    Child,
    /// Reserved; no operation currently registers exist watches.
    Exist,
}

impl fmt::Display for WatchKind {
    fn fmt(
        &self,
        f: &mut fmt::Formatter<'_>,
    ) -> fmt::Result {
        f.write_str(match self {
            Self::Data => "data",
            Self::Child => "child",
            Self::Exist => "exist",
        })
    }
}

/// Read operation that can leave a watch behind.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WatchRead {
    Get,
    Ls,
    Ls2,
}

impl WatchRead {
    pub fn kind(self) -> WatchKind {
        match self {
            Self::Get => WatchKind::Data,
            Self::Ls | Self::Ls2 => WatchKind::Child,
        }
    }
}

/// Message delivered to a watch subscriber endpoint.
#[derive(Debug)]
pub enum WatchNotice {
    /// The server-side watch fired. Sent exactly once per subscription.
    Fired {
        payload: u64,
        path: String,
        kind: WatchKind,
        state: KeeperState,
    },
    /// The session died before the watch fired.
    Lost {
        payload: u64,
        path: String,
        kind: WatchKind,
    },
}

/// Non-blocking reply, tagged with the caller-chosen token.
#[derive(Debug)]
pub struct TaggedReply {
    pub tag: u64,
    pub result: Result<Response, Error>,
}

pub type ReplySink = mpsc::UnboundedSender<TaggedReply>;
pub type WatchSink = mpsc::UnboundedSender<WatchNotice>;
