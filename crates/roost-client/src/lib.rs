//! Client core for a ZooKeeper-compatible coordination service.
//!
//! One [`Connection`] owns one session: a single framed TCP stream onto
//! which many concurrent logical requests are multiplexed. Replies are
//! correlated back to their callers by xid, server-pushed watch events are
//! dispatched to locally registered subscribers, and periodic heartbeats
//! keep the session alive. Session loss is terminal: every outstanding
//! request fails, every watch subscriber is told, and a fresh connection
//! replaces the dead one.
//!
//! [`ConnectionManager`] sits above connections and ties each one to a set
//! of external liveness tokens, tearing the connection down when any token
//! is cancelled.

mod connection;
mod engine;
mod error;
mod manager;
mod pending;
pub mod recipes;
#[cfg(test)]
mod testpeer;
mod types;
mod watches;

pub use connection::Connection;
pub use error::Error;
pub use manager::ConnectionManager;
pub use roost_proto::{
    Acl, CreateFlags, EventKind, KeeperState, OpCode, Perms, ProtoError,
    Request, Response, ServerErrorKind, Stat,
};
pub use types::{
    ConnectOptions, ReplySink, ServerSpec, TaggedReply, WatchKind,
    WatchNotice, WatchRead, WatchSink,
};
