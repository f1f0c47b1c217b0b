//! Public session handle and the connect/handshake path.

use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use rand::seq::IndexedRandom;
use roost_proto::{
    Acl, CreateFlags, Request, Response, Stat, decode_connect_reply,
    encode_connect, frame_codec,
};
use tokio::net::TcpStream;
use tokio::sync::{mpsc, oneshot};
use tokio::time::timeout;
use tokio_util::codec::{FramedRead, FramedWrite};
use tracing::info;
use uuid::Uuid;

use crate::engine::{Command, Engine};
use crate::error::Error;
use crate::pending::Completion;
use crate::types::{
    ConnectOptions, ReplySink, ServerSpec, WatchRead, WatchSink,
};

/// Cloneable handle to one connection engine.
///
/// Dropping every clone terminates the engine; outstanding requests and
/// watches are failed the same way as on session loss.
#[derive(Clone, Debug)]
pub struct Connection {
    id: Uuid,
    session_id: i64,
    tx: mpsc::UnboundedSender<Command>,
}

impl Connection {
    /// Connects to one server chosen uniformly from the list and performs
    /// the session handshake.
    pub async fn connect(servers: &[ServerSpec]) -> Result<Self, Error> {
        Self::connect_with(servers, ConnectOptions::default()).await
    }

    pub async fn connect_with(
        servers: &[ServerSpec],
        options: ConnectOptions,
    ) -> Result<Self, Error> {
        let server = servers.choose(&mut rand::rng()).ok_or(Error::NoServers)?;
        let endpoint = format!("{}:{}", server.host, server.port);

        let stream =
            timeout(options.connect_timeout, TcpStream::connect(&endpoint))
                .await
                .map_err(|_| Error::ConnectTimeout(options.connect_timeout))??;
        stream.set_nodelay(true).ok();

        let (read_half, write_half) = stream.into_split();
        let mut reader = FramedRead::new(read_half, frame_codec());
        let mut writer = FramedWrite::new(write_half, frame_codec());

        // a peer may accept the connection and then go silent; the
        // handshake exchange gets the same deadline as the connect
        let frame = timeout(options.connect_timeout, async {
            writer.send(encode_connect(server.timeout_ms)).await?;
            reader
                .next()
                .await
                .ok_or(Error::HandshakeClosed)?
                .map_err(Error::from)
        })
        .await
        .map_err(|_| Error::HandshakeTimeout(options.connect_timeout))??;
        let reply = decode_connect_reply(&frame)?;
        if reply.timeout_ms <= 0 || reply.session_id == 0 {
            return Err(Error::SessionRefused);
        }

        let negotiated = Duration::from_millis(reply.timeout_ms as u64);
        // the heartbeat period must stay strictly under half the negotiated
        // session timeout
        let heartbeat = options.heartbeat_interval.min(negotiated / 3);

        let id = Uuid::now_v7();
        info!(
            "session established: id={id}, endpoint={endpoint}, session_id={:#x}, negotiated_timeout={}ms, heartbeat={}ms",
            reply.session_id,
            reply.timeout_ms,
            heartbeat.as_millis()
        );

        let tx = Engine::spawn(
            id,
            endpoint,
            reply.session_id,
            heartbeat,
            reader,
            writer,
        );

        Ok(Self { id, session_id: reply.session_id, tx })
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn session_id(&self) -> i64 {
        self.session_id
    }

    /// Submits a request and suspends until its reply arrives.
    pub async fn call(
        &self,
        req: Request,
    ) -> Result<Response, Error> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.send(Command::Request {
            req,
            completion: Completion::Caller(reply_tx),
        })?;
        reply_rx.await.map_err(|_| Error::EngineGone)?
    }

    /// Submits a request without waiting; the tagged result is delivered to
    /// `sink` when the reply arrives.
    pub fn cast(
        &self,
        req: Request,
        sink: ReplySink,
        tag: u64,
    ) -> Result<(), Error> {
        self.send(Command::Request {
            req,
            completion: Completion::Sink { tx: sink, tag },
        })
    }

    pub async fn create(
        &self,
        path: &str,
        data: &[u8],
        flags: CreateFlags,
        acls: Vec<Acl>,
    ) -> Result<String, Error> {
        let req = Request::Create {
            path: path.to_string(),
            data: data.to_vec(),
            flags,
            acls,
        };
        match self.call(req).await? {
            Response::Created { path } => Ok(path),
            _ => unreachable!("create decodes to Created"),
        }
    }

    pub async fn delete(
        &self,
        path: &str,
    ) -> Result<(), Error> {
        match self.call(Request::Delete { path: path.to_string() }).await? {
            Response::Deleted => Ok(()),
            _ => unreachable!("delete decodes to Deleted"),
        }
    }

    pub async fn get(
        &self,
        path: &str,
    ) -> Result<(Vec<u8>, Stat), Error> {
        let req = Request::GetData { path: path.to_string(), watch: false };
        match self.call(req).await? {
            Response::Data { data, stat } => Ok((data, stat)),
            _ => unreachable!("get_data decodes to Data"),
        }
    }

    pub async fn set(
        &self,
        path: &str,
        data: &[u8],
    ) -> Result<Stat, Error> {
        let req = Request::SetData {
            path: path.to_string(),
            data: data.to_vec(),
        };
        match self.call(req).await? {
            Response::Stat(stat) => Ok(stat),
            _ => unreachable!("set_data decodes to Stat"),
        }
    }

    pub async fn get_acl(
        &self,
        path: &str,
    ) -> Result<(Vec<Acl>, Stat), Error> {
        match self.call(Request::GetAcl { path: path.to_string() }).await? {
            Response::Acls { acls, stat } => Ok((acls, stat)),
            _ => unreachable!("get_acl decodes to Acls"),
        }
    }

    pub async fn set_acl(
        &self,
        path: &str,
        acls: Vec<Acl>,
    ) -> Result<Stat, Error> {
        let req = Request::SetAcl { path: path.to_string(), acls };
        match self.call(req).await? {
            Response::Stat(stat) => Ok(stat),
            _ => unreachable!("set_acl decodes to Stat"),
        }
    }

    /// Lists children without node metadata.
    pub async fn ls(
        &self,
        path: &str,
    ) -> Result<Vec<String>, Error> {
        let req =
            Request::GetChildren { path: path.to_string(), watch: false };
        match self.call(req).await? {
            Response::Children(children) => Ok(children),
            _ => unreachable!("get_children decodes to Children"),
        }
    }

    /// Lists children together with the parent's stat.
    pub async fn ls2(
        &self,
        path: &str,
    ) -> Result<(Vec<String>, Stat), Error> {
        let req =
            Request::GetChildren2 { path: path.to_string(), watch: false };
        match self.call(req).await? {
            Response::ChildrenStat { children, stat } => Ok((children, stat)),
            _ => unreachable!("get_children2 decodes to ChildrenStat"),
        }
    }

    /// Reads data and subscribes to the node's data watch. The sink receives
    /// exactly one `Fired` or `Lost` notice for this subscription.
    pub async fn get_w(
        &self,
        path: &str,
        sink: WatchSink,
        payload: u64,
    ) -> Result<(Vec<u8>, Stat), Error> {
        match self.call_w(WatchRead::Get, path, sink, payload).await? {
            Response::Data { data, stat } => Ok((data, stat)),
            _ => unreachable!("get_data decodes to Data"),
        }
    }

    /// Lists children and subscribes to the node's child watch.
    pub async fn ls_w(
        &self,
        path: &str,
        sink: WatchSink,
        payload: u64,
    ) -> Result<Vec<String>, Error> {
        match self.call_w(WatchRead::Ls, path, sink, payload).await? {
            Response::Children(children) => Ok(children),
            _ => unreachable!("get_children decodes to Children"),
        }
    }

    pub async fn ls2_w(
        &self,
        path: &str,
        sink: WatchSink,
        payload: u64,
    ) -> Result<(Vec<String>, Stat), Error> {
        match self.call_w(WatchRead::Ls2, path, sink, payload).await? {
            Response::ChildrenStat { children, stat } => Ok((children, stat)),
            _ => unreachable!("get_children2 decodes to ChildrenStat"),
        }
    }

    async fn call_w(
        &self,
        read: WatchRead,
        path: &str,
        sink: WatchSink,
        payload: u64,
    ) -> Result<Response, Error> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.send(Command::Watch {
            read,
            path: path.to_string(),
            sink,
            payload,
            completion: Completion::Caller(reply_tx),
        })?;
        reply_rx.await.map_err(|_| Error::EngineGone)?
    }

    /// Watch-setting read in non-blocking mode: the read result goes to
    /// `reply_sink` tagged with `tag`, watch notices to `watch_sink`.
    pub fn cast_w(
        &self,
        read: WatchRead,
        path: &str,
        watch_sink: WatchSink,
        payload: u64,
        reply_sink: ReplySink,
        tag: u64,
    ) -> Result<(), Error> {
        self.send(Command::Watch {
            read,
            path: path.to_string(),
            sink: watch_sink,
            payload,
            completion: Completion::Sink { tx: reply_sink, tag },
        })
    }

    /// Authenticates the session. At most one auth request may be in flight;
    /// a second one fails immediately with `AuthInProgress`.
    pub async fn add_auth(
        &self,
        scheme: &str,
        auth: &[u8],
    ) -> Result<(), Error> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.send(Command::AddAuth {
            scheme: scheme.to_string(),
            auth: auth.to_vec(),
            reply: reply_tx,
        })?;
        reply_rx.await.map_err(|_| Error::EngineGone)?
    }

    /// The xid the next logical request will be assigned.
    pub async fn iterations(&self) -> Result<i32, Error> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.send(Command::Iterations { reply: reply_tx })?;
        reply_rx.await.map_err(|_| Error::EngineGone)
    }

    /// Terminates the engine. Outstanding requests fail with
    /// `ConnectionLost` and watch subscribers receive `Lost` notices.
    pub fn die(
        &self,
        reason: impl Into<String>,
    ) {
        let _ = self.tx.send(Command::Die { reason: reason.into() });
    }

    fn send(
        &self,
        cmd: Command,
    ) -> Result<(), Error> {
        self.tx.send(cmd).map_err(|_| Error::EngineGone)
    }
}
