//! The per-session connection engine.
//!
//! One task owns the session state and the read half of the socket; a
//! single `select!` loop merges API commands, inbound frames, heartbeat
//! ticks, and writer failures, so no state needs locking. The write half
//! lives on a companion task behind a bounded queue: the engine loop never
//! awaits the transport, so a stalled peer cannot starve the heartbeat.

use std::time::Duration;

use bytes::Bytes;
use futures_util::{SinkExt, StreamExt};
use roost_proto::{
    EventKind, FrameKind, OpCode, ReplyHeader, Request, ServerErrorKind,
    decode_body, decode_reply_header, decode_watch_event, encode_auth,
    encode_ping,
};
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::sync::mpsc::error::TrySendError;
use tokio::sync::{mpsc, oneshot};
use tokio::time::{Instant, interval_at};
use tokio_util::codec::{FramedRead, FramedWrite, LengthDelimitedCodec};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::error::Error;
use crate::pending::{Completion, PendingTable};
use crate::types::{WatchKind, WatchNotice, WatchRead, WatchSink};
use crate::watches::{WatchRegistry, WatchSubscriber};

pub(crate) type FrameReader = FramedRead<OwnedReadHalf, LengthDelimitedCodec>;
pub(crate) type FrameWriter = FramedWrite<OwnedWriteHalf, LengthDelimitedCodec>;

/// Outbound frames queued towards the writer task before the engine treats
/// the transport as stalled and kills the session.
const OUTBOUND_QUEUE: usize = 1024;

/// Owns the write half on its own task so a blocked socket backpressures
/// into the bounded queue instead of suspending the engine loop.
async fn run_writer(
    mut writer: FrameWriter,
    mut outbound: mpsc::Receiver<Bytes>,
    failed: oneshot::Sender<String>,
) {
    while let Some(frame) = outbound.recv().await {
        if let Err(err) = writer.send(frame).await {
            let _ = failed.send(format!("socket write failed: {err}"));
            return;
        }
    }
}

pub(crate) enum Command {
    Request {
        req: Request,
        completion: Completion,
    },
    Watch {
        read: WatchRead,
        path: String,
        sink: WatchSink,
        payload: u64,
        completion: Completion,
    },
    AddAuth {
        scheme: String,
        auth: Vec<u8>,
        reply: oneshot::Sender<Result<(), Error>>,
    },
    Iterations {
        reply: oneshot::Sender<i32>,
    },
    Die {
        reason: String,
    },
}

pub(crate) struct Engine {
    id: Uuid,
    endpoint: String,
    session_id: i64,
    heartbeat_interval: Duration,
    outbound: mpsc::Sender<Bytes>,
    pending: PendingTable,
    watches: WatchRegistry,
    auth_pending: Option<oneshot::Sender<Result<(), Error>>>,
    outstanding_pings: u8,
}

impl Engine {
    fn new(
        id: Uuid,
        endpoint: String,
        session_id: i64,
        heartbeat_interval: Duration,
        outbound: mpsc::Sender<Bytes>,
    ) -> Self {
        Self {
            id,
            endpoint,
            session_id,
            heartbeat_interval,
            outbound,
            pending: PendingTable::new(),
            watches: WatchRegistry::new(),
            auth_pending: None,
            outstanding_pings: 0,
        }
    }

    /// Spawns the writer and engine tasks for an established session and
    /// returns the command handle.
    pub(crate) fn spawn(
        id: Uuid,
        endpoint: String,
        session_id: i64,
        heartbeat_interval: Duration,
        reader: FrameReader,
        writer: FrameWriter,
    ) -> mpsc::UnboundedSender<Command> {
        let (outbound_tx, outbound_rx) = mpsc::channel(OUTBOUND_QUEUE);
        let (failed_tx, failed_rx) = oneshot::channel();
        tokio::spawn(run_writer(writer, outbound_rx, failed_tx));

        let (tx, rx) = mpsc::unbounded_channel();
        let engine =
            Self::new(id, endpoint, session_id, heartbeat_interval, outbound_tx);
        tokio::spawn(engine.run(reader, rx, failed_rx));
        tx
    }

    /// Serves the session until something kills it, then drains all
    /// outstanding state.
    async fn run(
        mut self,
        mut reader: FrameReader,
        mut commands: mpsc::UnboundedReceiver<Command>,
        mut writer_failed: oneshot::Receiver<String>,
    ) {
        let mut heartbeat = interval_at(
            Instant::now() + self.heartbeat_interval,
            self.heartbeat_interval,
        );

        let reason = loop {
            tokio::select! {
                maybe_cmd = commands.recv() => {
                    let Some(cmd) = maybe_cmd else {
                        break "all session handles dropped".to_string();
                    };
                    if let Err(reason) = self.handle_command(cmd) {
                        break reason;
                    }
                }
                maybe_frame = reader.next() => {
                    match maybe_frame {
                        None => break "connection closed by server".to_string(),
                        Some(Err(err)) => {
                            break format!("socket read failed: {err}");
                        }
                        Some(Ok(frame)) => {
                            if let Err(reason) =
                                self.handle_frame(frame.freeze())
                            {
                                break reason;
                            }
                        }
                    }
                }
                _ = heartbeat.tick() => {
                    if self.outstanding_pings > 0 {
                        break "heartattack".to_string();
                    }
                    self.outstanding_pings = 1;
                    debug!(
                        "heartbeat sent: id={}, session_id={:#x}",
                        self.id, self.session_id
                    );
                    if let Err(reason) = self.send_frame(encode_ping()) {
                        break reason;
                    }
                }
                failure = &mut writer_failed => {
                    break failure
                        .unwrap_or_else(|_| "socket writer stopped".to_string());
                }
            }
        };

        self.terminate(&reason);
    }

    fn handle_command(
        &mut self,
        cmd: Command,
    ) -> Result<(), String> {
        match cmd {
            Command::Request { req, completion } => {
                self.submit(req, completion)
            }
            Command::Watch { read, path, sink, payload, completion } => {
                let kind = read.kind();
                let arm = self.watches.subscribe(
                    kind,
                    &path,
                    WatchSubscriber { sink, payload },
                );
                debug!(
                    "watch subscriber registered: kind={kind}, path={path}, arm={arm}"
                );
                // the server holds one watch per (session, path, kind);
                // only the first local subscriber asks it to install one
                let req = match read {
                    WatchRead::Get => Request::GetData { path, watch: arm },
                    WatchRead::Ls => {
                        Request::GetChildren { path, watch: arm }
                    }
                    WatchRead::Ls2 => {
                        Request::GetChildren2 { path, watch: arm }
                    }
                };
                self.submit(req, completion)
            }
            Command::AddAuth { scheme, auth, reply } => {
                if self.auth_pending.is_some() {
                    let _ = reply.send(Err(Error::AuthInProgress));
                    return Ok(());
                }
                let frame = encode_auth(&scheme, &auth);
                self.auth_pending = Some(reply);
                debug!("auth submitted: id={}, scheme={scheme}", self.id);
                self.send_frame(frame)
            }
            Command::Iterations { reply } => {
                let _ = reply.send(self.pending.iterations());
                Ok(())
            }
            Command::Die { reason } => Err(reason),
        }
    }

    fn submit(
        &mut self,
        req: Request,
        completion: Completion,
    ) -> Result<(), String> {
        let op = req.opcode();
        let path = req.path().to_string();
        // the pending entry must exist before the frame reaches the wire
        let xid = self.pending.insert(op, path, completion);
        let frame = req.encode(xid);
        debug!(
            "request submitted: id={}, xid={xid}, op={op}, path={}",
            self.id,
            req.path()
        );
        self.send_frame(frame)
    }

    /// Enqueues a frame for the writer task. Never suspends the engine
    /// loop: a full queue means the transport has stalled and the session
    /// is failed instead.
    fn send_frame(
        &mut self,
        frame: Bytes,
    ) -> Result<(), String> {
        match self.outbound.try_send(frame) {
            Ok(()) => Ok(()),
            Err(TrySendError::Full(_)) => Err(format!(
                "transport stalled: outbound queue full ({OUTBOUND_QUEUE} frames)"
            )),
            Err(TrySendError::Closed(_)) => {
                Err("socket writer gone".to_string())
            }
        }
    }

    fn handle_frame(
        &mut self,
        frame: Bytes,
    ) -> Result<(), String> {
        let mut buf = frame;
        let header = decode_reply_header(&mut buf)
            .map_err(|err| format!("malformed frame: {err}"))?;

        match header.kind() {
            FrameKind::PingAck => {
                // a stray ack with no ping outstanding is tolerated
                self.outstanding_pings = self.outstanding_pings.saturating_sub(1);
                Ok(())
            }
            FrameKind::WatchEvent => self.dispatch_watch_event(&mut buf),
            FrameKind::AuthReply => {
                self.finish_auth(header.err);
                Ok(())
            }
            FrameKind::Reply => self.finish_request(header, &mut buf),
        }
    }

    fn finish_request(
        &mut self,
        header: ReplyHeader,
        buf: &mut Bytes,
    ) -> Result<(), String> {
        let Some(entry) = self.pending.remove(header.xid) else {
            return Err(format!("reply for unknown xid {}", header.xid));
        };

        if header.err != 0 {
            entry.completion.deliver(Err(Error::from_wire(header.err)));
            return Ok(());
        }

        match decode_body(entry.op, buf) {
            Ok(response) => {
                entry.completion.deliver(Ok(response));
                Ok(())
            }
            Err(err) => {
                entry.completion.deliver(Err(Error::ConnectionLost {
                    op: entry.op,
                    path: entry.path,
                }));
                Err(format!(
                    "malformed reply body for xid {}: {err}",
                    header.xid
                ))
            }
        }
    }

    fn dispatch_watch_event(
        &mut self,
        buf: &mut Bytes,
    ) -> Result<(), String> {
        let event = decode_watch_event(buf)
            .map_err(|err| format!("malformed watch event: {err}"))?;

        let kind = match event.kind {
            EventKind::ChildrenChanged => WatchKind::Child,
            EventKind::Created
            | EventKind::Deleted
            | EventKind::DataChanged => WatchKind::Data,
            EventKind::Other(code) => {
                warn!(
                    "watch event with unknown type ignored: type={code}, path={}",
                    event.path
                );
                return Ok(());
            }
        };

        // the server watch is one-shot: clear the key atomically with dispatch
        let subscribers = self.watches.fire(kind, &event.path);
        debug!(
            "watch event dispatched: kind={kind}, path={}, subscribers={}",
            event.path,
            subscribers.len()
        );
        for sub in subscribers {
            let _ = sub.sink.send(WatchNotice::Fired {
                payload: sub.payload,
                path: event.path.clone(),
                kind,
                state: event.state,
            });
        }
        Ok(())
    }

    fn finish_auth(
        &mut self,
        err: i32,
    ) {
        let Some(waiter) = self.auth_pending.take() else {
            warn!(
                "auth reply with no auth in flight: session_id={:#x}",
                self.session_id
            );
            return;
        };
        let result = match err {
            0 => Ok(()),
            code if code == ServerErrorKind::AuthFailed.code() => {
                Err(Error::AuthFailed)
            }
            code => Err(Error::Unknown(code)),
        };
        let _ = waiter.send(result);
    }

    /// Drains the watch registry, then the pending table and auth slot.
    /// Every subscriber and completion observes exactly one terminal
    /// notification, watches first.
    fn terminate(
        mut self,
        reason: &str,
    ) {
        info!(
            "connection engine terminating: id={}, endpoint={}, session_id={:#x}, reason={reason}, pending={}, watches={}",
            self.id,
            self.endpoint,
            self.session_id,
            self.pending.len(),
            self.watches.len()
        );

        for ((kind, path), subscribers) in self.watches.drain() {
            for sub in subscribers {
                let _ = sub.sink.send(WatchNotice::Lost {
                    payload: sub.payload,
                    path: path.clone(),
                    kind,
                });
            }
        }

        for entry in self.pending.drain() {
            entry.completion.deliver(Err(Error::ConnectionLost {
                op: entry.op,
                path: entry.path,
            }));
        }
        if let Some(waiter) = self.auth_pending.take() {
            let _ = waiter.send(Err(Error::ConnectionLost {
                op: OpCode::Auth,
                path: String::new(),
            }));
        }
        // dropping the outbound sender lets the writer task drain and exit,
        // closing the write half of the socket
    }
}
