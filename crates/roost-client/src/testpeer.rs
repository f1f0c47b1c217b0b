//! Scripted in-test peer: accepts one framed connection, answers the
//! session handshake, and lets tests read requests and push replies or
//! watch events byte by byte.

use bytes::{Buf, BufMut, Bytes, BytesMut};
use futures_util::{SinkExt, StreamExt};
use roost_proto::{frame_codec, wire};
use tokio::net::{TcpListener, TcpStream};
use tokio_util::codec::{Framed, LengthDelimitedCodec};

use crate::types::ServerSpec;

pub(crate) struct TestPeer {
    listener: TcpListener,
}

impl TestPeer {
    pub(crate) async fn bind() -> (Self, Vec<ServerSpec>) {
        let listener = TcpListener::bind("127.0.0.1:0")
            .await
            .expect("bind test listener");
        let port = listener.local_addr().expect("local addr").port();
        let servers = vec![ServerSpec::new("127.0.0.1", port, 30_000)];
        (Self { listener }, servers)
    }

    pub(crate) async fn accept(self) -> PeerSession {
        self.accept_with(30_000, 0x00C0_FFEE).await
    }

    /// Accepts one connection and answers the 44-byte handshake with the
    /// given negotiated timeout and session id.
    pub(crate) async fn accept_with(
        self,
        negotiated_ms: i32,
        session_id: i64,
    ) -> PeerSession {
        let (stream, _) = self.listener.accept().await.expect("accept");
        let mut framed = Framed::new(stream, frame_codec());

        let connect = framed
            .next()
            .await
            .expect("connect frame")
            .expect("read connect frame");
        assert_eq!(connect.len(), 44, "connect request must be 44 bytes");

        let mut reply = BytesMut::with_capacity(36);
        reply.put_i32(0); // protocol version
        reply.put_i32(negotiated_ms);
        reply.put_i64(session_id);
        reply.put_i32(16);
        reply.put_slice(&[0_u8; 16]);
        framed.send(reply.freeze()).await.expect("handshake reply");

        PeerSession { framed }
    }
}

pub(crate) struct PeerSession {
    framed: Framed<TcpStream, LengthDelimitedCodec>,
}

pub(crate) struct InboundRequest {
    pub xid: i32,
    pub opcode: i32,
    pub body: Bytes,
}

impl PeerSession {
    /// Reads the next request, transparently acking heartbeats.
    pub(crate) async fn recv_request(&mut self) -> InboundRequest {
        loop {
            let req = self.recv_raw().await.expect("request frame");
            if req.xid == roost_proto::PING_XID {
                self.send_reply(roost_proto::PING_XID, 0, 0, &[]).await;
                continue;
            }
            return req;
        }
    }

    /// Reads the next frame as-is; `None` once the client hung up.
    pub(crate) async fn recv_raw(&mut self) -> Option<InboundRequest> {
        let frame = self.framed.next().await?.expect("read frame");
        let mut buf = frame.freeze();
        let xid = buf.get_i32();
        let opcode = buf.get_i32();
        Some(InboundRequest { xid, opcode, body: buf })
    }

    /// Sends a reply frame: header `xid | zxid | err` followed by `body`.
    pub(crate) async fn send_reply(
        &mut self,
        xid: i32,
        zxid: i64,
        err: i32,
        body: &[u8],
    ) {
        let mut frame = BytesMut::with_capacity(16 + body.len());
        frame.put_i32(xid);
        frame.put_i64(zxid);
        frame.put_i32(err);
        frame.put_slice(body);
        self.framed.send(frame.freeze()).await.expect("send reply");
    }

    /// Pushes a watch event frame (xid −1).
    pub(crate) async fn send_watch_event(
        &mut self,
        event_type: i32,
        state: i32,
        path: &str,
    ) {
        let mut body = BytesMut::new();
        body.put_i32(event_type);
        body.put_i32(state);
        wire::write_string(&mut body, path);
        self.send_reply(roost_proto::WATCH_EVENT_XID, 0, 0, &body).await;
    }
}

/// A plausible 68-byte stat body with the given data version.
pub(crate) fn stat_body(version: i32) -> Vec<u8> {
    let mut buf = BytesMut::with_capacity(68);
    buf.put_i64(100); // czxid
    buf.put_i64(101); // mzxid
    buf.put_i64(1_700_000_000_000); // ctime
    buf.put_i64(1_700_000_000_500); // mtime
    buf.put_i32(version);
    buf.put_i32(0); // cversion
    buf.put_i32(0); // aversion
    buf.put_i64(0); // ephemeral owner
    buf.put_i32(1); // data length
    buf.put_i32(0); // num children
    buf.put_i64(101); // pzxid
    buf.to_vec()
}
