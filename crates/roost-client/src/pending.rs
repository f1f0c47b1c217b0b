use std::collections::HashMap;

use roost_proto::{OpCode, Response};
use tokio::sync::oneshot;

use crate::error::Error;
use crate::types::{ReplySink, TaggedReply};

/// How the reply to an in-flight request reaches its originator.
pub(crate) enum Completion {
    /// A suspended caller waiting on the rendezvous.
    Caller(oneshot::Sender<Result<Response, Error>>),
    /// A tagged message to an externally supplied endpoint.
    Sink { tx: ReplySink, tag: u64 },
}

impl Completion {
    pub(crate) fn deliver(
        self,
        result: Result<Response, Error>,
    ) {
        match self {
            Self::Caller(tx) => {
                let _ = tx.send(result);
            }
            Self::Sink { tx, tag } => {
                let _ = tx.send(TaggedReply { tag, result });
            }
        }
    }
}

pub(crate) struct PendingEntry {
    pub op: OpCode,
    pub path: String,
    pub completion: Completion,
}

/// In-flight request table keyed by xid.
///
/// xids are allocated here, starting at 1 and strictly increasing for the
/// lifetime of the session; heartbeats and watch events never consume one.
pub(crate) struct PendingTable {
    next_xid: i32,
    entries: HashMap<i32, PendingEntry>,
}

impl PendingTable {
    pub(crate) fn new() -> Self {
        Self { next_xid: 1, entries: HashMap::new() }
    }

    /// Allocates the next xid and records the entry under it. The entry must
    /// be in place before the encoded frame reaches the socket.
    pub(crate) fn insert(
        &mut self,
        op: OpCode,
        path: String,
        completion: Completion,
    ) -> i32 {
        let xid = self.next_xid;
        self.next_xid += 1;
        self.entries.insert(xid, PendingEntry { op, path, completion });
        xid
    }

    pub(crate) fn remove(
        &mut self,
        xid: i32,
    ) -> Option<PendingEntry> {
        self.entries.remove(&xid)
    }

    /// The xid the next logical request will be assigned.
    pub(crate) fn iterations(&self) -> i32 {
        self.next_xid
    }

    pub(crate) fn len(&self) -> usize {
        self.entries.len()
    }

    /// Removes every entry, oldest xid first.
    pub(crate) fn drain(&mut self) -> Vec<PendingEntry> {
        let mut entries: Vec<(i32, PendingEntry)> =
            self.entries.drain().collect();
        entries.sort_by_key(|(xid, _)| *xid);
        entries.into_iter().map(|(_, entry)| entry).collect()
    }
}

#[cfg(test)]
mod tests {
    use roost_proto::{OpCode, Response};
    use tokio::sync::{mpsc, oneshot};

    use super::{Completion, PendingTable};

    fn caller() -> (
        Completion,
        oneshot::Receiver<Result<Response, crate::error::Error>>,
    ) {
        let (tx, rx) = oneshot::channel();
        (Completion::Caller(tx), rx)
    }

    #[test]
    fn xids_start_at_one_and_increase() {
        let mut table = PendingTable::new();
        assert_eq!(table.iterations(), 1);
        for expected in 1..=5 {
            let (completion, _rx) = caller();
            let xid = table.insert(
                OpCode::GetData,
                "/a".to_string(),
                completion,
            );
            assert_eq!(xid, expected);
        }
        assert_eq!(table.iterations(), 6);
        assert_eq!(table.len(), 5);
    }

    #[test]
    fn remove_returns_saved_op_and_path() {
        let mut table = PendingTable::new();
        let (completion, _rx) = caller();
        let xid = table.insert(OpCode::Delete, "/gone".to_string(), completion);
        let entry = table.remove(xid).expect("entry present");
        assert_eq!(entry.op, OpCode::Delete);
        assert_eq!(entry.path, "/gone");
        assert!(table.remove(xid).is_none());
    }

    #[test]
    fn drain_is_ordered_by_xid() {
        let mut table = PendingTable::new();
        for path in ["/1", "/2", "/3"] {
            let (completion, _rx) = caller();
            table.insert(OpCode::GetChildren, path.to_string(), completion);
        }
        let drained = table.drain();
        let paths: Vec<&str> =
            drained.iter().map(|entry| entry.path.as_str()).collect();
        assert_eq!(paths, vec!["/1", "/2", "/3"]);
        assert_eq!(table.len(), 0);
    }

    #[test]
    fn sink_completion_carries_the_tag() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let completion = Completion::Sink { tx, tag: 42 };
        completion.deliver(Ok(Response::Deleted));
        let tagged = rx.try_recv().expect("tagged reply queued");
        assert_eq!(tagged.tag, 42);
        assert!(matches!(tagged.result, Ok(Response::Deleted)));
    }
}
