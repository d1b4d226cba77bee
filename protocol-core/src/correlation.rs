//! Request/response correlation by message id.
//!
//! Mirrors the original protocol's `awaiting_responses` table: every outbound
//! request that expects a reply installs a completion slot keyed by id
//! before its first frame is written, the receive loop resolves it when the
//! matching response arrives, and closing the connection fails every
//! outstanding slot in one pass.

use std::collections::HashMap;

use tokio::sync::oneshot;

use crate::error::Error;
use crate::message::Message;

/// A single outstanding request awaiting its response.
type Pending = oneshot::Sender<Result<Message, Error>>;

/// Tracks outstanding requests by correlation id.
///
/// Not `Send`-guarded internally; the connection engine holds this behind its
/// own mutex alongside the id counter, matching how a single-writer receive
/// loop is structured in the rest of the engine.
#[derive(Default)]
pub struct CorrelationTable {
    next_id: u32,
    pending: HashMap<u32, Pending>,
}

impl CorrelationTable {
    /// Creates an empty table. Ids are assigned starting at 1; 0 is never
    /// used on the wire by this engine.
    pub fn new() -> Self {
        Self {
            next_id: 1,
            pending: HashMap::new(),
        }
    }

    /// Allocates the next outbound message id.
    pub fn next_id(&mut self) -> u32 {
        let id = self.next_id;
        self.next_id = self.next_id.wrapping_add(1).max(1);
        id
    }

    /// Registers a pending request under `id`, returning the receiver half
    /// the caller awaits for the eventual response.
    ///
    /// Returns [`Error::DuplicateId`] if `id` is already pending — this
    /// should never happen given ids are assigned by [`Self::next_id`], and
    /// indicates a caller bug if it does.
    pub fn insert(&mut self, id: u32) -> Result<oneshot::Receiver<Result<Message, Error>>, Error> {
        if self.pending.contains_key(&id) {
            return Err(Error::DuplicateId(id));
        }
        let (tx, rx) = oneshot::channel();
        self.pending.insert(id, tx);
        Ok(rx)
    }

    /// Resolves the pending slot for `id` with `result`, consuming it.
    ///
    /// Returns [`Error::OrphanResponse`] if no slot is registered for `id`;
    /// the caller is expected to log this and continue rather than treat it
    /// as fatal, since a stray reply does not corrupt the connection.
    pub fn resolve(&mut self, id: u32, result: Result<Message, Error>) -> Result<(), Error> {
        match self.pending.remove(&id) {
            Some(tx) => {
                let _ = tx.send(result);
                Ok(())
            }
            None => Err(Error::OrphanResponse(id)),
        }
    }

    /// Drops the pending slot for `id` without resolving it, e.g. after a
    /// local cancellation.
    ///
    /// Returns [`Error::NoSuchPending`] if `id` is not currently pending —
    /// the caller asked to cancel a call that already completed or was never
    /// outstanding.
    pub fn cancel(&mut self, id: u32) -> Result<(), Error> {
        match self.pending.remove(&id) {
            Some(_) => Ok(()),
            None => Err(Error::NoSuchPending(id)),
        }
    }

    /// Fails every outstanding pending slot with [`Error::ConnectionClosed`],
    /// called once when the connection shuts down.
    pub fn fail_all_closed(&mut self) {
        for (_, tx) in self.pending.drain() {
            let _ = tx.send(Err(Error::ConnectionClosed));
        }
    }

    /// Number of requests currently awaiting a response.
    pub fn len(&self) -> usize {
        self.pending.len()
    }

    /// Returns true if no requests are currently awaiting a response.
    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::message::Ping;

    #[test]
    fn ids_start_at_one_and_increment() {
        let mut t = CorrelationTable::new();
        assert_eq!(t.next_id(), 1);
        assert_eq!(t.next_id(), 2);
        assert_eq!(t.next_id(), 3);
    }

    #[test]
    fn resolve_delivers_to_receiver() {
        let mut t = CorrelationTable::new();
        let id = t.next_id();
        let mut rx = t.insert(id).unwrap();
        t.resolve(id, Ok(Message::PingRes(Ping))).unwrap();
        let got = rx.try_recv().unwrap();
        assert_eq!(got.unwrap(), Message::PingRes(Ping));
    }

    #[test]
    fn resolve_unknown_id_is_orphan_response() {
        let mut t = CorrelationTable::new();
        let err = t.resolve(99, Ok(Message::PingRes(Ping))).unwrap_err();
        assert_eq!(err, Error::OrphanResponse(99));
    }

    #[test]
    fn duplicate_insert_rejected() {
        let mut t = CorrelationTable::new();
        let id = t.next_id();
        t.insert(id).unwrap();
        assert_eq!(t.insert(id).unwrap_err(), Error::DuplicateId(id));
    }

    #[test]
    fn fail_all_closed_resolves_every_pending_slot() {
        let mut t = CorrelationTable::new();
        let id1 = t.next_id();
        let id2 = t.next_id();
        let mut rx1 = t.insert(id1).unwrap();
        let mut rx2 = t.insert(id2).unwrap();
        t.fail_all_closed();
        assert_eq!(rx1.try_recv().unwrap().unwrap_err(), Error::ConnectionClosed);
        assert_eq!(rx2.try_recv().unwrap().unwrap_err(), Error::ConnectionClosed);
        assert!(t.is_empty());
    }

    #[test]
    fn cancel_drops_without_resolving() {
        let mut t = CorrelationTable::new();
        let id = t.next_id();
        let mut rx = t.insert(id).unwrap();
        t.cancel(id).unwrap();
        assert!(rx.try_recv().is_err());
        assert!(t.is_empty());
    }

    #[test]
    fn cancel_unknown_id_is_no_such_pending() {
        let mut t = CorrelationTable::new();
        assert_eq!(t.cancel(42).unwrap_err(), Error::NoSuchPending(42));
    }
}
