// Copyright 2018 Parity Technologies (UK) Ltd.
//
// Permission is hereby granted, free of charge, to any person obtaining a
// copy of this software and associated documentation files (the "Software"),
// to deal in the Software without restriction, including without limitation
// the rights to use, copy, modify, merge, publish, distribute, sublicense,
// and/or sell copies of the Software, and to permit persons to whom the
// Software is furnished to do so, subject to the following conditions:
//
// The above copyright notice and this permission notice shall be included in
// all copies or substantial portions of the Software.
//
// THE SOFTWARE IS PROVIDED "AS IS", WITHOUT WARRANTY OF ANY KIND, EXPRESS
// OR IMPLIED, INCLUDING BUT NOT LIMITED TO THE WARRANTIES OF MERCHANTABILITY,
// FITNESS FOR A PARTICULAR PURPOSE AND NONINFRINGEMENT. IN NO EVENT SHALL THE
// AUTHORS OR COPYRIGHT HOLDERS BE LIABLE FOR ANY CLAIM, DAMAGES OR OTHER
// LIABILITY, WHETHER IN AN ACTION OF CONTRACT, TORT OR OTHERWISE, ARISING
// FROM, OUT OF OR IN CONNECTION WITH THE SOFTWARE OR THE USE OR OTHER
// DEALINGS IN THE SOFTWARE.

//! Per-connected-peer state.

use crate::error::Error;
use crate::message::{Message, Rpc, SubscriptionDelta};
use crate::peer_id::PeerId;
use crate::topic::Topic;
use fnv::FnvHashSet;
use parking_lot::Mutex;
use tokio::sync::{broadcast, mpsc};

/// Lifecycle signal emitted by a [`PeerRecord`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PeerEvent {
    /// A fresh send channel has been installed; the peer is writable.
    Connection,
    /// The send channel has been torn down; the peer is no longer writable.
    Close,
}

/// State the engine keeps about one remote peer: its identity, the topics
/// it has announced, and (while connected) a handle to its outbound stream.
///
/// `is_writable()` iff `send` is present; `topics` mutates only through
/// [`PeerRecord::update_subscriptions`]; `references` is never negative.
pub struct PeerRecord {
    info: PeerId,
    topics: Mutex<FnvHashSet<Topic>>,
    send: Mutex<Option<mpsc::UnboundedSender<Rpc>>>,
    references: Mutex<usize>,
    events: broadcast::Sender<PeerEvent>,
}

impl PeerRecord {
    /// Creates a fresh, disconnected record with one reference (the engine's
    /// own entry in the peer map).
    pub fn new(info: PeerId) -> Self {
        let (events, _) = broadcast::channel(16);
        PeerRecord {
            info,
            topics: Mutex::new(FnvHashSet::default()),
            send: Mutex::new(None),
            references: Mutex::new(1),
            events,
        }
    }

    pub fn info(&self) -> &PeerId {
        &self.info
    }

    pub fn is_writable(&self) -> bool {
        self.send.lock().is_some()
    }

    /// Snapshot of the topics this peer has currently announced.
    pub fn topics(&self) -> FnvHashSet<Topic> {
        self.topics.lock().clone()
    }

    /// Installs a fresh outbound channel, emits [`PeerEvent::Connection`],
    /// and returns the paired receiver for the send-loop task to drain.
    pub fn create_stream(&self) -> mpsc::UnboundedReceiver<Rpc> {
        let (tx, rx) = mpsc::unbounded_channel();
        *self.send.lock() = Some(tx);
        let _ = self.events.send(PeerEvent::Connection);
        rx
    }

    /// Clears the outbound channel and emits [`PeerEvent::Close`]. Idempotent.
    pub fn on_stream_end(&self) {
        let had_send = self.send.lock().take().is_some();
        if had_send {
            let _ = self.events.send(PeerEvent::Close);
        }
    }

    /// Pushes one framed record onto the outbound channel.
    pub fn write(&self, rpc: Rpc) -> Result<(), Error> {
        let guard = self.send.lock();
        match guard.as_ref() {
            Some(tx) => tx.send(rpc).map_err(|_| Error::NoWritableConnection),
            None => Err(Error::NoWritableConnection),
        }
    }

    /// No-op on an empty topic list.
    pub fn send_subscriptions(&self, topics: &[Topic]) {
        self.send_deltas(topics, true);
    }

    /// No-op on an empty topic list.
    pub fn send_unsubscriptions(&self, topics: &[Topic]) {
        self.send_deltas(topics, false);
    }

    fn send_deltas(&self, topics: &[Topic], subscribe: bool) {
        if topics.is_empty() {
            return;
        }
        let rpc = Rpc {
            subscriptions: topics
                .iter()
                .cloned()
                .map(|topic| SubscriptionDelta { subscribe, topic })
                .collect(),
            messages: Vec::new(),
        };
        if let Err(err) = self.write(rpc) {
            log::debug!(
                "multicast: failed to send subscription delta to {}: {}",
                self.info,
                err
            );
        }
    }

    /// No-op on an empty message list.
    pub fn send_messages(&self, msgs: Vec<Message>) {
        if msgs.is_empty() {
            return;
        }
        if let Err(err) = self.write(Rpc::with_messages(msgs)) {
            log::debug!("multicast: failed to send messages to {}: {}", self.info, err);
        }
    }

    /// Applies each delta to `topics` in order (`subscribe=true` adds,
    /// otherwise removes).
    pub fn update_subscriptions(&self, deltas: &[SubscriptionDelta]) {
        let mut topics = self.topics.lock();
        for delta in deltas {
            if delta.subscribe {
                topics.insert(delta.topic.clone());
            } else {
                topics.remove(&delta.topic);
            }
        }
    }

    /// Forces `references` to 1 and tears down the send channel, so that the
    /// next `decref` drops the record from the engine's peer map.
    pub fn close(&self) {
        *self.references.lock() = 1;
        self.on_stream_end();
    }

    /// Subscribes a fresh listener to this peer's lifecycle events, used by
    /// `subscribe`/`unsubscribe` to defer a send until the peer becomes
    /// writable (see `Engine::defer_until_writable`).
    pub fn events(&self) -> broadcast::Receiver<PeerEvent> {
        self.events.subscribe()
    }

    pub fn incref(&self) -> usize {
        let mut refs = self.references.lock();
        *refs += 1;
        *refs
    }

    /// Returns the reference count after decrementing; never goes below zero.
    pub fn decref(&self) -> usize {
        let mut refs = self.references.lock();
        *refs = refs.saturating_sub(1);
        *refs
    }
}
