//! The `Message` and `MessageId` data model, and the domain-level (as
//! opposed to wire-level) `Rpc` exchanged between the engine and a peer
//! record.

use crate::topic::Topic;
use smallvec::SmallVec;

/// Most messages address a handful of topics at once; `SmallVec` avoids a
/// heap allocation for the common case, matching `subscribed_topics` in the
/// gossipsub protocol layer.
pub type TopicList = SmallVec<[Topic; 4]>;

/// A single multicast message as understood by the engine.
///
/// `data` is opaque to the core; `hops` is the forwarding credit described
/// in the glossary. The core never constructs a `Message` with negative
/// `hops` itself (see [`Message::hops`]); a negative value can only arrive
/// over the wire from a non-conforming peer, and is treated as "unbounded"
/// (never decremented, always forwarded while any listener or peer has
/// interest).
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Message {
    /// Identity of the peer that originated this message.
    pub from: Vec<u8>,
    /// Opaque payload.
    pub data: Vec<u8>,
    /// Opaque per-message sequence identifier, unique per `from`.
    pub seqno: Vec<u8>,
    /// Remaining forwards allowed. Zero means "local delivery only".
    pub hops: i32,
    /// Non-empty list of topics this message is addressed to.
    pub topic_ids: TopicList,
}

impl Message {
    /// The duplicate-suppression cache key: `from || seqno`.
    pub fn id(&self) -> MessageId {
        let mut buf = Vec::with_capacity(self.from.len() + self.seqno.len());
        buf.extend_from_slice(&self.from);
        buf.extend_from_slice(&self.seqno);
        MessageId(buf)
    }

    /// Whether this message still has forwarding credit.
    ///
    /// A negative `hops` (only ever seen on wire input, see the struct docs)
    /// is treated as unbounded and always has credit.
    pub fn has_forward_credit(&self) -> bool {
        self.hops != 0
    }

    /// Decrements `hops` in place per the rule in the module docs: only
    /// strictly positive values are decremented.
    pub fn decrement_hops(&mut self) {
        if self.hops > 0 {
            self.hops -= 1;
        }
    }
}

/// Key of the duplicate-suppression cache: `from || seqno`, as raw bytes.
#[derive(Clone, PartialEq, Eq, Hash, Debug)]
pub struct MessageId(Vec<u8>);

/// One `(subscribe, topic)` pair as transmitted on the wire.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SubscriptionDelta {
    pub subscribe: bool,
    pub topic: Topic,
}

/// A decoded or to-be-encoded RPC record: zero or more subscription deltas
/// plus zero or more messages, exchanged atomically as one frame.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Rpc {
    pub subscriptions: Vec<SubscriptionDelta>,
    pub messages: Vec<Message>,
}

impl Rpc {
    pub fn is_empty(&self) -> bool {
        self.subscriptions.is_empty() && self.messages.is_empty()
    }

    pub fn with_subscriptions(topics: impl IntoIterator<Item = Topic>, subscribe: bool) -> Self {
        Rpc {
            subscriptions: topics
                .into_iter()
                .map(|topic| SubscriptionDelta { subscribe, topic })
                .collect(),
            messages: Vec::new(),
        }
    }

    pub fn with_messages(messages: Vec<Message>) -> Self {
        Rpc {
            subscriptions: Vec::new(),
            messages,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use smallvec::smallvec;

    fn msg(from: &[u8], seqno: &[u8], hops: i32) -> Message {
        Message {
            from: from.to_vec(),
            data: vec![],
            seqno: seqno.to_vec(),
            hops,
            topic_ids: smallvec![Topic::new("foo")],
        }
    }

    #[test]
    fn id_is_from_concat_seqno() {
        let m = msg(b"peerA", b"\x00\x01", 1);
        assert_eq!(m.id(), MessageId(b"peerA\x00\x01".to_vec()));
    }

    #[test]
    fn decrement_only_when_positive() {
        let mut zero = msg(b"a", b"1", 0);
        zero.decrement_hops();
        assert_eq!(zero.hops, 0);

        let mut positive = msg(b"a", b"1", 3);
        positive.decrement_hops();
        assert_eq!(positive.hops, 2);

        let mut negative = msg(b"a", b"1", -1);
        negative.decrement_hops();
        assert_eq!(negative.hops, -1);
    }

    #[test]
    fn forward_credit_zero_only_at_exactly_zero() {
        assert!(!msg(b"a", b"1", 0).has_forward_credit());
        assert!(msg(b"a", b"1", 1).has_forward_credit());
        assert!(msg(b"a", b"1", -1).has_forward_credit());
    }
}
