//! The transport/peer-dialling substrate the engine depends on.
//!
//! Everything in this module is a collaborator boundary: opening streams,
//! accepting them, and local identity are the substrate's job (§1, §6).
//! The engine only ever calls through the [`Host`] trait.

use crate::peer_id::PeerId;
use async_trait::async_trait;
use tokio::io::{AsyncRead, AsyncWrite};

/// A bidirectional byte stream to a remote peer, as handed to us by the
/// substrate either because we dialled out or because it accepted an
/// inbound stream on our registered protocol.
pub trait Connection: AsyncRead + AsyncWrite + Send + Unpin {}

impl<T: AsyncRead + AsyncWrite + Send + Unpin> Connection for T {}

/// A connection-lifecycle event surfaced by the substrate for our
/// registered protocol identifier.
pub enum HostEvent {
    /// A stream with `peer` is ready to use, in either direction.
    Established {
        peer: PeerId,
        conn: Box<dyn Connection>,
    },
    /// The stream with `peer` has ended.
    Closed { peer: PeerId },
}

/// The substrate contract consumed by the engine (§6).
#[async_trait]
pub trait Host: Send + Sync {
    /// Local peer identity, used as the `from` of locally published
    /// messages.
    fn local_peer_id(&self) -> PeerId;

    /// Registers `protocol_id` (`Config::protocol_id`, e.g. `/multicast/0.0.1`)
    /// as the identifier this host should accept inbound streams for and
    /// negotiate on outbound dials. Called once from `Engine::start`, the
    /// way the teacher threads its protocol id through
    /// `GossipsubHandler::new` (`protocols/gossipsub/src/handler.rs`).
    fn register_protocol(&self, protocol_id: &'static str);

    /// Pulls the next connection-lifecycle event for our protocol. Returns
    /// `None` once the substrate has nothing further to deliver (e.g. it was
    /// shut down), which ends the engine's accept loop.
    async fn next_event(&self) -> Option<HostEvent>;
}

/// An in-memory [`Host`] double for tests: wires two or more engines
/// together over `tokio::io::duplex` pipes without a real transport, in the
/// style of `protocols/rendezvous/tests/harness/mod.rs`.
pub mod testing {
    use super::*;
    use tokio::sync::Mutex as AsyncMutex;
    use tokio::sync::mpsc;

    pub struct MemoryHost {
        local: PeerId,
        events: AsyncMutex<mpsc::UnboundedReceiver<HostEvent>>,
        inject: mpsc::UnboundedSender<HostEvent>,
        registered_protocol: std::sync::Mutex<Option<&'static str>>,
    }

    impl MemoryHost {
        fn new(local: PeerId) -> (Self, mpsc::UnboundedSender<HostEvent>) {
            let (tx, rx) = mpsc::unbounded_channel();
            let inject = tx.clone();
            (
                MemoryHost {
                    local,
                    events: AsyncMutex::new(rx),
                    inject,
                    registered_protocol: std::sync::Mutex::new(None),
                },
                tx,
            )
        }

        /// Lets a test script further connections onto an already-running
        /// host (e.g. to build the line topology A-B-C with B connected
        /// twice).
        pub fn injector(&self) -> mpsc::UnboundedSender<HostEvent> {
            self.inject.clone()
        }

        /// The protocol id this host was asked to register via
        /// `Engine::start`, if any — lets tests assert `Config::protocol_id`
        /// actually reaches the substrate boundary.
        pub fn registered_protocol(&self) -> Option<&'static str> {
            *self.registered_protocol.lock().unwrap()
        }
    }

    #[async_trait]
    impl Host for MemoryHost {
        fn local_peer_id(&self) -> PeerId {
            self.local.clone()
        }

        fn register_protocol(&self, protocol_id: &'static str) {
            *self.registered_protocol.lock().unwrap() = Some(protocol_id);
        }

        async fn next_event(&self) -> Option<HostEvent> {
            self.events.lock().await.recv().await
        }
    }

    /// Builds two in-memory hosts, `a` and `b`, each immediately holding an
    /// established connection to the other, over a duplex in-memory pipe.
    pub fn connect_pair(a: PeerId, b: PeerId) -> (MemoryHost, MemoryHost) {
        let (io_a, io_b) = tokio::io::duplex(64 * 1024);
        let (host_a, tx_a) = MemoryHost::new(a.clone());
        let (host_b, tx_b) = MemoryHost::new(b.clone());

        let _ = tx_a.send(HostEvent::Established {
            peer: b,
            conn: Box::new(io_a),
        });
        let _ = tx_b.send(HostEvent::Established {
            peer: a,
            conn: Box::new(io_b),
        });

        (host_a, host_b)
    }

    /// Attaches a fresh peer to an already-running host: `existing` (whose
    /// own identity is `existing_peer`) is handed a new `Established` event
    /// for `new_peer` via its injector, and a brand new [`MemoryHost`] for
    /// `new_peer` is returned, already holding the other end of the same
    /// duplex pipe pointed back at `existing_peer`. Useful for building a
    /// line topology A-B-C where B needs two independent connections.
    pub fn connect(existing: &MemoryHost, existing_peer: PeerId, new_peer: PeerId) -> MemoryHost {
        let (io_existing, io_new) = tokio::io::duplex(64 * 1024);
        let (host_new, tx_new) = MemoryHost::new(new_peer.clone());

        let _ = existing.injector().send(HostEvent::Established {
            peer: new_peer,
            conn: Box::new(io_existing),
        });
        let _ = tx_new.send(HostEvent::Established {
            peer: existing_peer,
            conn: Box::new(io_new),
        });

        host_new
    }
}
