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

//! The multicast engine: peer map, local subscriptions, dedup cache and the
//! receive/forward pipeline (§4.3, §4.4).

use crate::cache::DuplicateCache;
use crate::codec::RpcCodec;
use crate::config::Config;
use crate::error::Error;
use crate::host::{Connection, Host, HostEvent};
use crate::message::{Message, Rpc, SubscriptionDelta};
use crate::peer::{PeerEvent, PeerRecord};
use crate::peer_id::PeerId;
use crate::topic::Topic;
use crate::validator::ValidatorRegistry;
use asynchronous_codec::Framed;
use fnv::{FnvHashMap, FnvHashSet};
use futures::{SinkExt, StreamExt};
use parking_lot::Mutex;
use rand::RngCore;
use std::sync::Arc;
use tokio::task::JoinHandle;

/// Receives messages that matched a local subscription. The engine only
/// knows which topics currently have interest (its own `local_subscriptions`
/// set); the façade owns the actual listener registry behind this trait.
pub trait LocalSink: Send + Sync {
    fn deliver(&self, topic: &Topic, message: &Message);
}

struct EngineState {
    running: bool,
    peers: FnvHashMap<PeerId, Arc<PeerRecord>>,
    local_subscriptions: FnvHashSet<Topic>,
    cache: DuplicateCache,
    accept_task: Option<JoinHandle<()>>,
}

/// Owns the map of peer records, the local subscription set, the
/// forwarding-validator registry, and the receive/forward pipeline.
pub struct Engine {
    local_peer_id: PeerId,
    config: Config,
    state: Mutex<EngineState>,
    validators: ValidatorRegistry,
    sink: Arc<dyn LocalSink>,
}

impl Engine {
    pub fn new(local_peer_id: PeerId, config: Config, sink: Arc<dyn LocalSink>) -> Arc<Engine> {
        let cache = DuplicateCache::new(config.cache_ttl);
        Arc::new(Engine {
            local_peer_id,
            config,
            state: Mutex::new(EngineState {
                running: false,
                peers: FnvHashMap::default(),
                local_subscriptions: FnvHashSet::default(),
                cache,
                accept_task: None,
            }),
            validators: ValidatorRegistry::new(),
            sink,
        })
    }

    pub fn local_peer_id(&self) -> &PeerId {
        &self.local_peer_id
    }

    pub fn is_running(&self) -> bool {
        self.state.lock().running
    }

    /// Registers the protocol's accept loop with the substrate and marks
    /// the engine started (§4.8).
    pub fn start(self: Arc<Self>, host: Arc<dyn Host>) -> Result<(), Error> {
        let mut state = self.state.lock();
        if state.running {
            return Ok(());
        }
        state.running = true;

        host.register_protocol(self.config.protocol_id);

        let engine = self.clone();
        let task = tokio::spawn(async move {
            loop {
                match host.next_event().await {
                    Some(HostEvent::Established { peer, conn }) => {
                        engine.clone().on_peer_connected(peer, conn);
                    }
                    Some(HostEvent::Closed { peer }) => {
                        engine.on_peer_disconnected(&peer);
                    }
                    None => break,
                }
            }
        });
        state.accept_task = Some(task);
        Ok(())
    }

    /// Tears down all peer streams, empties `local_subscriptions`, and
    /// stops accepting new connections (§4.8). The validator registry and
    /// cache survive a restart.
    pub fn stop(&self) -> Result<(), Error> {
        let mut state = self.state.lock();
        if let Some(task) = state.accept_task.take() {
            task.abort();
        }
        for peer in state.peers.values() {
            peer.close();
        }
        state.peers.clear();
        state.local_subscriptions.clear();
        state.running = false;
        Ok(())
    }

    fn on_peer_connected(self: Arc<Self>, peer_id: PeerId, conn: Box<dyn Connection>) {
        let (record, local_subs) = {
            let mut state = self.state.lock();
            let record = state
                .peers
                .entry(peer_id.clone())
                .or_insert_with(|| Arc::new(PeerRecord::new(peer_id.clone())))
                .clone();
            record.incref();
            let local_subs: Vec<Topic> = state.local_subscriptions.iter().cloned().collect();
            (record, local_subs)
        };

        let mut outbound_rx = record.create_stream();
        let (read_half, write_half) = tokio::io::split(conn);
        let mut inbound = Framed::new(read_half, RpcCodec::default());
        let mut outbound = Framed::new(write_half, RpcCodec::default());

        // §4.7: the only subscription-state synchronization on connect.
        record.send_subscriptions(&local_subs);

        let engine = self.clone();
        let peer_for_inbound = peer_id.clone();
        tokio::spawn(async move {
            loop {
                match inbound.next().await {
                    Some(Ok(rpc)) => engine.on_rpc(&peer_for_inbound, rpc).await,
                    Some(Err(err)) => {
                        let err = Error::Codec(err);
                        log::debug!(
                            "multicast: codec error reading from {}: {}",
                            peer_for_inbound,
                            err
                        );
                        break;
                    }
                    None => break,
                }
            }
            engine.on_peer_disconnected(&peer_for_inbound);
        });

        let peer_for_outbound = peer_id;
        tokio::spawn(async move {
            while let Some(rpc) = outbound_rx.recv().await {
                if let Err(err) = outbound.send(rpc).await {
                    let err = Error::Codec(err);
                    log::debug!(
                        "multicast: codec error writing to {}: {}",
                        peer_for_outbound,
                        err
                    );
                    break;
                }
            }
            record.on_stream_end();
        });
    }

    fn on_peer_disconnected(&self, peer_id: &PeerId) {
        let mut state = self.state.lock();
        let remove = if let Some(record) = state.peers.get(peer_id) {
            record.on_stream_end();
            record.decref() == 0
        } else {
            false
        };
        if remove {
            state.peers.remove(peer_id);
        }
    }

    async fn on_rpc(&self, from: &PeerId, rpc: Rpc) {
        if rpc.is_empty() {
            return;
        }

        if !rpc.messages.is_empty() {
            for message in rpc.messages {
                self.receive_message(message).await;
            }
        }

        if !rpc.subscriptions.is_empty() {
            let record = { self.state.lock().peers.get(from).cloned() };
            if let Some(record) = record {
                record.update_subscriptions(&rpc.subscriptions);
            }
        }
    }

    /// The per-message loop of §4.3: dedup, local emit, hop check/decrement,
    /// forward.
    async fn receive_message(&self, mut message: Message) {
        let id = message.id();
        {
            let mut state = self.state.lock();
            if state.cache.contains(&id) {
                return;
            }
            state.cache.insert(id);
        }

        self.local_emit(&message);

        if !message.has_forward_credit() {
            return;
        }
        message.decrement_hops();

        let topics = message.topic_ids.clone();
        self.forward(&topics, vec![message]).await;
    }

    fn local_emit(&self, message: &Message) {
        let state = self.state.lock();
        for topic in &message.topic_ids {
            if state.local_subscriptions.contains(topic) {
                self.sink.deliver(topic, message);
            }
        }
    }

    /// The forward procedure of §4.4.
    async fn forward(&self, topics: &[Topic], messages: Vec<Message>) {
        let peers: Vec<Arc<PeerRecord>> = self.state.lock().peers.values().cloned().collect();

        for peer in peers {
            if !peer.is_writable() {
                continue;
            }

            let peer_topics = peer.topics();
            let overlap: Vec<Topic> = topics
                .iter()
                .filter(|t| peer_topics.contains(t))
                .cloned()
                .collect();
            if overlap.is_empty() {
                continue;
            }

            let mut surviving = Vec::with_capacity(messages.len());
            for message in &messages {
                let message_topics: Vec<&Topic> =
                    overlap.iter().filter(|t| message.topic_ids.contains(t)).collect();
                if message_topics.is_empty() {
                    continue;
                }

                let mut passed = false;
                for topic in message_topics {
                    if self.validators.passes(topic, &peer, message).await {
                        passed = true;
                        break;
                    }
                }
                if passed {
                    surviving.push(message.clone());
                }
            }

            if !peer.is_writable() {
                // Dropped mid-evaluation (§4.4 tie-break): discard silently.
                continue;
            }
            peer.send_messages(surviving);
        }
    }

    /// §4.5. Builds one message per payload and disseminates it.
    pub async fn publish(
        &self,
        topics: Vec<Topic>,
        payloads: Vec<Vec<u8>>,
        hops: i32,
    ) -> Result<(), Error> {
        if !self.is_running() {
            return Err(Error::NotStarted);
        }
        if topics.is_empty() {
            return Err(Error::BadArgument("publish requires at least one topic"));
        }
        if hops < 0 {
            return Err(Error::BadArgument("publish must not originate negative hops"));
        }

        for data in payloads {
            let message = Message {
                from: self.local_peer_id.as_bytes().to_vec(),
                data,
                seqno: random_seqno(),
                hops,
                topic_ids: topics.clone().into(),
            };

            {
                let mut state = self.state.lock();
                state.cache.insert(message.id());
            }

            self.local_emit(&message);
            self.forward(&topics, vec![message]).await;
        }

        Ok(())
    }

    /// §4.6.
    pub fn subscribe(&self, topics: Vec<Topic>) -> Result<(), Error> {
        if !self.is_running() {
            return Err(Error::NotStarted);
        }

        let peers: Vec<Arc<PeerRecord>> = {
            let mut state = self.state.lock();
            for topic in &topics {
                state.local_subscriptions.insert(topic.clone());
            }
            state.peers.values().cloned().collect()
        };

        for peer in peers {
            self.send_or_defer(peer, topics.clone(), true);
        }
        Ok(())
    }

    /// §4.6. Silently returns if the engine is not running, to avoid racing
    /// shutdown.
    pub fn unsubscribe(&self, topics: Vec<Topic>) -> Result<(), Error> {
        if !self.is_running() {
            return Ok(());
        }

        let peers: Vec<Arc<PeerRecord>> = {
            let mut state = self.state.lock();
            for topic in &topics {
                state.local_subscriptions.remove(topic);
            }
            state.peers.values().cloned().collect()
        };

        for peer in peers {
            self.send_or_defer(peer, topics.clone(), false);
        }
        Ok(())
    }

    /// Sends the subscribe/unsubscribe delta immediately if the peer is
    /// writable now; otherwise spawns a task that retries once the peer
    /// connects, cancelling if it closes first (§4.6).
    fn send_or_defer(&self, peer: Arc<PeerRecord>, topics: Vec<Topic>, subscribe: bool) {
        if peer.is_writable() {
            if subscribe {
                peer.send_subscriptions(&topics);
            } else {
                peer.send_unsubscriptions(&topics);
            }
            return;
        }

        let mut events = peer.events();
        tokio::spawn(async move {
            while let Ok(event) = events.recv().await {
                match event {
                    PeerEvent::Connection => {
                        if subscribe {
                            peer.send_subscriptions(&topics);
                        } else {
                            peer.send_unsubscriptions(&topics);
                        }
                        break;
                    }
                    PeerEvent::Close => break,
                }
            }
        });
    }

    pub fn ls(&self) -> Vec<Topic> {
        self.state.lock().local_subscriptions.iter().cloned().collect()
    }

    pub fn peers(&self, topic: Option<&Topic>) -> Vec<PeerId> {
        let state = self.state.lock();
        state
            .peers
            .values()
            .filter(|p| match topic {
                Some(t) => p.topics().contains(t),
                None => true,
            })
            .map(|p| p.info().clone())
            .collect()
    }

    pub fn add_forward_hooks(
        &self,
        topic: Topic,
        hooks: Vec<Arc<dyn crate::validator::ForwardValidator>>,
    ) {
        self.validators.add(topic, hooks);
    }

    pub fn remove_forward_hooks(
        &self,
        topic: &Topic,
        hooks: &[Arc<dyn crate::validator::ForwardValidator>],
    ) {
        self.validators.remove(topic, hooks);
    }
}

/// A fresh 8-byte unique sequence number drawn from a CSPRNG (§4.5). The
/// core never originates negative `hops`; uniqueness of `seqno` within the
/// validity window is all that is required of it, and 8 random bytes make a
/// collision vanishingly unlikely.
fn random_seqno() -> Vec<u8> {
    let mut buf = [0u8; 8];
    rand::rngs::OsRng.fill_bytes(&mut buf);
    buf.to_vec()
}
