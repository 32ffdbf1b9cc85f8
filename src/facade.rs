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

//! The public façade: listener bookkeeping and the `Multicast` handle.
//!
//! The engine only tracks which topics have *any* local interest; it is the
//! façade's job to fan a delivered message out to every listener actually
//! registered on that topic, and to decide when a topic's last listener
//! drops so it can `unsubscribe` the engine from it.

use crate::config::Config;
use crate::engine::{Engine, LocalSink};
use crate::error::Error;
use crate::host::Host;
use crate::message::Message;
use crate::peer_id::PeerId;
use crate::topic::Topic;
use crate::validator::ForwardValidator;
use fnv::FnvHashMap;
use parking_lot::RwLock;
use std::sync::Arc;

/// A callback invoked with every message delivered to a subscribed topic.
pub trait Listener: Send + Sync {
    fn on_message(&self, message: &Message);
}

/// Forwarding hooks to install for a topic at subscribe time.
#[derive(Default)]
pub struct SubscriptionOptions {
    pub forward_hooks: Vec<Arc<dyn ForwardValidator>>,
}

impl SubscriptionOptions {
    pub fn new() -> Self {
        SubscriptionOptions::default()
    }

    pub fn with_forward_hooks(forward_hooks: Vec<Arc<dyn ForwardValidator>>) -> Self {
        SubscriptionOptions { forward_hooks }
    }
}

/// `topic -> listeners` bookkeeping, the façade's half of local-interest
/// tracking (the engine's half is its own `local_subscriptions` set).
#[derive(Default)]
struct ListenerRegistry {
    listeners: RwLock<FnvHashMap<Topic, Vec<Arc<dyn Listener>>>>,
}

impl ListenerRegistry {
    fn new() -> Self {
        ListenerRegistry::default()
    }

    /// Registers `listener` for `topic`. Returns true iff this is the first
    /// listener for the topic, i.e. the engine must now be told to
    /// subscribe.
    fn add(&self, topic: Topic, listener: Arc<dyn Listener>) -> bool {
        let mut guard = self.listeners.write();
        let entry = guard.entry(topic).or_default();
        let was_empty = entry.is_empty();
        entry.push(listener);
        was_empty
    }

    /// Drops every listener registered for `topic`. Returns true iff the
    /// topic had any listeners, i.e. the engine must now be told to
    /// unsubscribe.
    fn clear(&self, topic: &Topic) -> bool {
        self.listeners.write().remove(topic).is_some()
    }
}

impl LocalSink for ListenerRegistry {
    fn deliver(&self, topic: &Topic, message: &Message) {
        let guard = self.listeners.read();
        if let Some(listeners) = guard.get(topic) {
            for listener in listeners {
                listener.on_message(message);
            }
        }
    }
}

/// The crate's public entry point: wraps the engine and the local listener
/// registry behind the operations described in §6.
pub struct Multicast {
    engine: Arc<Engine>,
    listeners: Arc<ListenerRegistry>,
}

impl Multicast {
    pub fn new(local_peer_id: PeerId, config: Config) -> Self {
        let listeners = Arc::new(ListenerRegistry::new());
        let engine = Engine::new(local_peer_id, config, listeners.clone());
        Multicast { engine, listeners }
    }

    pub fn local_peer_id(&self) -> &PeerId {
        self.engine.local_peer_id()
    }

    pub fn start(&self, host: Arc<dyn Host>) -> Result<(), Error> {
        self.engine.clone().start(host)
    }

    pub fn stop(&self) -> Result<(), Error> {
        self.engine.stop()
    }

    /// Registers `listener` for `topic`, installing `options.forward_hooks`
    /// and telling the engine about the topic the first time it gains a
    /// listener (§4.6).
    pub fn subscribe(
        &self,
        topic: Topic,
        listener: Arc<dyn Listener>,
        options: SubscriptionOptions,
    ) -> Result<(), Error> {
        if !self.engine.is_running() {
            return Err(Error::NotStarted);
        }

        if !options.forward_hooks.is_empty() {
            self.engine.add_forward_hooks(topic.clone(), options.forward_hooks);
        }

        if self.listeners.add(topic.clone(), listener) {
            self.engine.subscribe(vec![topic])?;
        }
        Ok(())
    }

    /// Drops every listener registered for `topic` and tells the engine to
    /// unsubscribe. Also removes `hooks` from the topic's forwarding
    /// validators, iterating the whole slice rather than stopping at the
    /// first match (see DESIGN.md).
    pub fn unsubscribe(&self, topic: Topic, hooks: &[Arc<dyn ForwardValidator>]) -> Result<(), Error> {
        if !hooks.is_empty() {
            self.engine.remove_forward_hooks(&topic, hooks);
        }
        if self.listeners.clear(&topic) {
            self.engine.unsubscribe(vec![topic])?;
        }
        Ok(())
    }

    pub async fn publish(&self, topics: Vec<Topic>, payloads: Vec<Vec<u8>>, hops: i32) -> Result<(), Error> {
        self.engine.publish(topics, payloads, hops).await
    }

    pub fn ls(&self) -> Vec<Topic> {
        self.engine.ls()
    }

    pub fn peers(&self, topic: Option<&Topic>) -> Vec<PeerId> {
        self.engine.peers(topic)
    }

    pub fn add_forward_hooks(&self, topic: Topic, hooks: Vec<Arc<dyn ForwardValidator>>) {
        self.engine.add_forward_hooks(topic, hooks);
    }

    pub fn remove_forward_hooks(&self, topic: &Topic, hooks: &[Arc<dyn ForwardValidator>]) {
        self.engine.remove_forward_hooks(topic, hooks);
    }
}
