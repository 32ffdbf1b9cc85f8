//! Per-topic forwarding-validator registry.
//!
//! A validator is an asynchronous predicate consulted in the forwarding hot
//! path before a message is sent to a specific peer. Multiple validators
//! registered for the same topic are combined by logical conjunction with
//! short-circuit semantics (§4.4). A synchronous predicate is simply the
//! degenerate case of a future that resolves immediately; this crate offers
//! only the asynchronous trait, per the open question recorded in
//! DESIGN.md.

use crate::message::Message;
use crate::peer::PeerRecord;
use crate::topic::Topic;
use async_trait::async_trait;
use fnv::FnvHashMap;
use parking_lot::RwLock;
use std::sync::Arc;

/// Result of a single validator invocation. An `Err` is logged by the
/// registry and treated as "does not pass" (§4.9); it is never propagated
/// to callers of `publish`/`subscribe`.
pub type ValidatorResult = Result<bool, Box<dyn std::error::Error + Send + Sync + 'static>>;

/// A pluggable per-topic forwarding hook, consulted with the full record of
/// the peer a message is about to be sent to (not just its identity), per
/// §3's "receive `&PeerRecord` and `&Message` only" contract — a validator
/// can inspect the peer's announced `topics` or any other `PeerRecord`
/// state, not just its `PeerId`.
#[async_trait]
pub trait ForwardValidator: Send + Sync {
    async fn validate(&self, peer: &PeerRecord, message: &Message) -> ValidatorResult;
}

/// `topic -> validators` registry, read concurrently by forward evaluations
/// without blocking the engine's main lock (validators may suspend).
#[derive(Default)]
pub struct ValidatorRegistry {
    validators: RwLock<FnvHashMap<Topic, Vec<Arc<dyn ForwardValidator>>>>,
}

impl ValidatorRegistry {
    pub fn new() -> Self {
        ValidatorRegistry::default()
    }

    pub fn add(&self, topic: Topic, hooks: Vec<Arc<dyn ForwardValidator>>) {
        if hooks.is_empty() {
            return;
        }
        self.validators.write().entry(topic).or_default().extend(hooks);
    }

    pub fn remove(&self, topic: &Topic, hooks: &[Arc<dyn ForwardValidator>]) {
        let mut guard = self.validators.write();
        if let Some(existing) = guard.get_mut(topic) {
            existing.retain(|installed| !hooks.iter().any(|h| Arc::ptr_eq(h, installed)));
            if existing.is_empty() {
                guard.remove(topic);
            }
        }
    }

    /// Whether `message` may be sent to `peer` for `topic`: true trivially
    /// if no validators are registered, otherwise the conjunction of every
    /// registered validator's verdict.
    pub async fn passes(&self, topic: &Topic, peer: &PeerRecord, message: &Message) -> bool {
        let installed = self.validators.read().get(topic).cloned();
        let installed = match installed {
            Some(v) => v,
            None => return true,
        };

        for validator in installed {
            match validator.validate(peer, message).await {
                Ok(true) => continue,
                Ok(false) => return false,
                Err(err) => {
                    log::warn!(
                        "multicast: forward validator for topic {} errored: {}",
                        topic,
                        err
                    );
                    return false;
                }
            }
        }
        true
    }
}
