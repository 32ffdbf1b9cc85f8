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

//! Flood-style publish/subscribe dissemination for libp2p-style networks.
//!
//! A node announces its topic interest to every peer it is connected to,
//! re-announcing on connect; publishing a message floods it to every
//! connected peer with an overlapping topic, each of which forwards it
//! again until its hop credit is exhausted. A time-bounded duplicate cache
//! keeps a message from being delivered or forwarded twice, and per-topic
//! forwarding validators (`ForwardValidator`) can veto propagation to a
//! given peer before it is sent.
//!
//! The transport and peer-dialling substrate is out of scope: this crate
//! only asks for a [`Host`](host::Host) to hand it established connections.

mod cache;
mod codec;
mod config;
mod engine;
mod error;
mod facade;
mod message;
mod peer;
mod peer_id;
mod topic;
mod validator;

pub mod host;

pub use config::{Config, ConfigBuilder, PROTOCOL_ID};
pub use error::Error;
pub use facade::{Listener, Multicast, SubscriptionOptions};
pub use host::{Connection, Host, HostEvent};
pub use message::{Message, TopicList};
pub use peer::PeerRecord;
pub use peer_id::PeerId;
pub use topic::Topic;
pub use validator::{ForwardValidator, ValidatorResult};
