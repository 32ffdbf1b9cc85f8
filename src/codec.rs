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

//! Framing & codec adapter (§4.1): composes the externally-supplied varint
//! length-prefix codec (`unsigned-varint`) with the externally-supplied
//! schema compiler (`prost`, driven by `build.rs` from `rpc.proto`) into an
//! `asynchronous_codec::{Encoder, Decoder}` pair for our domain `Rpc` type.

use crate::message::{Message, Rpc, SubscriptionDelta};
use crate::topic::Topic;
use asynchronous_codec::{Decoder, Encoder};
use bytes::{Bytes, BytesMut};
use prost::Message as _;
use std::io;
use unsigned_varint::codec::UviBytes;

/// Generated from `rpc.proto` by `build.rs`; treated as an external schema,
/// never hand-edited.
mod pb {
    include!(concat!(env!("OUT_DIR"), "/multicast.pb.rs"));
}

impl From<Rpc> for pb::Rpc {
    fn from(rpc: Rpc) -> Self {
        pb::Rpc {
            subscriptions: rpc
                .subscriptions
                .into_iter()
                .map(|d| pb::SubOpts {
                    subscribe: Some(d.subscribe),
                    topic_cid: Some(d.topic.into_string()),
                })
                .collect(),
            msgs: rpc.messages.into_iter().map(Into::into).collect(),
        }
    }
}

impl From<pb::Rpc> for Rpc {
    fn from(rpc: pb::Rpc) -> Self {
        Rpc {
            subscriptions: rpc
                .subscriptions
                .into_iter()
                .map(|s| SubscriptionDelta {
                    subscribe: s.subscribe.unwrap_or(false),
                    topic: Topic::new(s.topic_cid.unwrap_or_default()),
                })
                .collect(),
            messages: rpc.msgs.into_iter().map(Into::into).collect(),
        }
    }
}

impl From<Message> for pb::Message {
    fn from(msg: Message) -> Self {
        pb::Message {
            from: Some(msg.from),
            data: Some(msg.data),
            seqno: Some(msg.seqno),
            hops: Some(msg.hops),
            topic_ids: msg.topic_ids.into_iter().map(Topic::into_string).collect(),
        }
    }
}

impl From<pb::Message> for Message {
    fn from(msg: pb::Message) -> Self {
        Message {
            from: msg.from.unwrap_or_default(),
            data: msg.data.unwrap_or_default(),
            seqno: msg.seqno.unwrap_or_default(),
            hops: msg.hops.unwrap_or(0),
            topic_ids: msg.topic_ids.into_iter().map(Topic::new).collect(),
        }
    }
}

/// `asynchronous_codec` `Encoder`/`Decoder` for length-prefixed `Rpc`
/// frames, exactly the shape `GossipsubCodec` takes in the teacher crate.
pub struct RpcCodec {
    length_prefix: UviBytes<Bytes>,
}

impl Default for RpcCodec {
    fn default() -> Self {
        RpcCodec {
            length_prefix: UviBytes::default(),
        }
    }
}

impl Encoder for RpcCodec {
    type Item = Rpc;
    type Error = io::Error;

    fn encode(&mut self, item: Self::Item, dst: &mut BytesMut) -> Result<(), Self::Error> {
        let proto: pb::Rpc = item.into();
        let mut buf = Vec::with_capacity(proto.encoded_len());
        proto
            .encode(&mut buf)
            .expect("Vec<u8> provides capacity as needed and never fails to write");
        self.length_prefix
            .encode(Bytes::from(buf), dst)
            .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))
    }
}

impl Decoder for RpcCodec {
    type Item = Rpc;
    type Error = io::Error;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        let packet = match self
            .length_prefix
            .decode(src)
            .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))?
        {
            Some(p) => p,
            None => return Ok(None),
        };

        let proto =
            pb::Rpc::decode(&packet[..]).map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))?;
        Ok(Some(proto.into()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use smallvec::smallvec;

    #[test]
    fn round_trips_through_the_protobuf_schema() {
        let rpc = Rpc {
            subscriptions: vec![SubscriptionDelta {
                subscribe: true,
                topic: Topic::new("foo"),
            }],
            messages: vec![Message {
                from: vec![1, 2, 3],
                data: vec![0xde, 0xad],
                seqno: vec![9],
                hops: 2,
                topic_ids: smallvec![Topic::new("foo")],
            }],
        };

        let mut codec = RpcCodec::default();
        let mut buf = BytesMut::new();
        codec.encode(rpc.clone(), &mut buf).unwrap();

        let decoded = codec.decode(&mut buf).unwrap().unwrap();
        assert_eq!(decoded, rpc);
        assert!(buf.is_empty());
    }

    #[test]
    fn decode_returns_none_on_partial_frame() {
        let mut codec = RpcCodec::default();
        let mut buf = BytesMut::from(&b"\x05ab"[..]);
        assert!(codec.decode(&mut buf).unwrap().is_none());
    }
}
