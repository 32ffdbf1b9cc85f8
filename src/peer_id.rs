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

//! Opaque peer identity used as the key of the peer map.

use std::fmt;

/// Identity of a remote or local node on the network.
///
/// The core treats this as an opaque, comparable, hashable blob; it does not
/// attempt to verify or interpret it (that is the substrate's job). The
/// Base58 textual form is cached for cheap `Display`/logging use.
#[derive(Clone, PartialEq, Eq, Hash)]
pub struct PeerId {
    bytes: Vec<u8>,
    text: String,
}

impl PeerId {
    /// Builds a `PeerId` from its raw byte representation.
    pub fn new(bytes: impl Into<Vec<u8>>) -> Self {
        let bytes = bytes.into();
        let text = bs58::encode(&bytes).into_string();
        PeerId { bytes, text }
    }

    /// The raw bytes of this identity, as they appear on the wire.
    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    /// The Base58 textual form, as used by `peers()` and logging.
    pub fn to_base58(&self) -> &str {
        &self.text
    }
}

impl fmt::Debug for PeerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("PeerId").field(&self.text).finish()
    }
}

impl fmt::Display for PeerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.text)
    }
}
