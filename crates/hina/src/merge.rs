//! Ordered segment assembly.

use bytes::{Bytes, BytesMut};

/// Media type of the assembled payload.
pub const TRANSPORT_STREAM_MIME: &str = "video/mp2t";

/// The assembled download: every segment buffer concatenated in playlist
/// order, tagged as an MPEG transport stream.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransportStream {
    data: Bytes,
}

impl TransportStream {
    pub fn content_type(&self) -> &'static str {
        TRANSPORT_STREAM_MIME
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    pub fn into_bytes(self) -> Bytes {
        self.data
    }
}

impl AsRef<[u8]> for TransportStream {
    fn as_ref(&self) -> &[u8] {
        &self.data
    }
}

/// Concatenates the ordered segment buffers. Empty buffers from failed
/// segments contribute no bytes but never shift the order of the rest.
pub fn concat(buffers: Vec<Vec<u8>>) -> TransportStream {
    let total: usize = buffers.iter().map(Vec::len).sum();
    let mut data = BytesMut::with_capacity(total);
    for buffer in buffers {
        data.extend_from_slice(&buffer);
    }
    TransportStream {
        data: data.freeze(),
    }
}
