//! Where stream readers deliver their chunks

use crate::output::{OutputCollector, SessionOutputBuffer, StreamKind};

/// Destination for chunks read from a child's streams.
pub trait OutputSink: Send + Sync + 'static {
    /// Accept one chunk in arrival order.
    fn accept(&self, chunk: &[u8], stream: StreamKind);
}

impl OutputSink for OutputCollector {
    fn accept(&self, chunk: &[u8], stream: StreamKind) {
        self.append(chunk, stream);
    }
}

impl OutputSink for SessionOutputBuffer {
    fn accept(&self, chunk: &[u8], _stream: StreamKind) {
        self.append(chunk);
    }
}
