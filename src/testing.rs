//! Helpers shared by the unit tests.

use std::io;
use std::sync::{Arc, Mutex};

use bytes::Bytes;
use serde_json::Value;
use tracing::subscriber::DefaultGuard;
use tracing_subscriber::fmt::MakeWriter;

use crate::request::Request;

/// An in-memory writer for the `fmt` layer.
#[derive(Clone, Default)]
pub(crate) struct Buffer(Arc<Mutex<Vec<u8>>>);

impl io::Write for Buffer {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.0.lock().unwrap().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl<'a> MakeWriter<'a> for Buffer {
    type Writer = Buffer;

    fn make_writer(&'a self) -> Self::Writer {
        self.clone()
    }
}

/// Captures every `tracing` event on the current thread as JSON, the way
/// `tracing_subscriber::fmt().json()` writes it, with event fields flattened.
///
/// Stops capturing when dropped. `#[tokio::test]` runs on one thread, so
/// tasks spawned by the test are captured too.
pub(crate) struct Capture {
    buffer: Buffer,
    _guard: DefaultGuard,
}

impl Capture {
    pub(crate) fn start() -> Self {
        let buffer = Buffer::default();
        let subscriber = tracing_subscriber::fmt()
            .json()
            .flatten_event(true)
            .with_max_level(tracing::Level::TRACE)
            .with_writer(buffer.clone())
            .finish();
        let guard = tracing::subscriber::set_default(subscriber);
        Self { buffer, _guard: guard }
    }

    pub(crate) fn raw(&self) -> String {
        String::from_utf8(self.buffer.0.lock().unwrap().clone()).unwrap()
    }

    /// Every event written so far, parsed.
    pub(crate) fn lines(&self) -> Vec<Value> {
        self.raw()
            .lines()
            .map(|line| serde_json::from_str(line).unwrap())
            .collect()
    }

    /// Events emitted inside a request span.
    pub(crate) fn requests(&self) -> Vec<Value> {
        self.lines()
            .into_iter()
            .filter(|line| line["span"]["name"] == "request")
            .collect()
    }
}

/// A bodiless `GET` for `uri`.
pub(crate) fn get(uri: &str) -> Request {
    http::Request::builder().uri(uri).body(Bytes::new()).unwrap().into()
}
