#![allow(dead_code)]

use mvcore::{Core, DispatchResult, Invocation, Registry, Request, Response};
use parking_lot::Mutex;
use std::io::{self, Write};
use std::sync::Arc;

/// Ordered log of what ran during a test.
#[derive(Clone, Default)]
pub struct Recorder(Arc<Mutex<Vec<String>>>);

impl Recorder {
    pub fn push(&self, entry: impl Into<String>) {
        self.0.lock().push(entry.into());
    }

    pub fn entries(&self) -> Vec<String> {
        self.0.lock().clone()
    }

    pub fn clear(&self) {
        self.0.lock().clear();
    }
}

/// Register `class` as a closure handler that records `class::action`,
/// followed by `(k=v,...)` when the invocation carries parameters.
pub fn recording_class(registry: &Registry, class: &'static str, recorder: &Recorder) {
    let recorder = recorder.clone();
    registry.register_fn(class, move |inv: &Invocation<'_>| -> DispatchResult {
        recorder.push(describe(class, inv));
        Ok(())
    });
}

pub fn describe(class: &str, inv: &Invocation<'_>) -> String {
    if inv.params().is_empty() {
        format!("{class}::{}", inv.action())
    } else {
        let params: Vec<String> = inv.params().iter().map(|(k, v)| format!("{k}={v}")).collect();
        format!("{class}::{}({})", inv.action(), params.join(","))
    }
}

/// Writer that keeps everything written to it for later inspection.
#[derive(Clone, Default)]
pub struct BufferSink(Arc<Mutex<Vec<u8>>>);

impl BufferSink {
    pub fn contents(&self) -> String {
        String::from_utf8_lossy(&self.0.lock()).into_owned()
    }
}

impl Write for BufferSink {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.0.lock().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

/// A core rooted in a fresh temporary directory (no config or routes file)
/// serving `method uri`, with output captured in the returned sink.
pub fn test_app(method: &str, uri: &str) -> (tempfile::TempDir, Core, BufferSink) {
    let dir = tempfile::tempdir().unwrap();
    let sink = BufferSink::default();
    let mut app = Core::new(dir.path());
    app.set_request(Request::new(method, uri).unwrap());
    app.set_response_sink(Box::new(sink.clone()));
    (dir, app, sink)
}

pub fn response(app: &Core) -> Arc<Response> {
    app.container().get::<Response>("response").unwrap()
}
