use parking_lot::Mutex;
use std::fmt;
use std::io::{self, Write};

use super::request::DEFAULT_PROTOCOL;

/// Destination the response body is flushed to.
pub type Sink = Box<dyn Write + Send>;

#[derive(Debug, Clone)]
struct State {
    status: u16,
    headers: Vec<(String, String)>,
    body: String,
    sent: bool,
}

/// The response under construction.
///
/// Handlers share it through the container, so every setter takes `&self`.
pub struct Response {
    protocol: String,
    state: Mutex<State>,
    sink: Mutex<Sink>,
}

impl Default for Response {
    fn default() -> Self {
        Self::new(DEFAULT_PROTOCOL)
    }
}

impl Response {
    /// A `200` response with an empty body, flushed to stdout.
    #[must_use]
    pub fn new(protocol: impl Into<String>) -> Self {
        Self::with_sink(protocol, Box::new(io::stdout()))
    }

    #[must_use]
    pub fn with_sink(protocol: impl Into<String>, sink: Sink) -> Self {
        Self {
            protocol: protocol.into(),
            state: Mutex::new(State {
                status: 200,
                headers: Vec::new(),
                body: String::new(),
                sent: false,
            }),
            sink: Mutex::new(sink),
        }
    }

    /// Redirect output to another sink.
    pub fn set_sink(&self, sink: Sink) {
        *self.sink.lock() = sink;
    }

    #[must_use]
    pub fn protocol_version(&self) -> &str {
        &self.protocol
    }

    #[must_use]
    pub fn status(&self) -> u16 {
        self.state.lock().status
    }

    pub fn set_status(&self, status: u16) -> &Self {
        self.state.lock().status = status;
        self
    }

    #[must_use]
    pub fn body(&self) -> String {
        self.state.lock().body.clone()
    }

    pub fn set_body(&self, body: impl Into<String>) -> &Self {
        self.state.lock().body = body.into();
        self
    }

    pub fn append_body(&self, chunk: &str) -> &Self {
        self.state.lock().body.push_str(chunk);
        self
    }

    /// Set a header, replacing any value under the same name
    /// (case-insensitive).
    pub fn set_header(&self, name: &str, value: impl Into<String>) -> &Self {
        let value = value.into();
        let mut state = self.state.lock();
        match state.headers.iter_mut().find(|(k, _)| k.eq_ignore_ascii_case(name)) {
            Some((_, slot)) => *slot = value,
            None => state.headers.push((name.to_string(), value)),
        }
        self
    }

    #[must_use]
    pub fn header(&self, name: &str) -> Option<String> {
        self.state
            .lock()
            .headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.clone())
    }

    #[must_use]
    pub fn headers(&self) -> Vec<(String, String)> {
        self.state.lock().headers.clone()
    }

    #[must_use]
    pub fn is_sent(&self) -> bool {
        self.state.lock().sent
    }

    /// Write the body to the sink. Only the first call writes; later calls
    /// return `Ok(false)`.
    ///
    /// # Errors
    ///
    /// I/O errors from the sink. The response still counts as sent.
    pub fn send(&self) -> io::Result<bool> {
        let body = {
            let mut state = self.state.lock();
            if state.sent {
                return Ok(false);
            }
            state.sent = true;
            std::mem::take(&mut state.body)
        };
        let mut sink = self.sink.lock();
        sink.write_all(body.as_bytes())?;
        sink.flush()?;
        self.state.lock().body = body;
        Ok(true)
    }
}

impl fmt::Debug for Response {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Response")
            .field("protocol", &self.protocol)
            .field("state", &*self.state.lock())
            .finish_non_exhaustive()
    }
}
