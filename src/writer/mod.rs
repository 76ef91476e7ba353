//! Output capture buffer
//!
//! Bodies write through a [`SpecWriter`]; the runner truncates the shared
//! buffer before each spec and suite node and dumps it when something fails.
//! In streaming mode writes go straight to stdout and nothing is buffered.

use std::io::{self, Write};
use std::sync::{Arc, Mutex, PoisonError};

/// Suite-scoped capture buffer shared by every spec
#[derive(Debug, Default)]
pub struct OutputCapture {
    buffer: Mutex<Vec<u8>>,
    stream: bool,
}

impl OutputCapture {
    pub fn new(stream: bool) -> Self {
        Self {
            buffer: Mutex::new(Vec::new()),
            stream,
        }
    }

    pub fn is_streaming(&self) -> bool {
        self.stream
    }

    /// Drop everything captured so far
    pub fn truncate(&self) {
        self.lock().clear();
    }

    pub fn bytes(&self) -> Vec<u8> {
        self.lock().clone()
    }

    /// Captured output as text (lossy UTF-8)
    pub fn captured(&self) -> String {
        String::from_utf8_lossy(&self.lock()).into_owned()
    }

    /// Copy the buffer to stdout; no-op when streaming
    pub fn dump_out(&self) {
        if self.stream {
            return;
        }
        let buffer = self.lock();
        if buffer.is_empty() {
            return;
        }
        let mut stdout = io::stdout().lock();
        let _ = stdout.write_all(&buffer);
        let _ = stdout.flush();
    }

    /// Like [`dump_out`](Self::dump_out) but preceded by a header line
    pub fn dump_out_with_header(&self, header: &str) {
        if self.stream || self.lock().is_empty() {
            return;
        }
        println!("{header}");
        self.dump_out();
    }

    pub fn append(&self, bytes: &[u8]) {
        if self.stream {
            let mut stdout = io::stdout().lock();
            let _ = stdout.write_all(bytes);
            return;
        }
        self.lock().extend_from_slice(bytes);
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Vec<u8>> {
        self.buffer.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Cloneable `io::Write` handle onto the suite's [`OutputCapture`]
#[derive(Clone, Debug)]
pub struct SpecWriter {
    capture: Arc<OutputCapture>,
}

impl SpecWriter {
    pub fn new(capture: Arc<OutputCapture>) -> Self {
        Self { capture }
    }
}

impl Write for SpecWriter {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.capture.append(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}
