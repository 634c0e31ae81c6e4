//! In-memory log sink for TUI mode.
//!
//! While the alternate screen is up, tracing output must not reach stderr.
//! `LogBuffer` implements `MakeWriter` so the fmt layer writes here instead,
//! and the log pane reads the lines back.

use std::collections::VecDeque;
use std::io::Write;
use std::sync::{Arc, Mutex, MutexGuard};

use tracing_subscriber::fmt::MakeWriter;

/// Lines kept before the oldest are discarded.
const DEFAULT_CAPACITY: usize = 500;

#[derive(Debug, Default)]
struct Ring {
    lines: VecDeque<String>,
    capacity: usize,
    /// Lines discarded because the pane did not drain in time.
    overflowed: u64,
}

/// Shared bounded queue of formatted log lines.
#[derive(Clone, Debug)]
pub struct LogBuffer {
    ring: Arc<Mutex<Ring>>,
}

impl LogBuffer {
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_CAPACITY)
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            ring: Arc::new(Mutex::new(Ring {
                lines: VecDeque::with_capacity(capacity),
                capacity: capacity.max(1),
                overflowed: 0,
            })),
        }
    }

    fn lock(&self) -> MutexGuard<'_, Ring> {
        // Logging must keep working after a panic elsewhere.
        self.ring.lock().unwrap_or_else(|e| e.into_inner())
    }

    pub fn push(&self, line: String) {
        let mut ring = self.lock();
        if ring.lines.len() >= ring.capacity {
            ring.lines.pop_front();
            ring.overflowed += 1;
        }
        ring.lines.push_back(line);
    }

    /// Remove and return every queued line, oldest first.
    pub fn drain(&self) -> Vec<String> {
        self.lock().lines.drain(..).collect()
    }

    /// Lines lost to overflow since creation.
    pub fn overflowed(&self) -> u64 {
        self.lock().overflowed
    }
}

impl Default for LogBuffer {
    fn default() -> Self {
        Self::new()
    }
}

/// Per-event writer: collects bytes and pushes whole lines.
pub struct LineWriter {
    target: LogBuffer,
    partial: Vec<u8>,
}

impl LineWriter {
    fn push_complete_lines(&mut self) {
        while let Some(nl) = self.partial.iter().position(|&b| b == b'\n') {
            let rest = self.partial.split_off(nl + 1);
            let mut line = std::mem::replace(&mut self.partial, rest);
            line.pop();
            self.target.push(String::from_utf8_lossy(&line).into_owned());
        }
    }
}

impl Write for LineWriter {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        self.partial.extend_from_slice(buf);
        self.push_complete_lines();
        Ok(buf.len())
    }

    fn flush(&mut self) -> std::io::Result<()> {
        if !self.partial.is_empty() {
            let line = std::mem::take(&mut self.partial);
            self.target.push(String::from_utf8_lossy(&line).into_owned());
        }
        Ok(())
    }
}

impl Drop for LineWriter {
    fn drop(&mut self) {
        let _ = self.flush();
    }
}

impl<'a> MakeWriter<'a> for LogBuffer {
    type Writer = LineWriter;

    fn make_writer(&'a self) -> Self::Writer {
        LineWriter {
            target: self.clone(),
            partial: Vec::new(),
        }
    }
}
