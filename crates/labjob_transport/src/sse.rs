//! Incremental `text/event-stream` decoder.
//!
//! Only the `data` field matters to the progress stream: `event`, `id` and
//! `retry` lines are skipped, as are `:` comments (keep-alives).

/// Splits a byte stream into event payloads.
///
/// Chunks may end anywhere, including inside a line or a UTF-8 sequence;
/// incomplete lines are held back until the next [`SseDecoder::push`].
#[derive(Debug, Default)]
pub struct SseDecoder {
    buffer: Vec<u8>,
    data: Option<String>,
    /// Previous chunk ended on `\r`; a leading `\n` belongs to that line end.
    after_cr: bool,
}

impl SseDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed a chunk; returns the data of every event completed by it.
    ///
    /// Lines end in `\n`, `\r\n` or a bare `\r`.
    pub fn push(&mut self, chunk: &[u8]) -> Vec<String> {
        let mut chunk = chunk;
        if self.after_cr && !chunk.is_empty() {
            self.after_cr = false;
            if chunk[0] == b'\n' {
                chunk = &chunk[1..];
            }
        }
        self.buffer.extend_from_slice(chunk);

        let mut events = Vec::new();
        while let Some(pos) = self.buffer.iter().position(|&b| b == b'\n' || b == b'\r') {
            let terminator = self.buffer[pos];
            let mut line: Vec<u8> = self.buffer.drain(..=pos).collect();
            line.pop();
            if terminator == b'\r' {
                match self.buffer.first() {
                    Some(b'\n') => {
                        self.buffer.remove(0);
                    }
                    Some(_) => {}
                    None => self.after_cr = true,
                }
            }
            let line = String::from_utf8_lossy(&line);
            if let Some(data) = self.process_line(&line) {
                events.push(data);
            }
        }
        events
    }

    /// True when a partial line or event is buffered.
    pub fn has_pending(&self) -> bool {
        !self.buffer.is_empty() || self.data.is_some()
    }

    fn process_line(&mut self, line: &str) -> Option<String> {
        if line.is_empty() {
            return self.data.take();
        }
        if line.starts_with(':') {
            return None;
        }

        let (field, value) = match line.split_once(':') {
            Some((field, value)) => (field, value.strip_prefix(' ').unwrap_or(value)),
            None => (line, ""),
        };
        if field == "data" {
            match self.data.as_mut() {
                Some(data) => {
                    data.push('\n');
                    data.push_str(value);
                }
                None => self.data = Some(value.to_string()),
            }
        }
        None
    }
}
