use std::io;

use log::{log, Level};

/// `io::Write` adapter that forwards complete lines to the `log` crate.
///
/// Bytes are accumulated in a buffer owned by this adapter for the lifetime
/// of one logging session; carriage returns are stripped and each completed
/// line becomes one log record. `flush` (and drop) emits any partial
/// remainder. Blank lines are suppressed.
pub struct LineLog {
    level: Level,
    target: String,
    buffer: String,
}

impl LineLog {
    pub fn new(level: Level, target: &str) -> LineLog {
        LineLog {
            level,
            target: target.to_owned(),
            buffer: String::new(),
        }
    }

    fn emit(&self, line: &str) {
        if !line.is_empty() {
            log!(target: &self.target, self.level, "{}", line);
        }
    }
}

impl io::Write for LineLog {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let text = String::from_utf8_lossy(buf);
        for line in drain_lines(&mut self.buffer, &text) {
            self.emit(&line);
        }
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        if !self.buffer.is_empty() {
            let line = std::mem::take(&mut self.buffer);
            self.emit(&line);
        }
        Ok(())
    }
}

impl Drop for LineLog {
    fn drop(&mut self) {
        let _ = io::Write::flush(self);
    }
}

/// Append `input` to `buffer`, stripping carriage returns, and return the
/// lines completed by this input. The trailing partial line stays buffered.
fn drain_lines(buffer: &mut String, input: &str) -> Vec<String> {
    let mut completed = Vec::new();
    for c in input.chars() {
        match c {
            '\r' => {}
            '\n' => completed.push(std::mem::take(buffer)),
            _ => buffer.push(c),
        }
    }
    completed
}
