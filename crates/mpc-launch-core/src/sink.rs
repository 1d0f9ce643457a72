//! Shared output sink for tagged worker lines.

use std::borrow::Cow;
use std::fmt;
use std::io::{self, Write};
use std::sync::{Mutex, PoisonError};

/// Which pipe a line came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StreamKind {
    Stdout,
    Stderr,
}

impl fmt::Display for StreamKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StreamKind::Stdout => f.write_str("stdout"),
            StreamKind::Stderr => f.write_str("stderr"),
        }
    }
}

/// One line of worker output.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogLine {
    pub party_id: usize,
    pub kind: StreamKind,
    pub text: String,
    /// Set when invalid UTF-8 was replaced while decoding.
    pub lossy: bool,
}

impl LogLine {
    /// Decode raw bytes read up to and including a newline.
    ///
    /// The line terminator (`\n` or `\r\n`) is dropped and invalid UTF-8 is
    /// replaced with U+FFFD.
    pub fn decode(party_id: usize, kind: StreamKind, raw: &[u8]) -> Self {
        let raw = raw.strip_suffix(b"\n").unwrap_or(raw);
        let raw = raw.strip_suffix(b"\r").unwrap_or(raw);
        let (text, lossy) = match String::from_utf8_lossy(raw) {
            Cow::Borrowed(text) => (text.to_string(), false),
            Cow::Owned(text) => (text, true),
        };
        Self {
            party_id,
            kind,
            text,
            lossy,
        }
    }
}

/// Prefix rendering: `[<party_id>] <text>` with a zero-padded id.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LineFormat {
    width: usize,
}

impl Default for LineFormat {
    fn default() -> Self {
        Self { width: 2 }
    }
}

impl LineFormat {
    /// Width that fits every id of an `n`-party cluster, at least two digits.
    pub fn for_parties(num_parties: usize) -> Self {
        let largest = num_parties.saturating_sub(1);
        let digits = largest.checked_ilog10().map_or(1, |d| d as usize + 1);
        Self {
            width: digits.max(2),
        }
    }

    pub fn width(&self) -> usize {
        self.width
    }

    /// Full newline-terminated line as written to the sink.
    pub fn render(&self, line: &LogLine) -> String {
        format!(
            "[{:0width$}] {}\n",
            line.party_id,
            line.text,
            width = self.width
        )
    }
}

/// The single destination all worker streams are merged into.
///
/// Each [`write_line`](Self::write_line) call holds the lock for exactly one
/// rendered line, so bytes of different lines never interleave.
pub struct OutputSink {
    writer: Mutex<Box<dyn Write + Send>>,
}

impl fmt::Debug for OutputSink {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OutputSink").finish_non_exhaustive()
    }
}

impl OutputSink {
    pub fn new(writer: impl Write + Send + 'static) -> Self {
        Self {
            writer: Mutex::new(Box::new(writer)),
        }
    }

    /// Sink writing to the process's stdout.
    pub fn stdout() -> Self {
        Self::new(io::stdout())
    }

    pub fn write_line(&self, line: &LogLine, format: LineFormat) -> io::Result<()> {
        let rendered = format.render(line);
        // A panic in another writer leaves the stream itself usable.
        let mut writer = self.writer.lock().unwrap_or_else(PoisonError::into_inner);
        writer.write_all(rendered.as_bytes())?;
        writer.flush()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fakes::CaptureWriter;

    #[test]
    fn test_decode_strips_terminators() {
        let line = LogLine::decode(0, StreamKind::Stdout, b"hello\r\n");
        assert_eq!(line.text, "hello");
        assert!(!line.lossy);

        let line = LogLine::decode(0, StreamKind::Stdout, b"no newline");
        assert_eq!(line.text, "no newline");
    }

    #[test]
    fn test_decode_replaces_invalid_utf8() {
        let line = LogLine::decode(1, StreamKind::Stderr, b"bad \xff byte\n");
        assert_eq!(line.text, "bad \u{FFFD} byte");
        assert!(line.lossy);
    }

    #[test]
    fn test_format_width() {
        assert_eq!(LineFormat::for_parties(1).width(), 2);
        assert_eq!(LineFormat::for_parties(3).width(), 2);
        assert_eq!(LineFormat::for_parties(100).width(), 2);
        assert_eq!(LineFormat::for_parties(101).width(), 3);
        assert_eq!(LineFormat::for_parties(0).width(), 2);
    }

    #[test]
    fn test_render_prefix() {
        let line = LogLine::decode(3, StreamKind::Stdout, b"All peers connected\n");
        assert_eq!(
            LineFormat::for_parties(4).render(&line),
            "[03] All peers connected\n"
        );
    }

    #[test]
    fn test_write_line_appends_newline() {
        let capture = CaptureWriter::new();
        let sink = OutputSink::new(capture.clone());
        let format = LineFormat::default();
        sink.write_line(&LogLine::decode(0, StreamKind::Stdout, b"a"), format)
            .unwrap();
        sink.write_line(&LogLine::decode(1, StreamKind::Stderr, b"b\n"), format)
            .unwrap();
        assert_eq!(capture.contents(), "[00] a\n[01] b\n");
    }

    #[test]
    fn test_concurrent_writers_never_interleave() {
        const WRITERS: usize = 16;
        const LINES: usize = 200;

        let capture = CaptureWriter::byte_at_a_time();
        let sink = OutputSink::new(capture.clone());
        let format = LineFormat::for_parties(WRITERS);

        std::thread::scope(|scope| {
            for writer in 0..WRITERS {
                let sink = &sink;
                scope.spawn(move || {
                    let kind = if writer % 2 == 0 {
                        StreamKind::Stdout
                    } else {
                        StreamKind::Stderr
                    };
                    for n in 0..LINES {
                        let text = format!("writer {writer} line {n} {}", "x".repeat(n % 37));
                        sink.write_line(&LogLine::decode(writer, kind, text.as_bytes()), format)
                            .unwrap();
                    }
                });
            }
        });

        let lines = capture.lines();
        assert_eq!(lines.len(), WRITERS * LINES);

        let mut next = [0usize; WRITERS];
        for line in &lines {
            let (prefix, text) = line.split_once("] ").expect("tagged line");
            let party: usize = prefix.trim_start_matches('[').parse().unwrap();
            let n = next[party];
            assert_eq!(
                text,
                format!("writer {party} line {n} {}", "x".repeat(n % 37)),
                "line out of order or corrupted: {line}"
            );
            next[party] += 1;
        }
        assert!(next.iter().all(|&count| count == LINES));
    }
}
