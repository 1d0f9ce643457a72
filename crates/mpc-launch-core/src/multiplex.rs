//! Merges worker stdout/stderr into the shared [`OutputSink`].
//!
//! Every (party, stream) pair gets its own reader task. Readers split the
//! byte stream on `\n`, decode each line lossily and hand complete lines to
//! the sink. Lines from one stream keep their order; lines from different
//! streams are interleaved only at line boundaries.

use crate::sink::{LineFormat, LogLine, OutputSink, StreamKind};
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tokio::process::Child;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

/// Pipe buffer size per reader.
const READ_BUFFER: usize = 2048;

/// What one reader forwarded before its stream closed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReaderSummary {
    pub party_id: usize,
    pub kind: StreamKind,
    pub lines: u64,
    pub lossy_lines: u64,
}

/// Attaches reader tasks to worker pipes.
#[derive(Debug, Clone)]
pub struct StreamMultiplexer {
    sink: Arc<OutputSink>,
    format: LineFormat,
}

impl StreamMultiplexer {
    pub fn new(sink: Arc<OutputSink>, format: LineFormat) -> Self {
        Self { sink, format }
    }

    /// Take the child's piped stdout and stderr and start a reader for each.
    ///
    /// Streams that were not piped are skipped.
    pub fn attach(&self, party_id: usize, child: &mut Child) -> Vec<JoinHandle<ReaderSummary>> {
        let mut readers = Vec::with_capacity(2);
        if let Some(stdout) = child.stdout.take() {
            readers.push(self.spawn_reader(party_id, StreamKind::Stdout, stdout));
        }
        if let Some(stderr) = child.stderr.take() {
            readers.push(self.spawn_reader(party_id, StreamKind::Stderr, stderr));
        }
        readers
    }

    /// Forward lines from any async byte stream until it ends.
    pub fn spawn_reader<R>(
        &self,
        party_id: usize,
        kind: StreamKind,
        stream: R,
    ) -> JoinHandle<ReaderSummary>
    where
        R: AsyncRead + Unpin + Send + 'static,
    {
        let sink = Arc::clone(&self.sink);
        let format = self.format;
        tokio::spawn(async move { forward_lines(party_id, kind, stream, &sink, format).await })
    }
}

/// Drain `stream` into `sink` line by line.
///
/// Read errors end the reader; sink errors are logged once and the stream is
/// still drained so the worker never stalls on a full pipe.
pub async fn forward_lines<R>(
    party_id: usize,
    kind: StreamKind,
    stream: R,
    sink: &OutputSink,
    format: LineFormat,
) -> ReaderSummary
where
    R: AsyncRead + Unpin,
{
    let mut reader = BufReader::with_capacity(READ_BUFFER, stream);
    let mut buf = Vec::new();
    let mut summary = ReaderSummary {
        party_id,
        kind,
        lines: 0,
        lossy_lines: 0,
    };
    let mut sink_failed = false;

    loop {
        buf.clear();
        match reader.read_until(b'\n', &mut buf).await {
            Ok(0) => break,
            Ok(_) => {
                let line = LogLine::decode(party_id, kind, &buf);
                if line.lossy {
                    summary.lossy_lines += 1;
                    debug!(party_id, stream = %kind, "Replaced invalid UTF-8 in worker output");
                }
                if sink_failed {
                    continue;
                }
                match sink.write_line(&line, format) {
                    Ok(()) => summary.lines += 1,
                    Err(e) => {
                        sink_failed = true;
                        warn!(
                            party_id,
                            stream = %kind,
                            error = %e,
                            "Output sink failed, discarding further lines"
                        );
                    }
                }
            }
            Err(e) => {
                warn!(party_id, stream = %kind, error = %e, "Reading worker output failed");
                break;
            }
        }
    }

    debug!(party_id, stream = %kind, lines = summary.lines, "Worker stream closed");
    summary
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fakes::CaptureWriter;
    use std::io;

    fn capture_sink() -> (CaptureWriter, Arc<OutputSink>) {
        let capture = CaptureWriter::new();
        let sink = Arc::new(OutputSink::new(capture.clone()));
        (capture, sink)
    }

    #[tokio::test]
    async fn test_forward_lines_tags_each_line() {
        let (capture, sink) = capture_sink();
        let input: &[u8] = b"first\nsecond\nunterminated";

        let summary =
            forward_lines(4, StreamKind::Stdout, input, &sink, LineFormat::default()).await;

        assert_eq!(summary.lines, 3);
        assert_eq!(capture.contents(), "[04] first\n[04] second\n[04] unterminated\n");
    }

    #[tokio::test]
    async fn test_forward_lines_survives_invalid_utf8() {
        let (capture, sink) = capture_sink();
        let input: &[u8] = b"ok\n\xc3\x28 broken\nstill ok\n";

        let summary =
            forward_lines(0, StreamKind::Stderr, input, &sink, LineFormat::default()).await;

        assert_eq!(summary.lines, 3);
        assert_eq!(summary.lossy_lines, 1);
        assert_eq!(
            capture.lines(),
            vec!["[00] ok", "[00] \u{FFFD}( broken", "[00] still ok"]
        );
    }

    #[tokio::test]
    async fn test_empty_lines_are_kept() {
        let (capture, sink) = capture_sink();
        let input: &[u8] = b"\n\nend\n";
        forward_lines(1, StreamKind::Stdout, input, &sink, LineFormat::default()).await;
        assert_eq!(capture.contents(), "[01] \n[01] \n[01] end\n");
    }

    struct BrokenWriter;

    impl io::Write for BrokenWriter {
        fn write(&mut self, _buf: &[u8]) -> io::Result<usize> {
            Err(io::Error::new(io::ErrorKind::BrokenPipe, "closed"))
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    #[tokio::test]
    async fn test_sink_failure_keeps_draining() {
        let sink = OutputSink::new(BrokenWriter);
        let input: &[u8] = b"a\nb\nc\n";
        let summary =
            forward_lines(0, StreamKind::Stdout, input, &sink, LineFormat::default()).await;
        assert_eq!(summary.lines, 0);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_many_readers_merge_without_corruption() {
        const PARTIES: usize = 8;
        const LINES: usize = 300;

        let capture = CaptureWriter::byte_at_a_time();
        let sink = Arc::new(OutputSink::new(capture.clone()));
        let mux = StreamMultiplexer::new(sink, LineFormat::for_parties(PARTIES));

        let mut readers = Vec::new();
        for party in 0..PARTIES {
            for kind in [StreamKind::Stdout, StreamKind::Stderr] {
                let body: String = (0..LINES)
                    .map(|n| format!("{kind} {party} {n}\n"))
                    .collect();
                let (mut tx, rx) = tokio::io::duplex(64);
                tokio::spawn(async move {
                    use tokio::io::AsyncWriteExt;
                    tx.write_all(body.as_bytes()).await.unwrap();
                });
                readers.push(mux.spawn_reader(party, kind, rx));
            }
        }

        for reader in futures::future::join_all(readers).await {
            assert_eq!(reader.unwrap().lines, LINES as u64);
        }

        let lines = capture.lines();
        assert_eq!(lines.len(), PARTIES * 2 * LINES);
        for party in 0..PARTIES {
            for kind in ["stdout", "stderr"] {
                let own: Vec<&String> = lines
                    .iter()
                    .filter(|l| l.starts_with(&format!("[{party:02}] {kind} ")))
                    .collect();
                let expected: Vec<String> = (0..LINES)
                    .map(|n| format!("[{party:02}] {kind} {party} {n}"))
                    .collect();
                assert_eq!(own, expected.iter().collect::<Vec<_>>());
            }
        }
    }
}
