//! Line transport between the simulated radio and the gateway process.
//!
//! The radio talks to its peer over a pair of byte streams, normally the
//! process's stdin and stdout. Each envelope is one line. Outgoing lines are
//! terminated with `\r\n` and flushed immediately; incoming lines may end in
//! `\n` or `\r\n`.
//!
//! Reads happen on a background thread so that a receive can give up after
//! a deadline without losing a line that arrives later: the line stays
//! queued for the next receive. The thread reads at most one line ahead.
//!
//! Lines are delivered as raw bytes; UTF-8 validity is left to the JSON
//! parser.

use log::{debug, trace, warn};
use std::io::{self, BufRead, Read, Write};
use std::sync::mpsc::{self, Receiver, RecvTimeoutError, SyncSender};
use std::thread;
use std::time::Duration;

/// Line terminator appended to every outgoing envelope.
pub const LINE_TERMINATOR: &str = "\r\n";

/// Longest accepted input line in bytes, terminator excluded.
///
/// Longer lines are discarded and delivered as an empty line.
pub const MAX_LINE_LENGTH: usize = 4096;

/// Bidirectional line transport.
pub struct LineTransport<W: Write> {
    lines: Receiver<io::Result<Vec<u8>>>,
    writer: W,
}

impl LineTransport<io::Stdout> {
    /// Transport over the process's stdin and stdout.
    pub fn stdio() -> Self {
        Self::new(io::BufReader::new(io::stdin()), io::stdout())
    }
}

impl<W: Write> LineTransport<W> {
    /// Create a transport reading lines from `reader` and writing to `writer`.
    ///
    /// Spawns a thread that owns `reader` until it reaches end of input or
    /// fails.
    pub fn new<R>(reader: R, writer: W) -> Self
    where
        R: BufRead + Send + 'static,
    {
        let (tx, rx) = mpsc::sync_channel(1);
        thread::spawn(move || read_lines(reader, tx));
        Self { lines: rx, writer }
    }

    /// Write one line and flush.
    pub fn write_line(&mut self, line: &str) -> Result<(), TransportError> {
        trace!("-> {}", line);
        self.writer
            .write_all(line.as_bytes())
            .and_then(|_| self.writer.write_all(LINE_TERMINATOR.as_bytes()))
            .and_then(|_| self.writer.flush())
            .map_err(TransportError::Io)
    }

    /// Read the next line, without its terminator.
    ///
    /// With `deadline` set, returns `Ok(None)` if no line arrives in time.
    /// Without it, blocks until a line arrives or input ends.
    pub fn read_line(&mut self, deadline: Option<Duration>) -> Result<Option<Vec<u8>>, TransportError> {
        let next = match deadline {
            None => self.lines.recv().map_err(|_| TransportError::Closed)?,
            Some(timeout) => match self.lines.recv_timeout(timeout) {
                Ok(next) => next,
                Err(RecvTimeoutError::Timeout) => return Ok(None),
                Err(RecvTimeoutError::Disconnected) => return Err(TransportError::Closed),
            },
        };
        let line = next.map_err(TransportError::Io)?;
        trace!("<- {}", String::from_utf8_lossy(&line));
        Ok(Some(line))
    }

    /// Underlying writer.
    pub fn writer(&self) -> &W {
        &self.writer
    }
}

impl<W: Write> std::fmt::Debug for LineTransport<W> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LineTransport").finish_non_exhaustive()
    }
}

/// Read up to `limit` bytes of the current line into `buf`.
///
/// Returns the number of bytes read, 0 at end of input.
fn read_bounded<R: BufRead>(reader: &mut R, buf: &mut Vec<u8>, limit: usize) -> io::Result<usize> {
    reader.by_ref().take(limit as u64).read_until(b'\n', buf)
}

fn read_lines<R: BufRead>(mut reader: R, tx: SyncSender<io::Result<Vec<u8>>>) {
    let mut buf = Vec::new();
    loop {
        buf.clear();
        // Room for a \r\n terminator
        let line = match read_bounded(&mut reader, &mut buf, MAX_LINE_LENGTH + 2) {
            Ok(0) => {
                debug!("Input closed");
                return;
            }
            Ok(_) if buf.len() > MAX_LINE_LENGTH + 1 && buf.last() != Some(&b'\n') => {
                match skip_line(&mut reader) {
                    Ok(skipped) => warn!(
                        "Discarding {}-byte input line, limit is {}",
                        buf.len() + skipped,
                        MAX_LINE_LENGTH
                    ),
                    Err(e) => {
                        let _ = tx.send(Err(e));
                        return;
                    }
                }
                Vec::new()
            }
            Ok(_) => {
                while matches!(buf.last(), Some(b'\n' | b'\r')) {
                    buf.pop();
                }
                if buf.len() > MAX_LINE_LENGTH {
                    warn!("Discarding input line longer than {} bytes", MAX_LINE_LENGTH);
                    Vec::new()
                } else {
                    buf.clone()
                }
            }
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => {
                let _ = tx.send(Err(e));
                return;
            }
        };
        if tx.send(Ok(line)).is_err() {
            return;
        }
    }
}

/// Consume the rest of the current line. Returns the number of bytes skipped.
fn skip_line<R: BufRead>(reader: &mut R) -> io::Result<usize> {
    let mut skipped = 0;
    let mut chunk = Vec::new();
    loop {
        chunk.clear();
        let n = read_bounded(reader, &mut chunk, MAX_LINE_LENGTH)?;
        skipped += n;
        if n == 0 || chunk.last() == Some(&b'\n') {
            return Ok(skipped);
        }
    }
}

/// Transport errors.
#[derive(Debug)]
pub enum TransportError {
    /// Input reached end of stream.
    Closed,
    /// I/O error during read/write.
    Io(io::Error),
}

impl std::fmt::Display for TransportError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Closed => write!(f, "input closed"),
            Self::Io(e) => write!(f, "I/O error: {}", e),
        }
    }
}

impl std::error::Error for TransportError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Io(e) => Some(e),
            Self::Closed => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use lora_sim_radio_macros::sim_test;
    use std::io::Cursor;

    /// Reader that never yields data until dropped.
    struct Stalled(mpsc::Receiver<()>);

    impl io::Read for Stalled {
        fn read(&mut self, _buf: &mut [u8]) -> io::Result<usize> {
            let _ = self.0.recv();
            Ok(0)
        }
    }

    /// Writer that always fails.
    struct BrokenPipe;

    impl Write for BrokenPipe {
        fn write(&mut self, _buf: &[u8]) -> io::Result<usize> {
            Err(io::Error::new(io::ErrorKind::BrokenPipe, "closed"))
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    #[sim_test]
    fn test_write_appends_crlf() {
        let mut transport = LineTransport::new(Cursor::new(Vec::new()), Vec::new());
        transport.write_line("{\"a\":1}").unwrap();
        transport.write_line("{}").unwrap();
        assert_eq!(transport.writer().as_slice(), b"{\"a\":1}\r\n{}\r\n");
    }

    #[sim_test]
    fn test_read_strips_terminators() {
        let input = Cursor::new(b"first\r\nsecond\nthird".to_vec());
        let mut transport = LineTransport::new(input, Vec::new());
        assert_eq!(transport.read_line(None).unwrap().as_deref(), Some(&b"first"[..]));
        assert_eq!(transport.read_line(None).unwrap().as_deref(), Some(&b"second"[..]));
        assert_eq!(transport.read_line(None).unwrap().as_deref(), Some(&b"third"[..]));
        assert!(matches!(transport.read_line(None), Err(TransportError::Closed)));
        // Stays closed
        assert!(matches!(
            transport.read_line(Some(Duration::from_millis(10))),
            Err(TransportError::Closed)
        ));
    }

    #[sim_test]
    fn test_read_deadline_expires() {
        let (_keep_open, stall) = mpsc::channel();
        let input = io::BufReader::new(Stalled(stall));
        let mut transport = LineTransport::new(input, Vec::new());
        assert!(matches!(
            transport.read_line(Some(Duration::from_millis(20))),
            Ok(None)
        ));
    }

    #[sim_test]
    fn test_invalid_utf8_is_kept_as_bytes() {
        let input = Cursor::new(vec![b'"', 0xFF, 0xFE, b'"', b'\r', b'\n']);
        let mut transport = LineTransport::new(input, Vec::new());
        let line = transport.read_line(None).unwrap().unwrap();
        assert_eq!(line, vec![b'"', 0xFF, 0xFE, b'"']);
    }

    #[sim_test]
    fn test_overlong_line_is_discarded() {
        let mut input = vec![b'x'; MAX_LINE_LENGTH * 3];
        input.extend_from_slice(b"\r\nnext\n");
        let mut transport = LineTransport::new(Cursor::new(input), Vec::new());
        assert_eq!(transport.read_line(None).unwrap(), Some(Vec::new()));
        assert_eq!(transport.read_line(None).unwrap().as_deref(), Some(&b"next"[..]));
        assert!(matches!(transport.read_line(None), Err(TransportError::Closed)));
    }

    #[sim_test]
    fn test_line_length_boundary() {
        let mut input = vec![b'a'; MAX_LINE_LENGTH];
        input.extend_from_slice(b"\r\n");
        input.extend(vec![b'b'; MAX_LINE_LENGTH + 1]);
        input.push(b'\n');
        let mut transport = LineTransport::new(Cursor::new(input), Vec::new());
        assert_eq!(transport.read_line(None).unwrap().map(|l| l.len()), Some(MAX_LINE_LENGTH));
        assert_eq!(transport.read_line(None).unwrap(), Some(Vec::new()));
    }

    #[sim_test]
    fn test_write_failure_is_reported() {
        let mut transport = LineTransport::new(Cursor::new(Vec::new()), BrokenPipe);
        assert!(matches!(transport.write_line("x"), Err(TransportError::Io(_))));
    }
}
