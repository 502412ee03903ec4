//! Stdio transport with blank-line frame delimiting.
//!
//! The daemon frames each message as a compact JSON text followed by an
//! empty line:
//! ```text
//! <payload>\n
//! \n
//! ```
//! The read half is generic over [`BufRead`] so tests can drive the runtime
//! from in-memory buffers. The write half is a cloneable [`SharedWriter`]
//! whose lock spans an entire frame, so replies and handler-emitted log
//! notifications never interleave on the output stream.

use std::io::{self, BufRead, BufReader, Write};
use std::sync::{Arc, Mutex};

use tracing::debug;

use crate::error::PluginError;

/// Tracing target for transport operations.
const TRANSPORT_TARGET: &str = "filament_plugin::transport";

/// Reads blank-line-delimited frames from the daemon.
pub struct FrameReader<R> {
    reader: R,
}

impl FrameReader<BufReader<io::Stdin>> {
    /// Creates a reader over the process's standard input.
    #[must_use]
    pub fn stdin() -> Self {
        Self::new(BufReader::new(io::stdin()))
    }
}

impl<R: BufRead> FrameReader<R> {
    /// Creates a reader over an arbitrary buffered source.
    #[must_use]
    pub fn new(reader: R) -> Self {
        Self { reader }
    }

    /// Reads the next complete frame (blocks until the delimiter).
    ///
    /// Stray blank lines between frames are skipped.
    ///
    /// # Errors
    ///
    /// Returns [`PluginError::ConnectionClosed`] when the stream ends on a
    /// frame boundary, [`PluginError::MalformedFrame`] when it ends inside a
    /// frame, and [`PluginError::Io`] on read failure.
    pub fn receive(&mut self) -> Result<Vec<u8>, PluginError> {
        let mut frame = String::new();

        loop {
            let mut line = String::new();
            let bytes_read = self.reader.read_line(&mut line)?;
            if bytes_read == 0 {
                if frame.is_empty() {
                    return Err(PluginError::ConnectionClosed);
                }
                return Err(PluginError::MalformedFrame {
                    message: "stream ended inside a frame".to_owned(),
                });
            }

            if line.trim().is_empty() {
                if frame.is_empty() {
                    continue;
                }
                break;
            }

            frame.push_str(&line);
        }

        debug!(target: TRANSPORT_TARGET, bytes = frame.len(), "received frame");
        Ok(frame.into_bytes())
    }
}

/// Cloneable, mutually exclusive writer for outbound frames.
///
/// Every sender that can touch the output stream (dispatch replies, the log
/// side channel) holds a clone of the same writer, and each frame is
/// written and flushed under one lock acquisition.
pub struct SharedWriter {
    inner: Arc<Mutex<Box<dyn Write + Send>>>,
}

impl SharedWriter {
    /// Wraps a sink in a shared writer.
    #[must_use]
    pub fn new(writer: impl Write + Send + 'static) -> Self {
        Self {
            inner: Arc::new(Mutex::new(Box::new(writer))),
        }
    }

    /// Creates a writer over the process's standard output.
    #[must_use]
    pub fn stdout() -> Self {
        Self::new(io::stdout())
    }

    /// Writes one complete frame (payload plus delimiter) and flushes.
    ///
    /// # Errors
    ///
    /// Returns [`PluginError::Io`] if the write or flush fails.
    pub fn send(&self, payload: &[u8]) -> Result<(), PluginError> {
        let mut writer = self.lock();
        writer.write_all(payload)?;
        writer.write_all(b"\n\n")?;
        writer.flush()?;
        debug!(target: TRANSPORT_TARGET, bytes = payload.len(), "sent frame");
        Ok(())
    }

    /// Flushes any buffered output.
    ///
    /// # Errors
    ///
    /// Returns [`PluginError::Io`] if the flush fails.
    pub fn flush(&self) -> Result<(), PluginError> {
        self.lock().flush()?;
        Ok(())
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Box<dyn Write + Send>> {
        // Recover from poisoning so a panicking handler cannot wedge the
        // output stream for the rest of the process.
        self.inner.lock().unwrap_or_else(|poison| poison.into_inner())
    }
}

impl Clone for SharedWriter {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl std::fmt::Debug for SharedWriter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SharedWriter").finish_non_exhaustive()
    }
}

#[cfg(test)]
pub(crate) mod test_utils;

#[cfg(test)]
mod tests {
    use std::io::Cursor;

    use rstest::rstest;

    use super::test_utils::SharedBuffer;
    use super::*;

    fn reader_over(input: &[u8]) -> FrameReader<Cursor<Vec<u8>>> {
        FrameReader::new(Cursor::new(input.to_vec()))
    }

    #[rstest]
    fn receives_single_frame() {
        let mut reader = reader_over(b"{\"jsonrpc\":\"2.0\"}\n\n");
        let frame = reader.receive().expect("receive failed");
        assert_eq!(frame, b"{\"jsonrpc\":\"2.0\"}\n");
    }

    #[rstest]
    fn receives_consecutive_frames() {
        let mut reader = reader_over(b"first\n\nsecond\n\n");
        assert_eq!(reader.receive().expect("first"), b"first\n");
        assert_eq!(reader.receive().expect("second"), b"second\n");
    }

    #[rstest]
    fn skips_stray_blank_lines_between_frames() {
        let mut reader = reader_over(b"\n\n\nfirst\n\n");
        assert_eq!(reader.receive().expect("first"), b"first\n");
    }

    #[rstest]
    fn reports_connection_closed_at_eof() {
        let mut reader = reader_over(b"");
        let result = reader.receive();
        assert!(matches!(result, Err(PluginError::ConnectionClosed)));
    }

    #[rstest]
    fn reports_malformed_frame_on_truncated_input() {
        let mut reader = reader_over(b"{\"jsonrpc\":\"2.0\"}");
        let result = reader.receive();
        assert!(matches!(result, Err(PluginError::MalformedFrame { .. })));
    }

    #[rstest]
    fn send_appends_frame_delimiter_and_flushes() {
        let buffer = SharedBuffer::default();
        let writer = SharedWriter::new(buffer.clone());

        writer.send(b"{\"id\":1}").expect("send failed");

        assert_eq!(buffer.contents(), b"{\"id\":1}\n\n");
    }

    #[rstest]
    fn cloned_writers_share_one_stream() {
        let buffer = SharedBuffer::default();
        let writer = SharedWriter::new(buffer.clone());
        let clone = writer.clone();

        writer.send(b"a").expect("send a");
        clone.send(b"b").expect("send b");

        assert_eq!(buffer.contents(), b"a\n\nb\n\n");
    }

    #[rstest]
    fn sent_frames_round_trip_through_reader() {
        let buffer = SharedBuffer::default();
        let writer = SharedWriter::new(buffer.clone());
        writer.send(b"{\"method\":\"log\"}").expect("send failed");

        let mut reader = reader_over(&buffer.contents());
        let frame = reader.receive().expect("receive failed");
        assert_eq!(frame, b"{\"method\":\"log\"}\n");
    }
}
