//! Session Handler
//!
//! Drives one interactive session: reads input bytes, cuts them into lines,
//! dispatches each line and writes the reply back.
//!
//! ## Session Lifecycle
//!
//! ```text
//! 1. Greeting written
//!        │
//!        ▼
//! 2. ┌──────────────────────────────┐
//!    │      Main Loop               │
//!    │                              │
//!    │  ┌─────────────────────────┐ │
//!    │  │ Read bytes into buffer  │ │
//!    │  └───────────┬─────────────┘ │
//!    │              ▼               │
//!    │  ┌─────────────────────────┐ │
//!    │  │ Take complete lines     │ │
//!    │  └───────────┬─────────────┘ │
//!    │              ▼               │
//!    │  ┌─────────────────────────┐ │
//!    │  │ Dispatch, write reply   │ │
//!    │  └───────────┬─────────────┘ │
//!    │              ▼               │
//!    │         [Loop back]          │
//!    └──────────────────────────────┘
//!        │ `exit` reply or end of input
//!        ▼
//! 3. Connection closed, session ends
//! ```
//!
//! Lines are handled strictly one at a time: a line's backend round trip
//! finishes and its reply is flushed before the next line is looked at.

use crate::backend::Backend;
use crate::commands::{Dispatcher, Response, GREETING};
use bytes::BytesMut;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt, BufWriter};
use tracing::{debug, info, trace, warn};

/// Longest accepted input line (64 KB)
pub const MAX_LINE_SIZE: usize = 64 * 1024;

/// Initial buffer capacity
const INITIAL_BUFFER_SIZE: usize = 4096;

/// Counters for one session.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SessionStats {
    /// Non-blank lines dispatched
    pub lines_processed: u64,
    /// Total bytes read
    pub bytes_read: u64,
    /// Total bytes written
    pub bytes_written: u64,
}

/// One interactive session over any byte source and sink.
pub struct Session<R, W, B: Backend> {
    /// Where input lines come from
    reader: R,

    /// Where replies go
    writer: BufWriter<W>,

    /// Bytes read but not yet consumed as lines
    buffer: BytesMut,

    /// Routes lines to commands
    dispatcher: Dispatcher<B>,

    stats: SessionStats,
}

impl<R, W, B> Session<R, W, B>
where
    R: AsyncRead + Unpin,
    W: AsyncWrite + Unpin,
    B: Backend,
{
    pub fn new(reader: R, writer: W, dispatcher: Dispatcher<B>) -> Self {
        Self {
            reader,
            writer: BufWriter::new(writer),
            buffer: BytesMut::with_capacity(INITIAL_BUFFER_SIZE),
            dispatcher,
            stats: SessionStats::default(),
        }
    }

    pub fn writer(&self) -> &W {
        self.writer.get_ref()
    }

    pub fn stats(&self) -> SessionStats {
        self.stats
    }

    /// Runs the session until `exit` or end of input. The backend
    /// connection is closed before returning, whatever the outcome.
    pub async fn run(&mut self) -> Result<SessionStats, SessionError> {
        info!("Session started");

        let result = self.main_loop().await;

        if let Err(e) = self.dispatcher.shutdown().await {
            warn!(error = %e, "Failed to close connection at end of session");
        }

        match &result {
            Ok(()) => info!(
                lines = self.stats.lines_processed,
                "Session ended"
            ),
            Err(e) => warn!(error = %e, "Session ended with error"),
        }

        result.map(|()| self.stats)
    }

    async fn main_loop(&mut self) -> Result<(), SessionError> {
        self.send(&Response::line(GREETING)).await?;

        loop {
            while let Some(line) = self.next_line() {
                if self.handle_line(&line).await? {
                    return Ok(());
                }
            }

            if !self.read_more_data().await? {
                // End of input; a last line without '\n' still counts.
                if !self.buffer.is_empty() {
                    let rest = self.buffer.split();
                    let line = decode_line(&rest);
                    self.handle_line(&line).await?;
                }
                debug!("End of input");
                return Ok(());
            }
        }
    }

    /// Dispatches one line and writes the reply. Returns true when the
    /// session should end.
    async fn handle_line(&mut self, line: &str) -> Result<bool, SessionError> {
        if line.trim().is_empty() {
            return Ok(false);
        }

        let response = self.dispatcher.dispatch(line).await;
        self.stats.lines_processed += 1;
        self.send(&response).await?;

        Ok(response.is_exit())
    }

    /// Takes the next complete line out of the buffer.
    fn next_line(&mut self) -> Option<String> {
        let end = self.buffer.iter().position(|b| *b == b'\n')?;
        let raw = self.buffer.split_to(end + 1);
        trace!(consumed = raw.len(), remaining = self.buffer.len(), "Line taken");
        Some(decode_line(&raw))
    }

    /// Reads more input. Returns false at end of input.
    async fn read_more_data(&mut self) -> Result<bool, SessionError> {
        if self.buffer.len() >= MAX_LINE_SIZE {
            return Err(SessionError::LineTooLong {
                size: self.buffer.len(),
                max: MAX_LINE_SIZE,
            });
        }

        if self.buffer.capacity() - self.buffer.len() < 1024 {
            self.buffer.reserve(INITIAL_BUFFER_SIZE);
        }

        let n = self.reader.read_buf(&mut self.buffer).await?;
        if n == 0 {
            return Ok(false);
        }

        self.stats.bytes_read += n as u64;
        trace!(bytes = n, "Read input");
        Ok(true)
    }

    async fn send(&mut self, response: &Response) -> Result<(), SessionError> {
        let text = response.render();
        self.writer.write_all(text.as_bytes()).await?;
        self.writer.flush().await?;
        self.stats.bytes_written += text.len() as u64;
        Ok(())
    }
}

/// Strips the line terminator (`\n` or `\r\n`) and decodes the rest.
fn decode_line(raw: &[u8]) -> String {
    let raw = raw.strip_suffix(b"\n").unwrap_or(raw);
    let raw = raw.strip_suffix(b"\r").unwrap_or(raw);
    String::from_utf8_lossy(raw).into_owned()
}

/// Errors that end a session.
#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    /// Reading input or writing output failed
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// A single line exceeded the buffer limit
    #[error("input line too long: {size} bytes (max: {max})")]
    LineTooLong { size: usize, max: usize },
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::MemoryBackend;
    use crate::commands::{GOODBYE, PROMPT, UNKNOWN_COMMAND};
    use crate::manager::DatabaseManager;

    fn create_dispatcher() -> (Dispatcher<MemoryBackend>, MemoryBackend) {
        let backend = MemoryBackend::new()
            .with_user("postgres", "secret")
            .with_database("shop");
        let dispatcher = Dispatcher::new(DatabaseManager::new(backend.clone()));
        (dispatcher, backend)
    }

    async fn run_with_input(input: &[u8]) -> (String, SessionStats, MemoryBackend) {
        let (dispatcher, backend) = create_dispatcher();
        let mut session = Session::new(input, Vec::new(), dispatcher);
        let stats = session.run().await.unwrap();
        let output = String::from_utf8(session.writer().clone()).unwrap();
        (output, stats, backend)
    }

    #[tokio::test]
    async fn test_full_session() {
        let input = b"connect|shop|postgres|secret\r\ncreate|orders|id|int\n\ndrop|orders\nexit\ntables\n";
        let (output, stats, backend) = run_with_input(input).await;

        let expected = format!(
            "{}\n\
             Connected to database shop. {}\n\
             Table orders was created. {}\n\
             Table orders was dropped. {}\n\
             {}\n",
            GREETING, PROMPT, PROMPT, PROMPT, GOODBYE
        );
        assert_eq!(output, expected);
        assert_eq!(stats.lines_processed, 4);
        assert_eq!(stats.bytes_written, expected.len() as u64);
        assert_eq!(backend.stats().live_connections(), 0);
    }

    #[tokio::test]
    async fn test_end_of_input_closes_connection() {
        let (output, stats, backend) = run_with_input(b"connect|shop|postgres|secret\nfoo").await;

        assert!(output.ends_with(&format!("{}\n", UNKNOWN_COMMAND)));
        assert_eq!(stats.lines_processed, 2);
        assert_eq!(backend.stats().connections_opened(), 1);
        assert_eq!(backend.stats().live_connections(), 0);
    }

    #[tokio::test]
    async fn test_line_too_long() {
        let (dispatcher, _backend) = create_dispatcher();
        let input = vec![b'x'; MAX_LINE_SIZE + 10];
        let mut session = Session::new(&input[..], Vec::new(), dispatcher);

        let err = session.run().await.unwrap_err();
        assert!(matches!(err, SessionError::LineTooLong { .. }));
    }

    #[tokio::test]
    async fn test_invalid_utf8_is_unknown_command() {
        let (output, _stats, _backend) = run_with_input(b"\xff\xfe\n").await;
        assert!(output.ends_with(&format!("{}\n", UNKNOWN_COMMAND)));
    }

    #[tokio::test]
    async fn test_mock_io_exchange() {
        let (dispatcher, _backend) = create_dispatcher();
        let reader = tokio_test::io::Builder::new().read(b"drop\n").build();
        let writer = tokio_test::io::Builder::new()
            .write(format!("{}\n", GREETING).as_bytes())
            .write(b"Incorrect command format. Enter next command or help:\n")
            .build();

        let mut session = Session::new(reader, writer, dispatcher);
        let stats = session.run().await.unwrap();
        assert_eq!(stats.lines_processed, 1);
    }
}
