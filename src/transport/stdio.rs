//! Reference stdio transport: newline-delimited JSON-RPC over stdin/stdout.
//!
//! Reads with `BufReader<Stdin>` + `read_line`, writes with
//! `write_all(...)` then `write_all(b"\n")`. No notion of sessions or
//! auth context: this crate's `Transport` contract doesn't carry either.

use std::sync::Mutex as StdMutex;

use futures::stream::{self, BoxStream, StreamExt};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader, Stdin, Stdout};
use tokio::sync::{mpsc, Mutex as AsyncMutex};

use crate::jsonrpc::JsonRpcMessage;

use super::buffer::ReadBuffer;
use super::{Transport, TransportError};

/// A reference [`Transport`] implementation over `stdin`/`stdout`: one
/// JSON-RPC message per line.
pub struct StdioTransport {
    stdout: AsyncMutex<Stdout>,
    receiver: StdMutex<Option<mpsc::UnboundedReceiver<Result<JsonRpcMessage, TransportError>>>>,
    reader_task: StdMutex<Option<tokio::task::JoinHandle<()>>>,
}

impl StdioTransport {
    /// Spawn the background task that reads newline-delimited messages from
    /// `stdin` into an internal channel, consumed once via [`receive`].
    pub fn new() -> Self {
        Self::from_stdin(tokio::io::stdin())
    }

    fn from_stdin(stdin: Stdin) -> Self {
        let (tx, rx) = mpsc::unbounded_channel();

        let reader_task = tokio::spawn(async move {
            let mut reader = BufReader::new(stdin);
            let mut buf = ReadBuffer::default();
            let mut line_bytes = Vec::new();

            loop {
                line_bytes.clear();
                match reader.read_until(b'\n', &mut line_bytes).await {
                    Ok(0) => break, // EOF
                    Ok(_) => {
                        if let Err(err) = buf.feed(&line_bytes) {
                            let _ = tx.send(Err(TransportError::Connection(err.to_string())));
                            continue;
                        }
                        while let Some(line) = buf.pop_line() {
                            if line.trim().is_empty() {
                                continue;
                            }
                            let parsed = JsonRpcMessage::parse(&line)
                                .map_err(|e| TransportError::Connection(e.to_string()));
                            if tx.send(parsed).is_err() {
                                return;
                            }
                        }
                    }
                    Err(err) => {
                        let _ = tx.send(Err(TransportError::Io(err)));
                        break;
                    }
                }
            }
        });

        Self {
            stdout: AsyncMutex::new(tokio::io::stdout()),
            receiver: StdMutex::new(Some(rx)),
            reader_task: StdMutex::new(Some(reader_task)),
        }
    }
}

impl Default for StdioTransport {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait::async_trait]
impl Transport for StdioTransport {
    async fn send(&self, message: JsonRpcMessage) -> Result<(), TransportError> {
        let mut line = message.to_json()?;
        line.push('\n');

        let mut stdout = self.stdout.lock().await;
        stdout.write_all(line.as_bytes()).await?;
        stdout.flush().await?;
        Ok(())
    }

    fn receive(&self) -> BoxStream<'static, Result<JsonRpcMessage, TransportError>> {
        let rx = self.receiver.lock().unwrap_or_else(|e| e.into_inner()).take();
        match rx {
            Some(rx) => tokio_stream::wrappers::UnboundedReceiverStream::new(rx).boxed(),
            None => stream::once(async { Err(TransportError::Closed) }).boxed(),
        }
    }

    async fn close(&self) -> Result<(), TransportError> {
        if let Some(handle) = self.reader_task.lock().unwrap_or_else(|e| e.into_inner()).take() {
            handle.abort();
        }
        Ok(())
    }
}
