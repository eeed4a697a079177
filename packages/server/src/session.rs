//! Per-connection request loop.

use std::collections::VecDeque;
use std::sync::Arc;

use queue_core::ClientId;
use scheduler::JobScheduler;
use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncWrite, AsyncWriteExt, BufReader, BufWriter};

use crate::ServerError;
use crate::protocol::{ProtocolError, Request, Response};

/// Frames read ahead while a blocking get is parked. Past this the session
/// stops reading and the peer is held back by the socket buffers.
const MAX_PENDING_FRAMES: usize = 16;

/// One unit read from the connection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum Frame {
    /// A complete line without its terminator.
    Line(Vec<u8>),
    /// A line longer than the configured limit; its contents were discarded.
    Oversized,
}

/// Splits a byte stream into newline-terminated frames of bounded length.
///
/// Partial input survives in `partial` between calls, so a pending
/// [`LineReader::next_frame`] can be dropped and restarted without losing
/// bytes.
pub(crate) struct LineReader<R> {
    reader: BufReader<R>,
    partial: Vec<u8>,
    overflowed: bool,
    max_line_bytes: usize,
}

impl<R: AsyncRead + Unpin> LineReader<R> {
    pub(crate) fn new(reader: R, max_line_bytes: usize) -> Self {
        Self {
            reader: BufReader::new(reader),
            partial: Vec::new(),
            overflowed: false,
            max_line_bytes,
        }
    }

    /// Next frame, or `None` at end of stream.
    ///
    /// A final line without a trailing newline is still returned.
    pub(crate) async fn next_frame(&mut self) -> std::io::Result<Option<Frame>> {
        loop {
            let available = self.reader.fill_buf().await?;
            if available.is_empty() {
                return Ok(self.finish_frame_at_eof());
            }

            let (chunk, consumed, complete) = match available.iter().position(|b| *b == b'\n') {
                Some(end) => (&available[..end], end + 1, true),
                None => (available, available.len(), false),
            };

            if !self.overflowed {
                if self.partial.len() + chunk.len() > self.max_line_bytes {
                    self.overflowed = true;
                    self.partial.clear();
                } else {
                    self.partial.extend_from_slice(chunk);
                }
            }
            self.reader.consume(consumed);

            if complete {
                return Ok(Some(self.take_frame()));
            }
        }
    }

    fn finish_frame_at_eof(&mut self) -> Option<Frame> {
        if self.partial.is_empty() && !self.overflowed {
            None
        } else {
            Some(self.take_frame())
        }
    }

    fn take_frame(&mut self) -> Frame {
        if std::mem::take(&mut self.overflowed) {
            Frame::Oversized
        } else {
            Frame::Line(std::mem::take(&mut self.partial))
        }
    }
}

/// What to do after handling a request.
enum Flow {
    Continue,
    Hangup,
}

/// Outcome of waiting in a blocking get.
enum Parked {
    Done(Response),
    Frame(std::io::Result<Option<Frame>>),
}

/// A single client connection.
///
/// Requests are answered strictly in order. While a blocking get waits, the
/// session keeps reading so that end of stream can cancel the wait; a
/// bounded number of lines that arrive meanwhile are queued and handled
/// afterwards.
pub struct Session<R, W> {
    client: ClientId,
    scheduler: Arc<JobScheduler>,
    lines: LineReader<R>,
    writer: BufWriter<W>,
    pending: VecDeque<Frame>,
}

impl<R, W> Session<R, W>
where
    R: AsyncRead + Unpin,
    W: AsyncWrite + Unpin,
{
    pub fn new(
        client: ClientId,
        scheduler: Arc<JobScheduler>,
        reader: R,
        writer: W,
        max_line_bytes: usize,
    ) -> Self {
        Self {
            client,
            scheduler,
            lines: LineReader::new(reader, max_line_bytes),
            writer: BufWriter::new(writer),
            pending: VecDeque::new(),
        }
    }

    /// Serve requests until the peer hangs up, then release its jobs.
    pub async fn run(mut self) -> Result<(), ServerError> {
        let result = self.serve_requests().await;

        let released = self.scheduler.disconnect(self.client).await;
        tracing::debug!("Connection {} closed, {} job(s) released", self.client, released);
        result
    }

    async fn serve_requests(&mut self) -> Result<(), ServerError> {
        loop {
            let frame = match self.pending.pop_front() {
                Some(frame) => frame,
                None => match self.lines.next_frame().await? {
                    Some(frame) => frame,
                    None => return Ok(()),
                },
            };

            if let Flow::Hangup = self.handle_frame(frame).await? {
                return Ok(());
            }
        }
    }

    async fn handle_frame(&mut self, frame: Frame) -> Result<Flow, ServerError> {
        let request = match frame {
            Frame::Line(line) => Request::parse(&line),
            Frame::Oversized => Err(ProtocolError::Oversized {
                limit: self.lines.max_line_bytes,
            }),
        };

        let request = match request {
            Ok(request) => request,
            Err(err) => {
                tracing::warn!("Rejected request from {}: {}", self.client, err);
                self.respond(&Response::from(&err)).await?;
                return Ok(Flow::Continue);
            }
        };

        let response = match request {
            Request::Put { queue, job, pri } => {
                let id = self.scheduler.put(&queue, job, pri).await;
                Response::created(id)
            }
            Request::Get { queues, wait: false } => {
                match self.scheduler.try_get(&queues, self.client).await {
                    Ok(assignment) => Response::assigned(assignment),
                    Err(err) => err.into(),
                }
            }
            Request::Get { queues, wait: true } => match self.wait_for_job(&queues).await? {
                Some(response) => response,
                None => return Ok(Flow::Hangup),
            },
            Request::Abort { id } => match self.scheduler.abort(id, self.client).await {
                Ok(()) => Response::ok(),
                Err(err) => err.into(),
            },
            Request::Delete { id } => match self.scheduler.delete(id).await {
                Ok(()) => Response::ok(),
                Err(err) => err.into(),
            },
        };

        self.respond(&response).await?;
        Ok(Flow::Continue)
    }

    /// Blocking get that gives up when the peer goes away.
    ///
    /// Returns `None` on hangup.
    async fn wait_for_job(&mut self, queues: &[String]) -> Result<Option<Response>, ServerError> {
        let scheduler = self.scheduler.clone();
        let get = scheduler.get(queues, true, self.client);
        tokio::pin!(get);

        loop {
            let parked = tokio::select! {
                result = &mut get => Parked::Done(match result {
                    Ok(assignment) => Response::assigned(assignment),
                    Err(err) => err.into(),
                }),
                frame = self.lines.next_frame(), if self.pending.len() < MAX_PENDING_FRAMES => {
                    Parked::Frame(frame)
                }
            };

            match parked {
                Parked::Done(response) => return Ok(Some(response)),
                Parked::Frame(frame) => match frame? {
                    Some(frame) => self.pending.push_back(frame),
                    None => {
                        tracing::debug!("{} hung up while waiting for a job", self.client);
                        return Ok(None);
                    }
                },
            }
        }
    }

    async fn respond(&mut self, response: &Response) -> Result<(), ServerError> {
        let line = response.to_line()?;
        self.writer.write_all(line.as_bytes()).await?;
        self.writer.flush().await?;
        Ok(())
    }
}
