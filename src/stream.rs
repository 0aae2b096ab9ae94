//! Duplex stream over a file: initial read, tail loop and manual writes.

use crate::chunk::{Chunk, Decoder};
use crate::error::{Error, Result};
use crate::options::StreamOptions;
use crate::reader::{self, BulkReader, IncrementalReader, Step};
use crate::state::{SharedState, StreamState};
use crate::watcher::ChangeWatcher;
use futures::{Stream, ready};
use std::io;
use std::path::{Path, PathBuf};
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};
use tokio::fs::File;
use tokio::io::AsyncWrite;
use tokio::sync::{broadcast, mpsc};
use tokio::task::JoinHandle;
use tracing::{debug, trace, warn};

const EVENT_CAPACITY: usize = 64;

/// Lifecycle notifications published by a [`TailStream`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreamEvent {
    /// The initial read reached the requested end or end of file.
    Sync,
    /// The watched file changed.
    Change,
    /// End of stream was signalled.
    End,
}

#[derive(Debug)]
enum Message {
    Chunk(Chunk),
    Error(Error),
    End,
}

#[derive(Debug)]
enum Control {
    Close,
}

/// A stream over a file's contents that can keep following the file.
///
/// The read side starts on the first poll. Chunks injected with
/// [`TailStream::write`] are delivered through the same stream.
pub struct TailStream {
    path: PathBuf,
    options: StreamOptions,
    receiver: mpsc::UnboundedReceiver<Message>,
    writer: StreamWriter,
    closer: CloseHandle,
    events: broadcast::Sender<StreamEvent>,
    shared: Arc<SharedState>,
    pending: Option<ReadTask>,
    task_handle: Option<JoinHandle<()>>,
    done: bool,
}

impl TailStream {
    /// Creates a stream for `path`. No I/O happens until the stream is polled.
    pub fn new<P: AsRef<Path>>(path: P, options: StreamOptions) -> Result<Self> {
        options.validate()?;
        let path = path.as_ref().to_path_buf();

        let (output_tx, output_rx) = mpsc::unbounded_channel();
        let (control_tx, control_rx) = mpsc::unbounded_channel();
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        let shared = Arc::new(SharedState::new(options.start));

        let task = ReadTask {
            path: path.clone(),
            options: options.clone(),
            output: output_tx.clone(),
            events: events.clone(),
            control: control_rx,
            shared: Arc::clone(&shared),
            decoder: Decoder::new(options.encoding),
            close_requested: false,
        };

        Ok(TailStream {
            path,
            options,
            receiver: output_rx,
            writer: StreamWriter {
                output: output_tx,
                shared: Arc::clone(&shared),
            },
            closer: CloseHandle {
                control: control_tx,
            },
            events,
            shared,
            pending: Some(task),
            task_handle: None,
            done: false,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn options(&self) -> &StreamOptions {
        &self.options
    }

    /// Subscribes to lifecycle events.
    ///
    /// Subscribe before the first poll to be sure to see [`StreamEvent::Sync`].
    pub fn subscribe(&self) -> broadcast::Receiver<StreamEvent> {
        self.events.subscribe()
    }

    /// Whether the initial read has finished.
    pub fn is_synced(&self) -> bool {
        self.shared.is_synced()
    }

    pub fn state(&self) -> StreamState {
        self.shared.snapshot()
    }

    /// Offset the next tail read starts from.
    pub fn position(&self) -> u64 {
        self.shared.position.get()
    }

    /// Injects a chunk into the output as if it had been read from the file.
    pub fn write(&self, chunk: impl Into<Chunk>) -> Result<()> {
        self.writer.write(chunk)
    }

    /// Returns a handle for writing from elsewhere.
    pub fn writer(&self) -> StreamWriter {
        self.writer.clone()
    }

    /// Stops following the file and ends the stream.
    ///
    /// An outstanding read finishes first, and the initial read is never
    /// cut short.
    pub fn close(&self) {
        self.closer.close();
    }

    /// Returns a handle that can close the stream from elsewhere.
    pub fn close_handle(&self) -> CloseHandle {
        self.closer.clone()
    }

    fn activate(&mut self) {
        if let Some(task) = self.pending.take() {
            debug!(path = %self.path.display(), "starting read task");
            self.task_handle = Some(tokio::spawn(task.run()));
        }
    }
}

impl Drop for TailStream {
    fn drop(&mut self) {
        if let Some(handle) = self.task_handle.take() {
            handle.abort();
        }
    }
}

impl Stream for TailStream {
    type Item = Result<Chunk>;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        if self.done {
            return Poll::Ready(None);
        }
        self.activate();

        let item = match ready!(self.receiver.poll_recv(cx)) {
            Some(Message::Chunk(chunk)) => Some(Ok(chunk)),
            Some(Message::Error(e)) => {
                self.done = true;
                Some(Err(e))
            }
            Some(Message::End) | None => {
                self.done = true;
                None
            }
        };
        Poll::Ready(item)
    }
}

/// Write side of a [`TailStream`].
///
/// Writes are never held back and are counted towards the offset the tail
/// loop resumes from.
#[derive(Debug, Clone)]
pub struct StreamWriter {
    output: mpsc::UnboundedSender<Message>,
    shared: Arc<SharedState>,
}

impl StreamWriter {
    pub fn write(&self, chunk: impl Into<Chunk>) -> Result<()> {
        let chunk = chunk.into();
        let len = chunk.len() as u64;
        let sent = self.shared.send_if_open(|| {
            self.shared.add_written(len);
            self.output.send(Message::Chunk(chunk))
        });
        match sent {
            Some(Ok(())) => Ok(()),
            Some(Err(_)) | None => Err(Error::StreamClosed),
        }
    }
}

impl AsyncWrite for StreamWriter {
    fn poll_write(
        self: Pin<&mut Self>,
        _cx: &mut Context<'_>,
        buf: &[u8],
    ) -> Poll<io::Result<usize>> {
        let written = self
            .get_mut()
            .write(buf)
            .map(|()| buf.len())
            .map_err(|e| io::Error::new(io::ErrorKind::BrokenPipe, e));
        Poll::Ready(written)
    }

    fn poll_flush(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        Poll::Ready(Ok(()))
    }

    fn poll_shutdown(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        Poll::Ready(Ok(()))
    }
}

/// Closes a [`TailStream`] from another task.
#[derive(Debug, Clone)]
pub struct CloseHandle {
    control: mpsc::UnboundedSender<Control>,
}

impl CloseHandle {
    pub fn close(&self) {
        // The read task is gone once the stream is dropped
        let _ = self.control.send(Control::Close);
    }
}

/// Background task owning the file handle, the watcher and the read state.
struct ReadTask {
    path: PathBuf,
    options: StreamOptions,
    output: mpsc::UnboundedSender<Message>,
    events: broadcast::Sender<StreamEvent>,
    control: mpsc::UnboundedReceiver<Control>,
    shared: Arc<SharedState>,
    decoder: Decoder,
    close_requested: bool,
}

impl ReadTask {
    async fn run(mut self) {
        if let Err(e) = self.read_file().await {
            self.fail(e);
        }
    }

    async fn read_file(&mut self) -> Result<()> {
        let mut file = reader::open_file(&self.path).await?;
        debug!(
            path = %self.path.display(),
            start = self.options.start,
            end = ?self.options.end,
            tail = self.options.is_tailing(),
            "opened file"
        );

        let mut watcher = if self.options.is_tailing() {
            let mut watcher = ChangeWatcher::new(&self.path)?;
            watcher.start_watching()?;
            self.shared.set_watching(true);
            Some(watcher)
        } else {
            None
        };

        let mut bulk = BulkReader::new(&self.options);
        self.shared.set_reading(true);
        while let Some(bytes) = bulk.next_chunk(&mut file).await? {
            trace!(len = bytes.len(), "read initial chunk");
            self.emit(bytes);
            if let Some(watcher) = watcher.as_mut() {
                self.record_early_changes(watcher)?;
            }
            self.poll_control();
            tokio::task::yield_now().await;
        }
        self.shared.set_reading(false);

        let resume = bulk.resume_position(self.shared.bytes_written_manually());
        let position = self.shared.position.resume_at(resume);
        self.shared.mark_synced();
        debug!(consumed = bulk.consumed(), position, "initial read synced");
        self.publish(StreamEvent::Sync);

        self.poll_control();
        match watcher {
            Some(mut watcher) if !self.close_requested => {
                self.tail(&mut file, &mut watcher, bulk.chunk_size()).await
            }
            Some(mut watcher) => {
                self.stop_watching(&mut watcher);
                self.finish();
                Ok(())
            }
            None => {
                self.finish();
                Ok(())
            }
        }
    }

    /// Publishes changes seen during the initial read without reading.
    fn record_early_changes(&mut self, watcher: &mut ChangeWatcher) -> Result<()> {
        while let Some(change) = watcher.try_next_change() {
            change?;
            trace!("change before sync");
            self.publish(StreamEvent::Change);
        }
        Ok(())
    }

    async fn tail(
        &mut self,
        file: &mut File,
        watcher: &mut ChangeWatcher,
        chunk_size: usize,
    ) -> Result<()> {
        let mut incremental = IncrementalReader::new();
        let mut buf = vec![0; chunk_size];

        loop {
            tokio::select! {
                _ = self.control.recv() => {
                    self.stop_watching(watcher);
                    // Passes run inline, so no read is outstanding here
                    if incremental.on_close() {
                        break;
                    }
                }
                change = watcher.next_change() => match change {
                    Some(Ok(())) => {
                        trace!("change notification");
                        self.publish(StreamEvent::Change);
                        if !incremental.on_change(self.shared.is_synced()) {
                            continue;
                        }
                        self.shared.set_reading(true);
                        let pass = self.drain(file, watcher, &mut incremental, &mut buf).await;
                        self.shared.set_reading(false);
                        trace!(state = ?incremental.state(), "read pass finished");
                        match pass {
                            Ok(Step::End) => break,
                            Ok(_) => {}
                            Err(e) => {
                                // Reads stop, the watcher stays until close()
                                incremental.halt();
                                self.fail(e);
                            }
                        }
                    }
                    Some(Err(e)) => return Err(e),
                    None => {
                        debug!("change notifications ended");
                        self.stop_watching(watcher);
                        break;
                    }
                },
            }
        }

        self.finish();
        Ok(())
    }

    /// Reads from the tracked position until the file is drained.
    async fn drain(
        &mut self,
        file: &mut File,
        watcher: &mut ChangeWatcher,
        incremental: &mut IncrementalReader,
        buf: &mut [u8],
    ) -> Result<Step> {
        loop {
            let position = self.shared.position.get();
            let n = reader::read_at(file, position, buf).await?;
            if n > 0 {
                self.shared.position.advance(n as u64);
                trace!(position, len = n, "read appended chunk");
                self.emit(buf[..n].to_vec());
            }

            while let Some(change) = watcher.try_next_change() {
                change?;
                self.publish(StreamEvent::Change);
                incremental.on_change(true);
            }
            self.poll_control();
            if self.close_requested && self.stop_watching(watcher) && !incremental.on_close() {
                debug!(
                    position = self.shared.position.get(),
                    "close deferred until the pass drains"
                );
            }

            match incremental.on_read(n) {
                Step::Continue => tokio::task::yield_now().await,
                step => return Ok(step),
            }
        }
    }

    fn poll_control(&mut self) {
        while let Ok(Control::Close) = self.control.try_recv() {
            if !self.close_requested {
                debug!("close requested");
            }
            self.close_requested = true;
        }
    }

    /// Returns false if the watcher was already stopped.
    fn stop_watching(&mut self, watcher: &mut ChangeWatcher) -> bool {
        if !watcher.stop() {
            return false;
        }
        self.shared.set_watching(false);
        debug!(path = %self.path.display(), "stopped watching");
        true
    }

    /// Events are best effort, there may be no subscriber.
    fn publish(&self, event: StreamEvent) {
        let _ = self.events.send(event);
    }

    fn emit(&mut self, bytes: Vec<u8>) {
        if let Some(chunk) = self.decoder.decode(bytes) {
            let _ = self.output.send(Message::Chunk(chunk));
        }
    }

    fn fail(&mut self, error: Error) {
        warn!(path = %self.path.display(), error = %error, "stream failed");
        self.shared.set_reading(false);
        let output = &self.output;
        self.shared.end_with(|| {
            let _ = output.send(Message::Error(error));
        });
    }

    fn finish(&mut self) {
        let (decoder, output) = (&mut self.decoder, &self.output);
        let ended = self.shared.end_with(|| {
            if let Some(chunk) = decoder.finish() {
                let _ = output.send(Message::Chunk(chunk));
            }
            let _ = output.send(Message::End);
        });
        if ended {
            debug!(path = %self.path.display(), "stream ended");
            self.publish(StreamEvent::End);
        }
    }
}
