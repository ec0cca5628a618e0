use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use tokio::sync::Notify;
use tracing::trace;

use super::Producer;
use crate::error::{Error, Result};

#[derive(Debug, Default)]
struct AbortState {
    interrupted: AtomicBool,
    notify: Notify,
}

/// Cloneable handle that cancels reads on a [`StreamReader`] from elsewhere.
#[derive(Debug, Clone, Default)]
pub struct AbortHandle(Arc<AbortState>);

impl AbortHandle {
    /// Raise the interrupted flag and wake any read waiting on its producer.
    pub fn abort(&self) {
        self.0.interrupted.store(true, Ordering::SeqCst);
        self.0.notify.notify_waiters();
    }

    pub fn is_aborted(&self) -> bool {
        self.0.interrupted.load(Ordering::SeqCst)
    }
}

/// Sequential reader with peek-ahead over a [`Producer`].
///
/// Peeked bytes are kept in a LIFO queue of pending chunks. Draining the
/// queue and then pulling from the producer yields exactly the bytes the
/// producer would have produced without any peeking.
pub struct StreamReader<P> {
    producer: P,
    peek_queue: Vec<Vec<u8>>,
    end_of_stream: bool,
    abort: AbortHandle,
}

impl<P: Producer> StreamReader<P> {
    pub fn new(producer: P) -> Self {
        Self {
            producer,
            peek_queue: Vec::new(),
            end_of_stream: false,
            abort: AbortHandle::default(),
        }
    }

    pub fn abort_handle(&self) -> AbortHandle {
        self.abort.clone()
    }

    /// Read the next bytes into `buf`.
    ///
    /// Fails with [`Error::EndOfStream`] when the source runs dry before `buf`
    /// is full, unless `may_be_less` is set, in which case the short count is
    /// returned. A failed read consumes nothing.
    ///
    /// Once aborted or closed, a lenient read still returns pending bytes;
    /// anything that needs the producer fails with [`Error::Aborted`].
    pub async fn read(&mut self, buf: &mut [u8], may_be_less: bool) -> Result<usize> {
        let bytes_read = self.fill(buf, may_be_less).await?;
        if bytes_read < buf.len() && !may_be_less {
            self.unread(&buf[..bytes_read]);
            return Err(Error::EndOfStream);
        }
        Ok(bytes_read)
    }

    /// Same as [`read`](Self::read), then pushes the bytes back so the next
    /// read or peek sees them again.
    pub async fn peek(&mut self, buf: &mut [u8], may_be_less: bool) -> Result<usize> {
        let bytes_read = self.fill(buf, may_be_less).await?;
        self.unread(&buf[..bytes_read]);
        if bytes_read < buf.len() && !may_be_less {
            return Err(Error::EndOfStream);
        }
        Ok(bytes_read)
    }

    /// Release the producer. Pending peeked bytes stay readable.
    pub async fn close(&mut self) -> Result<()> {
        self.abort.0.interrupted.store(true, Ordering::SeqCst);
        self.producer.release().await
    }

    /// Cancel the stream: in-flight and later pulls fail with [`Error::Aborted`].
    pub async fn abort(&mut self) -> Result<()> {
        self.abort.abort();
        self.producer.release().await
    }

    /// Push bytes back so the next read or peek returns them first.
    pub(crate) fn unread(&mut self, bytes: &[u8]) {
        if !bytes.is_empty() {
            self.peek_queue.push(bytes.to_vec());
        }
    }

    async fn fill(&mut self, buf: &mut [u8], may_be_less: bool) -> Result<usize> {
        let mut bytes_read = self.drain_peek_queue(buf);
        if may_be_less && bytes_read > 0 && self.abort.is_aborted() {
            return Ok(bytes_read);
        }

        while bytes_read < buf.len() && !self.end_of_stream {
            let pulled = match self.pull(&mut buf[bytes_read..]).await {
                Ok(pulled) => pulled,
                Err(e) => {
                    self.unread(&buf[..bytes_read]);
                    return Err(e);
                }
            };
            if pulled == 0 {
                trace!(bytes_read, "producer exhausted");
                self.end_of_stream = true;
                break;
            }
            bytes_read += pulled;
        }

        Ok(bytes_read)
    }

    fn drain_peek_queue(&mut self, buf: &mut [u8]) -> usize {
        let mut bytes_read = 0;
        while bytes_read < buf.len() {
            let Some(mut chunk) = self.peek_queue.pop() else {
                break;
            };
            let len = chunk.len().min(buf.len() - bytes_read);
            buf[bytes_read..bytes_read + len].copy_from_slice(&chunk[..len]);
            bytes_read += len;
            if len < chunk.len() {
                self.peek_queue.push(chunk.split_off(len));
            }
        }
        bytes_read
    }

    async fn pull(&mut self, buf: &mut [u8]) -> Result<usize> {
        let state = &self.abort.0;
        let notified = state.notify.notified();
        tokio::pin!(notified);
        // register before checking the flag so an abort in between is not lost
        notified.as_mut().enable();
        if state.interrupted.load(Ordering::SeqCst) {
            return Err(Error::Aborted);
        }

        tokio::select! {
            biased;
            _ = &mut notified => Err(Error::Aborted),
            pulled = self.producer.pull(buf) => pulled,
        }
    }
}
