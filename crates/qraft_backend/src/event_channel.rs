//! Push/pull bridge between a producing task and exactly one consumer.
//!
//! Values pushed before the reader attaches are buffered in order. `close` is
//! idempotent; everything queued before it is still delivered, then the reader
//! sees `None`. Pushes after close are dropped.

use futures::Stream;
use std::pin::Pin;
use std::sync::{Arc, Mutex, PoisonError};
use std::task::{Context, Poll};
use tokio::sync::mpsc;

pub fn event_channel<T>() -> (EventSender<T>, EventReceiver<T>) {
    let (tx, rx) = mpsc::unbounded_channel();
    (
        EventSender {
            tx: Arc::new(Mutex::new(Some(tx))),
        },
        EventReceiver { rx, done: false },
    )
}

pub struct EventSender<T> {
    tx: Arc<Mutex<Option<mpsc::UnboundedSender<T>>>>,
}

impl<T> Clone for EventSender<T> {
    fn clone(&self) -> Self {
        Self {
            tx: self.tx.clone(),
        }
    }
}

impl<T> EventSender<T> {
    /// Returns `false` when the channel was already closed.
    pub fn push(&self, value: T) -> bool {
        let guard = self.tx.lock().unwrap_or_else(PoisonError::into_inner);
        match guard.as_ref() {
            // A dropped reader only means nobody is listening any more.
            Some(tx) => tx.send(value).is_ok(),
            None => false,
        }
    }

    /// Returns `true` only for the call that actually closed the channel.
    pub fn close(&self) -> bool {
        self.tx
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take()
            .is_some()
    }

    pub fn is_closed(&self) -> bool {
        self.tx
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .is_none()
    }
}

/// The single reader. Not `Clone`.
pub struct EventReceiver<T> {
    rx: mpsc::UnboundedReceiver<T>,
    done: bool,
}

impl<T> EventReceiver<T> {
    /// Oldest queued value, or `None` once closed and drained.
    pub async fn next(&mut self) -> Option<T> {
        if self.done {
            return None;
        }
        let next = self.rx.recv().await;
        if next.is_none() {
            self.done = true;
        }
        next
    }
}

impl<T> Stream for EventReceiver<T> {
    type Item = T;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<T>> {
        let this = self.get_mut();
        if this.done {
            return Poll::Ready(None);
        }
        match this.rx.poll_recv(cx) {
            Poll::Ready(None) => {
                this.done = true;
                Poll::Ready(None)
            }
            other => other,
        }
    }
}
