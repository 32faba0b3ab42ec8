//! Bounded in-memory channels carrying viewport transforms to frontier
//! loaders and loader events back to the display.

use futures::channel::mpsc::{self, Receiver, Sender};
pub use futures::channel::mpsc::{SendError, TrySendError};
use futures::prelude::*;
use std::{
    pin::Pin,
    task::{Context, Poll},
};

/// Sending half of a [`channel`].
#[derive(Debug)]
pub struct MessageBox<Msg>(Sender<Msg>);

/// Receiving half of a [`channel`], read as a `Stream`.
#[derive(Debug)]
pub struct MessageQueue<Msg>(Receiver<Msg>);

/// A channel holding up to `buffer` pending messages (plus one slot per
/// sender).
pub fn channel<Msg>(buffer: usize) -> (MessageBox<Msg>, MessageQueue<Msg>) {
    let (tx, rx) = mpsc::channel(buffer);
    (MessageBox(tx), MessageQueue(rx))
}

impl<Msg> MessageBox<Msg> {
    /// Fails right away when the channel is full or the queue is gone.
    pub fn try_send(&mut self, msg: Msg) -> Result<(), TrySendError<Msg>> {
        self.0.try_send(msg)
    }

    /// Sends a message, waiting for room in the channel. A dropped
    /// receiving end is logged and otherwise ignored.
    pub async fn send_or_log(&mut self, msg: Msg) {
        if let Err(err) = self.0.send(msg).await {
            tracing::debug!(reason = %err, "failed to enqueue message for processing");
        }
    }
}

impl<Msg> Sink<Msg> for MessageBox<Msg> {
    type Error = SendError;

    fn poll_ready(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Result<(), SendError>> {
        Pin::new(&mut self.0).poll_ready(cx)
    }

    fn start_send(mut self: Pin<&mut Self>, msg: Msg) -> Result<(), SendError> {
        Pin::new(&mut self.0).start_send(msg)
    }

    fn poll_flush(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Result<(), SendError>> {
        Pin::new(&mut self.0).poll_flush(cx)
    }

    fn poll_close(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Result<(), SendError>> {
        Pin::new(&mut self.0).poll_close(cx)
    }
}

impl<Msg> Stream for MessageQueue<Msg> {
    type Item = Msg;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Msg>> {
        Pin::new(&mut self.0).poll_next(cx)
    }
}

impl<Msg> Clone for MessageBox<Msg> {
    fn clone(&self) -> Self {
        MessageBox(self.0.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn messages_arrive_in_order() {
        let (mut tx, mut rx) = channel(4);
        tx.try_send(1).unwrap();
        tx.send_or_log(2).await;
        drop(tx);
        assert_eq!(rx.next().await, Some(1));
        assert_eq!(rx.next().await, Some(2));
        assert_eq!(rx.next().await, None);
    }
}
