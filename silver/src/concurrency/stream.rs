use core::pin::Pin;
use core::task::{Context, Poll};
use std::time::Duration;

use futures::{Future, Stream, ready};
use pin_project_lite::pin_project;
use silver_config::shared::BatchConfig;
use tracing::info;

use crate::concurrency::shutdown::{ShutdownResult, ShutdownRx};

// Implementation adapted from:
//  https://github.com/tokio-rs/tokio/blob/master/tokio-stream/src/stream_ext/chunks_timeout.rs.
pin_project! {
    /// A stream adapter that batches items by size and time.
    ///
    /// A batch is emitted when it reaches `max_size` items, when `max_fill_ms` elapsed since the
    /// batch was started, or when the inner stream ends. Once the shutdown signal is observed the
    /// buffered items are returned as [`ShutdownResult::Shutdown`] and the stream ends.
    ///
    /// The shutdown receiver is checked on every poll but does not wake the task by itself, so
    /// callers waiting on an idle source should also select on the signal.
    #[must_use = "streams do nothing unless polled"]
    #[derive(Debug)]
    pub struct BatchStream<B, S: Stream<Item = B>> {
        #[pin]
        stream: S,
        #[pin]
        deadline: Option<tokio::time::Sleep>,
        shutdown_rx: ShutdownRx,
        items: Vec<S::Item>,
        batch_config: BatchConfig,
        reset_timer: bool,
        inner_stream_ended: bool,
        stream_stopped: bool,
    }
}

impl<B, S: Stream<Item = B>> BatchStream<B, S> {
    pub fn wrap(stream: S, batch_config: BatchConfig, shutdown_rx: ShutdownRx) -> Self {
        BatchStream {
            stream,
            deadline: None,
            shutdown_rx,
            items: Vec::new(),
            batch_config,
            reset_timer: true,
            inner_stream_ended: false,
            stream_stopped: false,
        }
    }
}

impl<B, S: Stream<Item = B>> Stream for BatchStream<B, S> {
    type Item = ShutdownResult<Vec<S::Item>, Vec<S::Item>>;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let mut this = self.as_mut().project();

        if *this.inner_stream_ended || *this.stream_stopped {
            return Poll::Ready(None);
        }

        loop {
            // Shutdown wins over everything else, buffered items are handed back so the caller
            // can still apply them.
            if this.shutdown_rx.has_changed().unwrap_or(false) {
                info!("batch stream stopped due to shutdown signal");

                *this.stream_stopped = true;
                this.shutdown_rx.mark_unchanged();

                return Poll::Ready(Some(ShutdownResult::Shutdown(std::mem::take(this.items))));
            }

            if *this.reset_timer {
                this.deadline
                    .set(Some(tokio::time::sleep(Duration::from_millis(
                        this.batch_config.max_fill_ms,
                    ))));
                *this.reset_timer = false;
            }

            if this.items.is_empty() {
                this.items.reserve(this.batch_config.max_size.min(1_024));
            }

            match this.stream.as_mut().poll_next(cx) {
                Poll::Pending => break,
                Poll::Ready(Some(item)) => {
                    // The fill deadline counts from the first item of a batch.
                    if this.items.is_empty() {
                        *this.reset_timer = true;
                    }
                    this.items.push(item);

                    if this.items.len() >= this.batch_config.max_size {
                        *this.reset_timer = true;
                        return Poll::Ready(Some(ShutdownResult::Ok(std::mem::take(this.items))));
                    }
                }
                Poll::Ready(None) => {
                    let last = if this.items.is_empty() {
                        None
                    } else {
                        *this.reset_timer = true;
                        Some(ShutdownResult::Ok(std::mem::take(this.items)))
                    };

                    *this.inner_stream_ended = true;

                    return Poll::Ready(last);
                }
            }
        }

        if !this.items.is_empty()
            && let Some(deadline) = this.deadline.as_pin_mut()
        {
            ready!(deadline.poll(cx));
            *this.reset_timer = true;

            return Poll::Ready(Some(ShutdownResult::Ok(std::mem::take(this.items))));
        }

        Poll::Pending
    }
}
