//! Folding a fragment stream into growing snapshots.

use std::pin::Pin;
use std::task::{Context, Poll, ready};

use futures_util::Stream;
use pin_project_lite::pin_project;

pin_project! {
    /// A stream of full-text snapshots over a stream of text fragments.
    ///
    /// The `n`-th snapshot is the concatenation of the first `n` fragments.
    /// One snapshot is produced per fragment, in order. The stream ends when
    /// the fragments end, or right after forwarding the first error.
    ///
    /// Nothing is pulled from the fragments unless the snapshots are
    /// polled, and the source is never told to stop early.
    #[must_use = "streams do nothing unless polled"]
    pub struct Snapshots<S> {
        #[pin]
        fragments: S,
        text: String,
        done: bool,
    }
}

impl<S> Snapshots<S> {
    /// Wraps a fragment stream.
    #[inline]
    pub fn new(fragments: S) -> Self {
        Self {
            fragments,
            text: String::new(),
            done: false,
        }
    }

    /// Returns the latest snapshot.
    #[inline]
    pub fn text(&self) -> &str {
        &self.text
    }
}

impl<S, E> Stream for Snapshots<S>
where
    S: Stream<Item = Result<String, E>>,
{
    type Item = Result<String, E>;

    fn poll_next(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
    ) -> Poll<Option<Self::Item>> {
        let this = self.project();
        if *this.done {
            return Poll::Ready(None);
        }
        match ready!(this.fragments.poll_next(cx)) {
            Some(Ok(fragment)) => {
                this.text.push_str(&fragment);
                Poll::Ready(Some(Ok(this.text.clone())))
            }
            Some(Err(err)) => {
                *this.done = true;
                Poll::Ready(Some(Err(err)))
            }
            None => {
                *this.done = true;
                Poll::Ready(None)
            }
        }
    }
}
