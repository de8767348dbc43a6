use std::collections::VecDeque;
use std::future::Future;
use std::pin::Pin;
use std::sync::{Arc, Mutex};
use std::task::{Context, Poll, Waker};

use futures::Stream;
use futures::stream::FusedStream;

use crate::context::{self, Suspension};
use crate::iteration::Iteration;
use crate::sync::lock;

struct Queue<T> {
    items: VecDeque<T>,
    closed: bool,
    waker: Option<Waker>,
}

struct Channel<T> {
    queue: Mutex<Queue<T>>,
}

/// Delivery handle passed to a multi-shot source.
///
/// The source calls [`deliver`](Feed::deliver) with `Some(element)` once per
/// element and then once with `None`. Anything delivered after the `None`, or
/// after the bridge was dropped, is absorbed.
pub struct Feed<T> {
    channel: Arc<Channel<T>>,
}

impl<T> Clone for Feed<T> {
    fn clone(&self) -> Self {
        Self {
            channel: Arc::clone(&self.channel),
        }
    }
}

impl<T> Feed<T> {
    pub fn deliver(&self, item: Option<T>) {
        let waker = {
            let mut queue = lock(&self.channel.queue);
            if queue.closed {
                tracing::trace!("delivery after end of sequence absorbed");
                return;
            }
            match item {
                Some(element) => queue.items.push_back(element),
                None => queue.closed = true,
            }
            queue.waker.take()
        };
        if let Some(waker) = waker {
            waker.wake();
        }
    }

    pub fn element(&self, element: T) {
        self.deliver(Some(element));
    }

    pub fn finish(&self) {
        self.deliver(None);
    }

    pub fn is_finished(&self) -> bool {
        lock(&self.channel.queue).closed
    }
}

/// Pull-based view of a multi-shot callback source.
///
/// Each awaited [`next`](IterationBridge::next) resumes with one
/// [`Iteration`]: `Present` for every element the source pushed, then
/// `Exhausted` for good. The source is started on the first step.
///
/// # Examples
///
/// ```rust
/// use cont_bridge::{Continuation, Iteration, iterate};
///
/// let cont = Continuation::new(async {
///     let mut numbers = iterate(|feed| {
///         for i in 0..4 {
///             feed.element(i);
///         }
///         feed.finish();
///     });
///     let mut sum = 0;
///     while let Iteration::Present(i) = numbers.next().await {
///         sum += i;
///     }
///     Ok(sum)
/// });
/// assert_eq!(cont.result().unwrap(), 6);
/// ```
pub struct IterationBridge<T, S> {
    source: Option<S>,
    channel: Arc<Channel<T>>,
    exhausted: bool,
}

// Neither the source nor the queued elements are ever pinned.
impl<T, S> Unpin for IterationBridge<T, S> {}

/// Bridge over the multi-shot source `source`.
pub fn iterate<T, S>(source: S) -> IterationBridge<T, S>
where
    S: FnOnce(Feed<T>),
{
    IterationBridge::new(source)
}

impl<T, S> IterationBridge<T, S>
where
    S: FnOnce(Feed<T>),
{
    pub fn new(source: S) -> Self {
        Self {
            source: Some(source),
            channel: Arc::new(Channel {
                queue: Mutex::new(Queue {
                    items: VecDeque::new(),
                    closed: false,
                    waker: None,
                }),
            }),
            exhausted: false,
        }
    }

    pub fn is_exhausted(&self) -> bool {
        self.exhausted
    }
}

impl<T, S> IterationBridge<T, S>
where
    T: Send + 'static,
    S: FnOnce(Feed<T>) + 'static,
{
    /// Await the next step of the sequence.
    pub fn next(&mut self) -> NextStep<'_, T, S> {
        NextStep { bridge: self }
    }

    /// Await every remaining element, handing each to `f`.
    pub async fn for_each<F>(mut self, mut f: F)
    where
        F: FnMut(T),
    {
        while let Iteration::Present(element) = self.next().await {
            f(element);
        }
    }

    fn poll_step(&mut self, cx: &mut Context<'_>) -> Poll<Iteration<T>> {
        if self.exhausted {
            return Poll::Ready(Iteration::Exhausted);
        }

        if let Some(source) = self.source.take() {
            lock(&self.channel.queue).waker = Some(cx.waker().clone());
            let feed = Feed {
                channel: Arc::clone(&self.channel),
            };
            context::mark(Suspension::Bridge);
            context::defer(Box::new(move || source(feed)));
            return Poll::Pending;
        }

        let mut queue = lock(&self.channel.queue);
        if let Some(element) = queue.items.pop_front() {
            return Poll::Ready(Iteration::Present(element));
        }
        if queue.closed {
            drop(queue);
            self.exhausted = true;
            tracing::trace!("sequence exhausted");
            return Poll::Ready(Iteration::Exhausted);
        }
        let stale = queue
            .waker
            .as_ref()
            .is_none_or(|waker| !waker.will_wake(cx.waker()));
        if stale {
            queue.waker = Some(cx.waker().clone());
        }
        context::mark(Suspension::Bridge);
        Poll::Pending
    }
}

impl<T, S> Drop for IterationBridge<T, S> {
    fn drop(&mut self) {
        // nothing reads the queue any more: absorb later deliveries
        let (items, waker) = {
            let mut queue = lock(&self.channel.queue);
            queue.closed = true;
            (std::mem::take(&mut queue.items), queue.waker.take())
        };
        drop(items);
        drop(waker);
    }
}

/// Future returned by [`IterationBridge::next`].
pub struct NextStep<'a, T, S> {
    bridge: &'a mut IterationBridge<T, S>,
}

impl<T, S> Future for NextStep<'_, T, S>
where
    T: Send + 'static,
    S: FnOnce(Feed<T>) + 'static,
{
    type Output = Iteration<T>;

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Iteration<T>> {
        self.get_mut().bridge.poll_step(cx)
    }
}

impl<T, S> Stream for IterationBridge<T, S>
where
    T: Send + 'static,
    S: FnOnce(Feed<T>) + 'static,
{
    type Item = T;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<T>> {
        self.get_mut().poll_step(cx).map(Iteration::present_value)
    }
}

impl<T, S> FusedStream for IterationBridge<T, S>
where
    T: Send + 'static,
    S: FnOnce(Feed<T>) + 'static,
{
    fn is_terminated(&self) -> bool {
        self.exhausted
    }
}
