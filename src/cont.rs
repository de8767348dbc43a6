//! The suspendable unit of sequential computation.
//!
//! A [`Continuation`] owns a computation (an `async` block returning
//! [`Result`]) and drives it itself: construction polls it until the first
//! suspension, and every wake re-polls it synchronously inside the waking
//! call. No executor is involved.
//!
//! # Scheduling
//!
//! Each frame carries a small state machine: `IDLE` (parked), `RUNNING`,
//! `NOTIFIED` (woken while running; poll again before parking) and `DONE`.
//! A wake that finds the frame running only flips it to `NOTIFIED`, so a
//! frame is never polled re-entrantly and no wake is lost.
//! Callback registrations made during a poll run once the frame has parked;
//! a frame resumed from inside one of them queues its next registrations
//! behind it rather than nesting (see `context`).
//!
//! Wakers handed to awaited things reference the frame weakly. Only the
//! [`Continuation`] handle (and a detached frame's own keep-alive) owns it.

use std::borrow::Cow;
use std::fmt;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::pin::Pin;
use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::{Arc, Mutex, Weak};
use std::task::{Context, Poll, Wake, Waker};

use futures::FutureExt;
use futures::future::BoxFuture;

use crate::config::Config;
use crate::context::{self, Suspension};
use crate::error::{Error, Result};
use crate::slot::ResultSlot;
use crate::sync::lock;

const IDLE: u8 = 0;
const RUNNING: u8 = 1;
const NOTIFIED: u8 = 2;
const DONE: u8 = 3;

/// Observable state of a [`Continuation`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum State {
    /// The computation is being polled right now.
    Running,
    /// The computation is parked, waiting to be resumed.
    Suspended(Suspension),
    /// The computation finished; its outcome sits in the result slot.
    Completed,
}

struct Completion<R> {
    slot: ResultSlot<R>,
    waiter: Option<Waker>,
    keep_alive: Option<Arc<Frame<R>>>,
}

struct Frame<R> {
    name: Option<Cow<'static, str>>,
    schedule: AtomicU8,
    suspension: AtomicU8,
    computation: Mutex<Option<BoxFuture<'static, Result<R>>>>,
    completion: Mutex<Completion<R>>,
    waker: Waker,
}

trait Resume: Send + Sync {
    fn resume(self: Arc<Self>);
}

/// Waker target. Holds the frame weakly: waking a dropped frame does nothing.
struct Resumer {
    frame: Weak<dyn Resume>,
}

impl Wake for Resumer {
    fn wake(self: Arc<Self>) {
        self.wake_by_ref();
    }

    fn wake_by_ref(self: &Arc<Self>) {
        match self.frame.upgrade() {
            Some(frame) => frame.resume(),
            None => tracing::trace!("wake for a dropped continuation ignored"),
        }
    }
}

impl<R: Send + 'static> Resume for Frame<R> {
    fn resume(self: Arc<Self>) {
        self.run();
    }
}

impl<R: Send + 'static> Frame<R> {
    /// Identity of this frame in the thread's drain queues.
    fn key(self: &Arc<Self>) -> usize {
        Arc::as_ptr(self).cast::<()>() as usize
    }

    fn label(&self) -> &str {
        self.name.as_deref().unwrap_or("anonymous")
    }

    /// Move `IDLE -> RUNNING`, or record the wake on a running frame.
    ///
    /// Returns `true` if the caller now owns the run.
    fn claim(&self) -> bool {
        let mut current = self.schedule.load(Ordering::Acquire);
        loop {
            let next = match current {
                IDLE => RUNNING,
                RUNNING => NOTIFIED,
                _ => return false,
            };
            match self.schedule.compare_exchange_weak(
                current,
                next,
                Ordering::AcqRel,
                Ordering::Acquire,
            ) {
                Ok(_) => return next == RUNNING,
                Err(actual) => current = actual,
            }
        }
    }

    fn run(self: &Arc<Self>) {
        if !self.claim() {
            return;
        }
        tracing::trace!(continuation = self.label(), "resumed");
        loop {
            let (poll, activation) = context::enter(|| self.poll_computation());
            let outcome = match poll {
                Poll::Ready(outcome) => outcome,
                Poll::Pending => {
                    self.suspension
                        .store(activation.suspension().to_u8(), Ordering::Release);
                    if !activation.has_deferred() {
                        match self.schedule.compare_exchange(
                            RUNNING,
                            IDLE,
                            Ordering::AcqRel,
                            Ordering::Acquire,
                        ) {
                            Ok(_) => {
                                tracing::trace!(
                                    continuation = self.label(),
                                    suspension = ?activation.suspension(),
                                    "parked"
                                );
                                return;
                            }
                            Err(_) => {
                                self.schedule.store(RUNNING, Ordering::Release);
                                continue;
                            }
                        }
                    }
                    // Registrations run with the frame parked so a delivery made
                    // from inside one resumes the frame right there.
                    let notified = self.schedule.swap(IDLE, Ordering::AcqRel) == NOTIFIED;
                    activation.run_deferred(self.key());
                    if notified && self.claim() {
                        continue;
                    }
                    return;
                }
            };
            self.complete(outcome);
            return;
        }
    }

    fn poll_computation(&self) -> Poll<Result<R>> {
        let mut computation = lock(&self.computation);
        let Some(future) = computation.as_mut() else {
            return Poll::Pending;
        };
        let mut cx = Context::from_waker(&self.waker);
        let poll = future.as_mut().poll(&mut cx);
        let finished = if poll.is_ready() {
            computation.take()
        } else {
            None
        };
        drop(computation);
        drop(finished);
        poll
    }

    fn complete(&self, outcome: Result<R>) {
        let failed = outcome.is_err();
        let (waiter, keep_alive) = {
            let mut completion = lock(&self.completion);
            if let Err(error) = completion.slot.store(outcome) {
                tracing::error!(continuation = self.label(), %error, "Bug: continuation completed twice");
            }
            self.schedule.store(DONE, Ordering::Release);
            (completion.waiter.take(), completion.keep_alive.take())
        };
        tracing::trace!(continuation = self.label(), failed, "completed");
        if let Some(waiter) = waiter {
            waiter.wake();
        }
        drop(keep_alive);
    }
}

/// A running or finished computation that can be awaited by another one.
///
/// The handle owns the computation exclusively. Dropping it in any state
/// releases the computation and everything it owns, including child
/// continuations it was awaiting.
///
/// Awaiting a `Continuation` yields its outcome: a finished one is ready at
/// once, otherwise the awaiting computation parks and is resumed when this
/// one completes.
///
/// # Examples
///
/// ```rust
/// use cont_bridge::{Continuation, callback};
///
/// let outer = Continuation::new(async {
///     let inner = Continuation::new(async {
///         let n: u32 = callback(|deliver| deliver.deliver(20)).await;
///         Ok(n + 1)
///     });
///     Ok(inner.await? * 2)
/// });
/// assert_eq!(outer.result().unwrap(), 42);
/// ```
pub struct Continuation<R> {
    frame: Arc<Frame<R>>,
}

impl<R: Send + 'static> Continuation<R> {
    /// Wrap `computation` and run it until its first suspension or completion.
    pub fn new<F>(computation: F) -> Self
    where
        F: Future<Output = Result<R>> + Send + 'static,
    {
        Self::with_config(Config::default(), computation)
    }

    /// An already completed continuation holding `value`.
    pub fn ready(value: R) -> Self {
        Self::new(async move { Ok(value) })
    }

    pub(crate) fn with_config<F>(config: Config, computation: F) -> Self
    where
        F: Future<Output = Result<R>> + Send + 'static,
    {
        let computation: BoxFuture<'static, Result<R>> = if config.capture_panics {
            AssertUnwindSafe(computation)
                .catch_unwind()
                .map(|caught| caught.unwrap_or_else(|payload| Err(Error::panicked(payload))))
                .boxed()
        } else {
            computation.boxed()
        };

        let frame = Arc::new_cyclic(|weak: &Weak<Frame<R>>| {
            let resume: Weak<dyn Resume> = weak.clone();
            Frame {
                name: config.name,
                schedule: AtomicU8::new(IDLE),
                suspension: AtomicU8::new(Suspension::Foreign.to_u8()),
                computation: Mutex::new(Some(computation)),
                completion: Mutex::new(Completion {
                    slot: ResultSlot::new(),
                    waiter: None,
                    keep_alive: None,
                }),
                waker: Waker::from(Arc::new(Resumer { frame: resume })),
            }
        });
        frame.run();
        Self { frame }
    }

    pub fn state(&self) -> State {
        match self.frame.schedule.load(Ordering::Acquire) {
            IDLE => State::Suspended(Suspension::from_u8(
                self.frame.suspension.load(Ordering::Acquire),
            )),
            DONE => State::Completed,
            _ => State::Running,
        }
    }

    pub fn is_completed(&self) -> bool {
        self.state() == State::Completed
    }

    pub fn name(&self) -> Option<&str> {
        self.frame.name.as_deref()
    }

    /// Take the outcome if the computation has completed.
    ///
    /// Returns `None` while it is still suspended, and after the outcome was
    /// taken once. Awaiting the continuation after its outcome was taken
    /// yields [`Error::ResultTaken`].
    pub fn try_result(&mut self) -> Option<Result<R>> {
        lock(&self.frame.completion).slot.try_take()
    }

    /// Extract the value, passing a captured error to `on_error` instead of
    /// returning it.
    ///
    /// A continuation that has not completed yields `R::default()`.
    ///
    /// ```rust
    /// use cont_bridge::{Continuation, Error};
    ///
    /// let cont: Continuation<i32> = Continuation::new(async { Err(Error::failed("no route")) });
    /// let value = cont.get_result(|error| {
    ///     assert_eq!(error.to_string(), "computation failed: no route");
    ///     -1
    /// });
    /// assert_eq!(value, -1);
    /// ```
    pub fn get_result<H>(mut self, on_error: H) -> R
    where
        R: Default,
        H: FnOnce(Error) -> R,
    {
        match self.try_result() {
            Some(Ok(value)) => value,
            Some(Err(error)) => on_error(error),
            None => R::default(),
        }
    }

    /// Extract the outcome, returning a captured error as `Err`.
    ///
    /// A continuation that has not completed yields `Ok(R::default())`.
    pub fn result(mut self) -> Result<R>
    where
        R: Default,
    {
        self.try_result().unwrap_or_else(|| Ok(R::default()))
    }

    /// Give up the handle but keep the computation alive until it completes.
    ///
    /// The outcome of a detached computation is discarded.
    pub fn detach(self) {
        let mut completion = lock(&self.frame.completion);
        if self.frame.schedule.load(Ordering::Acquire) != DONE {
            completion.keep_alive = Some(Arc::clone(&self.frame));
        }
    }
}

/// Continuation over `computation`, started immediately.
///
/// Shorthand for [`Continuation::new`].
pub fn continuation<R, F>(computation: F) -> Continuation<R>
where
    R: Send + 'static,
    F: Future<Output = Result<R>> + Send + 'static,
{
    Continuation::new(computation)
}

impl<R: Send + 'static> Future for Continuation<R> {
    type Output = Result<R>;

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        let mut completion = lock(&self.frame.completion);
        if let Some(outcome) = completion.slot.try_take() {
            return Poll::Ready(outcome);
        }
        if completion.slot.is_written() {
            return Poll::Ready(Err(Error::ResultTaken));
        }
        let stale = completion
            .waiter
            .as_ref()
            .is_none_or(|waiter| !waiter.will_wake(cx.waker()));
        if stale {
            completion.waiter = Some(cx.waker().clone());
        }
        context::mark(Suspension::Continuation);
        Poll::Pending
    }
}

impl<R> Drop for Continuation<R> {
    fn drop(&mut self) {
        if self.frame.schedule.load(Ordering::Acquire) != DONE {
            tracing::trace!(
                continuation = self.frame.name.as_deref().unwrap_or("anonymous"),
                "dropped before completion"
            );
        }
    }
}

impl<R: Send + 'static> fmt::Debug for Continuation<R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Continuation")
            .field("name", &self.name())
            .field("state", &self.state())
            .finish()
    }
}
