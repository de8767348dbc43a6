use std::future::Future;
use std::pin::Pin;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::task::{Context, Poll, Waker};

use crate::context::{self, Suspension};
use crate::sync::lock;

struct Handoff<R> {
    value: Option<R>,
    waker: Option<Waker>,
}

struct Latch<R> {
    delivered: AtomicBool,
    handoff: Mutex<Handoff<R>>,
}

/// Delivery handle passed to a single-shot API.
///
/// Only the first [`deliver`](Deliver::deliver) counts; later calls (from any
/// clone) are absorbed. Delivering resumes the awaiting computation before
/// the call returns.
pub struct Deliver<R> {
    latch: Arc<Latch<R>>,
}

impl<R> Clone for Deliver<R> {
    fn clone(&self) -> Self {
        Self {
            latch: Arc::clone(&self.latch),
        }
    }
}

impl<R> Deliver<R> {
    pub fn deliver(&self, value: R) {
        if self.latch.delivered.swap(true, Ordering::AcqRel) {
            tracing::trace!("duplicate delivery absorbed");
            return;
        }
        let waker = {
            let mut handoff = lock(&self.latch.handoff);
            handoff.value = Some(value);
            handoff.waker.take()
        };
        if let Some(waker) = waker {
            waker.wake();
        }
    }

    pub fn is_delivered(&self) -> bool {
        self.latch.delivered.load(Ordering::Acquire)
    }

    /// Turn the handle into a plain closure, for APIs that take one.
    pub fn into_callback(self) -> impl Fn(R) + Clone + Send + Sync + 'static
    where
        R: Send + 'static,
    {
        move |value| self.deliver(value)
    }
}

impl Deliver<()> {
    /// Deliver the no-value completion.
    pub fn done(&self) {
        self.deliver(());
    }
}

enum BridgeState<R, A> {
    Idle(A),
    Waiting(Arc<Latch<R>>),
    Delivered,
}

/// Awaitable over a single-shot callback API.
///
/// The API is any `FnOnce(Deliver<R>)` that eventually calls
/// [`Deliver::deliver`], now or later, from this thread or another. Awaiting
/// the bridge always suspends first. Inside a [`Continuation`](crate::Continuation)
/// the API is called once the computation has parked, so a synchronous
/// delivery resumes it before the API's own code after the delivery runs.
///
/// # Examples
///
/// ```rust
/// use cont_bridge::{Continuation, Deliver, callback};
///
/// fn lookup(key: &'static str, on_done: Deliver<(String, usize)>) {
///     on_done.deliver((key.to_uppercase(), key.len()));
/// }
///
/// let cont = Continuation::new(async {
///     let (upper, len) = callback(|deliver| lookup("abc", deliver)).await;
///     Ok(format!("{upper}:{len}"))
/// });
/// assert_eq!(cont.result().unwrap(), "ABC:3");
/// ```
pub struct CallbackBridge<R, A> {
    state: BridgeState<R, A>,
}

// The API closure is moved out by value and never pinned.
impl<R, A> Unpin for CallbackBridge<R, A> {}

impl<R, A> CallbackBridge<R, A>
where
    A: FnOnce(Deliver<R>),
{
    pub fn new(api: A) -> Self {
        Self {
            state: BridgeState::Idle(api),
        }
    }
}

/// Bridge over the single-shot API `api`.
pub fn callback<R, A>(api: A) -> CallbackBridge<R, A>
where
    A: FnOnce(Deliver<R>),
{
    CallbackBridge::new(api)
}

impl<R, A> Future for CallbackBridge<R, A>
where
    R: Send + 'static,
    A: FnOnce(Deliver<R>) + 'static,
{
    type Output = R;

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<R> {
        let this = self.get_mut();
        match std::mem::replace(&mut this.state, BridgeState::Delivered) {
            BridgeState::Idle(api) => {
                let latch = Arc::new(Latch {
                    delivered: AtomicBool::new(false),
                    handoff: Mutex::new(Handoff {
                        value: None,
                        waker: Some(cx.waker().clone()),
                    }),
                });
                let deliver = Deliver {
                    latch: Arc::clone(&latch),
                };
                this.state = BridgeState::Waiting(latch);
                context::mark(Suspension::Bridge);
                context::defer(Box::new(move || api(deliver)));
                Poll::Pending
            }
            BridgeState::Waiting(latch) => {
                let value = {
                    let mut handoff = lock(&latch.handoff);
                    let value = handoff.value.take();
                    if value.is_none() {
                        let stale = handoff
                            .waker
                            .as_ref()
                            .is_none_or(|waker| !waker.will_wake(cx.waker()));
                        if stale {
                            handoff.waker = Some(cx.waker().clone());
                        }
                    }
                    value
                };
                match value {
                    Some(value) => Poll::Ready(value),
                    None => {
                        this.state = BridgeState::Waiting(latch);
                        context::mark(Suspension::Bridge);
                        Poll::Pending
                    }
                }
            }
            BridgeState::Delivered => panic!("`CallbackBridge` polled after delivery"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{Continuation, State};
    use futures::task::noop_waker;

    #[test]
    fn test_first_delivery_wins() {
        let cont = Continuation::new(async {
            let n: u32 = callback(|deliver| {
                deliver.deliver(1);
                deliver.deliver(2);
                deliver.clone().deliver(3);
            })
            .await;
            Ok(n)
        });
        assert_eq!(cont.result().unwrap(), 1);
    }

    #[test]
    fn test_duplicate_deliveries_from_threads() {
        let cont = Continuation::new(async {
            let n: u32 = callback(|deliver| {
                let handles: Vec<_> = (1..=3)
                    .map(|i| {
                        let deliver = deliver.clone();
                        std::thread::spawn(move || {
                            std::thread::sleep(std::time::Duration::from_millis(10 * i));
                            deliver.deliver(i as u32);
                        })
                    })
                    .collect();
                std::thread::spawn(move || {
                    for handle in handles {
                        handle.join().unwrap();
                    }
                });
            })
            .await;
            Ok(n)
        });
        assert_eq!(crate::wait(cont).unwrap(), 1);
    }

    #[test]
    fn test_always_suspends_even_when_value_is_ready() {
        let mut bridge = callback(|deliver: Deliver<u8>| deliver.deliver(7));
        let waker = noop_waker();
        let mut cx = Context::from_waker(&waker);

        // outside a continuation the API runs inline during the first poll
        assert!(Pin::new(&mut bridge).poll(&mut cx).is_pending());
        assert_eq!(Pin::new(&mut bridge).poll(&mut cx), Poll::Ready(7));
    }

    #[test]
    fn test_synchronous_api_needs_no_external_trigger() {
        let cont = Continuation::new(async {
            let pair: (String, i32) =
                callback(|deliver| deliver.deliver(("xy".to_string(), 2))).await;
            Ok(pair)
        });
        assert_eq!(cont.state(), State::Completed);
        assert_eq!(cont.result().unwrap(), ("xy".to_string(), 2));
    }

    #[test]
    fn test_api_code_after_delivery_runs_after_consumer_parks() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let cont = Continuation::new({
            let log = Arc::clone(&log);
            async move {
                let api_log = Arc::clone(&log);
                let n: u32 = callback(move |deliver| {
                    api_log.lock().unwrap().push("api: before delivery");
                    deliver.deliver(42);
                    api_log.lock().unwrap().push("api: after delivery");
                })
                .await;
                log.lock().unwrap().push("consumer: resumed");
                Ok(n)
            }
        });

        assert_eq!(
            *log.lock().unwrap(),
            vec![
                "api: before delivery",
                "consumer: resumed",
                "api: after delivery"
            ]
        );
        assert_eq!(cont.result().unwrap(), 42);
    }

    #[test]
    fn test_many_synchronous_bridges_in_constant_stack() {
        const STEPS: u64 = 100_000;

        let worker = std::thread::Builder::new()
            .stack_size(2 * 1024 * 1024)
            .spawn(|| {
                let cont = Continuation::new(async {
                    let mut total = 0;
                    for _ in 0..STEPS {
                        total += callback(|deliver: Deliver<u64>| deliver.deliver(1)).await;
                    }
                    Ok(total)
                });
                assert!(cont.is_completed());
                cont.result().unwrap()
            })
            .unwrap();
        assert_eq!(worker.join().unwrap(), STEPS);
    }

    #[test]
    fn test_next_api_runs_after_previous_api_returns() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let cont = Continuation::new({
            let log = Arc::clone(&log);
            async move {
                for name in ["first", "second"] {
                    let api_log = Arc::clone(&log);
                    let got: &str = callback(move |deliver| {
                        api_log.lock().unwrap().push(format!("{name}: deliver"));
                        deliver.deliver(name);
                        api_log.lock().unwrap().push(format!("{name}: return"));
                    })
                    .await;
                    log.lock().unwrap().push(format!("consumer: {got}"));
                }
                Ok(())
            }
        });

        assert!(cont.is_completed());
        assert_eq!(
            *log.lock().unwrap(),
            vec![
                "first: deliver",
                "consumer: first",
                "first: return",
                "second: deliver",
                "consumer: second",
                "second: return",
            ]
        );
    }

    #[test]
    fn test_unit_bridge_done() {
        let cont = Continuation::new(async {
            callback(|deliver: Deliver<()>| {
                std::thread::spawn(move || deliver.done());
            })
            .await;
            Ok("finished")
        });
        assert_eq!(crate::wait(cont).unwrap(), "finished");
    }

    #[test]
    fn test_into_callback_for_closure_taking_apis() {
        fn legacy_api(on_result: Box<dyn Fn(u64) + Send>) {
            on_result(64);
        }

        let cont = Continuation::new(async {
            let n = callback(|deliver: Deliver<u64>| {
                legacy_api(Box::new(deliver.into_callback()))
            })
            .await;
            Ok(n)
        });
        assert_eq!(cont.result().unwrap(), 64);
    }

    #[test]
    fn test_is_delivered_tracks_latch() {
        let stash = Arc::new(Mutex::new(None));
        let _cont = Continuation::new({
            let stash = Arc::clone(&stash);
            async move {
                callback(move |deliver: Deliver<u8>| {
                    *stash.lock().unwrap() = Some(deliver);
                })
                .await;
                Ok(())
            }
        });
        let deliver = stash.lock().unwrap().take().unwrap();
        assert!(!deliver.is_delivered());
        deliver.deliver(0);
        assert!(deliver.is_delivered());
    }

    #[test]
    fn test_bridge_under_futures_executor() {
        let n = futures::executor::block_on(callback(|deliver: Deliver<u32>| {
            std::thread::spawn(move || deliver.deliver(5));
        }));
        assert_eq!(n, 5);
    }

    #[tokio::test]
    async fn test_bridge_under_tokio() {
        let text = callback(|deliver: Deliver<String>| {
            std::thread::spawn(move || {
                std::thread::sleep(std::time::Duration::from_millis(5));
                deliver.deliver("from a plain thread".to_string());
            });
        })
        .await;
        assert_eq!(text, "from a plain thread");
    }
}
