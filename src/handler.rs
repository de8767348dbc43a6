//! Functions for driving continuations from synchronous code.
//!
//! These are for the outermost caller, which is not itself a continuation
//! and cannot await. They block the calling thread until the continuation
//! completes, so the delivery that completes it must come from another
//! thread (or already have happened).

use crate::cont::Continuation;
use crate::error::{Error, Result};

/// Block until `cont` completes and return its outcome.
///
/// ```rust
/// use cont_bridge::{Continuation, Deliver, callback, wait};
///
/// let cont = Continuation::new(async {
///     let n = callback(|deliver: Deliver<u32>| {
///         std::thread::spawn(move || deliver.deliver(9));
///     })
///     .await;
///     Ok(n * n)
/// });
/// assert_eq!(wait(cont).unwrap(), 81);
/// ```
pub fn wait<R>(cont: Continuation<R>) -> Result<R>
where
    R: Send + 'static,
{
    futures::executor::block_on(cont)
}

/// Block until `cont` completes, passing a captured error to `on_error`.
///
/// Nothing escapes as `Err`: the handler decides what value stands in for a
/// failed computation.
pub fn handle<R, H>(cont: Continuation<R>, on_error: H) -> R
where
    R: Send + 'static,
    H: FnOnce(Error) -> R,
{
    match wait(cont) {
        Ok(value) => value,
        Err(error) => {
            tracing::debug!(%error, "continuation failed, handing error to caller");
            on_error(error)
        }
    }
}
