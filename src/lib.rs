//! # Cont-bridge: Sequential Code over Callback APIs
//!
//! Write top-to-bottom `async` code against APIs that report results through
//! callbacks, without chaining the callbacks by hand and without an executor.
//!
//! ## Core Types
//!
//! - **[`Continuation<R>`]**: a computation that starts eagerly, parks when it
//!   awaits something unfinished, and is resumed synchronously by whoever
//!   completes that thing
//! - **[`CallbackBridge`]**: awaitable over a single-shot API that calls its
//!   [`Deliver`] handle once
//! - **[`IterationBridge`]**: awaitable steps over a multi-shot source that
//!   pushes elements through a [`Feed`] and then an empty delivery
//! - **[`Iteration<T>`]**: one step of a multi-shot source, `Present(T)` or
//!   `Exhausted`
//! - **[`ResultSlot<R>`]**: write-once value-or-error storage
//!
//! ## Example
//!
//! ```
//! use cont_bridge::*;
//!
//! // A callback-style API that answers on another thread
//! fn fetch(on_done: Deliver<(String, i32)>) {
//!     std::thread::spawn(move || on_done.deliver(("hello world".to_string(), 42)));
//! }
//!
//! let cont = Continuation::new(async {
//!     let (greeting, answer) = callback(fetch).await;
//!     Ok(format!("{greeting}: {answer}"))
//! });
//!
//! assert_eq!(wait(cont).unwrap(), "hello world: 42");
//! ```
//!
//! ## Errors
//!
//! A computation returns [`Result`]. An `Err` (or a panic) is captured when the
//! computation ends and surfaces only where its outcome is consumed: awaiting
//! the continuation, [`Continuation::result`], [`Continuation::get_result`]
//! or [`wait`].
//!
//! ## Common Functions
//!
//! **Building:**
//! - [`continuation(fut)`] - Start a computation
//! - [`builder()`] - Configure a computation before starting it
//! - [`callback(api)`] - Await a single-shot callback API
//! - [`iterate(source)`] - Await steps of a multi-shot source
//! - [`for_await!`] - Loop over a multi-shot source
//!
//! **Driving from synchronous code:**
//! - [`wait(cont)`] - Block until completion
//! - [`handle(cont, on_error)`] - Block until completion, handling errors
//!
//! [`continuation(fut)`]: continuation
//! [`callback(api)`]: callback
//! [`iterate(source)`]: iterate
//! [`wait(cont)`]: wait
//! [`handle(cont, on_error)`]: handle

mod bridge;
mod config;
mod context;
mod cont;
mod error;
mod handler;
mod iteration;
mod macros;
mod slot;
mod sync;

pub mod prelude;

pub use bridge::*;
pub use config::{Builder, Config, builder};
pub use context::Suspension;
pub use cont::{Continuation, State, continuation};
pub use error::{BoxError, Error, Result};
pub use handler::*;
pub use iteration::Iteration;
pub use slot::ResultSlot;
