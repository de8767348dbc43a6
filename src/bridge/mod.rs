//! Adapters from callback-style APIs to awaitables
//!
//! Single-shot APIs deliver one result through a [`Deliver`] handle;
//! multi-shot sources push elements through a [`Feed`] and finish with an
//! empty delivery.

mod callback;
mod iterate;

pub use callback::{CallbackBridge, Deliver, callback};
pub use iterate::{Feed, IterationBridge, NextStep, iterate};
